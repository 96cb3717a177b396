#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! File and environment backed configuration for the otaverify tools.
//!
//! Layout: `model.rs` (`VerifierConfig`), `defaults.rs` (default values and
//! bounds), `validate.rs` (field checks), `loader.rs` (JSON file plus
//! `OTAVERIFY_*` overrides), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_PREFIX, load, load_with_env};
pub use model::VerifierConfig;
