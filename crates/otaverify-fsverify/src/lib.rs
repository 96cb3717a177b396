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

//! Partition digest verification for installed updates.
//!
//! Layout: `plan.rs` (install plan model and JSON form), `verifier.rs`
//! (`FilesystemVerifierAction`), `state.rs` (pass lifecycle and cleanup
//! monitoring), `error.rs`.

pub mod error;
pub mod plan;
pub mod state;
pub mod verifier;

pub use error::{FsVerifyError, FsVerifyResult};
pub use plan::{DirectoryResolver, InstallPlan, Partition, PartitionPathResolver};
pub use state::{CleanupMonitor, VerificationState};
pub use verifier::{DEFAULT_CHUNK_SIZE, FilesystemVerifierAction, VerifierSettings, VerifierStep};
