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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (temp dirs, partition images, digests), keys.rs (fixed RSA
//! signing keys), payload.rs (payload byte builder).

pub mod fixtures;
pub mod keys;
pub mod payload;
