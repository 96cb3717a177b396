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

//! Update payload header parsing and signature verification.
//!
//! Layout: `metadata.rs` (header parse and manifest access), `signature.rs`
//! (metadata and payload signature checks), `manifest.rs` (protobuf model),
//! `key.rs` (public keys), `padding.rs` (digest padding), `error.rs`.

pub mod error;
pub mod key;
pub mod manifest;
pub mod metadata;
pub mod padding;
mod signature;

pub use error::{PayloadError, PayloadRegion, PayloadResult};
pub use key::{PayloadKey, RsaPayloadKey};
pub use manifest::{DeltaArchiveManifest, PartitionInfo, PartitionUpdate, Signature, Signatures};
pub use metadata::{
    HeaderParse, LEGACY_MAJOR_VERSION, MIN_HEADER_LEN, PAYLOAD_MAGIC, PayloadMetadata,
    SIGNED_MAJOR_VERSION,
};
pub use padding::{SHA256_DIGEST_INFO, pad_sha256_digest};
