//! Default values and accepted bounds for configuration fields.

/// Default read chunk size for partition hashing (128 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;
/// Smallest accepted chunk size.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;
/// Largest accepted chunk size.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;
/// Payload major version accepted unless configured otherwise.
pub const DEFAULT_MAJOR_VERSION: u64 = 2;
/// Payload major versions the parser understands.
pub const KNOWN_MAJOR_VERSIONS: [u64; 2] = [1, 2];
/// Log level used when neither the file nor `RUST_LOG` names one.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Accepted `log_format` labels.
pub const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
