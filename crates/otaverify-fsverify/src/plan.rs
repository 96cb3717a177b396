//! Install plan model shared by the actions of a verification pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use otaverify_payload::{DeltaArchiveManifest, PartitionInfo};
use serde::{Deserialize, Serialize};

use crate::error::{FsVerifyError, FsVerifyResult};

/// One partition to verify, with its pre- and post-update images.
///
/// An empty hash means "not applicable"; full-image installs have no source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Partition name.
    pub name: String,
    /// Device path of the image the update was built against.
    #[serde(default)]
    pub source_path: PathBuf,
    /// Expected size of the source image in bytes.
    #[serde(default)]
    pub source_size: u64,
    /// Expected SHA-256 digest of the source image.
    #[serde(default, with = "base64_bytes")]
    pub source_hash: Vec<u8>,
    /// Device path of the freshly written image.
    pub target_path: PathBuf,
    /// Expected size of the target image in bytes.
    pub target_size: u64,
    /// Expected SHA-256 digest of the target image.
    #[serde(with = "base64_bytes")]
    pub target_hash: Vec<u8>,
}

/// Partitions to verify, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPlan {
    /// Partitions in verification order.
    pub partitions: Vec<Partition>,
}

/// Maps partition names onto device paths for the inactive and active slots.
pub trait PartitionPathResolver {
    /// Path of the image the update applies over.
    fn source_path(&self, partition: &str) -> PathBuf;
    /// Path the update writes to.
    fn target_path(&self, partition: &str) -> PathBuf;
}

/// Resolves partitions to `<dir>/<name>.img` inside per-slot directories.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    source_dir: PathBuf,
    target_dir: PathBuf,
}

impl DirectoryResolver {
    /// Resolve source images in `source_dir` and target images in `target_dir`.
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
        }
    }
}

impl PartitionPathResolver for DirectoryResolver {
    fn source_path(&self, partition: &str) -> PathBuf {
        self.source_dir.join(format!("{partition}.img"))
    }

    fn target_path(&self, partition: &str) -> PathBuf {
        self.target_dir.join(format!("{partition}.img"))
    }
}

impl InstallPlan {
    /// Build a plan from the manifest's partitions, preserving their order.
    ///
    /// Partitions without `old_partition_info` get no source (full image).
    ///
    /// # Errors
    ///
    /// Returns [`FsVerifyError::IncompleteManifest`] when a partition lacks a
    /// name or new image size and hash.
    pub fn from_manifest(
        manifest: &DeltaArchiveManifest,
        resolver: &dyn PartitionPathResolver,
    ) -> FsVerifyResult<Self> {
        let mut partitions = Vec::with_capacity(manifest.partitions.len());
        for (index, update) in manifest.partitions.iter().enumerate() {
            let name = update
                .partition_name
                .clone()
                .filter(|name| !name.is_empty())
                .ok_or(FsVerifyError::IncompleteManifest {
                    index,
                    field: "partition_name",
                })?;
            let new_info =
                update
                    .new_partition_info
                    .as_ref()
                    .ok_or(FsVerifyError::IncompleteManifest {
                        index,
                        field: "new_partition_info",
                    })?;
            let (target_size, target_hash) = required_info(new_info, index)?;

            let mut partition = Partition {
                target_path: resolver.target_path(&name),
                target_size,
                target_hash,
                ..Partition::default()
            };
            if let Some(old_info) = &update.old_partition_info {
                let hash = old_info.hash.clone().unwrap_or_default();
                if !hash.is_empty() {
                    partition.source_path = resolver.source_path(&name);
                    partition.source_size = old_info.size.unwrap_or_default();
                    partition.source_hash = hash;
                }
            }
            partition.name = name;
            partitions.push(partition);
        }
        Ok(Self { partitions })
    }

    /// Read a JSON plan from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsVerifyError::Io`] or [`FsVerifyError::Json`].
    pub fn load(path: &Path) -> FsVerifyResult<Self> {
        let raw = fs::read(path).map_err(|source| FsVerifyError::io("read_plan", path, source))?;
        serde_json::from_slice(&raw).map_err(|source| FsVerifyError::json("parse_plan", path, source))
    }

    /// Write the plan to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FsVerifyError::Io`] or [`FsVerifyError::Json`].
    pub fn save(&self, path: &Path) -> FsVerifyResult<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|source| FsVerifyError::json("encode_plan", path, source))?;
        fs::write(path, json).map_err(|source| FsVerifyError::io("write_plan", path, source))
    }
}

fn required_info(info: &PartitionInfo, index: usize) -> FsVerifyResult<(u64, Vec<u8>)> {
    let size = info.size.ok_or(FsVerifyError::IncompleteManifest {
        index,
        field: "new_partition_info.size",
    })?;
    let hash = info
        .hash
        .clone()
        .filter(|hash| !hash.is_empty())
        .ok_or(FsVerifyError::IncompleteManifest {
            index,
            field: "new_partition_info.hash",
        })?;
    Ok((size, hash))
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}
