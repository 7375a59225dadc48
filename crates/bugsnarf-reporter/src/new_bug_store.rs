//! On-disk markers recording which bug ids were already announced.

use std::fs::{create_dir_all, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bugsnarf_core::sanitize_path_segment;

/// Ids per shard directory.
const BUCKET_SIZE: u64 = 1000;

#[derive(Debug, Clone)]
/// Marker tree rooted at `base`: `<tag>/<tracker>/<id / 1000>/<id>`.
pub struct NewBugStore {
    base: PathBuf,
}

impl NewBugStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn marker_path(&self, tracker: &str, tag: &str, bug_id: u64) -> PathBuf {
        self.base
            .join(sanitize_path_segment(tag))
            .join(sanitize_path_segment(tracker))
            .join((bug_id / BUCKET_SIZE).to_string())
            .join(bug_id.to_string())
    }

    /// Creates the marker if absent. Returns `true` only for the call that
    /// created it.
    pub fn is_new(&self, tracker: &str, tag: &str, bug_id: u64) -> Result<bool> {
        let marker = self.marker_path(tracker, tag, bug_id);
        if let Some(bucket) = marker.parent() {
            create_dir_all(bucket)
                .with_context(|| format!("failed to create {}", bucket.display()))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(error) => {
                Err(error).with_context(|| format!("failed to create marker {}", marker.display()))
            }
        }
    }
}
