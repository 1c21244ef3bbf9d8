// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic file sink.
//!
//! Writes the payload to a temporary file in the destination directory,
//! applies the configured permissions, then renames into place. A
//! concurrent reader sees either the previous complete payload or the new
//! one, never a partial write.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use keyrelay_core::{Sink, SinkError};

pub struct FileSink {
    path: PathBuf,
    mode: u32,
    name: String,
}

impl FileSink {
    /// `mode` is the Unix permission bits applied to the written file.
    pub fn new(path: &Path, mode: u32) -> Result<Self, SinkError> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                SinkError::Config(format!("sink path {} has no parent directory", path.display()))
            })?;
        if !parent.is_dir() {
            return Err(SinkError::Config(format!(
                "sink directory {} does not exist",
                parent.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            name: format!("file:{}", path.display()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, payload: &[u8]) -> Result<(), SinkError> {
        let path = self.path.clone();
        let mode = self.mode;
        let payload = payload.to_vec();

        // Blocking filesystem work off the async threads.
        tokio::task::spawn_blocking(move || write_atomic(&path, mode, &payload))
            .await
            .map_err(|e| SinkError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })??;

        debug!(sink = %self.name, "token file written");
        Ok(())
    }
}

/// Temp file in the destination directory, then rename into place. Same
/// filesystem, so the rename is atomic.
fn write_atomic(path: &Path, mode: u32, payload: &[u8]) -> Result<(), SinkError> {
    let parent = path.parent().expect("validated at construction");
    let io_err = |source: std::io::Error| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(payload).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(mode);
        tmp.as_file().set_permissions(perms).map_err(io_err)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.persist(path)
        .map_err(|e| io_err(e.error))
        .map(|_| ())
}
