// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Scoped scratch space for one rule-creation operation.
//!
//! Both descriptor files live in a private directory that is removed when the
//! [`Workspace`] is dropped, so every exit path releases them.

use std::path::{Path, PathBuf};

use affinity_core::Result;
use tempfile::TempDir;
use tracing::{debug, warn};

const BINARY_FILE: &str = "crushmap.bin";
const TEXT_FILE: &str = "crushmap.txt";

/// Temporary binary and text descriptor files.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    binary: PathBuf,
    text: PathBuf,
}

impl Workspace {
    /// Creates a private directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("affinity-").tempdir_in(parent)?;
        let binary = dir.path().join(BINARY_FILE);
        let text = dir.path().join(TEXT_FILE);
        debug!(path = %dir.path().display(), "Created workspace");
        Ok(Self { dir, binary, text })
    }

    /// The private directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the binary descriptor.
    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.binary
    }

    /// Path of the editable text descriptor.
    #[must_use]
    pub fn text_path(&self) -> &Path {
        &self.text
    }

    /// Writes the binary descriptor.
    pub async fn write_binary(&self, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(&self.binary, bytes).await?;
        Ok(())
    }

    /// Reads the binary descriptor.
    pub async fn read_binary(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.binary).await?)
    }

    /// Writes the text descriptor.
    pub async fn write_text(&self, text: &str) -> Result<()> {
        tokio::fs::write(&self.text, text).await?;
        Ok(())
    }

    /// Reads the text descriptor.
    pub async fn read_text(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.text).await?)
    }

    /// Removes the directory now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().inspect_err(|err| {
            warn!(path = %path.display(), error = %err, "Failed to remove workspace");
        })?;
        debug!(path = %path.display(), "Removed workspace");
        Ok(())
    }
}
