// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Converter port between the binary and textual topology forms.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use affinity_core::{Error, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Converts topology descriptors between binary and editable text.
///
/// Implementations are trusted: their output is never repaired.
#[async_trait]
pub trait TopologyConverter: Send + Sync {
    /// Decompiles the binary descriptor at `input` into text at `output`.
    async fn decompile(&self, input: &Path, output: &Path) -> Result<()>;

    /// Compiles the text descriptor at `input` into binary at `output`.
    async fn compile(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Converter backed by the `crushtool` binary.
#[derive(Debug, Clone)]
pub struct CrushTool {
    binary: PathBuf,
}

impl CrushTool {
    /// Creates a converter invoking `binary`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    fn tool_name(&self) -> String {
        self.binary
            .file_name()
            .map_or_else(|| self.binary.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    async fn run(&self, mode: &str, input: &Path, output: &Path) -> Result<()> {
        debug!(
            tool = %self.binary.display(),
            mode,
            input = %input.display(),
            output = %output.display(),
            "Running topology converter"
        );

        let result = Command::new(&self.binary)
            .arg(mode)
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if result.status.success() {
            Ok(())
        } else {
            Err(Error::Conversion {
                tool: self.tool_name(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl TopologyConverter for CrushTool {
    async fn decompile(&self, input: &Path, output: &Path) -> Result<()> {
        self.run("-d", input, output).await
    }

    async fn compile(&self, input: &Path, output: &Path) -> Result<()> {
        self.run("-c", input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name() {
        assert_eq!(CrushTool::new("/usr/bin/crushtool").tool_name(), "crushtool");
        assert_eq!(CrushTool::new("crushtool").tool_name(), "crushtool");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CrushTool::new("false");

        let err = tool.compile(&dir.path().join("in"), &dir.path().join("out")).await.unwrap_err();
        match err {
            Error::Conversion { tool, code, .. } => {
                assert_eq!(tool, "false");
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CrushTool::new("true");
        tool.decompile(&dir.path().join("in"), &dir.path().join("out")).await.unwrap();
    }
}
