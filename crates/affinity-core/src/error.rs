// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Error types shared by the affinity crates.

use thiserror::Error;

/// A specialized `Result` type for affinity operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `EIO`, returned for conversion and local I/O failures.
pub const EIO: i32 = 5;

/// `EINVAL`, returned for malformed input and configuration.
pub const EINVAL: i32 = 22;

/// `ENODATA`, returned when the control plane answers with an empty payload.
pub const ENODATA: i32 = 61;

/// Errors that can occur while synthesizing and installing a placement rule.
#[derive(Debug, Error)]
pub enum Error {
    /// The cluster control plane answered with a non-zero status.
    #[error("control plane returned status {code}: {message}")]
    ControlPlane {
        /// Status code reported by the control plane.
        code: i32,
        /// Message text reported by the control plane.
        message: String,
    },

    /// The external topology converter exited unsuccessfully.
    #[error("{tool} exited with {}: {stderr}", display_exit(.code))]
    Conversion {
        /// Name of the converter binary.
        tool: String,
        /// Exit code, `None` when the process was killed by a signal.
        code: Option<i32>,
        /// Captured standard error of the converter.
        stderr: String,
    },

    /// The rule template could not be rendered into well-formed text.
    #[error("template error: {0}")]
    Template(String),

    /// A command argument is missing or unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

impl Error {
    /// Creates a new template error.
    #[must_use]
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Returns the non-zero result code reported on the command surface.
    ///
    /// Control-plane failures pass their own status through; everything else
    /// maps to a negative errno value.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        match self {
            Self::ControlPlane { code, .. } if *code != 0 => *code,
            Self::ControlPlane { .. } | Self::Conversion { .. } | Self::Io(_) => -EIO,
            Self::Template(_) | Self::InvalidArgument(_) | Self::Config(_) | Self::Json(_) => {
                -EINVAL
            }
        }
    }

    /// Short name of the pipeline stage that produced this error.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::ControlPlane { .. } => "control_plane",
            Self::Conversion { .. } => "conversion",
            Self::Template(_) => "template",
            Self::InvalidArgument(_) => "argument",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
