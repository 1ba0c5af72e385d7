// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! In-process stand-ins for the control plane and the converter.
//!
//! Used by the test suites and for offline dry runs against a saved
//! descriptor.

use std::collections::HashMap;
use std::path::Path;

use affinity_core::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::control_plane::{ControlPlane, MonCommand, MonReply, GET_CRUSH_MAP, SET_CRUSH_MAP};
use crate::converter::TopologyConverter;

/// A control plane holding the topology descriptor in memory.
///
/// `osd getcrushmap` returns the stored descriptor and `osd setcrushmap`
/// replaces it with the input buffer. Any prefix can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryControlPlane {
    topology: Mutex<Vec<u8>>,
    submissions: Mutex<Vec<Vec<u8>>>,
    failures: Mutex<HashMap<String, (i32, String)>>,
}

impl MemoryControlPlane {
    /// Creates a control plane serving `topology`.
    #[must_use]
    pub fn new(topology: Vec<u8>) -> Self {
        Self { topology: Mutex::new(topology), ..Default::default() }
    }

    /// Makes every command with `prefix` answer with `status` and `message`.
    pub fn fail_with(&self, prefix: &str, status: i32, message: &str) {
        self.failures.lock().insert(prefix.to_string(), (status, message.to_string()));
    }

    /// The currently installed descriptor.
    #[must_use]
    pub fn topology(&self) -> Vec<u8> {
        self.topology.lock().clone()
    }

    /// Every descriptor accepted so far, in submission order.
    #[must_use]
    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl ControlPlane for MemoryControlPlane {
    async fn mon_command(&self, cmd: &MonCommand, inbuf: &[u8]) -> Result<MonReply> {
        if let Some((status, message)) = self.failures.lock().get(&cmd.prefix) {
            return Ok(MonReply::error(*status, message.clone()));
        }

        match cmd.prefix.as_str() {
            GET_CRUSH_MAP => Ok(MonReply::ok(self.topology())),
            SET_CRUSH_MAP => {
                *self.topology.lock() = inbuf.to_vec();
                self.submissions.lock().push(inbuf.to_vec());
                Ok(MonReply::ok(Vec::new()))
            }
            other => Ok(MonReply::error(-22, format!("unrecognized command '{other}'"))),
        }
    }
}

/// A converter that copies bytes unchanged in both directions.
///
/// With it the "binary" descriptor is simply the topology text, which lets
/// the full pipeline run without the external tool.
#[derive(Debug, Default)]
pub struct PassthroughConverter {
    compile_failure: Option<i32>,
}

impl PassthroughConverter {
    /// Creates a converter that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a converter whose `compile` exits with `code`.
    #[must_use]
    pub fn failing_compile(code: i32) -> Self {
        Self { compile_failure: Some(code) }
    }
}

#[async_trait]
impl TopologyConverter for PassthroughConverter {
    async fn decompile(&self, input: &Path, output: &Path) -> Result<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn compile(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(code) = self.compile_failure {
            return Err(Error::Conversion {
                tool: "passthrough".to_string(),
                code: Some(code),
                stderr: "compile failure requested".to_string(),
            });
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}
