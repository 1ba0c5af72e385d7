// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Control-plane port: fetching and installing the topology descriptor.
//!
//! Requests are JSON documents whose `prefix` field selects the operation.
//! Replies are the `(status, payload, message)` triple the monitors return.

use std::collections::BTreeMap;
use std::process::Stdio;

use affinity_core::error::{EIO, ENODATA};
use affinity_core::{ClusterConfig, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Prefix of the query returning the binary topology descriptor.
pub const GET_CRUSH_MAP: &str = "osd getcrushmap";

/// Prefix of the mutation installing a new binary topology descriptor.
pub const SET_CRUSH_MAP: &str = "osd setcrushmap";

/// A control-plane request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonCommand {
    /// Operation selector.
    pub prefix: String,
    /// Operation arguments.
    #[serde(flatten)]
    pub args: BTreeMap<String, serde_json::Value>,
}

impl MonCommand {
    /// Creates a request without arguments.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), args: BTreeMap::new() }
    }

    /// Adds an argument.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Query for the current topology descriptor.
    #[must_use]
    pub fn get_crush_map() -> Self {
        Self::new(GET_CRUSH_MAP)
    }

    /// Mutation installing the descriptor carried in the input buffer.
    #[must_use]
    pub fn set_crush_map() -> Self {
        Self::new(SET_CRUSH_MAP)
    }

    /// JSON encoding of the request.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Positional command line form: the prefix words followed by argument values.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv: Vec<String> = self.prefix.split_whitespace().map(str::to_string).collect();
        argv.extend(self.args.values().map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
        argv
    }
}

/// A control-plane reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonReply {
    /// Zero on success, a negative errno otherwise.
    pub status: i32,
    /// Binary payload.
    pub outb: Vec<u8>,
    /// Informational or error text.
    pub outs: String,
}

impl MonReply {
    /// A successful reply carrying `outb`.
    #[must_use]
    pub fn ok(outb: Vec<u8>) -> Self {
        Self { status: 0, outb, outs: String::new() }
    }

    /// A failed reply.
    #[must_use]
    pub fn error(status: i32, outs: impl Into<String>) -> Self {
        Self { status, outb: Vec::new(), outs: outs.into() }
    }
}

/// Transport for control-plane commands.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Sends `cmd` with the optional input buffer and waits for the reply.
    ///
    /// Transport failures are errors; a delivered command that the control
    /// plane rejects is an `Ok` reply with a non-zero status.
    async fn mon_command(&self, cmd: &MonCommand, inbuf: &[u8]) -> Result<MonReply>;
}

/// Fetches the current binary topology descriptor.
///
/// # Errors
///
/// Returns [`Error::ControlPlane`] carrying the status and message when the
/// query fails or returns an empty descriptor.
pub async fn fetch(control_plane: &dyn ControlPlane) -> Result<Vec<u8>> {
    let cmd = MonCommand::get_crush_map();
    debug!(command = %cmd.to_json()?, "Fetching topology descriptor");

    let reply = control_plane.mon_command(&cmd, &[]).await?;
    if reply.status != 0 {
        return Err(Error::ControlPlane { code: reply.status, message: reply.outs });
    }
    if reply.outb.is_empty() {
        return Err(Error::ControlPlane {
            code: -ENODATA,
            message: format!("'{GET_CRUSH_MAP}' returned an empty descriptor"),
        });
    }

    debug!(bytes = reply.outb.len(), "Fetched topology descriptor");
    Ok(reply.outb)
}

/// Installs `descriptor` as the authoritative topology.
///
/// # Errors
///
/// Returns [`Error::ControlPlane`] carrying the status and message when the
/// mutation fails.
pub async fn submit(control_plane: &dyn ControlPlane, descriptor: &[u8]) -> Result<()> {
    let cmd = MonCommand::set_crush_map();
    debug!(command = %cmd.to_json()?, bytes = descriptor.len(), "Submitting topology descriptor");

    let reply = control_plane.mon_command(&cmd, descriptor).await?;
    if reply.status != 0 {
        return Err(Error::ControlPlane { code: reply.status, message: reply.outs });
    }
    Ok(())
}

/// Control plane reached through the `ceph` command line client.
#[derive(Debug, Clone)]
pub struct CephCli {
    config: ClusterConfig,
}

impl CephCli {
    /// Creates a client from the cluster configuration.
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    fn command(&self, cmd: &MonCommand, with_input: bool) -> Command {
        let mut command = Command::new(&self.config.ceph_binary);
        if let Some(conf) = &self.config.conf {
            command.arg("--conf").arg(conf);
        }
        command.arg("--name").arg(&self.config.client_name);
        if let Some(keyring) = &self.config.keyring {
            command.arg("--keyring").arg(keyring);
        }
        command.args(cmd.argv());
        if with_input {
            command.args(["-i", "-"]);
        }
        command
            .stdin(if with_input { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ControlPlane for CephCli {
    async fn mon_command(&self, cmd: &MonCommand, inbuf: &[u8]) -> Result<MonReply> {
        let with_input = !inbuf.is_empty();
        let mut child = self.command(cmd, with_input).spawn()?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(inbuf).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        if let Err(err) = fed {
            warn!(prefix = %cmd.prefix, error = %err, "Failed to write command input");
        }

        // The client exits with the absolute errno value.
        let status = match output.status.code() {
            Some(0) => 0,
            Some(code) => -code.abs(),
            None => -EIO,
        };

        Ok(MonReply {
            status,
            outb: output.stdout,
            outs: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
