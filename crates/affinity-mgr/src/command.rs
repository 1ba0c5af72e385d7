// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Command surface: descriptors, request parsing and dispatch.

use std::collections::BTreeMap;

use affinity_core::error::EINVAL;
use affinity_core::{Error, Result};
use affinity_placement::RegionalDomains;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::synthesizer::{CreatedRule, RuleRequest, RuleSynthesizer};

/// Prefix of the rule-creation command.
pub const CREATE_POOL_PREFIX: &str = "affinity create pool";

/// Advertised description of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    /// Prefix followed by the argument signature.
    pub cmd: &'static str,
    /// One-line help text.
    pub desc: &'static str,
    /// Required capability.
    pub perm: &'static str,
}

/// Commands this module implements.
pub const COMMANDS: &[CommandDescriptor] = &[CommandDescriptor {
    cmd: "affinity create pool \
          name=poolname,type=CephString,req=true \
          name=region,type=CephString,req=true \
          name=pd,type=CephString,req=true \
          name=sd,type=CephString,req=true \
          name=td,type=CephString,req=true",
    desc: "create a placement rule with primary affinity to pd",
    perm: "rw",
}];

/// A parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command prefix.
    pub prefix: String,
    /// Named arguments.
    #[serde(flatten)]
    pub args: BTreeMap<String, String>,
}

impl CommandRequest {
    /// Creates a request without arguments.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), args: BTreeMap::new() }
    }

    /// Adds a named argument.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Parses the JSON command form, e.g. `{"prefix": "...", "poolname": "..."}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a flat object of strings.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.args
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidArgument(format!("missing required argument '{key}'")))
    }
}

/// Identity of whoever issued a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoker {
    /// Entity name echoed back in diagnostics.
    pub entity: String,
}

impl Invoker {
    /// Creates an invoker with an explicit entity.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self { entity: entity.into() }
    }

    /// The local user acting as `client_name`.
    #[must_use]
    pub fn local(client_name: &str) -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self::new(format!("{user} as {client_name}"))
    }
}

/// Result of a command: status code, data output and informative text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Zero on success, non-zero otherwise.
    pub retval: i32,
    /// Data output.
    pub stdout: String,
    /// Informative text.
    pub stderr: String,
}

impl CommandResult {
    /// Whether the command succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.retval == 0
    }

    fn failure(retval: i32, header: &str, cause: impl std::fmt::Display) -> Self {
        Self { retval, stdout: String::new(), stderr: format!("{header}\nError: {cause}") }
    }
}

/// Dispatches commands to the rule synthesizer.
pub struct CommandHandler {
    synthesizer: RuleSynthesizer,
    name_suffix: String,
}

impl CommandHandler {
    /// Creates a handler; rule names are the pool name followed by `name_suffix`.
    pub fn new(synthesizer: RuleSynthesizer, name_suffix: impl Into<String>) -> Self {
        Self { synthesizer, name_suffix: name_suffix.into() }
    }

    /// Returns the underlying synthesizer.
    #[must_use]
    pub fn synthesizer(&self) -> &RuleSynthesizer {
        &self.synthesizer
    }

    /// Builds the rule request a create-pool command describes.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing argument.
    pub fn rule_request(&self, request: &CommandRequest) -> Result<RuleRequest> {
        let pool = request.require("poolname")?;
        Ok(RuleRequest {
            name: format!("{pool}{}", self.name_suffix),
            domains: RegionalDomains::new(
                request.require("region")?,
                request.require("pd")?,
                request.require("sd")?,
                request.require("td")?,
            ),
        })
    }

    /// Handles one command invocation.
    pub async fn handle_command(
        &self,
        request: &CommandRequest,
        invoker: &Invoker,
    ) -> CommandResult {
        debug!(prefix = %request.prefix, entity = %invoker.entity, "Handling command");
        let header = format!("{} uid: {}", request.prefix, invoker.entity);

        match request.prefix.as_str() {
            CREATE_POOL_PREFIX => match self.create_pool_rule(request).await {
                Ok((created, stdout)) => CommandResult {
                    retval: 0,
                    stdout,
                    stderr: format!(
                        "{header}\nCreated rule '{}' with id {}",
                        created.name, created.id
                    ),
                },
                Err(err) => {
                    error!(prefix = %request.prefix, error = %err, "Command failed");
                    CommandResult::failure(err.status_code(), &header, err)
                }
            },
            other => CommandResult::failure(-EINVAL, &header, format!("unknown command '{other}'")),
        }
    }

    async fn create_pool_rule(&self, request: &CommandRequest) -> Result<(CreatedRule, String)> {
        let rule_request = self.rule_request(request)?;
        let created = self.synthesizer.create_rule(&rule_request).await?;
        let stdout = serde_json::to_string(&created)?;
        Ok((created, stdout))
    }
}
