// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Rule synthesizer: fetch, edit and resubmit the topology descriptor.
//!
//! # Pipeline
//!
//! 1. Fetch the binary descriptor from the control plane
//! 2. Decompile it into text with the converter
//! 3. Allocate the next rule id against that snapshot and render the rule
//! 4. Append the rule and compile the text back to binary
//! 5. Submit the new descriptor
//! 6. Remove the temporary files
//!
//! The sequence is not atomic. Two concurrent runs may read the same
//! snapshot, allocate the same id, and the later submission overwrites the
//! earlier one. Callers must serialize rule creation until the control plane
//! offers a compare-and-swap submission.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use affinity_core::{Config, Result};
use affinity_placement::rule::{DEFAULT_LEAF_TYPE, DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE};
use affinity_placement::{allocate_id, CrushMapText, RegionalDomains, Rule};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::control_plane::{self, ControlPlane};
use crate::converter::TopologyConverter;
use crate::workspace::Workspace;

/// Settings applied to every synthesized rule.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Directory the per-operation workspace is created in.
    pub temp_dir: PathBuf,
    /// Bucket type each `chooseleaf` step selects.
    pub leaf_type: String,
    /// Replication bounds as `(min_size, max_size)`.
    pub bounds: (u32, u32),
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            leaf_type: DEFAULT_LEAF_TYPE.to_string(),
            bounds: (DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE),
        }
    }
}

impl SynthesizerConfig {
    /// Derives the settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_dir: config.workspace.temp_dir(),
            leaf_type: config.rule.leaf_type.clone(),
            bounds: config.rule.bounds(),
        }
    }
}

/// What to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    /// Rule name.
    pub name: String,
    /// Domains for the three replica ranks.
    pub domains: RegionalDomains,
}

/// Outcome of a rule creation or preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRule {
    /// Rule name.
    pub name: String,
    /// Allocated rule id.
    pub id: i64,
    /// The rule block as appended to the topology text.
    pub rendered: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Submit,
    Preview,
}

/// Creates regional affinity rules on a cluster.
pub struct RuleSynthesizer {
    control_plane: Arc<dyn ControlPlane>,
    converter: Arc<dyn TopologyConverter>,
    config: SynthesizerConfig,
}

impl RuleSynthesizer {
    /// Creates a synthesizer over the two ports.
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        converter: Arc<dyn TopologyConverter>,
        config: SynthesizerConfig,
    ) -> Self {
        Self { control_plane, converter, config }
    }

    /// Returns the synthesizer settings.
    #[must_use]
    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Creates the rule and installs the updated descriptor.
    ///
    /// Either the whole descriptor is replaced or the cluster is left
    /// untouched; temporary files are removed in both cases.
    ///
    /// # Errors
    ///
    /// Any control-plane, conversion, template or I/O failure aborts the
    /// operation and is returned unchanged.
    pub async fn create_rule(&self, request: &RuleRequest) -> Result<CreatedRule> {
        self.observe(request, Mode::Submit).await
    }

    /// Allocates an id and renders the rule without compiling or submitting.
    ///
    /// # Errors
    ///
    /// Same as [`RuleSynthesizer::create_rule`] for the steps it performs.
    pub async fn preview_rule(&self, request: &RuleRequest) -> Result<CreatedRule> {
        self.observe(request, Mode::Preview).await
    }

    async fn observe(&self, request: &RuleRequest, mode: Mode) -> Result<CreatedRule> {
        let start = Instant::now();
        let result = self.synthesize(request, mode).await;

        match &result {
            Ok(created) if mode == Mode::Submit => {
                counter!("affinity_rules_created_total").increment(1);
                histogram!("affinity_rule_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                info!(rule = %created.name, id = created.id, "Installed placement rule");
            }
            Ok(created) => {
                debug!(rule = %created.name, id = created.id, "Previewed placement rule");
            }
            Err(err) => {
                counter!("affinity_rule_failures_total", "stage" => err.stage()).increment(1);
                error!(rule = %request.name, error = %err, "Failed to synthesize placement rule");
            }
        }

        result
    }

    async fn synthesize(&self, request: &RuleRequest, mode: Mode) -> Result<CreatedRule> {
        let workspace = Workspace::create(&self.config.temp_dir)?;

        let descriptor = control_plane::fetch(self.control_plane.as_ref()).await?;
        workspace.write_binary(&descriptor).await?;
        self.converter.decompile(workspace.binary_path(), workspace.text_path()).await?;

        let mut map = CrushMapText::new(workspace.read_text().await?);
        let existing = map.rules()?;
        let id = allocate_id(&existing)?;
        debug!(existing = existing.len(), id, "Allocated rule id");

        if map.has_rule(&request.name)? {
            warn!(rule = %request.name, "A rule with this name already exists");
        }

        let rule = Rule::regional_affinity(
            request.name.as_str(),
            id,
            &request.domains,
            &self.config.leaf_type,
            self.config.bounds,
        );
        let rendered = rule.render_checked()?;
        let created = CreatedRule { name: request.name.clone(), id, rendered };

        if mode == Mode::Preview {
            workspace.close()?;
            return Ok(created);
        }

        map.append_block(&created.rendered);
        workspace.write_text(map.as_str()).await?;
        self.converter.compile(workspace.text_path(), workspace.binary_path()).await?;
        let compiled = workspace.read_binary().await?;

        control_plane::submit(self.control_plane.as_ref(), &compiled).await?;

        // The cluster already holds the new descriptor; a leftover directory
        // must not turn that into a reported failure.
        if let Err(err) = workspace.close() {
            warn!(rule = %created.name, error = %err, "Failed to clean up after install");
        }

        Ok(created)
    }
}
