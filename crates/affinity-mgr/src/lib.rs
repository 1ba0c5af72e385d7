// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Regional primary affinity rule synthesis against a live cluster.
//!
//! This crate provides:
//! - The control-plane port and a `ceph` CLI implementation
//! - The topology converter port and a `crushtool` implementation
//! - A scoped workspace for the temporary descriptor files
//! - The rule synthesizer that fetches, edits and resubmits the topology
//! - The command surface and an idle lifecycle service
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use affinity_mgr::{CephCli, CrushTool, RuleRequest, RuleSynthesizer, SynthesizerConfig};
//! use affinity_placement::RegionalDomains;
//!
//! let synthesizer = RuleSynthesizer::new(
//!     Arc::new(CephCli::new(Default::default())),
//!     Arc::new(CrushTool::new("crushtool")),
//!     SynthesizerConfig::default(),
//! );
//!
//! let request = RuleRequest {
//!     name: "poolXrule".to_string(),
//!     domains: RegionalDomains::new("dc1-", "rackA", "rackB", "rackC"),
//! };
//! let created = synthesizer.create_rule(&request).await?;
//! println!("installed {} with id {}", created.name, created.id);
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod control_plane;
pub mod converter;
pub mod memory;
pub mod service;
pub mod synthesizer;
pub mod workspace;

pub use command::{
    CommandDescriptor, CommandHandler, CommandRequest, CommandResult, Invoker, COMMANDS,
    CREATE_POOL_PREFIX,
};
pub use control_plane::{fetch, submit, CephCli, ControlPlane, MonCommand, MonReply};
pub use converter::{CrushTool, TopologyConverter};
pub use memory::{MemoryControlPlane, PassthroughConverter};
pub use service::{LifecycleState, Service, ServiceHandle};
pub use synthesizer::{CreatedRule, RuleRequest, RuleSynthesizer, SynthesizerConfig};
pub use workspace::Workspace;
