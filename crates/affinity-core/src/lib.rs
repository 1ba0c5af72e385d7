//! Core types for the regional primary affinity tooling.
//!
//! This crate provides the building blocks shared by the other affinity crates:
//! - Configuration management
//! - The error taxonomy and its mapping onto command result codes

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    ClusterConfig, Config, ConverterConfig, LogFormat, LoggingConfig, RuleConfig, ServiceConfig,
    WorkspaceConfig,
};
pub use error::{Error, Result};
