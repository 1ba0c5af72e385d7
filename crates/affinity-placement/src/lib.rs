//! Placement rule synthesis for regional primary affinity.
//!
//! This crate builds the one rule the affinity tooling installs: a replicated
//! rule whose primary replica always lands in a designated domain, with the
//! secondary and tertiary replicas pinned to two other domains.
//!
//! # Overview
//!
//! ```text
//!            region "dc1-"
//!   ┌──────────────┬──────────────┬──────────────┐
//!   │  dc1-rackA   │  dc1-rackB   │  dc1-rackC   │
//!   │  (primary)   │ (secondary)  │  (tertiary)  │
//!   └──────┬───────┴──────┬───────┴──────┬───────┘
//!          │              │              │
//!     take/chooseleaf/emit, once per replica rank
//! ```
//!
//! # Usage
//!
//! ```
//! use affinity_placement::{CrushMapText, RegionalDomains, Rule};
//!
//! let mut map = CrushMapText::new("rule replicated_rule {\n\tid 0\n}\n");
//! let id = map.next_rule_id().unwrap();
//! assert_eq!(id, 1);
//!
//! let domains = RegionalDomains::new("dc1-", "rackA", "rackB", "rackC");
//! let rule = Rule::regional_affinity("poolXrule", id, &domains, "host", (1, 10));
//! map.append_rule(&rule);
//!
//! assert_eq!(map.rules().unwrap().len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod crushmap;
pub mod rule;

pub use crushmap::{allocate_id, CrushMapText, RuleSummary};
pub use rule::{render, RegionalDomains, Rule, RuleStep, RuleType, SelectMode};
