//! Placement rules in the decompiled topology syntax.
//!
//! A rule is a sequence of steps that:
//! 1. Take a starting point in the hierarchy
//! 2. Choose items at a specific bucket type
//! 3. Emit the selections for the replica rank being filled
//!
//! The regional affinity rule repeats that triplet once per replica rank, so
//! the first emitted item (the primary) always comes from the primary domain.

use std::fmt;

use affinity_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::crushmap::CrushMapText;

/// Default minimum replica count of a synthesized rule.
pub const DEFAULT_MIN_SIZE: u32 = 1;

/// Default maximum replica count of a synthesized rule.
pub const DEFAULT_MAX_SIZE: u32 = 10;

/// Default bucket type selected by each `chooseleaf` step.
pub const DEFAULT_LEAF_TYPE: &str = "host";

/// Pool type a rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Replicated pools.
    #[default]
    Replicated,
    /// Erasure-coded pools.
    Erasure,
}

impl RuleType {
    /// Keyword used in the topology text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replicated => "replicated",
            Self::Erasure => "erasure",
        }
    }
}

/// How a choose step fills its slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    /// Fill the first N slots, shifting on failure (replicated pools).
    #[default]
    FirstN,
    /// Keep slot positions stable (erasure-coded pools).
    Indep,
}

impl SelectMode {
    /// Keyword used in the topology text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstN => "firstn",
            Self::Indep => "indep",
        }
    }
}

/// A step in a placement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStep {
    /// Start at the named bucket.
    Take {
        /// Bucket name to start from.
        item: String,
    },

    /// Choose N distinct buckets of the given type.
    Choose {
        /// Slot filling mode.
        mode: SelectMode,
        /// Number of items to choose (0 = as many as the pool size).
        count: u32,
        /// Bucket type to choose.
        item_type: String,
    },

    /// Choose N distinct buckets of the given type, then one device below each.
    ChooseLeaf {
        /// Slot filling mode.
        mode: SelectMode,
        /// Number of items to choose (0 = as many as the pool size).
        count: u32,
        /// Bucket type that isolates the chosen devices.
        leaf_type: String,
    },

    /// Emit the currently selected items.
    Emit,
}

impl fmt::Display for RuleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Take { item } => write!(f, "step take {item}"),
            Self::Choose { mode, count, item_type } => {
                write!(f, "step choose {} {count} type {item_type}", mode.as_str())
            }
            Self::ChooseLeaf { mode, count, leaf_type } => {
                write!(f, "step chooseleaf {} {count} type {leaf_type}", mode.as_str())
            }
            Self::Emit => f.write_str("step emit"),
        }
    }
}

/// The domains a regional affinity rule pins each replica rank to.
///
/// Each domain path is the region identifier followed by the domain suffix;
/// nothing checks that the path names a real bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalDomains {
    /// Region prefix shared by all three paths.
    pub region: String,
    /// Domain suffix for the primary replica.
    pub primary: String,
    /// Domain suffix for the secondary replica.
    pub secondary: String,
    /// Domain suffix for the tertiary replica.
    pub tertiary: String,
}

impl RegionalDomains {
    /// Creates a new domain set.
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
        tertiary: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            primary: primary.into(),
            secondary: secondary.into(),
            tertiary: tertiary.into(),
        }
    }

    /// Full domain paths in rank order: primary, secondary, tertiary.
    #[must_use]
    pub fn paths(&self) -> [String; 3] {
        [
            format!("{}{}", self.region, self.primary),
            format!("{}{}", self.region, self.secondary),
            format!("{}{}", self.region, self.tertiary),
        ]
    }
}

/// A complete placement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name.
    pub name: String,
    /// Numeric rule identifier.
    pub id: i64,
    /// Pool type the rule applies to.
    pub rule_type: RuleType,
    /// Minimum number of replicas this rule produces.
    pub min_size: u32,
    /// Maximum number of replicas this rule produces.
    pub max_size: u32,
    /// The steps in this rule.
    pub steps: Vec<RuleStep>,
}

impl Rule {
    /// Create a new empty replicated rule.
    #[must_use]
    pub fn new(name: impl Into<String>, id: i64, min_size: u32, max_size: u32) -> Self {
        Self {
            name: name.into(),
            id,
            rule_type: RuleType::Replicated,
            min_size,
            max_size,
            steps: Vec::new(),
        }
    }

    /// Add a step to this rule.
    #[must_use]
    pub fn with_step(mut self, step: RuleStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Create a regional primary affinity rule.
    ///
    /// For each replica rank, in order primary, secondary, tertiary, this rule:
    /// 1. Takes the rank's domain path
    /// 2. Chooses one leaf below a distinct `leaf_type` bucket
    /// 3. Emits it
    #[must_use]
    pub fn regional_affinity(
        name: impl Into<String>,
        id: i64,
        domains: &RegionalDomains,
        leaf_type: &str,
        (min_size, max_size): (u32, u32),
    ) -> Self {
        domains.paths().into_iter().fold(Self::new(name, id, min_size, max_size), |rule, path| {
            rule.with_step(RuleStep::Take { item: path })
                .with_step(RuleStep::ChooseLeaf {
                    mode: SelectMode::FirstN,
                    count: 1,
                    leaf_type: leaf_type.to_string(),
                })
                .with_step(RuleStep::Emit)
        })
    }

    /// Render this rule and check that the text scans back to this rule's id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if the name is empty or the rendered block
    /// is not a single well-formed rule carrying `self.id`.
    pub fn render_checked(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(Error::template("rule name must not be empty"));
        }

        let rendered = self.to_string();
        let rules = CrushMapText::new(rendered.clone()).rules()?;
        match rules.as_slice() {
            [only] if only.id == self.id && only.name == self.name => Ok(rendered),
            _ => Err(Error::template(format!(
                "rendered rule '{}' does not scan back to a single rule with id {}",
                self.name, self.id
            ))),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule {} {{", self.name)?;
        writeln!(f, "\tid {}", self.id)?;
        writeln!(f, "\ttype {}", self.rule_type.as_str())?;
        writeln!(f, "\tmin_size {}", self.min_size)?;
        writeln!(f, "\tmax_size {}", self.max_size)?;
        for step in &self.steps {
            writeln!(f, "\t{step}")?;
        }
        f.write_str("}")
    }
}

/// Render a regional affinity rule block with the default bounds and leaf type.
///
/// # Errors
///
/// Returns [`Error::Template`] if `name` is empty or the rendered block does
/// not scan back into exactly one rule with identifier `id`.
pub fn render(
    name: &str,
    id: i64,
    region: &str,
    primary_domain: &str,
    secondary_domain: &str,
    tertiary_domain: &str,
) -> Result<String> {
    let domains = RegionalDomains::new(region, primary_domain, secondary_domain, tertiary_domain);
    Rule::regional_affinity(
        name,
        id,
        &domains,
        DEFAULT_LEAF_TYPE,
        (DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE),
    )
    .render_checked()
}
