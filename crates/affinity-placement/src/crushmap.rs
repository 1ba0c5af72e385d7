//! Scanner for decompiled topology text.
//!
//! Only the rule section is interpreted; devices, types, buckets and
//! `choose_args` blocks are skipped by tracking brace depth. The text itself
//! is produced by the external converter and is otherwise passed through
//! untouched.

use affinity_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Name and identifier of a rule found in the topology text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    /// Rule name.
    pub name: String,
    /// Rule identifier.
    pub id: i64,
}

/// Editable topology text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrushMapText {
    text: String,
}

struct OpenRule {
    name: String,
    line: usize,
    id: Option<i64>,
    ruleset: Option<i64>,
}

impl OpenRule {
    fn finish(self) -> Result<RuleSummary> {
        // Legacy maps only carry `ruleset`.
        match self.id.or(self.ruleset) {
            Some(id) => Ok(RuleSummary { name: self.name, id }),
            None => Err(Error::template(format!(
                "rule '{}' at line {} has no numeric id",
                self.name, self.line
            ))),
        }
    }
}

impl CrushMapText {
    /// Wrap decompiled topology text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The current text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume and return the text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    /// Scan the rule blocks in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for a malformed rule header, an `id` line
    /// without a number, a rule without any id, or an unterminated rule.
    pub fn rules(&self) -> Result<Vec<RuleSummary>> {
        let mut rules = Vec::new();
        let mut depth = 0usize;
        let mut open: Option<OpenRule> = None;

        for (index, raw) in self.text.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();

            if let Some(rule) = open.as_mut() {
                match tokens.as_slice() {
                    ["}"] => {
                        if let Some(rule) = open.take() {
                            rules.push(rule.finish()?);
                        }
                    }
                    ["id", value] => rule.id = Some(parse_id(value, line_no)?),
                    ["ruleset", value] => rule.ruleset = Some(parse_id(value, line_no)?),
                    ["id" | "ruleset", ..] => {
                        return Err(Error::template(format!(
                            "line {line_no}: expected a single numeric value in '{line}'"
                        )));
                    }
                    _ => {}
                }
                continue;
            }

            if depth == 0 && tokens.first() == Some(&"rule") {
                match tokens.as_slice() {
                    ["rule", name, "{"] => {
                        open = Some(OpenRule {
                            name: (*name).to_string(),
                            line: line_no,
                            id: None,
                            ruleset: None,
                        });
                    }
                    _ => {
                        return Err(Error::template(format!(
                            "line {line_no}: malformed rule header '{line}'"
                        )));
                    }
                }
                continue;
            }

            depth = brace_depth(depth, line);
        }

        if let Some(rule) = open {
            return Err(Error::template(format!(
                "rule '{}' opened at line {} is not terminated",
                rule.name, rule.line
            )));
        }

        Ok(rules)
    }

    /// Whether a rule with this name already exists.
    ///
    /// # Errors
    ///
    /// Propagates scan errors from [`CrushMapText::rules`].
    pub fn has_rule(&self, name: &str) -> Result<bool> {
        Ok(self.rules()?.iter().any(|rule| rule.name == name))
    }

    /// The identifier a new rule should receive against this snapshot.
    ///
    /// # Errors
    ///
    /// Propagates scan errors from [`CrushMapText::rules`].
    pub fn next_rule_id(&self) -> Result<i64> {
        allocate_id(&self.rules()?)
    }

    /// Append a rendered rule block to the end of the text.
    pub fn append_rule(&mut self, rule: &Rule) {
        self.append_block(&rule.to_string());
    }

    /// Append an already rendered block to the end of the text.
    pub fn append_block(&mut self, block: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(block);
        if !block.ends_with('\n') {
            self.text.push('\n');
        }
    }
}

/// One greater than the largest existing identifier, or 1 when there are no
/// rules or every identifier is non-positive.
///
/// # Errors
///
/// Returns [`Error::Template`] when the largest identifier is `i64::MAX`.
pub fn allocate_id(rules: &[RuleSummary]) -> Result<i64> {
    match rules.iter().map(|rule| rule.id).max().filter(|max| *max > 0) {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| Error::template(format!("no rule id left above {max}"))),
    }
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn parse_id(value: &str, line_no: usize) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::template(format!("line {line_no}: rule id '{value}' is not a number")))
}

fn brace_depth(depth: usize, line: &str) -> usize {
    let opens = line.matches('{').count();
    let closes = line.matches('}').count();
    (depth + opens).saturating_sub(closes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RegionalDomains;

    const SAMPLE: &str = "\
# begin crush map
tunable choose_local_tries 0
tunable chooseleaf_vary_r 1

# devices
device 0 osd.0 class hdd
device 1 osd.1 class hdd

# types
type 0 osd
type 1 host
type 3 rack
type 11 root

# buckets
host node1 {
\tid -3\t\t# do not change unnecessarily
\tid -4 class hdd\t\t# do not change unnecessarily
\t# weight 0.010
\talg straw2
\thash 0\t# rjenkins1
\titem osd.0 weight 0.010
}
root default {
\tid -1\t\t# do not change unnecessarily
\talg straw2
\thash 0\t# rjenkins1
\titem node1 weight 0.010
}

# rules
rule replicated_rule {
\tid 0
\ttype replicated
\tmin_size 1
\tmax_size 10
\tstep take default
\tstep chooseleaf firstn 0 type host
\tstep emit
}
rule ssd_rule {
\tid 4
\ttype replicated
\tstep take default class ssd
\tstep chooseleaf firstn 0 type host
\tstep emit
}

choose_args 1 {
  {
    bucket_id -1
    weight_set [
      [ 0.010 ]
    ]
  }
}

# end crush map
";

    #[test]
    fn test_scan_rules_skips_bucket_ids() {
        let map = CrushMapText::new(SAMPLE);
        let rules = map.rules().unwrap();

        assert_eq!(
            rules,
            vec![
                RuleSummary { name: "replicated_rule".to_string(), id: 0 },
                RuleSummary { name: "ssd_rule".to_string(), id: 4 },
            ]
        );
        assert_eq!(map.next_rule_id().unwrap(), 5);
        assert!(map.has_rule("ssd_rule").unwrap());
        assert!(!map.has_rule("poolrule").unwrap());
    }

    #[test]
    fn test_allocate_id() {
        let summary = |id| RuleSummary { name: format!("r{id}"), id };

        assert_eq!(allocate_id(&[]).unwrap(), 1);
        assert_eq!(allocate_id(&[summary(0)]).unwrap(), 1);
        assert_eq!(allocate_id(&[summary(-3), summary(-1)]).unwrap(), 1);
        assert_eq!(allocate_id(&[summary(2), summary(9), summary(4)]).unwrap(), 10);
    }

    #[test]
    fn test_allocate_id_at_upper_bound() {
        let rules = [
            RuleSummary { name: "low".to_string(), id: 3 },
            RuleSummary { name: "top".to_string(), id: i64::MAX },
        ];
        let err = allocate_id(&rules).unwrap_err();
        assert!(matches!(err, Error::Template(_)));

        let map = CrushMapText::new(format!("rule top {{\n\tid {}\n}}\n", i64::MAX));
        assert!(map.next_rule_id().is_err());

        let below = [RuleSummary { name: "near".to_string(), id: i64::MAX - 1 }];
        assert_eq!(allocate_id(&below).unwrap(), i64::MAX);
    }

    #[test]
    fn test_legacy_ruleset() {
        let map = CrushMapText::new("rule old {\n\truleset 3\n\ttype replicated\n}\n");
        assert_eq!(map.next_rule_id().unwrap(), 4);

        let map = CrushMapText::new("rule both {\n\tid 2\n\truleset 6\n}\n");
        assert_eq!(map.rules().unwrap()[0].id, 2);
    }

    #[test]
    fn test_missing_numeric_id_is_fatal() {
        let err = CrushMapText::new("rule broken {\n\tid \n}\n").rules().unwrap_err();
        assert!(matches!(err, Error::Template(_)));

        let err = CrushMapText::new("rule broken {\n\tid x\n}\n").rules().unwrap_err();
        assert!(matches!(err, Error::Template(_)));

        let err = CrushMapText::new("rule noid {\n\ttype replicated\n}\n").rules().unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_unterminated_rule() {
        let err = CrushMapText::new("rule open {\n\tid 1\n").rules().unwrap_err();
        assert!(err.to_string().contains("not terminated"));
    }

    #[test]
    fn test_append_rule_then_rescan() {
        let mut map = CrushMapText::new(SAMPLE.trim_end());
        let id = map.next_rule_id().unwrap();
        let domains = RegionalDomains::new("dc1-", "rackA", "rackB", "rackC");
        map.append_rule(&Rule::regional_affinity("poolXrule", id, &domains, "host", (1, 10)));

        let text = map.as_str();
        assert!(text.contains("# end crush map\nrule poolXrule {\n"));
        assert!(text.ends_with("}\n"));

        let rules = map.rules().unwrap();
        assert_eq!(rules.last(), Some(&RuleSummary { name: "poolXrule".to_string(), id: 5 }));
        assert_eq!(map.next_rule_id().unwrap(), 6);
    }

    #[test]
    fn test_append_to_empty_text() {
        let mut map = CrushMapText::default();
        map.append_block("rule a {\n\tid 1\n}");
        assert_eq!(map.into_string(), "rule a {\n\tid 1\n}\n");
    }
}

#[cfg(test)]
mod proptest_allocation {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// The allocated id is strictly greater than every existing id and at least 1.
        #[test]
        fn allocated_id_is_fresh(ids in proptest::collection::vec(-1000i64..1000, 0..32)) {
            let rules: Vec<RuleSummary> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| RuleSummary { name: format!("rule{i}"), id: *id })
                .collect();

            let allocated = allocate_id(&rules).unwrap();
            prop_assert!(allocated >= 1);
            prop_assert!(rules.iter().all(|rule| rule.id < allocated));

            let expected = ids.iter().copied().filter(|id| *id > 0).max().map_or(1, |max| max + 1);
            prop_assert_eq!(allocated, expected);
        }
    }
}
