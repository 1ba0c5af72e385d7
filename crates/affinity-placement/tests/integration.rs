// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Rucket Authors

//! Integration tests for rule rendering against decompiled topologies.

use affinity_placement::{allocate_id, render, CrushMapText, RegionalDomains, Rule, RuleSummary};

/// A trimmed `crushtool -d` output from a three-rack cluster.
const DECOMPILED: &str = "\
# begin crush map
tunable choose_local_tries 0
tunable chooseleaf_descend_once 1

# devices
device 0 osd.0 class hdd
device 1 osd.1 class hdd
device 2 osd.2 class hdd

# types
type 0 osd
type 1 host
type 3 rack
type 11 root

# buckets
host node-a {
\tid -2\t\t# do not change unnecessarily
\tid -3 class hdd\t\t# do not change unnecessarily
\talg straw2
\thash 0\t# rjenkins1
\titem osd.0 weight 1.000
}
rack dc1-rackA {
\tid -10
\talg straw2
\thash 0\t# rjenkins1
\titem node-a weight 1.000
}
root default {
\tid -1
\talg straw2
\thash 0\t# rjenkins1
\titem dc1-rackA weight 1.000
}

# rules
rule replicated_rule {
\tid 0
\ttype replicated
\tstep take default
\tstep chooseleaf firstn 0 type host
\tstep emit
}
rule ec_rule {
\tid 3
\ttype erasure
\tstep set_chooseleaf_tries 5
\tstep take default class hdd
\tstep chooseleaf indep 0 type host
\tstep emit
}

# end crush map
";

#[test]
fn test_bucket_ids_are_not_rule_ids() {
    let map = CrushMapText::new(DECOMPILED);
    let rules = map.rules().unwrap();
    assert_eq!(
        rules,
        vec![
            RuleSummary { name: "replicated_rule".to_string(), id: 0 },
            RuleSummary { name: "ec_rule".to_string(), id: 3 },
        ]
    );
    assert_eq!(map.next_rule_id().unwrap(), 4);
}

#[test]
fn test_render_and_append() {
    let mut map = CrushMapText::new(DECOMPILED);
    let id = map.next_rule_id().unwrap();
    let block = render("poolXrule", id, "dc1-", "rackA", "rackB", "rackC").unwrap();

    map.append_block(&block);
    let text = map.into_string();
    assert!(text.starts_with(DECOMPILED));
    assert!(text.ends_with(
        "rule poolXrule {\n\
         \tid 4\n\
         \ttype replicated\n\
         \tmin_size 1\n\
         \tmax_size 10\n\
         \tstep take dc1-rackA\n\
         \tstep chooseleaf firstn 1 type host\n\
         \tstep emit\n\
         \tstep take dc1-rackB\n\
         \tstep chooseleaf firstn 1 type host\n\
         \tstep emit\n\
         \tstep take dc1-rackC\n\
         \tstep chooseleaf firstn 1 type host\n\
         \tstep emit\n\
         }\n"
    ));

    let rescanned = CrushMapText::new(text).rules().unwrap();
    assert_eq!(rescanned.len(), 3);
    assert_eq!(rescanned[2], RuleSummary { name: "poolXrule".to_string(), id: 4 });
}

#[test]
fn test_repeated_allocation_is_monotonic() {
    let mut map = CrushMapText::new(DECOMPILED);
    let domains = RegionalDomains::new("dc2-", "rowA", "rowB", "rowC");

    let mut ids = Vec::new();
    for name in ["first", "second", "third"] {
        let id = map.next_rule_id().unwrap();
        map.append_rule(&Rule::regional_affinity(name, id, &domains, "host", (1, 10)));
        ids.push(id);
    }
    assert_eq!(ids, vec![4, 5, 6]);
}

#[test]
fn test_empty_topology_starts_at_one() {
    let map = CrushMapText::new("# begin crush map\n# end crush map\n");
    assert_eq!(map.next_rule_id().unwrap(), 1);
    assert_eq!(allocate_id(&[]).unwrap(), 1);
}

#[test]
fn test_domains_are_not_validated() {
    // Domains that do not exist in the topology still render.
    let block = render("r", 9, "", "nowhere", "nowhere", "nowhere").unwrap();
    assert_eq!(block.matches("step take nowhere").count(), 3);
}
