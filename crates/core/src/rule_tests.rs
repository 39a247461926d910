// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn rule_id_is_deterministic_from_list_and_entry() {
    let list_id = ListId::from_string("lst-aaaaaaaaaaaaaaaaaaa");
    let entry_id = ListEntryId::from_string("ent-bbbbbbbbbbbbbbbbbbb");
    let a = RuleId::derive(&list_id, &entry_id);
    let b = RuleId::derive(&list_id, &entry_id);
    assert_eq!(a, b);
}

#[test]
fn rule_id_differs_for_different_entries() {
    let list_id = ListId::from_string("lst-aaaaaaaaaaaaaaaaaaa");
    let e1 = ListEntryId::from_string("ent-bbbbbbbbbbbbbbbbbbb");
    let e2 = ListEntryId::from_string("ent-ccccccccccccccccccc");
    assert_ne!(RuleId::derive(&list_id, &e1), RuleId::derive(&list_id, &e2));
}

#[test]
fn ordering_prefers_higher_priority() {
    let low = FilterRule::builder().priority(1).build();
    let high = FilterRule::builder().priority(10).build();
    assert!(high.ordering_key() < low.ordering_key());
}

#[test]
fn ordering_prefers_exact_over_domain_over_wildcard_at_equal_priority() {
    let exact = FilterRule::builder().priority(1).match_kind(MatchKind::Exact).build();
    let domain = FilterRule::builder().priority(1).match_kind(MatchKind::Domain).build();
    let wildcard = FilterRule::builder().priority(1).match_kind(MatchKind::Wildcard).build();
    assert!(exact.ordering_key() < domain.ordering_key());
    assert!(domain.ordering_key() < wildcard.ordering_key());
}
