// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn signature_name_match_is_case_insensitive() {
    let sig = ProcessSignature::builder().name("BadApp").build();
    assert!(sig.matches_name("badapp"));
    assert!(sig.matches_name("BADAPP"));
    assert!(!sig.matches_name("goodapp"));
}

#[test]
fn process_info_builder_defaults() {
    let info = ProcessInfo::builder().build();
    assert_eq!(info.pid, 1);
    assert!(info.parent_pid.is_none());
}

#[test]
fn process_event_variants_carry_distinct_info() {
    let info = ProcessInfo::builder().pid(7).build();
    let started = ProcessEvent::Started(info.clone());
    let stopped = ProcessEvent::Stopped(info);
    assert_ne!(started, stopped);
}
