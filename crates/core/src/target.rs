// SPDX-License-Identifier: MIT

//! The kind of thing a list entry, filter rule, or decision applies to.

use serde::{Deserialize, Serialize};

/// What a [`crate::list_entry::ListEntry`] or [`crate::rule::FilterRule`]
/// governs: a DNS name / URL, or a local executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Executable,
    Url,
}

crate::simple_display! {
    TargetKind {
        Executable => "executable",
        Url => "url",
    }
}

/// How a pattern is compared against an observed target value.
///
/// Ordered by specificity (most specific first) to break rule-priority
/// ties per invariant (I2): `Exact > Domain > Wildcard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Domain,
    Wildcard,
}

impl MatchKind {
    /// Specificity rank used for tie-breaking; lower sorts first.
    pub fn specificity_rank(self) -> u8 {
        match self {
            MatchKind::Exact => 0,
            MatchKind::Domain => 1,
            MatchKind::Wildcard => 2,
        }
    }
}
