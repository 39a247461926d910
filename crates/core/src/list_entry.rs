// SPDX-License-Identifier: MIT

//! A single pattern within a [`crate::list::List`], consumed read-only by
//! the Rule Synchronizer.

use crate::list::ListId;
use crate::target::{MatchKind, TargetKind};
use serde::{Deserialize, Serialize};

/// Maximum pattern length, per the data model table.
pub const PATTERN_MAX_LEN: usize = 1000;

crate::define_id! {
    /// Unique identifier for a [`ListEntry`].
    pub struct ListEntryId("ent-");
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: ListEntryId,
    pub list_id: ListId,
    pub target_kind: TargetKind,
    pub pattern: String,
    pub pattern_kind: MatchKind,
    pub enabled: bool,
}

impl ListEntry {
    /// Validates the pattern length invariant from the data model table.
    pub fn is_pattern_valid(&self) -> bool {
        !self.pattern.is_empty() && self.pattern.len() <= PATTERN_MAX_LEN
    }
}

crate::builder! {
    pub struct ListEntryBuilder => ListEntry {
        set { list_id: ListId = ListId::new() }
        set { target_kind: TargetKind = TargetKind::Url }
        into { pattern: String = "example.com" }
        set { pattern_kind: MatchKind = MatchKind::Domain }
        set { enabled: bool = true }
        computed { id: ListEntryId = ListEntryId::new() }
    }
}

#[cfg(test)]
#[path = "list_entry_tests.rs"]
mod tests;
