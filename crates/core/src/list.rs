// SPDX-License-Identifier: MIT

//! Admin-managed lists of entries that the Rule Synchronizer projects
//! into [`crate::rule::FilterRule`]s.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a [`List`].
    pub struct ListId("lst-");
}

/// Whether a list's entries default to permitting or denying their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    /// The rule action this list kind projects its entries to.
    pub fn action(self) -> crate::rule::RuleAction {
        match self {
            ListKind::Whitelist => crate::rule::RuleAction::Allow,
            ListKind::Blacklist => crate::rule::RuleAction::Block,
        }
    }
}

/// An admin-managed collection of entries (a blacklist or whitelist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: ListId,
    pub name: String,
    pub kind: ListKind,
    pub enabled: bool,
}

crate::builder! {
    pub struct ListBuilder => List {
        into { name: String = "test-list" }
        set { kind: ListKind = ListKind::Blacklist }
        set { enabled: bool = true }
        computed { id: ListId = ListId::new() }
    }
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
