// SPDX-License-Identifier: MIT

//! `pcguardctl rules ...`

use crate::client::AdminClient;
use crate::error::ClientError;
use crate::output::{print_rules, print_sync_report, OutputFormat};
use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use pcguard_core::{
    AdminRequest, AdminResponse, FilterRule, ListEntryId, ListId, MatchKind as CoreMatchKind,
    RuleAction as CoreRuleAction, RuleId, TargetKind as CoreTargetKind,
};

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List the rules currently loaded in the Decision Engine.
    List,
    /// Add a single network rule directly (bypasses the Rule Synchronizer).
    Add {
        /// What the rule applies to.
        #[arg(long, value_enum)]
        kind: CliTargetKind,
        /// How `pattern` is compared against an observed target.
        #[arg(long, value_enum, default_value = "exact")]
        match_kind: CliMatchKind,
        /// Pattern to match, e.g. a domain or an executable path.
        #[arg(long)]
        pattern: String,
        /// Whether a match is allowed or blocked.
        #[arg(long, value_enum, default_value = "block")]
        action: CliRuleAction,
        /// Higher priority rules are preferred on a tie (I2).
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// A human-readable label shown by `rules list`.
        #[arg(long, default_value = "manual")]
        name: String,
    },
    /// Remove a rule by id (hex, as printed by `rules list`).
    Remove {
        /// Rule id in the `{:016x}` hex form printed by `rules list`.
        id: String,
    },
    /// Remove every loaded rule.
    Clear,
    /// Trigger an immediate Rule Synchronizer pass.
    Sync,
}

pub async fn handle(client: &mut AdminClient, format: OutputFormat, cmd: RulesCommand) -> Result<()> {
    match cmd {
        RulesCommand::List => {
            match client.call(&AdminRequest::GetCurrentRules).await? {
                AdminResponse::Rules { rules } => print_rules(format, &rules),
                other => return Err(unexpected(other)),
            }
        }
        RulesCommand::Add { kind, match_kind, pattern, action, priority, name } => {
            let now_ms = now_ms();
            let rule = FilterRule {
                id: RuleId::derive(&ListId::new(), &ListEntryId::new()),
                name,
                target_kind: kind.into(),
                pattern,
                match_kind: match_kind.into(),
                action: action.into(),
                priority,
                enabled: true,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };
            match client.call(&AdminRequest::AddNetworkRule { rule }).await? {
                AdminResponse::Ok => println!("rule added"),
                other => return Err(unexpected(other)),
            }
        }
        RulesCommand::Remove { id } => {
            let id = parse_rule_id(&id)?;
            match client.call(&AdminRequest::RemoveNetworkRule { id }).await? {
                AdminResponse::Ok => println!("rule {id} removed"),
                other => return Err(unexpected(other)),
            }
        }
        RulesCommand::Clear => match client.call(&AdminRequest::ClearAllRules).await? {
            AdminResponse::Ok => println!("all rules cleared"),
            other => return Err(unexpected(other)),
        },
        RulesCommand::Sync => match client.call(&AdminRequest::SyncRules).await? {
            AdminResponse::SyncReport { report } => print_sync_report(format, &report),
            other => return Err(unexpected(other)),
        },
    }
    Ok(())
}

fn parse_rule_id(raw: &str) -> Result<RuleId> {
    u64::from_str_radix(raw, 16).map(RuleId).with_context(|| format!("'{raw}' is not a valid rule id"))
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn unexpected(response: AdminResponse) -> anyhow::Error {
    match response {
        AdminResponse::Error { message } => ClientError::Daemon(message).into(),
        _ => ClientError::UnexpectedResponse.into(),
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliTargetKind {
    Executable,
    Url,
}

impl From<CliTargetKind> for CoreTargetKind {
    fn from(value: CliTargetKind) -> Self {
        match value {
            CliTargetKind::Executable => CoreTargetKind::Executable,
            CliTargetKind::Url => CoreTargetKind::Url,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliMatchKind {
    Exact,
    Domain,
    Wildcard,
}

impl From<CliMatchKind> for CoreMatchKind {
    fn from(value: CliMatchKind) -> Self {
        match value {
            CliMatchKind::Exact => CoreMatchKind::Exact,
            CliMatchKind::Domain => CoreMatchKind::Domain,
            CliMatchKind::Wildcard => CoreMatchKind::Wildcard,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliRuleAction {
    Allow,
    Block,
}

impl From<CliRuleAction> for CoreRuleAction {
    fn from(value: CliRuleAction) -> Self {
        match value {
            CliRuleAction::Allow => CoreRuleAction::Allow,
            CliRuleAction::Block => CoreRuleAction::Block,
        }
    }
}
