//! Keyword-blocklist safety gate over selected items.
//!
//! Hard hits suppress the item, soft hits require attribution, otherwise approve.

use serde::{Deserialize, Serialize};

use crate::candidate::SelectionPlan;
use crate::config::SafetyConfig;
use crate::text::contains_phrase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    Approve,
    AddAttribution,
    Suppress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub passed: bool,
    pub violations: Vec<String>,
    pub action: SafetyAction,
}

#[derive(Debug, Clone, Default)]
pub struct SafetyChecker {
    hard: Vec<String>,
    soft: Vec<String>,
}

impl SafetyChecker {
    pub fn from_config(cfg: &SafetyConfig) -> Self {
        Self {
            hard: cfg.hard_blocklist.clone(),
            soft: cfg.soft_blocklist.clone(),
        }
    }

    pub fn check(&self, title: &str, description: Option<&str>) -> SafetyVerdict {
        let text = crate::text::combined(title, description);

        let hard: Vec<String> = self
            .hard
            .iter()
            .filter(|k| contains_phrase(&text, k))
            .map(|k| format!("hard_violation: {k}"))
            .collect();
        if !hard.is_empty() {
            return SafetyVerdict {
                id: None,
                passed: false,
                violations: hard,
                action: SafetyAction::Suppress,
            };
        }

        let soft: Vec<String> = self
            .soft
            .iter()
            .filter(|k| contains_phrase(&text, k))
            .map(|k| format!("soft_violation: {k}"))
            .collect();
        let action = if soft.is_empty() {
            SafetyAction::Approve
        } else {
            SafetyAction::AddAttribution
        };
        SafetyVerdict {
            id: None,
            passed: true,
            violations: soft,
            action,
        }
    }

    /// One verdict per selected item, long item first.
    pub fn check_plan(&self, plan: &SelectionPlan) -> Vec<SafetyVerdict> {
        let verdicts: Vec<SafetyVerdict> = plan
            .items()
            .map(|it| {
                let c = it.scored.candidate();
                let mut v = self.check(&c.title, c.description.as_deref());
                v.id = Some(c.id.clone());
                v
            })
            .collect();
        let suppressed = verdicts.iter().filter(|v| !v.passed).count();
        if suppressed > 0 {
            tracing::warn!(target: "safety", suppressed, "hard blocklist hits");
        }
        tracing::info!(target: "safety", total = verdicts.len(), suppressed, "safety check complete");
        verdicts
    }
}
