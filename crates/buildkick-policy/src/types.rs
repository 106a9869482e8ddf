//! Evaluation results

use buildkick_utils::types::{ExclusionReason, ExclusionRule};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A configuration newly excluded by evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub config_id: String,
    pub reason: ExclusionReason,
}

/// A policy entry that matched nothing on the server.
///
/// Warnings never fail a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PolicyWarning {
    SelfConfigNotFound(String),
    ExcludedConfigNotFound(String),
    ExcludedStepTypeNotFound(String),
    DisabledStepIdNotFound(String),
    DisabledStepTypeNotFound(String),
}

impl fmt::Display for PolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfConfigNotFound(id) => write!(f, "Couldn't exclude build config (me): '{id}'"),
            Self::ExcludedConfigNotFound(id) => write!(f, "Couldn't exclude build config: '{id}'"),
            Self::ExcludedStepTypeNotFound(t) => {
                write!(f, "Couldn't find enabled build step type to exclude: '{t}'")
            }
            Self::DisabledStepIdNotFound(id) => {
                write!(f, "Couldn't find enabled build step to disable: '{id}'")
            }
            Self::DisabledStepTypeNotFound(t) => {
                write!(f, "Couldn't find enabled build step type to disable: '{t}'")
            }
        }
    }
}

/// What one evaluation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyOutcome {
    /// In the order the rules fired
    pub exclusions: Vec<Exclusion>,
    pub warnings: Vec<PolicyWarning>,
    /// Steps newly marked for temporary disabling
    pub steps_marked: usize,
}

impl PolicyOutcome {
    /// Number of exclusions per rule, every rule present.
    #[must_use]
    pub fn exclusions_by_rule(&self) -> BTreeMap<ExclusionRule, usize> {
        let mut counts: BTreeMap<ExclusionRule, usize> =
            ExclusionRule::ALL.iter().map(|rule| (*rule, 0)).collect();
        for exclusion in &self.exclusions {
            *counts.entry(exclusion.reason.rule).or_default() += 1;
        }
        counts
    }
}
