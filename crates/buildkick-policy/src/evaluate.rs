//! Policy evaluation
//!
//! Rules run in a fixed order and only ever set flags:
//!
//! 1. exclude configurations with an enabled step of an excluded type
//! 2. exclude the configuration executing this run
//! 3. exclude explicitly named configurations
//! 4. mark enabled steps by id or type for temporary disabling
//!
//! Evaluation makes no network calls and is idempotent.

use buildkick_utils::types::{BuildConfig, ExclusionReason, ExclusionRule};
use tracing::{info, warn};

use crate::policy::RunPolicy;
use crate::types::{Exclusion, PolicyOutcome, PolicyWarning};

/// Apply `policy` to `configs` in place.
pub fn evaluate(configs: &mut [BuildConfig], policy: &RunPolicy) -> PolicyOutcome {
    let mut outcome = PolicyOutcome::default();

    exclude_step_types(configs, &policy.excluded_step_types, &mut outcome);
    if let Some(self_id) = &policy.self_config_id {
        exclude_self(configs, self_id, &mut outcome);
    }
    exclude_configs(configs, &policy.excluded_configs, &mut outcome);
    disable_steps(configs, policy, &mut outcome);

    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    outcome
}

fn record(config: &mut BuildConfig, reason: ExclusionReason, outcome: &mut PolicyOutcome) {
    if config.exclude(reason.clone()) {
        outcome.exclusions.push(Exclusion {
            config_id: config.id.clone(),
            reason,
        });
    }
}

fn exclude_step_types(configs: &mut [BuildConfig], types: &[String], outcome: &mut PolicyOutcome) {
    if types.is_empty() {
        return;
    }

    let is_excluded = |step_type: &str| types.iter().any(|t| t == step_type);
    let mut matched = 0;

    for config in configs.iter_mut() {
        let offending: Vec<String> = config
            .enabled_steps()
            .filter(|s| is_excluded(&s.step_type))
            .map(|s| format!("{}|{}", s.name, s.step_type))
            .collect();
        if offending.is_empty() {
            continue;
        }
        matched += 1;
        let detail = offending.join(", ");
        info!("Excluding build config: '{}' ({detail})", config.id);
        record(
            config,
            ExclusionReason::with_detail(ExclusionRule::StepType, detail),
            outcome,
        );
    }
    info!("Excluding {matched} build configs (steptype).");

    for step_type in types {
        let used = configs
            .iter()
            .any(|c| c.enabled_steps().any(|s| &s.step_type == step_type));
        if !used {
            outcome
                .warnings
                .push(PolicyWarning::ExcludedStepTypeNotFound(step_type.clone()));
        }
    }
}

fn exclude_self(configs: &mut [BuildConfig], self_id: &str, outcome: &mut PolicyOutcome) {
    let mut found = false;
    for config in configs.iter_mut().filter(|c| c.id_matches(self_id)) {
        found = true;
        info!("Excluding build config (me): '{}'", config.id);
        record(config, ExclusionReason::new(ExclusionRule::SelfConfig), outcome);
    }
    if !found {
        outcome
            .warnings
            .push(PolicyWarning::SelfConfigNotFound(self_id.to_string()));
    }
}

fn exclude_configs(configs: &mut [BuildConfig], names: &[String], outcome: &mut PolicyOutcome) {
    for name in names {
        let mut found = false;
        for config in configs.iter_mut().filter(|c| c.id_matches(name)) {
            found = true;
            info!("Excluding build config: '{}'", config.id);
            record(config, ExclusionReason::new(ExclusionRule::Explicit), outcome);
        }
        if !found {
            outcome
                .warnings
                .push(PolicyWarning::ExcludedConfigNotFound(name.clone()));
        }
    }
}

fn disable_steps(configs: &mut [BuildConfig], policy: &RunPolicy, outcome: &mut PolicyOutcome) {
    let ids = &policy.disabled_step_ids;
    let types = &policy.disabled_step_types;
    if ids.is_empty() && types.is_empty() {
        return;
    }

    for step in configs
        .iter_mut()
        .flat_map(|c| c.steps.iter_mut())
        .filter(|s| s.is_enabled())
    {
        let selected = ids.iter().any(|id| *id == step.id)
            || types.iter().any(|t| *t == step.step_type);
        if selected && !step.temporarily_disable {
            step.temporarily_disable = true;
            outcome.steps_marked += 1;
        }
    }

    for id in ids {
        let found = configs
            .iter()
            .any(|c| c.enabled_steps().any(|s| &s.id == id));
        if !found {
            outcome
                .warnings
                .push(PolicyWarning::DisabledStepIdNotFound(id.clone()));
        }
    }
    for step_type in types {
        let found = configs
            .iter()
            .any(|c| c.enabled_steps().any(|s| &s.step_type == step_type));
        if !found {
            outcome
                .warnings
                .push(PolicyWarning::DisabledStepTypeNotFound(step_type.clone()));
        }
    }
}
