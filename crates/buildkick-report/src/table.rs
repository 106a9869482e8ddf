//! Verbose step table and step-type usage listing

use buildkick_utils::types::{BuildConfig, BuildStep};

const NATIVE_DISABLED: &str = "Disabled";
const NATIVE_ENABLED: &str = "Enabled";
const RUN_DISABLE: &str = "Disable";
const RUN_ENABLE: &str = "Enable";

/// Maximum references shown per step type, the last one replaced by `...`.
const MAX_REFS: usize = 3;

fn native_state(step: &BuildStep) -> &'static str {
    if step.natively_disabled {
        NATIVE_DISABLED
    } else {
        NATIVE_ENABLED
    }
}

fn run_state(step: &BuildStep) -> &'static str {
    if step.temporarily_disable {
        RUN_DISABLE
    } else {
        RUN_ENABLE
    }
}

/// One block per configuration: a header line, then one padded line per step.
///
/// Columns are quoted name, type, id, server state and run state, each padded
/// to the widest value across all configurations. Excluded configurations
/// carry their exclusion reason in the header.
#[must_use]
pub fn step_table(configs: &[BuildConfig]) -> Vec<String> {
    let steps = || configs.iter().flat_map(|c| c.steps.iter());
    let width = |f: &dyn Fn(&BuildStep) -> usize| steps().map(f).max().unwrap_or(0);

    let name_w = width(&|s: &BuildStep| s.name.chars().count()) + 2;
    let type_w = width(&|s: &BuildStep| s.step_type.chars().count());
    let id_w = width(&|s: &BuildStep| s.id.chars().count());
    let native_w = width(&|s: &BuildStep| native_state(s).len());
    let run_w = width(&|s: &BuildStep| run_state(s).len());

    let mut lines = Vec::new();
    for config in configs {
        match &config.exclusion {
            Some(reason) => lines.push(format!("{} [excluded: {reason}]", config.id)),
            None => lines.push(config.id.clone()),
        }
        for step in &config.steps {
            let quoted = format!("'{}'", step.name);
            let line = format!(
                "    {quoted:<name_w$} {:<type_w$} {:<id_w$} {:<native_w$} {:<run_w$}",
                step.step_type,
                step.id,
                native_state(step),
                run_state(step),
            );
            lines.push(line.trim_end().to_string());
        }
    }
    lines
}

/// Usage of each enabled step type, most used first.
///
/// The first line counts distinct types. Each following line reads
/// ` {type}: {count}: 'config.step', 'config.step', ...`. Types with equal
/// counts keep the order in which they were first seen.
#[must_use]
pub fn step_type_usage(configs: &[BuildConfig]) -> Vec<String> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();
    for config in configs {
        for step in config.enabled_steps() {
            let reference = format!("'{}.{}'", config.id, step.name);
            match groups.iter_mut().find(|(t, _)| *t == step.step_type) {
                Some((_, refs)) => refs.push(reference),
                None => groups.push((step.step_type.as_str(), vec![reference])),
            }
        }
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut lines = vec![format!("Found {} enabled build step types.", groups.len())];
    for (step_type, refs) in groups {
        let count = refs.len();
        let mut shown: Vec<&str> = refs.iter().take(MAX_REFS).map(String::as_str).collect();
        if shown.len() == MAX_REFS {
            shown[MAX_REFS - 1] = "...";
        }
        lines.push(format!(" {step_type}: {count}: {}", shown.join(", ")));
    }
    lines
}
