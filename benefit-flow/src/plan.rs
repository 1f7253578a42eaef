use regex::Regex;
use std::sync::LazyLock;

static STEP_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d\.\s*").expect("step marker pattern is valid"));

/// Splits generated plan text into its numbered steps.
///
/// Any number of steps is accepted; empty segments are dropped.
pub fn split_plan_steps(plan: &str) -> Vec<String> {
    STEP_MARKER
        .split(plan)
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(str::to_string)
        .collect()
}
