//! Shared phase enum for TerraformConfiguration and TerraformPlan.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Phase of a terraform action.
///
/// The Configuration phase mirrors the phase of its owned Plan; the Plan
/// phase is driven by the pod lifecycle of the current spec revision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    /// A plan run is scheduled but no pod has been created yet
    #[default]
    PlanScheduled,

    /// The plan-only pod is running
    PlanRunning,

    /// The plan run finished, apply awaits approval
    WaitingConfirmation,

    /// The auto-approved apply pod is running
    ApplyRunning,

    /// The run finished successfully
    Done,

    /// The run failed
    Fail,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::PlanScheduled => "PlanScheduled",
            Phase::PlanRunning => "PlanRunning",
            Phase::WaitingConfirmation => "WaitingConfirmation",
            Phase::ApplyRunning => "ApplyRunning",
            Phase::Done => "Done",
            Phase::Fail => "Fail",
        };
        f.write_str(s)
    }
}
