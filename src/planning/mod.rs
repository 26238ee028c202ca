//! Planning stage support: the plan model, the scoring engine and the JSON
//! extraction used to read structured model output.

mod extract;
mod plan;

pub use extract::extract_json;
pub use plan::{
    priority_score, Plan, PlanError, PlanRules, ScoredPlan, ScoredSubtask, Subtask,
    TIME_QUANTUM_HOURS,
};

/// Extract, parse, validate and score a plan from model output.
pub fn score_output(text: &str, rules: &PlanRules) -> Result<ScoredPlan, PlanError> {
    let value = extract_json(text).ok_or(PlanError::NoJson)?;
    Plan::from_value(&value)?.score(rules)
}
