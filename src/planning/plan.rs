//! Plan model, shape validation and priority scoring.
//!
//! # Invariants of an accepted plan
//! - 1 to `max_subtasks` subtasks
//! - every `time_hours` is a positive multiple of 0.25
//! - every `impact_pct` is within [0, 100]
//! - impacts sum to 100 within `impact_tolerance`
//!
//! A plan violating any of these is rejected, never rescaled.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Smallest unit of effort, in hours.
pub const TIME_QUANTUM_HOURS: f64 = 0.25;

const EPSILON: f64 = 1e-9;

/// Impact per unit of effort: `impact_pct / max(time_hours, 0.25)`.
///
/// Pure. Higher means better return for the time spent.
pub fn priority_score(impact_pct: f64, time_hours: f64) -> f64 {
    impact_pct / time_hours.max(TIME_QUANTUM_HOURS)
}

/// Limits a plan must satisfy before it is scored.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRules {
    pub max_subtasks: usize,
    /// Allowed distance of the impact sum from 100
    pub impact_tolerance: f64,
}

impl Default for PlanRules {
    fn default() -> Self {
        Self {
            max_subtasks: 7,
            impact_tolerance: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("plan has no subtasks")]
    Empty,

    #[error("plan has {count} subtasks, at most {max} allowed")]
    TooManySubtasks { count: usize, max: usize },

    #[error("subtask '{subtask}' has time_hours {time_hours}, expected a positive multiple of 0.25")]
    InvalidTime { subtask: String, time_hours: f64 },

    #[error("subtask '{subtask}' has impact_pct {impact_pct}, expected a value in [0, 100]")]
    InvalidImpact { subtask: String, impact_pct: f64 },

    #[error("impact_pct values sum to {sum}, expected 100 ± {tolerance}")]
    ImpactSum { sum: f64, tolerance: f64 },

    #[error("no JSON object found in output")]
    NoJson,

    #[error("plan JSON has the wrong shape: {0}")]
    Parse(String),
}

/// One proposed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub name: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(deserialize_with = "lenient_number")]
    pub time_hours: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub impact_pct: f64,
}

impl Subtask {
    pub fn new(name: impl Into<String>, time_hours: f64, impact_pct: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            time_hours,
            impact_pct,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A plan as proposed by the planning agent, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(alias = "tasks")]
    pub subtasks: Vec<Subtask>,
    #[serde(default, deserialize_with = "lenient_notes")]
    pub notes: Option<String>,
}

impl Plan {
    pub fn new(subtasks: Vec<Subtask>) -> Self {
        Self {
            subtasks,
            notes: None,
        }
    }

    /// Parse a plan from JSON.
    ///
    /// Accepts `{"tasks" | "subtasks": [...], "notes": ...}` or a bare list
    /// of subtasks. Any extra fields (such as a model-computed
    /// `priority_score`) are ignored; scores are always recomputed.
    pub fn from_value(value: &Value) -> Result<Self, PlanError> {
        let result = match value {
            Value::Array(_) => {
                serde_json::from_value::<Vec<Subtask>>(value.clone()).map(Plan::new)
            }
            _ => serde_json::from_value::<Plan>(value.clone()),
        };
        result.map_err(|e| PlanError::Parse(e.to_string()))
    }

    pub fn impact_total(&self) -> f64 {
        self.subtasks.iter().map(|s| s.impact_pct).sum()
    }

    /// Check the plan's shape against `rules`.
    pub fn validate(&self, rules: &PlanRules) -> Result<(), PlanError> {
        if self.subtasks.is_empty() {
            return Err(PlanError::Empty);
        }
        if self.subtasks.len() > rules.max_subtasks {
            return Err(PlanError::TooManySubtasks {
                count: self.subtasks.len(),
                max: rules.max_subtasks,
            });
        }

        for subtask in &self.subtasks {
            if !is_quantized_time(subtask.time_hours) {
                return Err(PlanError::InvalidTime {
                    subtask: subtask.name.clone(),
                    time_hours: subtask.time_hours,
                });
            }
            if !subtask.impact_pct.is_finite() || !(0.0..=100.0).contains(&subtask.impact_pct) {
                return Err(PlanError::InvalidImpact {
                    subtask: subtask.name.clone(),
                    impact_pct: subtask.impact_pct,
                });
            }
        }

        let sum = self.impact_total();
        if (sum - 100.0).abs() > rules.impact_tolerance + EPSILON {
            return Err(PlanError::ImpactSum {
                sum,
                tolerance: rules.impact_tolerance,
            });
        }

        Ok(())
    }

    /// Validate, then score and rank every subtask.
    ///
    /// Ranking is by score, highest first; equal scores keep the proposed
    /// order.
    pub fn score(&self, rules: &PlanRules) -> Result<ScoredPlan, PlanError> {
        self.validate(rules)?;

        let mut scored: Vec<ScoredSubtask> = self
            .subtasks
            .iter()
            .map(|s| ScoredSubtask {
                name: s.name.clone(),
                description: s.description.clone(),
                time_hours: s.time_hours,
                impact_pct: s.impact_pct,
                priority_score: priority_score(s.impact_pct, s.time_hours),
                rank: 0,
            })
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        for (i, subtask) in scored.iter_mut().enumerate() {
            subtask.rank = i + 1;
        }

        Ok(ScoredPlan {
            subtasks: scored,
            notes: self.notes.clone(),
            impact_total: self.impact_total(),
        })
    }
}

fn is_quantized_time(hours: f64) -> bool {
    if !hours.is_finite() || hours < TIME_QUANTUM_HOURS - EPSILON {
        return false;
    }
    let units = hours / TIME_QUANTUM_HOURS;
    (units - units.round()).abs() < EPSILON
}

/// A subtask with its derived priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSubtask {
    pub name: String,
    pub description: String,
    pub time_hours: f64,
    pub impact_pct: f64,
    pub priority_score: f64,
    /// 1-based position in the ranking
    pub rank: usize,
}

/// A validated plan, ranked by priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredPlan {
    pub subtasks: Vec<ScoredSubtask>,
    pub notes: Option<String>,
    pub impact_total: f64,
}

impl ScoredPlan {
    pub fn top(&self) -> Option<&ScoredSubtask> {
        self.subtasks.first()
    }
}

/// Numbers sometimes arrive as strings ("1.5") from model output.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim_end_matches('h')
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a number", s))),
        other => Err(serde::de::Error::custom(format!("expected a number, got {}", other))),
    }
}

fn lenient_notes<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        other => Some(other.to_string()),
    })
}
