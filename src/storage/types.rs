//! Domain records shared by backends, the wire codec and the client proxy.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a study, unique within one backend.
pub type StudyId = u64;

/// Identifier of a trial, unique within one backend across all studies.
pub type TrialId = u64;

/// Lifecycle state of a trial.
///
/// States only move forward: a finished trial (`Complete`, `Failed` or
/// `Pruned`) can never be mutated again. The one tolerated repeat is
/// `Running` -> `Running`, which is reported as "unchanged" rather than
/// as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialState {
    /// Created but not yet picked up by a worker.
    Pending,
    /// Currently being evaluated.
    Running,
    /// Finished with an objective value.
    Complete,
    /// Finished unsuccessfully.
    Failed,
    /// Stopped early by a pruner.
    Pruned,
}

impl TrialState {
    /// Whether the state is terminal.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Pruned)
    }

    /// Symbolic name used on the wire. Never the ordinal, so renumbering
    /// the enum cannot corrupt stored states.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Pruned => "PRUNED",
        }
    }

    /// Inverse of [`TrialState::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "COMPLETE" => Some(Self::Complete),
            "FAILED" => Some(Self::Failed),
            "PRUNED" => Some(Self::Pruned),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Optimization direction of a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudyDirection {
    /// Direction not decided yet.
    NotSet,
    /// Smaller objective values are better.
    Minimize,
    /// Larger objective values are better.
    Maximize,
}

impl StudyDirection {
    /// Symbolic name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::NotSet => "NOT_SET",
            Self::Minimize => "MINIMIZE",
            Self::Maximize => "MAXIMIZE",
        }
    }

    /// Inverse of [`StudyDirection::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NOT_SET" => Some(Self::NotSet),
            "MINIMIZE" => Some(Self::Minimize),
            "MAXIMIZE" => Some(Self::Maximize),
            _ => None,
        }
    }
}

impl std::fmt::Display for StudyDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampling domain of one parameter.
///
/// Structural equality matters here: samplers decide whether a parameter's
/// domain changed by comparing the decoded distribution against the stored
/// one, so the wire codec must round-trip these exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Continuous floating-point range.
    Float {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Whether to sample in log space.
        log_scale: bool,
        /// Optional step size for discretization.
        step: Option<f64>,
    },
    /// Integer range.
    Int {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
        /// Whether to sample in log space.
        log_scale: bool,
        /// Optional step size for discretization.
        step: Option<i64>,
    },
    /// Fixed set of choices.
    Categorical {
        /// The candidate values, in suggestion order.
        choices: Vec<Value>,
    },
}

impl Distribution {
    /// Uniform float distribution over `[low, high]`.
    pub fn uniform(low: f64, high: f64) -> Self {
        Self::Float {
            low,
            high,
            log_scale: false,
            step: None,
        }
    }
}

/// One evaluation of an objective function.
///
/// Mutated only by the owning backend; everything a worker sees is a
/// decoded copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Backend-wide unique id, monotonically assigned.
    pub trial_id: TrialId,
    /// Sequential number within the owning study, starting at 0.
    pub number: u64,
    /// Current lifecycle state.
    pub state: TrialState,
    /// Internal representation of each sampled parameter value.
    pub params: HashMap<String, f64>,
    /// Sampling domain of each parameter.
    pub distributions: HashMap<String, Distribution>,
    /// Final objective value, once reported.
    pub value: Option<f64>,
    /// Intermediate objective values keyed by step.
    pub intermediate_values: BTreeMap<u64, f64>,
    /// Caller-defined attributes.
    pub user_attrs: HashMap<String, Value>,
    /// Internal attributes.
    pub system_attrs: HashMap<String, Value>,
    /// When the trial started running.
    pub datetime_start: Option<NaiveDateTime>,
    /// When the trial reached a finished state.
    pub datetime_complete: Option<NaiveDateTime>,
}

impl Trial {
    /// Fresh running trial, started now.
    pub fn new(trial_id: TrialId, number: u64) -> Self {
        Self {
            trial_id,
            number,
            state: TrialState::Running,
            params: HashMap::new(),
            distributions: HashMap::new(),
            value: None,
            intermediate_values: BTreeMap::new(),
            user_attrs: HashMap::new(),
            system_attrs: HashMap::new(),
            datetime_start: Some(timestamp_now()),
            datetime_complete: None,
        }
    }
}

/// Read-only snapshot of one study, recomputed on each request.
#[derive(Debug, Clone, PartialEq)]
pub struct StudySummary {
    /// Identifier of the study.
    pub study_id: StudyId,
    /// Human-readable study name, unique within a backend.
    pub study_name: String,
    /// Optimization direction.
    pub direction: StudyDirection,
    /// Best completed trial under the study's direction, if any completed.
    pub best_trial: Option<Trial>,
    /// Caller-defined attributes.
    pub user_attrs: HashMap<String, Value>,
    /// Internal attributes.
    pub system_attrs: HashMap<String, Value>,
    /// Total number of trials in the study.
    pub n_trials: usize,
    /// Earliest trial start in the study.
    pub datetime_start: Option<NaiveDateTime>,
}

/// Current time truncated to microseconds, the precision the wire format
/// carries. Timestamps created here survive an encode/decode round trip
/// unchanged.
pub fn timestamp_now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
