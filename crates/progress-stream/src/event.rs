use serde::{Deserialize, Serialize};

/// One step announced by the task breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    /// Sent as `desc` by the evaluation endpoint.
    #[serde(default, alias = "desc")]
    pub description: String,
}

/// The step-0 plan that precedes all step results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskBreakdown {
    pub label: Option<String>,
    pub total_steps: usize,
    pub steps: Vec<PlannedStep>,
}

/// Outcome (or start notice) of a single numbered step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Always greater than zero.
    pub step: u32,
    pub name: String,
    pub score: Option<f64>,
    pub reason: Option<String>,
}

impl StepResult {
    /// A step is complete once it carries a score; without one it only
    /// announces that the step has started.
    pub fn is_complete(&self) -> bool {
        self.score.is_some()
    }
}

/// Free-form progress update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotice {
    pub message: String,
    pub percent: Option<f64>,
    /// Wire discriminator that produced the notice (`start`, `progress`,
    /// or an ingest status such as `parsed`).
    pub stage: Option<String>,
    /// Extra payload fields, e.g. an analysis `result` or a `resume_id`.
    pub detail: Option<serde_json::Value>,
}

/// Terminal success payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub final_text: Option<String>,
}

/// Typed event reconstructed from one payload frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    TaskBreakdown(TaskBreakdown),
    StepResult(StepResult),
    Progress(ProgressNotice),
    Completion(Completion),
    StreamError { message: String },
}

impl DomainEvent {
    /// Step index for step-shaped events (`0` for the breakdown).
    pub fn step(&self) -> Option<u32> {
        match self {
            Self::TaskBreakdown(_) => Some(0),
            Self::StepResult(result) => Some(result.step),
            Self::Progress(_) | Self::Completion(_) | Self::StreamError { .. } => None,
        }
    }

    /// Whether the event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion(_) | Self::StreamError { .. })
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskBreakdown(_) => "task_breakdown",
            Self::StepResult(_) => "step_result",
            Self::Progress(_) => "progress",
            Self::Completion(_) => "completion",
            Self::StreamError { .. } => "stream_error",
        }
    }
}
