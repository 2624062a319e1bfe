use serde_json::{Map, Value};

use crate::event::{
    Completion, DomainEvent, PlannedStep, ProgressNotice, StepResult, TaskBreakdown,
};

/// Payload that could not be turned into a [`DomainEvent`].
///
/// Malformed frames are skipped by the session; they never end a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedFrame {
    /// The payload is not JSON at all.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    /// Valid JSON that matches none of the known shapes.
    #[error("unrecognized payload shape")]
    UnknownShape,
    /// A known shape with a field of the wrong type or range.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
    /// A valid event that arrived where the stream ordering forbids it.
    #[error("out-of-order event: {0}")]
    OutOfOrder(String),
}

impl MalformedFrame {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

const FALLBACK_ERROR_MESSAGE: &str = "stream reported an error";

/// Parses one payload frame into a domain event.
pub fn interpret(payload: &str) -> Result<DomainEvent, MalformedFrame> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| MalformedFrame::InvalidJson(e.to_string()))?;
    interpret_value(&value)
}

/// Maps already-parsed JSON into a domain event.
///
/// Error shapes are checked first so that a payload carrying both an
/// `error` field and a success shape is always an error.
pub fn interpret_value(value: &Value) -> Result<DomainEvent, MalformedFrame> {
    let Some(object) = value.as_object() else {
        return Err(MalformedFrame::UnknownShape);
    };
    let event = object.get("event").and_then(Value::as_str);
    let status = object.get("status").and_then(Value::as_str);

    if let Some(error) = object.get("error") {
        return Ok(DomainEvent::StreamError {
            message: error_message(error, object),
        });
    }
    if event == Some("error") || status == Some("error") {
        return Ok(DomainEvent::StreamError {
            message: nested_message(object).unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
        });
    }

    if let Some(step) = object.get("step") {
        return interpret_step(step, object);
    }

    match event {
        Some(stage @ ("start" | "progress")) => {
            let data = object.get("data").and_then(Value::as_object);
            let message = data
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let percent = data.and_then(|d| d.get("progress")).and_then(Value::as_f64);
            return Ok(DomainEvent::Progress(ProgressNotice {
                message,
                percent,
                stage: Some(stage.to_string()),
                detail: None,
            }));
        }
        Some("complete") => {
            let final_text = object
                .get("data")
                .and_then(|d| d.get("polished_text"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            return Ok(DomainEvent::Completion(Completion { final_text }));
        }
        _ => {}
    }

    if let Some(status) = status {
        return Ok(DomainEvent::Progress(status_notice(status, object)));
    }

    Err(MalformedFrame::UnknownShape)
}

fn interpret_step(
    step: &Value,
    object: &Map<String, Value>,
) -> Result<DomainEvent, MalformedFrame> {
    let step = step
        .as_u64()
        .ok_or_else(|| {
            MalformedFrame::field("step", format!("expected a non-negative integer, got {step}"))
        })?;
    let step = u32::try_from(step).map_err(|_| MalformedFrame::field("step", "out of range"))?;
    let name = object.get("name").and_then(Value::as_str).map(ToOwned::to_owned);

    if step == 0 {
        let steps = object
            .get("steps")
            .ok_or_else(|| MalformedFrame::field("steps", "step 0 must carry a steps array"))?;
        let steps: Vec<PlannedStep> = serde_json::from_value(steps.clone())
            .map_err(|e| MalformedFrame::field("steps", e.to_string()))?;
        return Ok(DomainEvent::TaskBreakdown(TaskBreakdown {
            label: name,
            total_steps: steps.len(),
            steps,
        }));
    }

    let score = match object.get("score") {
        None | Some(Value::Null) => None,
        Some(score) => Some(
            score
                .as_f64()
                .ok_or_else(|| {
                    MalformedFrame::field("score", format!("expected a number, got {score}"))
                })?,
        ),
    };
    Ok(DomainEvent::StepResult(StepResult {
        step,
        name: name.unwrap_or_default(),
        score,
        reason: object.get("reason").and_then(Value::as_str).map(ToOwned::to_owned),
    }))
}

fn status_notice(status: &str, object: &Map<String, Value>) -> ProgressNotice {
    let message = object
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(status)
        .to_string();
    let percent = object.get("progress").and_then(Value::as_f64);
    let detail: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "status" | "message" | "progress"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    ProgressNotice {
        message,
        percent,
        stage: Some(status.to_string()),
        detail: (!detail.is_empty()).then_some(Value::Object(detail)),
    }
}

fn error_message(error: &Value, object: &Map<String, Value>) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .or_else(|| nested_message(object))
            .unwrap_or_else(|| error.to_string()),
        Value::Null => {
            nested_message(object).unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
        }
        other => other.to_string(),
    }
}

fn nested_message(object: &Map<String, Value>) -> Option<String> {
    object
        .get("data")
        .and_then(|d| d.get("message"))
        .or_else(|| object.get("message"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}
