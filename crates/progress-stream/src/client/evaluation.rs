use serde::Serialize;

use super::{StreamClient, validate_document};
use crate::call::StreamCall;
use crate::errors::ClientError;
use crate::event::{DomainEvent, StepResult, TaskBreakdown};
use crate::sink::EventSink;
use crate::transport::{Document, RequestBody, StreamKind};

const RESUME_FIELD: &str = "resume_file";

/// Aggregated result of an evaluation stream.
///
/// Steps are keyed by step number: a later report for a step replaces the
/// earlier one at its original position.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub breakdown: Option<TaskBreakdown>,
    pub steps: Vec<StepResult>,
}

impl Evaluation {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a DomainEvent>) -> Self {
        let mut evaluation = Self::default();
        for event in events {
            evaluation.apply(event);
        }
        evaluation
    }

    fn apply(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::TaskBreakdown(breakdown) => self.breakdown = Some(breakdown.clone()),
            DomainEvent::StepResult(result) => {
                match self.steps.iter_mut().find(|s| s.step == result.step) {
                    Some(existing) => *existing = result.clone(),
                    None => self.steps.push(result.clone()),
                }
            }
            DomainEvent::Progress(_)
            | DomainEvent::Completion(_)
            | DomainEvent::StreamError { .. } => {}
        }
    }

    pub fn step(&self, step: u32) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Sum of the scores reported so far.
    pub fn total_score(&self) -> f64 {
        self.steps.iter().filter_map(|s| s.score).sum()
    }

    /// Whether every planned step has a scored result.
    pub fn is_complete(&self) -> bool {
        match &self.breakdown {
            Some(breakdown) => breakdown
                .steps
                .iter()
                .all(|planned| self.step(planned.id).is_some_and(StepResult::is_complete)),
            None => !self.steps.is_empty() && self.steps.iter().all(StepResult::is_complete),
        }
    }
}

impl StreamClient {
    /// Streams the evaluation of `document` against job description `jd_id`.
    ///
    /// The sink receives the breakdown and each step report as it arrives.
    pub fn evaluate(
        &self,
        jd_id: u64,
        document: Document,
        sink: impl EventSink + 'static,
    ) -> Result<StreamCall<Evaluation>, ClientError> {
        validate_document(&document)?;
        let body = RequestBody::Multipart {
            field: RESUME_FIELD.to_string(),
            document,
        };
        Ok(self.start(
            StreamKind::Evaluation,
            self.config.evaluation_url(jd_id),
            body,
            Box::new(sink),
            |report| Ok(Evaluation::from_events(&report.results)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::client::ClientConfig;
    use crate::client::testing::FakeTransport;
    use crate::sink::{Callbacks, NoopSink};

    const BODY: &str = concat!(
        "{\"step\":0,\"name\":\"任务拆解\",\"steps\":[{\"id\":1,\"name\":\"学历匹配评估\",\"desc\":\"d1\"},{\"id\":2,\"name\":\"技能匹配评估\",\"desc\":\"d2\"}]}\n",
        "{\"step\":1,\"name\":\"学历匹配评估\"}\n",
        "{\"step\":1,\"name\":\"学历匹配评估\",\"score\":18,\"reason\":\"本科\"}\n",
        "{\"step\":2,\"name\":\"技能匹配评估\",\"score\":25.5,\"reason\":\"匹配\"}\n",
    );

    fn client(transport: FakeTransport) -> StreamClient {
        StreamClient::with_transport(ClientConfig::new("http://hr.test"), Arc::new(transport))
            .expect("client")
    }

    #[tokio::test]
    async fn aggregates_steps_keyed_by_number() {
        let transport = FakeTransport::lines("application/x-ndjson", BODY);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let call = client(transport.clone())
            .evaluate(
                4,
                Document::new("cv.pdf", b"%PDF-1.4".to_vec()),
                Callbacks::new().with_progress(move |e| log.lock().unwrap().push(e.step())),
            )
            .expect("call");
        let evaluation = call
            .finish()
            .await
            .expect("ok")
            .completed()
            .expect("completed");

        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(1), Some(1), Some(2)]);
        assert_eq!(evaluation.breakdown.as_ref().map(|b| b.total_steps), Some(2));
        assert_eq!(evaluation.steps.len(), 2);
        assert_eq!(evaluation.steps[0].score, Some(18.0));
        assert_eq!(evaluation.total_score(), 43.5);
        assert!(evaluation.is_complete());

        let requests = transport.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://hr.test/api/jd/4/evaluate-resume");
        assert!(matches!(
            &requests[0].body,
            RequestBody::Multipart { field, document }
                if field == "resume_file" && document.file_name == "cv.pdf"
        ));
    }

    #[tokio::test]
    async fn json_document_response_is_replayed() {
        let document = format!(
            "[{}]",
            BODY.lines().collect::<Vec<_>>().join(",")
        );
        let call = client(FakeTransport::lines("application/json", &document))
            .evaluate(1, Document::new("cv.docx", vec![1u8]), NoopSink)
            .expect("call");
        let evaluation = call.finish().await.expect("ok").completed().expect("completed");
        assert_eq!(evaluation.steps.len(), 2);
    }

    #[tokio::test]
    async fn stream_error_carries_partial_steps() {
        let breakdown = BODY.lines().next().unwrap_or_default();
        let body = format!("{breakdown}\n{{\"error\":\"LLM调用失败\"}}\n");
        let err = client(FakeTransport::lines("application/x-ndjson", &body))
            .evaluate(1, Document::new("cv.pdf", vec![1u8]), NoopSink)
            .expect("call")
            .finish()
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "LLM调用失败");
        assert_eq!(err.partial_results().len(), 1);
    }

    #[test]
    fn empty_document_is_rejected_before_any_request() {
        let transport = FakeTransport::default();
        let result =
            client(transport.clone()).evaluate(1, Document::new("cv.pdf", Vec::new()), NoopSink);
        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert!(transport.recorded().is_empty());
    }

    #[test]
    fn incomplete_without_breakdown_or_scores() {
        assert!(!Evaluation::default().is_complete());
        let started = DomainEvent::StepResult(StepResult {
            step: 1,
            name: "A".into(),
            score: None,
            reason: None,
        });
        assert!(!Evaluation::from_events([&started]).is_complete());
    }
}
