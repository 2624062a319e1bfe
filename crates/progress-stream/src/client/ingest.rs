use serde::Serialize;
use serde_json::Value;

use super::{StreamClient, validate_document};
use crate::call::StreamCall;
use crate::errors::ClientError;
use crate::event::{DomainEvent, ProgressNotice};
use crate::sink::EventSink;
use crate::transport::{Document, RequestBody, StreamKind};

const FILE_FIELD: &str = "file";
const ACCEPTED_EXTENSIONS: [&str; 2] = ["pdf", "docx"];

/// Aggregated result of a resume ingest stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    /// Every status notice, in arrival order.
    pub notices: Vec<ProgressNotice>,
    /// The parsed analysis, from the last notice carrying a `result`.
    pub analysis: Option<Value>,
    /// Database id, from the notice carrying `resume_id`.
    pub resume_id: Option<u64>,
}

impl IngestSummary {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a DomainEvent>) -> Self {
        let mut summary = Self::default();
        for event in events {
            let DomainEvent::Progress(notice) = event else {
                continue;
            };
            if let Some(detail) = &notice.detail {
                if let Some(result) = detail.get("result").filter(|r| !r.is_null()) {
                    summary.analysis = Some(result.clone());
                }
                if let Some(id) = detail.get("resume_id").and_then(resume_id) {
                    summary.resume_id = Some(id);
                }
            }
            summary.notices.push(notice.clone());
        }
        summary
    }

    /// Stage of the last notice received.
    pub fn last_stage(&self) -> Option<&str> {
        self.notices.last().and_then(|n| n.stage.as_deref())
    }
}

fn resume_id(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

impl StreamClient {
    /// Uploads a `.pdf` or `.docx` resume and streams the parsing progress.
    pub fn ingest(
        &self,
        document: Document,
        sink: impl EventSink + 'static,
    ) -> Result<StreamCall<IngestSummary>, ClientError> {
        validate_document(&document)?;
        match document.extension() {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => {
                return Err(ClientError::Validation(format!(
                    "unsupported document `{}`: only PDF and DOCX files are accepted",
                    document.file_name
                )));
            }
        }
        let body = RequestBody::Multipart {
            field: FILE_FIELD.to_string(),
            document,
        };
        Ok(self.start(
            StreamKind::Ingest,
            self.config.ingest_url(),
            body,
            Box::new(sink),
            |report| Ok(IngestSummary::from_events(&report.results)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::ClientConfig;
    use crate::client::testing::FakeTransport;
    use crate::sink::{ChannelSink, NoopSink, SinkMessage};

    fn client(transport: FakeTransport) -> StreamClient {
        StreamClient::with_transport(ClientConfig::default(), Arc::new(transport)).expect("client")
    }

    #[tokio::test]
    async fn completed_status_does_not_end_the_stream() {
        let body = concat!(
            "data: {\"status\":\"reading\",\"message\":\"正在读取文件...\"}\n\n",
            "data: {\"status\":\"提取关键信息\",\"progress\":40}\n\n",
            "data: {\"status\":\"completed\",\"message\":\"解析完成\",\"result\":{\"name\":\"张三\"}}\n\n",
            "data: {\"status\":\"saved\",\"message\":\"简历已保存到数据库\",\"resume_id\":17}\n\n",
            "data: [DONE]\n\n",
        );
        let transport = FakeTransport::lines("text/event-stream", body);
        let (sink, mut rx) = ChannelSink::new();
        let call = client(transport.clone())
            .ingest(Document::new("张三.pdf", vec![1u8, 2, 3]), sink)
            .expect("call");
        let summary = call.finish().await.expect("ok").completed().expect("completed");

        assert_eq!(summary.notices.len(), 4);
        assert_eq!(summary.analysis, Some(serde_json::json!({"name": "张三"})));
        assert_eq!(summary.resume_id, Some(17));
        assert_eq!(summary.last_stage(), Some("saved"));

        let mut forwarded = 0;
        while let Ok(message) = rx.try_recv() {
            assert!(matches!(message, SinkMessage::Event(DomainEvent::Progress(_))));
            forwarded += 1;
        }
        assert_eq!(forwarded, 4);

        let requests = transport.recorded();
        assert!(matches!(
            &requests[0].body,
            RequestBody::Multipart { field, .. } if field == "file"
        ));
    }

    #[tokio::test]
    async fn error_status_fails_the_call() {
        let body = "data: {\"status\":\"reading\",\"message\":\"r\"}\n\ndata: {\"status\":\"error\",\"message\":\"文件解析失败\"}\n\n";
        let err = client(FakeTransport::lines("text/event-stream", body))
            .ingest(Document::new("cv.docx", vec![1u8]), NoopSink)
            .expect("call")
            .finish()
            .await
            .expect_err("should fail");
        assert_eq!(err.to_string(), "文件解析失败");
        assert_eq!(err.partial_results().len(), 1);
    }

    #[test]
    fn only_pdf_and_docx_are_accepted() {
        let transport = FakeTransport::default();
        for name in ["cv.txt", "cv", "cv.doc"] {
            assert!(matches!(
                client(transport.clone()).ingest(Document::new(name, vec![1u8]), NoopSink),
                Err(ClientError::Validation(_))
            ));
        }
        assert!(transport.recorded().is_empty());
    }

    #[test]
    fn resume_id_accepts_numeric_strings() {
        assert_eq!(resume_id(&serde_json::json!("42")), Some(42));
        assert_eq!(resume_id(&serde_json::json!(null)), None);
    }
}
