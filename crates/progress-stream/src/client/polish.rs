use super::StreamClient;
use crate::call::StreamCall;
use crate::errors::ClientError;
use crate::session::SessionReport;
use crate::sink::EventSink;
use crate::transport::{RequestBody, StreamKind};

impl StreamClient {
    /// Streams a polish of `text`. Resolves to the polished text.
    ///
    /// Progress notices reach the sink live and are not part of the result.
    pub fn polish(
        &self,
        text: impl Into<String>,
        sink: impl EventSink + 'static,
    ) -> Result<StreamCall<String>, ClientError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ClientError::Validation("text to polish must not be empty".into()));
        }
        let body = RequestBody::Json(serde_json::json!({ "original_text": text }));
        Ok(self.start(
            StreamKind::Polish,
            self.config.polish_url(),
            body,
            Box::new(sink),
            polished_text,
        ))
    }
}

fn polished_text(report: SessionReport) -> Result<String, ClientError> {
    report
        .completion
        .and_then(|c| c.final_text)
        .ok_or_else(|| ClientError::protocol_msg("polish stream ended without polished text"))
}
