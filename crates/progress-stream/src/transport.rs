use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{ClientError, TransportError};

/// Response body as a stream of raw chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Which endpoint a session talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Resume evaluation against a job description (JSON lines).
    Evaluation,
    /// Text polishing (SSE-style frames).
    Polish,
    /// Resume upload and parsing (SSE-style status frames).
    Ingest,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Polish => "polish",
            Self::Ingest => "ingest",
        }
    }

    /// Whether the completion frame must carry the final text.
    pub fn requires_final_text(self) -> bool {
        matches!(self, Self::Polish)
    }

    fn accept(self) -> &'static str {
        match self {
            Self::Evaluation => "application/x-ndjson, application/json",
            Self::Polish | Self::Ingest => "text/event-stream",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file uploaded as one multipart field.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Bytes,
    pub mime: String,
}

impl Document {
    /// Creates a document, guessing the MIME type from the file extension.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).to_string();
        Self {
            file_name,
            bytes: bytes.into(),
            mime,
        }
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

fn guess_mime(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Multipart { field: String, document: Document },
    Json(serde_json::Value),
}

/// Everything a transport needs to open one stream.
#[derive(Clone, Debug)]
pub struct StreamRequest {
    pub session_id: uuid::Uuid,
    pub kind: StreamKind,
    pub url: String,
    pub body: RequestBody,
    /// Whole-exchange timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// A successfully opened response.
pub struct OpenedStream {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl OpenedStream {
    /// Whether the server answered with a whole JSON document rather than a
    /// line stream.
    pub fn is_json_document(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase())
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}

impl fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedStream")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Seam between sessions and the network.
///
/// Non-success statuses must be reported as [`TransportError::Status`]
/// before any body chunk is produced.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, req: &StreamRequest) -> Result<OpenedStream, TransportError>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with an optional connect timeout.
    pub fn new(connect_timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl StreamTransport for ReqwestTransport {
    async fn open(&self, req: &StreamRequest) -> Result<OpenedStream, TransportError> {
        debug!(session_id = %req.session_id, kind = %req.kind, url = %req.url, "opening stream");
        let mut http_req = self
            .client
            .post(&req.url)
            .header(reqwest::header::ACCEPT, req.kind.accept());
        http_req = match &req.body {
            RequestBody::Json(value) => http_req.json(value),
            RequestBody::Multipart { field, document } => {
                let part = reqwest::multipart::Part::bytes(document.bytes.to_vec())
                    .file_name(document.file_name.clone())
                    .mime_str(&document.mime)
                    .map_err(|e| TransportError::request(format!("invalid MIME type: {e}")))?;
                http_req.multipart(reqwest::multipart::Form::new().part(field.clone(), part))
            }
        };
        if let Some(timeout) = req.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        debug!(session_id = %req.session_id, status = status.as_u16(), content_type = ?content_type, "stream opened");
        let body: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string()))),
        );
        Ok(OpenedStream { content_type, body })
    }
}
