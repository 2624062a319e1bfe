//! End-to-end tests running `ReqwestTransport` against wiremock servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use progress_stream::prelude::*;
use wiremock::matchers::{body_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVALUATION_LINES: &str = concat!(
    "{\"step\":0,\"name\":\"任务拆解\",\"steps\":[{\"id\":1,\"name\":\"学历匹配评估\",\"desc\":\"评估学历\"},{\"id\":2,\"name\":\"技能匹配评估\",\"desc\":\"评估技能\"}]}\n",
    "{\"step\":1,\"name\":\"学历匹配评估\",\"score\":18,\"reason\":\"本科，专业对口\"}\n",
    "not even json\n",
    "{\"step\":2,\"name\":\"技能匹配评估\",\"score\":22,\"reason\":\"技能基本匹配\"}\n",
);

fn client(server: &MockServer) -> StreamClient {
    StreamClient::new(ClientConfig::new(server.uri()).timeout(Duration::from_secs(10)))
        .expect("client")
}

#[tokio::test]
async fn evaluation_stream_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jd/12/evaluate-resume"))
        .and(body_string_contains("name=\"resume_file\""))
        .and(body_string_contains("filename=\"cv.pdf\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(EVALUATION_LINES, "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let steps = Arc::new(Mutex::new(Vec::new()));
    let seen = steps.clone();
    let call = client(&server)
        .evaluate(
            12,
            Document::new("cv.pdf", b"%PDF-1.4 fake".to_vec()),
            Callbacks::new().with_progress(move |event| seen.lock().unwrap().push(event.step())),
        )
        .expect("call");
    let evaluation = call
        .finish()
        .await
        .expect("evaluation succeeds")
        .completed()
        .expect("not cancelled");

    assert_eq!(*steps.lock().unwrap(), vec![Some(0), Some(1), Some(2)]);
    assert_eq!(evaluation.total_score(), 40.0);
    assert!(evaluation.is_complete());
}

#[tokio::test]
async fn evaluation_json_array_fallback_over_http() {
    let server = MockServer::start().await;
    let entries: Vec<&str> = EVALUATION_LINES
        .lines()
        .filter(|l| l.starts_with('{'))
        .collect();
    let document = format!("[{}]", entries.join(","));
    Mock::given(method("POST"))
        .and(path("/api/jd/3/evaluate-resume"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(document, "application/json"))
        .mount(&server)
        .await;

    let client = StreamClient::new(
        ClientConfig::new(server.uri()).simulated_delay(Duration::from_millis(5)),
    )
    .expect("client");
    let (sink, mut rx) = ChannelSink::new();
    let call = client
        .evaluate(3, Document::new("cv.docx", vec![7u8; 16]), sink)
        .expect("call");
    let evaluation = call.finish().await.expect("ok").completed().expect("completed");

    assert_eq!(evaluation.steps.len(), 2);
    let mut delivered = 0;
    while let Some(message) = rx.recv().await {
        assert!(matches!(message, SinkMessage::Event(_)));
        delivered += 1;
    }
    assert_eq!(delivered, 3);
}

#[tokio::test]
async fn polish_sse_stream_over_http() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"event\":\"start\",\"data\":{\"message\":\"开始润色文本...\",\"progress\":0}}\r\n\r\n",
        ": keep-alive\r\n",
        "data: {\"event\":\"progress\",\"data\":{\"message\":\"正在润色\",\"progress\":60}}\r\n\r\n",
        "data: {\"event\":\"complete\",\"data\":{\"message\":\"文本润色完成\",\"progress\":100,\"polished_text\":\"主导后端系统开发。\"}}\r\n\r\n",
        "data: [DONE]\r\n\r\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/jd/polish-text/stream"))
        .and(body_json(serde_json::json!({"original_text": "负责后端开发"})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let notices = Arc::new(Mutex::new(Vec::new()));
    let seen = notices.clone();
    let call = client(&server)
        .polish(
            "负责后端开发",
            Callbacks::new().with_progress(move |event| {
                if let DomainEvent::Progress(notice) = event {
                    seen.lock().unwrap().push(notice.message.clone());
                }
            }),
        )
        .expect("call");
    let text = call.finish().await.expect("ok").completed().expect("completed");

    assert_eq!(text, "主导后端系统开发。");
    assert_eq!(*notices.lock().unwrap(), vec!["开始润色文本...", "正在润色"]);
}

#[tokio::test]
async fn server_error_status_fails_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jd/polish-text/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("润色失败"))
        .mount(&server)
        .await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let seen = errors.clone();
    let err = client(&server)
        .polish(
            "text",
            Callbacks::new().with_error(move |m| seen.lock().unwrap().push(m.to_string())),
        )
        .expect("call")
        .finish()
        .await
        .expect_err("500 must fail");

    match &err {
        ClientError::Transport {
            status_code,
            message,
        } => {
            assert_eq!(*status_code, Some(500));
            assert!(message.contains("润色失败"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn ingest_stream_over_http() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"status\":\"reading\",\"message\":\"正在读取文件...\"}\n\n",
        "data: {\"status\":\"parsed\",\"message\":\"文件解析完成\"}\n\n",
        "data: {\"status\":\"completed\",\"result\":{\"name\":\"李四\",\"skills\":[\"Rust\"]}}\n\n",
        "data: {\"status\":\"saved\",\"message\":\"简历已保存到数据库\",\"resume_id\":5}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/resumes/upload-stream"))
        .and(body_string_contains("name=\"file\""))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let summary = client(&server)
        .ingest(Document::new("李四.docx", vec![1u8; 8]), NoopSink)
        .expect("call")
        .finish()
        .await
        .expect("ok")
        .completed()
        .expect("completed");

    assert_eq!(summary.resume_id, Some(5));
    assert_eq!(summary.notices.len(), 4);
    assert_eq!(
        summary.analysis.as_ref().and_then(|a| a.get("name")),
        Some(&serde_json::json!("李四"))
    );
}

#[tokio::test]
async fn abort_while_server_is_slow_resolves_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jd/polish-text/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: [DONE]\n", "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let call = client(&server).polish("text", NoopSink).expect("call");
    let handle = call.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    });
    let outcome = tokio::time::timeout(Duration::from_secs(5), call.finish())
        .await
        .expect("settles promptly")
        .expect("cancellation is not an error");
    assert!(outcome.is_cancelled());
}
