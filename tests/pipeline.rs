//! Integration tests for the event endpoints.
//!
//! Each test spins up an Axum server on a random port backed by
//! in-memory storage, a stub recognizer, and a recording mailer, then
//! exercises the real HTTP contract end to end.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use mailscan::error::{DeliveryError, RecognitionError};
use mailscan::mail::{Mailer, OutboundEmail};
use mailscan::ocr::{TextBlock, TextRecognizer};
use mailscan::pipeline::{EmailDecomposer, ImageConverter};
use mailscan::server::event_routes;
use mailscan::storage::{MemoryStorage, ObjectStorage};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const BUCKET: &str = "mail-ingest";
const FROM_ADDRESS: &str = "scanner@svc.example";

/// PNG header bytes; base64-encodes to "iVBORw0KGgo=".
const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Stub recognizer for integration tests (no real OCR calls).
struct StubRecognizer {
    blocks: Vec<TextBlock>,
}

#[async_trait]
impl TextRecognizer for StubRecognizer {
    async fn analyze(&self, _bucket: &str, _key: &str) -> Result<Vec<TextBlock>, RecognitionError> {
        Ok(self.blocks.clone())
    }
}

/// Mailer that records sent emails instead of talking to SMTP.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct TestHarness {
    port: u16,
    storage: Arc<MemoryStorage>,
    mailer: Arc<RecordingMailer>,
}

/// Start an Axum server on a random port wired to test doubles.
async fn start_server(blocks: Vec<TextBlock>) -> TestHarness {
    let storage = Arc::new(MemoryStorage::new());
    let mailer = Arc::new(RecordingMailer::default());

    let storage_dyn: Arc<dyn ObjectStorage> = storage.clone();
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(StubRecognizer { blocks });
    let mailer_dyn: Arc<dyn Mailer> = mailer.clone();

    let decomposer = Arc::new(EmailDecomposer::new(Arc::clone(&storage_dyn)));
    let converter = Arc::new(ImageConverter::new(
        storage_dyn,
        recognizer,
        mailer_dyn,
        FROM_ADDRESS.to_string(),
    ));
    let app = event_routes(decomposer, converter);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestHarness {
        port,
        storage,
        mailer,
    }
}

/// Helper: block of a given type.
fn block(kind: &str, text: &str) -> TextBlock {
    TextBlock {
        kind: kind.into(),
        text: text.into(),
    }
}

/// Helper: a multipart email with one base64 PNG attachment.
fn raw_email(from: &str, filename: &str) -> String {
    format!(
        "From: Sender <{from}>\r\n\
         To: scan@svc.example\r\n\
         Subject: please scan\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
         \r\n\
         --sep\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         see attached\r\n\
         --sep\r\n\
         Content-Type: image/png; name=\"{filename}\"\r\n\
         Content-Disposition: attachment; filename=\"{filename}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         iVBORw0KGgo=\r\n\
         --sep--\r\n"
    )
}

/// Helper: a plain email with no attachments.
fn plain_email(from: &str) -> String {
    format!(
        "From: Sender <{from}>\r\n\
         To: scan@svc.example\r\n\
         Subject: hello\r\n\
         \r\n\
         no images here\r\n"
    )
}

/// Helper: direct object-created notification.
fn direct_event(key: &str) -> Value {
    serde_json::json!({
        "detail": {
            "bucket": { "name": BUCKET },
            "object": { "key": key }
        }
    })
}

/// Helper: the same notification after a failed invocation was redriven
/// through a queue. Record bodies are JSON strings.
fn redrive_event(keys: &[&str]) -> Value {
    let records: Vec<Value> = keys
        .iter()
        .map(|key| {
            let body = serde_json::json!({
                "requestPayload": direct_event(key),
                "requestContext": {
                    "condition": "RetriesExhausted",
                    "approximateInvokeCount": 3
                },
                "responsePayload": {
                    "errorType": "Error",
                    "errorMessage": "processing failed",
                    "trace": []
                }
            });
            serde_json::json!({ "body": body.to_string() })
        })
        .collect();
    serde_json::json!({ "Records": records })
}

async fn post_event(port: u16, path: &str, payload: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}{path}"))
        .json(payload)
        .send()
        .await
        .unwrap()
}

async fn seed_raw(harness: &TestHarness, key: &str, message: &str) {
    harness
        .storage
        .put(
            BUCKET,
            key,
            Bytes::copy_from_slice(message.as_bytes()),
            "message/rfc822",
        )
        .await
        .unwrap();
}

async fn seed_image(harness: &TestHarness, key: &str) {
    harness
        .storage
        .put(BUCKET, key, Bytes::from_static(PNG_BYTES), "image/png")
        .await
        .unwrap();
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{}/health", harness.port))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "mailscan");
    })
    .await
    .expect("test timed out");
}

// ── Raw-email endpoint ───────────────────────────────────────────────

#[tokio::test]
async fn raw_email_event_extracts_attachment() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;
        seed_raw(&harness, "raw/abc", &raw_email("j@x.com", "note.png")).await;

        let resp = post_event(harness.port, "/events/raw-email", &direct_event("raw/abc")).await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["processed"], 1);
        assert_eq!(body["attachments_written"], 1);

        let stored = harness
            .storage
            .get(BUCKET, "images/j@x.com/note.png")
            .await
            .unwrap();
        assert_eq!(&stored[..], PNG_BYTES);
        assert_eq!(
            harness
                .storage
                .content_type(BUCKET, "images/j@x.com/note.png")
                .await
                .as_deref(),
            Some("image/png")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn raw_email_event_without_attachments_writes_nothing() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;
        seed_raw(&harness, "raw/plain", &plain_email("j@x.com")).await;

        let resp = post_event(harness.port, "/events/raw-email", &direct_event("raw/plain")).await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["attachments_written"], 0);
        assert_eq!(
            harness.storage.keys(BUCKET).await,
            vec!["raw/plain".to_string()]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn raw_email_event_missing_object_is_server_error() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;

        let resp = post_event(harness.port, "/events/raw-email", &direct_event("raw/gone")).await;
        assert_eq!(resp.status(), 500);

        // Nothing was written on the failed read.
        assert!(harness.storage.keys(BUCKET).await.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Image endpoint ───────────────────────────────────────────────────

#[tokio::test]
async fn image_event_mails_recognized_text() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(vec![
            block("LINE", "line1"),
            block("WORD", "ignored"),
            block("LINE", "line2"),
        ])
        .await;
        seed_image(&harness, "images/j@x.com/note.png").await;

        let resp = post_event(
            harness.port,
            "/events/image",
            &direct_event("images/j@x.com/note.png"),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["processed"], 1);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, FROM_ADDRESS);
        assert_eq!(sent[0].to, "j@x.com");
        assert_eq!(sent[0].subject, "Results from the image note.png");
        assert_eq!(sent[0].text, "line1\nline2");
        assert_eq!(sent[0].attachments.len(), 1);
        assert_eq!(sent[0].attachments[0].filename, "note.png");
        assert_eq!(sent[0].attachments[0].content, STANDARD.encode(PNG_BYTES));
        assert_eq!(sent[0].attachments[0].encoding, "base64");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn image_event_missing_object_sends_nothing() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(vec![block("LINE", "text")]).await;

        let resp = post_event(
            harness.port,
            "/events/image",
            &direct_event("images/j@x.com/gone.png"),
        )
        .await;
        assert_eq!(resp.status(), 500);
        assert!(harness.mailer.sent().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn image_event_unattributable_key_sends_nothing() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(vec![block("LINE", "text")]).await;
        seed_image(&harness, "images/plainname/file.png").await;

        let resp = post_event(
            harness.port,
            "/events/image",
            &direct_event("images/plainname/file.png"),
        )
        .await;
        assert_eq!(resp.status(), 500);
        assert!(harness.mailer.sent().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── End to end ───────────────────────────────────────────────────────

#[tokio::test]
async fn raw_email_flows_to_result_email() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(vec![block("LINE", "line1"), block("LINE", "line2")]).await;
        seed_raw(&harness, "raw/abc", &raw_email("j@x.com", "note.png")).await;

        // Stage one: decompose the raw email.
        let resp = post_event(harness.port, "/events/raw-email", &direct_event("raw/abc")).await;
        assert_eq!(resp.status(), 200);

        // Stage two: convert the image object stage one produced.
        let resp = post_event(
            harness.port,
            "/events/image",
            &direct_event("images/j@x.com/note.png"),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "j@x.com");
        assert_eq!(sent[0].subject, "Results from the image note.png");
        assert_eq!(sent[0].text, "line1\nline2");
        assert_eq!(sent[0].attachments[0].content, "iVBORw0KGgo=");
    })
    .await
    .expect("test timed out");
}

// ── Redrive ──────────────────────────────────────────────────────────

#[tokio::test]
async fn redrive_event_behaves_like_direct() {
    timeout(TEST_TIMEOUT, async {
        let blocks = vec![block("LINE", "hello")];

        let direct = start_server(blocks.clone()).await;
        seed_image(&direct, "images/j@x.com/note.png").await;
        let resp = post_event(
            direct.port,
            "/events/image",
            &direct_event("images/j@x.com/note.png"),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let redriven = start_server(blocks).await;
        seed_image(&redriven, "images/j@x.com/note.png").await;
        let resp = post_event(
            redriven.port,
            "/events/image",
            &redrive_event(&["images/j@x.com/note.png"]),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let (a, b) = (direct.mailer.sent(), redriven.mailer.sent());
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].to, b[0].to);
        assert_eq!(a[0].subject, b[0].subject);
        assert_eq!(a[0].text, b[0].text);
        assert_eq!(a[0].attachments[0].content, b[0].attachments[0].content);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn redrive_event_processes_records_in_order() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(vec![block("LINE", "text")]).await;
        seed_image(&harness, "images/a@x.com/one.png").await;
        seed_image(&harness, "images/b@x.com/two.png").await;

        let resp = post_event(
            harness.port,
            "/events/image",
            &redrive_event(&["images/a@x.com/one.png", "images/b@x.com/two.png"]),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["processed"], 2);

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[1].to, "b@x.com");
    })
    .await
    .expect("test timed out");
}

// ── Malformed notifications ──────────────────────────────────────────

#[tokio::test]
async fn malformed_record_body_is_unprocessable() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;

        let payload = serde_json::json!({
            "Records": [ { "body": "not json" } ]
        });
        let resp = post_event(harness.port, "/events/image", &payload).await;
        assert_eq!(resp.status(), 422);

        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Record 0"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn notification_without_object_key_is_unprocessable() {
    timeout(TEST_TIMEOUT, async {
        let harness = start_server(Vec::new()).await;

        let payload = serde_json::json!({
            "detail": { "bucket": { "name": BUCKET } }
        });
        let resp = post_event(harness.port, "/events/raw-email", &payload).await;
        assert_eq!(resp.status(), 422);
    })
    .await
    .expect("test timed out");
}
