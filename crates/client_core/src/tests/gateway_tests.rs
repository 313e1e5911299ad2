use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use shared::domain::SelectedFile;

use super::*;

#[derive(Debug, Clone, Default)]
struct RecordedUpload {
    field_name: String,
    file_name: Option<String>,
    bytes: Vec<u8>,
    reference_date: Option<String>,
}

type UploadLog = Arc<Mutex<Vec<RecordedUpload>>>;

#[derive(Clone)]
struct OkServerState {
    uploads: UploadLog,
    decode_body: serde_json::Value,
    encode_bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct DecodeParams {
    reference_date: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> RecordedUpload {
    let mut upload = RecordedUpload::default();
    while let Some(field) = multipart.next_field().await.expect("read multipart field") {
        upload.field_name = field.name().unwrap_or_default().to_owned();
        upload.file_name = field.file_name().map(str::to_owned);
        upload.bytes = field.bytes().await.expect("read multipart bytes").to_vec();
    }
    upload
}

async fn handle_decode(
    State(state): State<OkServerState>,
    Query(params): Query<DecodeParams>,
    multipart: Multipart,
) -> impl IntoResponse {
    let mut upload = read_upload(multipart).await;
    upload.reference_date = params.reference_date;
    state.uploads.lock().await.push(upload);
    Json(state.decode_body.clone())
}

async fn handle_encode(
    State(state): State<OkServerState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let upload = read_upload(multipart).await;
    state.uploads.lock().await.push(upload);
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        state.encode_bytes.clone(),
    )
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "CAT62 ASTERIX API"}))
}

/// Transform service double that records uploads and answers with the given
/// bodies. Returns the base url and the upload log.
async fn spawn_ok_server(
    decode_body: serde_json::Value,
    encode_bytes: Vec<u8>,
) -> (String, UploadLog) {
    // Keep test traffic away from any proxy configured in the environment.
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let uploads: UploadLog = Arc::new(Mutex::new(Vec::new()));
    let state = OkServerState {
        uploads: uploads.clone(),
        decode_body,
        encode_bytes,
    };
    let app = Router::new()
        .route("/decode", post(handle_decode))
        .route("/encode", post(handle_encode))
        .route("/health", get(handle_health))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), uploads)
}

/// Server that answers every transform route with one fixed reply: a JSON
/// body when given, otherwise a plain-text placeholder.
async fn spawn_static_server(status: StatusCode, body: Option<serde_json::Value>) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let handler = move || {
        let body = body.clone();
        async move {
            match body {
                Some(body) => (status, Json(body)).into_response(),
                None => (status, "upstream unavailable").into_response(),
            }
        }
    };
    let app = Router::new()
        .route("/decode", post(handler.clone()))
        .route("/encode", post(handler));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn gateway_for(base_url: &str) -> HttpTransformGateway {
    HttpTransformGateway::new(HttpGatewayOptions {
        base_url: base_url.to_owned(),
        reference_date: None,
        request_timeout: Some(Duration::from_secs(5)),
    })
    .expect("build gateway")
}

#[tokio::test]
async fn decode_posts_multipart_and_parses_reply() {
    let decode_body = json!({
        "count": 2,
        "records": [{"track_number": 3501}, {"track_number": 3502}],
    });
    let (base_url, uploads) = spawn_ok_server(decode_body, Vec::new()).await;
    let gateway = gateway_for(&base_url);
    let file = SelectedFile::new("plots.bin", vec![0x3e, 0x00, 0x0a]);

    let decoded = gateway.decode_to_structured(&file).await.expect("decode");
    assert_eq!(decoded.count, 2);
    assert_eq!(decoded.records.len(), 2);

    let uploads = uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field_name, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("plots.bin"));
    assert_eq!(uploads[0].bytes, vec![0x3e, 0x00, 0x0a]);
    assert_eq!(uploads[0].reference_date, None);
}

#[tokio::test]
async fn decode_forwards_configured_reference_date() {
    let (base_url, uploads) =
        spawn_ok_server(json!({"count": 0, "records": []}), Vec::new()).await;
    let gateway = HttpTransformGateway::new(HttpGatewayOptions {
        base_url,
        reference_date: Some("2025-03-14".to_owned()),
        request_timeout: None,
    })
    .expect("build gateway");

    gateway
        .decode_to_structured(&SelectedFile::new("plots.bin", vec![0x01]))
        .await
        .expect("decode");

    let uploads = uploads.lock().await;
    assert_eq!(uploads[0].reference_date.as_deref(), Some("2025-03-14"));
}

#[tokio::test]
async fn encode_returns_binary_payload_verbatim() {
    let payload = vec![0x3e, 0x01, 0x4a, 0xff, 0x00, 0x10];
    let (base_url, uploads) =
        spawn_ok_server(json!({"count": 0, "records": []}), payload.clone()).await;
    let gateway = gateway_for(&base_url);

    let encoded = gateway
        .encode_to_binary(&SelectedFile::new("plots.json", b"{}".to_vec()))
        .await
        .expect("encode");
    assert_eq!(encoded, payload);

    let uploads = uploads.lock().await;
    assert_eq!(uploads[0].field_name, "file");
    assert_eq!(uploads[0].file_name.as_deref(), Some("plots.json"));
}

#[tokio::test]
async fn error_detail_is_captured_from_json_body() {
    let base_url = spawn_static_server(
        StatusCode::BAD_REQUEST,
        Some(json!({"detail": "invalid header"})),
    )
    .await;
    let gateway = gateway_for(&base_url);

    let err = gateway
        .decode_to_structured(&SelectedFile::new("bad.bin", vec![0x00]))
        .await
        .expect_err("decode should fail");
    assert_eq!(
        err,
        GatewayError::Status {
            status: 400,
            detail: Some("invalid header".to_owned()),
        }
    );
    assert_eq!(err.display_message(), "invalid header");
}

#[tokio::test]
async fn error_without_json_detail_falls_back_to_status() {
    let base_url = spawn_static_server(StatusCode::SERVICE_UNAVAILABLE, None).await;
    let gateway = gateway_for(&base_url);

    let err = gateway
        .encode_to_binary(&SelectedFile::new("plots.json", b"{}".to_vec()))
        .await
        .expect_err("encode should fail");
    assert_eq!(
        err,
        GatewayError::Status {
            status: 503,
            detail: None,
        }
    );
    assert_eq!(err.display_message(), "HTTP 503");
}

#[tokio::test]
async fn malformed_success_body_is_a_transport_error() {
    let base_url = spawn_static_server(StatusCode::OK, None).await;
    let gateway = gateway_for(&base_url);

    let err = gateway
        .decode_to_structured(&SelectedFile::new("plots.bin", vec![0x01]))
        .await
        .expect_err("non-json success body should fail to parse");
    assert!(matches!(err, GatewayError::Transport { .. }));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);

    let gateway = gateway_for(&format!("http://{addr}"));
    let err = gateway.health_check().await.expect_err("health should fail");
    assert!(matches!(err, GatewayError::Transport { .. }));
    assert!(!err.display_message().is_empty());
}

#[tokio::test]
async fn health_check_reports_service_identity() {
    let (base_url, _uploads) =
        spawn_ok_server(json!({"count": 0, "records": []}), Vec::new()).await;

    let health = gateway_for(&base_url).health_check().await.expect("health");
    assert_eq!(health.status, "ok");
    assert_eq!(health.service, "CAT62 ASTERIX API");
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let (base_url, _uploads) =
        spawn_ok_server(json!({"count": 1, "records": [{}]}), Vec::new()).await;

    let gateway = gateway_for(&format!("{base_url}/"));
    let decoded = gateway
        .decode_to_structured(&SelectedFile::new("plots.bin", vec![0x01]))
        .await
        .expect("decode");
    assert_eq!(decoded.count, 1);
}

#[test]
fn display_message_prefers_detail_then_code() {
    let with_detail = GatewayError::Status {
        status: 400,
        detail: Some("bad field spec".to_owned()),
    };
    assert_eq!(with_detail.display_message(), "bad field spec");

    let blank_detail = GatewayError::Status {
        status: 400,
        detail: Some("   ".to_owned()),
    };
    assert_eq!(blank_detail.display_message(), "HTTP 400");

    let no_detail = GatewayError::Status {
        status: 502,
        detail: None,
    };
    assert_eq!(no_detail.display_message(), "HTTP 502");

    let transport = GatewayError::Transport {
        message: "connection refused".to_owned(),
    };
    assert_eq!(transport.display_message(), "connection refused");

    let silent = GatewayError::Transport {
        message: "  ".to_owned(),
    };
    assert_eq!(silent.display_message(), "Unknown error");
}

#[test]
fn rejects_invalid_base_url() {
    let result = HttpTransformGateway::new(HttpGatewayOptions {
        base_url: "not a url".to_owned(),
        ..Default::default()
    });
    assert!(result.is_err());
}
