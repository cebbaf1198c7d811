//! # Submission Handler Tests
//!
//! Drive [`SubmissionHandler`] against mock `/generate` servers and against
//! the real router, checking what it sends, what it alerts, and what ends up
//! in the result container.

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::stream::{self, StreamExt};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use hueforge::HueforgeError;
use hueforge::client::{
    ClientConfig, DOWNLOAD_FILENAME, DOWNLOAD_LABEL, DownloadLink, ERROR_MESSAGE, Host,
    NO_FILE_MESSAGE, Outcome, SelectedFile, SubmissionHandler,
};
use hueforge::server::{self, ServerConfig};

// ============================================================================
// TEST PAGE
// ============================================================================

/// In-memory page with the inputs, alerts and result container.
#[derive(Default)]
struct TestPage {
    file: Mutex<Option<SelectedFile>>,
    fields: Mutex<HashMap<String, String>>,
    alerts: Mutex<Vec<String>>,
    control: Mutex<Vec<bool>>,
    result: Mutex<Vec<DownloadLink>>,
}

impl TestPage {
    fn with_inputs(file: Option<SelectedFile>, values: [&str; 4]) -> Self {
        let page = TestPage::default();
        *page.file.lock().unwrap() = file;
        page.set_fields(values);
        page
    }

    fn set_fields(&self, [maxdim, scalexy, zscale, base]: [&str; 4]) {
        let mut fields = self.fields.lock().unwrap();
        fields.insert("maxdim".into(), maxdim.into());
        fields.insert("scalexy".into(), scalexy.into());
        fields.insert("zscale".into(), zscale.into());
        fields.insert("base".into(), base.into());
    }

    fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    fn control_events(&self) -> Vec<bool> {
        self.control.lock().unwrap().clone()
    }

    fn result(&self) -> Vec<DownloadLink> {
        self.result.lock().unwrap().clone()
    }
}

impl Host for TestPage {
    fn selected_file(&self) -> Option<SelectedFile> {
        self.file.lock().unwrap().clone()
    }

    fn field_value(&self, element_id: &str) -> String {
        self.fields
            .lock()
            .unwrap()
            .get(element_id)
            .cloned()
            .unwrap_or_default()
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn set_control_enabled(&self, enabled: bool) {
        self.control.lock().unwrap().push(enabled);
    }

    fn replace_result(&self, link: DownloadLink) {
        let mut result = self.result.lock().unwrap();
        result.clear();
        result.push(link);
    }
}

// ============================================================================
// MOCK SERVER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct RecordedPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Lets a test hold the response until it says so.
#[derive(Default)]
struct Gate {
    received: Notify,
    release: Notify,
}

#[derive(Clone)]
struct Mock {
    status: StatusCode,
    body: Arc<Mutex<Vec<u8>>>,
    requests: Arc<Mutex<Vec<Vec<RecordedPart>>>>,
    gate: Option<Arc<Gate>>,
}

impl Mock {
    fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            body: Arc::new(Mutex::new(body)),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    fn gated(mut self) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    fn requests(&self) -> Vec<Vec<RecordedPart>> {
        self.requests.lock().unwrap().clone()
    }
}

async fn mock_generate(State(mock): State<Mock>, mut multipart: Multipart) -> impl IntoResponse {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(RecordedPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    mock.requests.lock().unwrap().push(parts);

    if let Some(gate) = &mock.gate {
        gate.received.notify_one();
        gate.release.notified().await;
    }

    let body = mock.body.lock().unwrap().clone();
    (mock.status, body)
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{}", addr)
}

async fn spawn_mock(mock: Mock) -> String {
    spawn(
        Router::new()
            .route("/generate", post(mock_generate))
            .with_state(mock),
    )
    .await
}

/// Sends headers and the first chunk, then fails the body once released.
async fn truncated_generate(State(gate): State<Arc<Gate>>, mut multipart: Multipart) -> Response {
    while let Some(field) = multipart.next_field().await.unwrap() {
        field.bytes().await.unwrap();
    }

    let head = stream::once(async { Ok(Bytes::from_static(b"solid ")) });
    let tail = stream::once(async move {
        gate.received.notify_one();
        gate.release.notified().await;
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "upstream went away",
        ))
    });
    Response::new(Body::from_stream(head.chain(tail)))
}

fn handler(page: TestPage, base: &str) -> SubmissionHandler<TestPage> {
    SubmissionHandler::new(page, ClientConfig::new(base)).unwrap()
}

fn mesh_file(size: usize) -> SelectedFile {
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    SelectedFile::new("mesh.png", data)
}

const EXAMPLE_FIELDS: [&str; 4] = ["200", "1.0", "0.2", "0.4"];

// ============================================================================
// PRECONDITIONS
// ============================================================================

#[tokio::test]
async fn test_no_file_never_sends_and_alerts() {
    let mock = Mock::new(StatusCode::OK, vec![1, 2, 3]);
    let base = spawn_mock(mock.clone()).await;
    let handler = handler(TestPage::with_inputs(None, EXAMPLE_FIELDS), &base);

    let outcome = handler.activate().await.unwrap();

    assert_eq!(outcome, Outcome::MissingFile);
    assert_eq!(handler.host().alerts(), vec![NO_FILE_MESSAGE.to_string()]);
    assert!(mock.requests().is_empty());
    assert!(handler.host().result().is_empty());
    assert!(handler.host().control_events().is_empty());
    assert!(!handler.is_busy());
}

// ============================================================================
// PAYLOAD
// ============================================================================

#[tokio::test]
async fn test_payload_has_five_parts_with_verbatim_text() {
    let mock = Mock::new(StatusCode::OK, b"solid x\nendsolid x\n".to_vec());
    let base = spawn_mock(mock.clone()).await;
    let file = mesh_file(1000);
    let raw = ["  200  ", "1,5", "", "abc"];
    let handler = handler(TestPage::with_inputs(Some(file.clone()), raw), &base);

    handler.activate().await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let parts = &requests[0];
    assert_eq!(parts.len(), 5);

    let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["file", "max_dim", "scale_xy", "z_scale", "base_thickness"]);

    assert_eq!(parts[0].file_name.as_deref(), Some("mesh.png"));
    assert_eq!(parts[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(parts[0].data, file.bytes.to_vec());

    for (part, expected) in parts[1..].iter().zip(raw) {
        assert_eq!(String::from_utf8(part.data.clone()).unwrap(), expected);
        assert_eq!(part.file_name, None);
    }
}

#[tokio::test]
async fn test_inputs_are_read_at_activation_time() {
    let mock = Mock::new(StatusCode::OK, vec![0]);
    let base = spawn_mock(mock.clone()).await;
    let handler = handler(TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS), &base);

    handler.activate().await.unwrap();
    handler.host().set_fields(["50", "2", "3", "4"]);
    handler.activate().await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0][1].data, b"200".to_vec());
    assert_eq!(requests[1][1].data, b"50".to_vec());
}

// ============================================================================
// RESPONSES
// ============================================================================

#[tokio::test]
async fn test_error_status_alerts_and_leaves_result_alone() {
    for status in [
        StatusCode::BAD_REQUEST,
        StatusCode::NOT_FOUND,
        StatusCode::UNPROCESSABLE_ENTITY,
        StatusCode::INTERNAL_SERVER_ERROR,
    ] {
        let mock = Mock::new(status, b"{\"error\":\"nope\"}".to_vec());
        let base = spawn_mock(mock).await;
        let handler = handler(TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS), &base);

        let outcome = handler.activate().await.unwrap();

        assert_eq!(outcome, Outcome::Rejected(status));
        assert_eq!(handler.host().alerts(), vec![ERROR_MESSAGE.to_string()]);
        assert!(handler.host().result().is_empty());
        assert_eq!(handler.host().control_events(), vec![false, true]);
        assert_eq!(handler.live_object_urls(), 0);
    }
}

#[tokio::test]
async fn test_example_512_byte_model() {
    let mock = Mock::new(StatusCode::OK, vec![7u8; 512]);
    let base = spawn_mock(mock).await;
    let handler = handler(
        TestPage::with_inputs(Some(mesh_file(10 * 1024)), EXAMPLE_FIELDS),
        &base,
    );

    let outcome = handler.activate().await.unwrap();

    let result = handler.host().result();
    assert_eq!(result.len(), 1);
    let link = &result[0];
    assert_eq!(outcome, Outcome::Ready(link.clone()));
    assert_eq!(link.download, DOWNLOAD_FILENAME);
    assert_eq!(link.text, DOWNLOAD_LABEL);

    let blob = handler.resolve(&link.href).unwrap();
    assert_eq!(blob.len(), 512);
    assert!(handler.host().alerts().is_empty());
    assert!(!handler.is_busy());
}

#[tokio::test]
async fn test_any_success_status_publishes_the_body() {
    let mock = Mock::new(StatusCode::CREATED, b"solid x\nendsolid x\n".to_vec());
    let base = spawn_mock(mock).await;
    let handler = handler(TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS), &base);

    let Outcome::Ready(link) = handler.activate().await.unwrap() else {
        panic!("201 should be treated as success");
    };

    assert_eq!(handler.host().result(), vec![link.clone()]);
    assert_eq!(&handler.resolve(&link.href).unwrap()[..], b"solid x\nendsolid x\n");
    assert!(handler.host().alerts().is_empty());
    assert_eq!(handler.host().control_events(), vec![false, true]);
}

#[tokio::test]
async fn test_second_success_replaces_link_and_revokes_first() {
    let mock = Mock::new(StatusCode::OK, b"first".to_vec());
    let base = spawn_mock(mock.clone()).await;
    let handler = handler(TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS), &base);

    let Outcome::Ready(first) = handler.activate().await.unwrap() else {
        panic!("first submission should succeed");
    };
    *mock.body.lock().unwrap() = b"second".to_vec();
    let Outcome::Ready(second) = handler.activate().await.unwrap() else {
        panic!("second submission should succeed");
    };

    assert_eq!(handler.host().result(), vec![second.clone()]);
    assert_ne!(first.href, second.href);
    assert!(handler.resolve(&first.href).is_none());
    assert_eq!(&handler.resolve(&second.href).unwrap()[..], b"second");
    assert_eq!(handler.live_object_urls(), 1);
}

#[tokio::test]
async fn test_network_failure_alerts_and_returns_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let handler = handler(
        TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS),
        &format!("http://{}", addr),
    );

    let err = handler.activate().await.unwrap_err();

    assert!(matches!(err, HueforgeError::Http(_)));
    assert_eq!(handler.host().alerts(), vec![ERROR_MESSAGE.to_string()]);
    assert!(handler.host().result().is_empty());
    assert!(!handler.is_busy());
}

#[tokio::test]
async fn test_timeout_is_a_network_failure() {
    let (mock, _gate) = Mock::new(StatusCode::OK, vec![1]).gated();
    let base = spawn_mock(mock).await;
    let page = TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS);
    let handler = SubmissionHandler::new(
        page,
        ClientConfig::new(base).with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let err = handler.activate().await.unwrap_err();

    assert!(matches!(err, HueforgeError::Http(_)));
    assert_eq!(handler.host().alerts(), vec![ERROR_MESSAGE.to_string()]);
}

// ============================================================================
// IN-FLIGHT GUARD
// ============================================================================

#[tokio::test]
async fn test_activation_while_in_flight_is_ignored() {
    let (mock, gate) = Mock::new(StatusCode::OK, vec![9u8; 64]).gated();
    let base = spawn_mock(mock.clone()).await;
    let handler = Arc::new(handler(
        TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS),
        &base,
    ));

    let first = tokio::spawn({
        let handler = handler.clone();
        async move { handler.activate().await }
    });
    gate.received.notified().await;

    assert!(handler.is_busy());
    assert_eq!(handler.activate().await.unwrap(), Outcome::Busy);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();

    assert!(matches!(outcome, Outcome::Ready(_)));
    assert_eq!(mock.requests().len(), 1);
    assert_eq!(handler.host().control_events(), vec![false, true]);
    assert_eq!(handler.host().result().len(), 1);
    assert!(!handler.is_busy());
}

#[tokio::test]
async fn test_cancelled_response_is_discarded() {
    let (mock, gate) = Mock::new(StatusCode::OK, vec![9u8; 64]).gated();
    let base = spawn_mock(mock).await;
    let handler = Arc::new(handler(
        TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS),
        &base,
    ));

    let first = tokio::spawn({
        let handler = handler.clone();
        async move { handler.activate().await }
    });
    gate.received.notified().await;

    handler.cancel();
    assert!(!handler.is_busy());

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();

    assert_eq!(outcome, Outcome::Stale);
    assert!(handler.host().result().is_empty());
    assert!(handler.host().alerts().is_empty());
    assert_eq!(handler.live_object_urls(), 0);
    assert_eq!(handler.host().control_events(), vec![false, true]);
}

#[tokio::test]
async fn test_cancelled_request_with_broken_body_stays_silent() {
    let gate = Arc::new(Gate::default());
    let base = spawn(
        Router::new()
            .route("/generate", post(truncated_generate))
            .with_state(gate.clone()),
    )
    .await;
    let handler = Arc::new(handler(
        TestPage::with_inputs(Some(mesh_file(10)), EXAMPLE_FIELDS),
        &base,
    ));

    let first = tokio::spawn({
        let handler = handler.clone();
        async move { handler.activate().await }
    });
    gate.received.notified().await;
    // let the handler get past the headers and into the body read
    tokio::time::sleep(Duration::from_millis(50)).await;

    handler.cancel();
    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();

    assert_eq!(outcome, Outcome::Stale);
    assert!(handler.host().alerts().is_empty());
    assert!(handler.host().result().is_empty());
    assert_eq!(handler.live_object_urls(), 0);
}

// ============================================================================
// END TO END
// ============================================================================

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 31 + y * 17) % 256) as u8;
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_end_to_end_against_real_server() {
    let base = spawn(server::router(ServerConfig::default())).await;
    let file = SelectedFile::new("photo.png", png(16, 12));
    let handler = handler(TestPage::with_inputs(Some(file), ["8", "1.0", "0.2", "0.4"]), &base);

    let Outcome::Ready(link) = handler.activate().await.unwrap() else {
        panic!("real server should produce a model");
    };

    let stl = String::from_utf8(handler.resolve(&link.href).unwrap().to_vec()).unwrap();
    assert!(stl.starts_with("solid hueforge_model\n"));
    assert!(stl.contains("vertex 0 0 -0.4\n"));
    assert_eq!(
        stl.matches("endfacet").count(),
        hueforge::mesh::expected_triangle_count(8, 6)
    );
}

#[tokio::test]
async fn test_end_to_end_invalid_number_is_rejected() {
    let base = spawn(server::router(ServerConfig::default())).await;
    let file = SelectedFile::new("photo.png", png(4, 4));
    let handler = handler(TestPage::with_inputs(Some(file), ["big", "1", "1", "1"]), &base);

    let outcome = handler.activate().await.unwrap();

    assert_eq!(outcome, Outcome::Rejected(StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(handler.host().alerts(), vec![ERROR_MESSAGE.to_string()]);
}
