#![recursion_limit = "256"]
//! Integration tests using wiremock to simulate the timetable server.

use chrono::{Local, TimeDelta};
use http::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use trenes::metadata::WireRequest;
use trenes::timetable::DecodeError;
use trenes::transport::{Transport, TransportResult};
use trenes::validate::{accept_any, default_policy};
use trenes::{
    Dispatcher, Error, ErrorKind, ParameterEncoding, Parameters, Result, ServiceRequest, TaskId,
    TimetableItem, TimetableRequest, TrainStatus,
};
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Dispatches `request` and waits for whichever callback fires.
///
/// Returns `None` if both callbacks were dropped without being called.
async fn dispatch_and_wait<R, T>(
    dispatcher: &Dispatcher<T>,
    request: R,
) -> Option<Result<R::Output>>
where
    R: ServiceRequest,
    T: Transport,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let failure_tx = tx.clone();

    dispatcher.dispatch(
        request,
        move |output| {
            let _ = tx.send(Ok(output));
        },
        move |error| {
            let _ = failure_tx.send(Err(error));
        },
    );

    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("callback within five seconds")
}

fn timetable_payload() -> Value {
    json!({
        "fecha": "15/03/24",
        "hora": "09:29",
        "salidas": [
            {"tipo_s": "N", "est": 1, "estado": "confirmado", "and": "1", "min": "10:00", "ramal": "41"}
        ],
        "salidas2": [
            {"tipo_s": "N", "est": 2, "estado": "A CONFIRMAR", "and": 2, "min": "10:30", "ramal": 42}
        ],
        "intermedias": [{
            "tipo_s_1": "N", "ramal_1": "41", "est_1": 3, "min_1": "2.5", "tren_1": "3101", "chapa_1": "A1",
            "tipo_s_2": "N", "ramal_2": "41", "est_2": 3, "min_2": "10", "tren_2": "3103", "chapa_2": "A2",
            "tipo_s_3": "N", "ramal_3": "41", "est_3": 3, "min_3": "20", "tren_3": "3105", "chapa_3": "A3",
            "tipo_s_4": "N", "ramal_4": "41", "est_4": 3, "min_4": "30", "tren_4": "3107", "chapa_4": "A4",
            "tipo_s_5": "N", "ramal_5": "41", "est_5": 3, "min_5": "40", "tren_5": "3109", "chapa_5": "A5",
            "tipo_s_6": "N", "ramal_6": "41", "est_6": 3, "min_6": "50", "tren_6": "3111", "chapa_6": "A6",
            "_id": "abc123"
        }],
        "alertas": {"mensaje": "Servicio normal"}
    })
}

fn timetable_request(server: &MockServer, line_id: i32) -> TimetableRequest {
    TimetableRequest::new(line_id).with_base_url(format!("{}/apps", server.uri()))
}

async fn mount_timetable(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/apps/api_tiempos_temp.php"))
        .and(query_param("ramal", "41"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_timetable_request() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(timetable_payload()),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let before = Local::now().naive_local();
    let response = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap();
    let after = Local::now().naive_local();

    assert_eq!(response.line_id(), 41);
    assert_eq!(response.message(), Some("Servicio normal"));
    assert_eq!(response.timestamp().to_string(), "2024-03-15 09:29:00");
    assert_eq!(response.items().len(), 8);

    let statuses: Vec<TrainStatus> = response.terminus_items().map(|item| item.status).collect();
    assert_eq!(statuses, vec![TrainStatus::Confirmed, TrainStatus::NotConfirmed]);

    let trains: Vec<&str> = response
        .intermediate_items()
        .map(|item| item.train_number.as_str())
        .collect();
    assert_eq!(trains, vec!["3101", "3103", "3105", "3107", "3109", "3111"]);

    let TimetableItem::Intermediate(first) = &response.items()[2] else {
        panic!("expected intermediate items after the termini");
    };
    let offset = TimeDelta::try_seconds(150).unwrap();
    assert!(first.timestamp >= before + offset && first.timestamp <= after + offset);
    assert_eq!(first.passthrough_id, json!("abc123"));
    assert_eq!(first.train_id, "A1");

    assert!(!dispatcher.is_busy());
}

#[tokio::test]
async fn test_http_error_with_message() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(404).set_body_string("not found"),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.code(), 404);
    assert_eq!(err.to_string(), "[404] - not found");
    assert_eq!(err.server_message(), Some("not found"));
}

#[tokio::test]
async fn test_http_error_without_body() {
    let mock_server = MockServer::start().await;
    mount_timetable(&mock_server, ResponseTemplate::new(503)).await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.code(), 503);
    assert_eq!(
        err.message(),
        "No error message reported. Default response validator failed: status code was 503"
    );
}

#[tokio::test]
async fn test_invalid_json() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::SerializerFailed);
    assert_eq!(err.code(), -1000);
    let underlying = err.underlying().unwrap();
    assert_eq!(underlying.kind(), &ErrorKind::JsonParsingFailed);
    assert!(std::error::Error::source(underlying)
        .unwrap()
        .is::<serde_json::Error>());
}

#[tokio::test]
async fn test_unexpected_shape() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({"fecha": "15/03/24", "hora": "09:29"})),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::SerializerFailed);
    let cause = std::error::Error::source(&err)
        .and_then(|e| e.downcast_ref::<DecodeError>())
        .unwrap();
    assert_eq!(cause, &DecodeError::MissingField("salidas".to_string()));
}

#[tokio::test]
async fn test_empty_body_is_no_data() {
    let mock_server = MockServer::start().await;
    mount_timetable(&mock_server, ResponseTemplate::new(200)).await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::NoDataReceived);
    assert_eq!(err.code(), -1001);
}

/// A form-encoded POST that expects no data back.
struct Report {
    line_id: Option<i32>,
    base_url: String,
    encoding: ParameterEncoding,
}

impl ServiceRequest for Report {
    type Output = ();

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> &str {
        "/report"
    }

    fn encoding(&self) -> ParameterEncoding {
        self.encoding
    }

    fn params(&self) -> Result<Parameters> {
        let line_id = self.line_id.ok_or_else(|| Error::missing_parameter("ramal"))?;
        let mut params = Parameters::new();
        params.insert("ramal".to_string(), json!(line_id));
        params.insert("delayed".to_string(), json!(false));
        Ok(params)
    }

    fn convert(&self, _payload: Option<Value>) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_form_post_without_response_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .and(header(
            "content-type",
            "application/x-www-form-urlencoded; charset=utf-8",
        ))
        .and(body_string("delayed=0&ramal=41"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let outcome = dispatch_and_wait(
        &dispatcher,
        Report {
            line_id: Some(41),
            base_url: mock_server.uri(),
            encoding: ParameterEncoding::Url,
        },
    )
    .await
    .unwrap();

    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_json_post() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/report"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"delayed": false, "ramal": 41})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let outcome = dispatch_and_wait(
        &dispatcher,
        Report {
            line_id: Some(41),
            base_url: mock_server.uri(),
            encoding: ParameterEncoding::Json,
        },
    )
    .await
    .unwrap();

    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_missing_parameter_fails_synchronously() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let id = dispatcher.dispatch(
        Report {
            line_id: None,
            base_url: mock_server.uri(),
            encoding: ParameterEncoding::Url,
        },
        |_| panic!("request must not succeed"),
        move |error| {
            let _ = tx.send(error);
        },
    );

    assert!(id.is_none());
    let err = rx.try_recv().expect("failure reported before dispatch returns");
    assert_eq!(err.code(), -1005);
    assert_eq!(
        err.to_string(),
        "The parameter \"ramal\" could not be obtained for creating the request"
    );
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_default_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "trenes-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(timetable_payload()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = Dispatcher::builder()
        .default_header("User-Agent", "trenes-tests")
        .unwrap()
        .build()
        .unwrap();

    let outcome = dispatch_and_wait(&dispatcher, timetable_request(&mock_server, 41))
        .await
        .unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_cancel_discards_outcome() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(timetable_payload())
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<&str>();
    let failure_tx = tx.clone();

    let id = dispatcher
        .dispatch(
            timetable_request(&mock_server, 41),
            move |_| {
                let _ = tx.send("success");
            },
            move |_| {
                let _ = failure_tx.send("failure");
            },
        )
        .unwrap();

    assert!(dispatcher.is_in_flight(&id));
    dispatcher.cancel(&id);
    assert!(!dispatcher.is_in_flight(&id));
    assert_eq!(dispatcher.in_flight(), 0);

    // Both callbacks are dropped with the aborted exchange.
    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(received, None);
}

#[tokio::test]
async fn test_cancel_unknown_id_is_noop() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(timetable_payload())
            .set_delay(Duration::from_millis(100)),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.dispatch(
        timetable_request(&mock_server, 41),
        move |response| {
            let _ = tx.send(response.line_id());
        },
        |e| panic!("unexpected failure: {e}"),
    );

    dispatcher.cancel(&TaskId::from("unknown-id"));
    assert_eq!(dispatcher.in_flight(), 1);
    assert_eq!(rx.recv().await, Some(41));
}

#[tokio::test]
async fn test_cancel_all() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(timetable_payload())
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    for _ in 0..3 {
        let success_tx = tx.clone();
        let failure_tx = tx.clone();
        dispatcher.dispatch(
            timetable_request(&mock_server, 41),
            move |_| {
                let _ = success_tx.send(());
            },
            move |_| {
                let _ = failure_tx.send(());
            },
        );
    }
    drop(tx);

    assert_eq!(dispatcher.in_flight(), 3);
    dispatcher.cancel_all();
    assert!(!dispatcher.is_busy());

    let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap();
    assert_eq!(received, None);
}

#[tokio::test]
async fn test_activity_tracks_in_flight_requests() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(timetable_payload())
            .set_delay(Duration::from_millis(100)),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let mut activity = dispatcher.subscribe_activity();
    assert_eq!(*activity.borrow_and_update(), 0);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let clone = dispatcher.clone();
    dispatcher.dispatch(
        timetable_request(&mock_server, 41),
        move |_| {
            // The task is released before its callback runs.
            let _ = tx.send(clone.in_flight());
        },
        |e| panic!("unexpected failure: {e}"),
    );

    assert!(activity.has_changed().unwrap());
    assert_eq!(*activity.borrow_and_update(), 1);
    assert!(dispatcher.is_busy());

    assert_eq!(rx.recv().await, Some(0));
    activity.changed().await.unwrap();
    assert_eq!(*activity.borrow(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_ids() {
    let mock_server = MockServer::start().await;
    mount_timetable(
        &mock_server,
        ResponseTemplate::new(200)
            .set_body_json(timetable_payload())
            .set_delay(Duration::from_millis(100)),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut ids = Vec::new();
    for _ in 0..4 {
        let tx = tx.clone();
        let id = dispatcher.dispatch(
            timetable_request(&mock_server, 41),
            move |response| {
                let _ = tx.send(response.line_id());
            },
            |e| panic!("unexpected failure: {e}"),
        );
        ids.push(id.unwrap());
    }
    drop(tx);

    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids.dedup();
    assert_eq!(ids.len(), 4);

    let mut completed = 0;
    while let Some(line_id) = rx.recv().await {
        assert_eq!(line_id, 41);
        completed += 1;
    }
    assert_eq!(completed, 4);
    assert_eq!(dispatcher.in_flight(), 0);
}

/// Completes without ever producing a response.
struct Silent;

impl Transport for Silent {
    async fn send(&self, _request: WireRequest) -> TransportResult {
        Ok(None)
    }
}

/// Fails every request at the connection level.
struct Refused;

impl Transport for Refused {
    async fn send(&self, _request: WireRequest) -> TransportResult {
        let refused =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        Err(refused.into())
    }
}

#[tokio::test]
async fn test_no_response_received() {
    let dispatcher = Dispatcher::with_transport(Silent);
    let err = dispatch_and_wait(&dispatcher, TimetableRequest::new(41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::NoResponseReceived);
    assert_eq!(err.code(), -1004);
}

#[tokio::test]
async fn test_transport_failure_keeps_cause() {
    let dispatcher = Dispatcher::with_transport(Refused);
    let err = dispatch_and_wait(&dispatcher, TimetableRequest::new(41))
        .await
        .unwrap()
        .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::Transport);
    assert_eq!(err.code(), -1006);
    let cause = std::error::Error::source(&err)
        .and_then(|e| e.downcast_ref::<std::io::Error>())
        .unwrap();
    assert_eq!(cause.kind(), std::io::ErrorKind::ConnectionRefused);
    assert!(!dispatcher.is_busy());
}

/// A GET whose response policy is chosen per instance.
struct Lookup {
    base_url: String,
    policy: fn(StatusCode, Option<&[u8]>) -> Option<Error>,
}

impl ServiceRequest for Lookup {
    type Output = Value;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> &str {
        "/lookup"
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn validate(&self, status: StatusCode, body: Option<&[u8]>) -> Option<Error> {
        (self.policy)(status, body)
    }

    fn convert(&self, payload: Option<Value>) -> Result<Value> {
        payload.ok_or_else(|| Error::new(ErrorKind::NoDataReceived))
    }
}

/// Accepts only `200 OK`.
fn only_ok(status: StatusCode, body: Option<&[u8]>) -> Option<Error> {
    if status == StatusCode::OK {
        return None;
    }
    default_policy(status, body).or_else(|| {
        Some(Error::validation_failed(format!(
            "expected 200, got {}",
            status.as_u16()
        )))
    })
}

fn broken_policy(_status: StatusCode, _body: Option<&[u8]>) -> Option<Error> {
    panic!("validator bug")
}

async fn mount_lookup(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/lookup"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_overridden_validator_accepts_error_status() {
    let mock_server = MockServer::start().await;
    mount_lookup(
        &mock_server,
        ResponseTemplate::new(404).set_body_json(json!({"error": "unknown line"})),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let payload = dispatch_and_wait(
        &dispatcher,
        Lookup {
            base_url: mock_server.uri(),
            policy: accept_any,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(payload, json!({"error": "unknown line"}));
}

#[tokio::test]
async fn test_overridden_validator_rejects_success_status() {
    let mock_server = MockServer::start().await;
    mount_lookup(
        &mock_server,
        ResponseTemplate::new(202).set_body_json(json!({"queued": true})),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(
        &dispatcher,
        Lookup {
            base_url: mock_server.uri(),
            policy: only_ok,
        },
    )
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::ServiceRequestValidatorFailed);
    assert_eq!(err.code(), -1003);
    let cause = std::error::Error::source(&err).unwrap();
    assert_eq!(cause.to_string(), "expected 200, got 202");
    assert!(!dispatcher.is_busy());
}

#[tokio::test]
async fn test_panicking_validator_reports_unknown_error() {
    let mock_server = MockServer::start().await;
    mount_lookup(
        &mock_server,
        ResponseTemplate::new(200).set_body_json(json!({})),
    )
    .await;

    let dispatcher = Dispatcher::builder().build().unwrap();
    let err = dispatch_and_wait(
        &dispatcher,
        Lookup {
            base_url: mock_server.uri(),
            policy: broken_policy,
        },
    )
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.kind(), &ErrorKind::UnknownError);
    assert_eq!(dispatcher.in_flight(), 0);
    assert!(!dispatcher.is_busy());
}

/// Panics while sending.
struct Broken;

impl Transport for Broken {
    async fn send(&self, _request: WireRequest) -> TransportResult {
        panic!("transport bug")
    }
}

#[tokio::test]
async fn test_panicking_transport_releases_task() {
    let dispatcher = Dispatcher::with_transport(Broken);
    let mut activity = dispatcher.subscribe_activity();

    // Neither callback runs, both are dropped with the task.
    let outcome = dispatch_and_wait(&dispatcher, TimetableRequest::new(41)).await;
    assert!(outcome.is_none());

    tokio::time::timeout(Duration::from_secs(2), activity.wait_for(|count| *count == 0))
        .await
        .expect("task released")
        .unwrap();
    assert!(!dispatcher.is_busy());
}
