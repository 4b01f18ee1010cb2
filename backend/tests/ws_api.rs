use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mapaction_backend::test_util::{create_test_state, test_config, ScriptedGenerator, StaticClassifier};
use mapaction_backend::{router, AppState};
use mapaction_common::{IncidentId, PredictResponse};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(image_host: &MockServer) -> (SocketAddr, Arc<AppState>) {
    Mock::given(method("GET"))
        .and(path("/uploads/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3, 4]))
        .mount(image_host)
        .await;

    let mut config = test_config();
    config.images.base_url = format!("{}/uploads", image_host.uri());

    let state = create_test_state(
        config,
        Arc::new(StaticClassifier::new(vec![0.9, 0.1])),
        Arc::new(ScriptedGenerator::replying(["ctx", "impact", "solution"])),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn connect(addr: SocketAddr, origin: Option<&'static str>) -> Client {
    let mut request = format!("ws://{}/ws/image/predict", addr)
        .into_client_request()
        .unwrap();
    if let Some(origin) = origin {
        request
            .headers_mut()
            .insert("origin", HeaderValue::from_static(origin));
    }
    let (client, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    client
}

async fn next_message(client: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("no message within 5s")
        .expect("stream ended")
        .expect("websocket error")
}

async fn wait_for_sessions(state: &AppState, expected: usize) {
    for _ in 0..50 {
        if state.connections.count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.connections.count().await, expected);
}

fn request_text(incident_id: i64) -> String {
    json!({
        "image_name": "photo.jpg",
        "sensitive_structures": ["école"],
        "incident_id": incident_id
    })
    .to_string()
}

#[tokio::test]
async fn test_disallowed_origin_closed_with_policy_violation() {
    let image_host = MockServer::start().await;
    let (addr, state) = start_server(&image_host).await;

    let mut client = connect(addr, Some("http://evil.example")).await;

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("expected close frame, got {:?}", other),
    }
    assert_eq!(state.connections.count().await, 0);
}

#[tokio::test]
async fn test_missing_origin_closed_with_policy_violation() {
    let image_host = MockServer::start().await;
    let (addr, state) = start_server(&image_host).await;

    let mut client = connect(addr, None).await;

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("expected close frame, got {:?}", other),
    }
    assert_eq!(state.connections.count().await, 0);
}

#[tokio::test]
async fn test_allowed_origin_receives_prediction_per_message() {
    let image_host = MockServer::start().await;
    let (addr, state) = start_server(&image_host).await;

    let mut client = connect(addr, Some("http://localhost:3000")).await;
    wait_for_sessions(&state, 1).await;

    for incident_id in [1, 2] {
        client
            .send(Message::Text(request_text(incident_id)))
            .await
            .unwrap();

        let response: PredictResponse = match next_message(&mut client).await {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text message, got {:?}", other),
        };
        assert_eq!(response.prediction, "flood");
        assert_eq!(response.context, "ctx");
        assert_eq!(response.in_depth, "impact");
        assert_eq!(response.piste_solution, "solution");
    }

    assert_eq!(state.store.count().unwrap(), 2);
    assert_eq!(
        state
            .store
            .records_for_incident(&IncidentId::Number(2))
            .unwrap()
            .len(),
        1
    );

    client.close(None).await.unwrap();
    match next_message(&mut client).await {
        Message::Close(_) => {}
        other => panic!("expected close reply, got {:?}", other),
    }
    wait_for_sessions(&state, 0).await;
}

#[tokio::test]
async fn test_malformed_message_closes_with_internal_error() {
    let image_host = MockServer::start().await;
    let (addr, state) = start_server(&image_host).await;

    let mut client = connect(addr, Some("http://localhost:3000")).await;
    client
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Error);
            assert!(frame.reason.contains("Invalid message"));
        }
        other => panic!("expected close frame, got {:?}", other),
    }

    wait_for_sessions(&state, 0).await;
    assert_eq!(state.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_pipeline_error_closes_session() {
    let image_host = MockServer::start().await;
    let (addr, state) = start_server(&image_host).await;

    let mut client = connect(addr, Some("http://localhost:3000")).await;
    client
        .send(Message::Text(
            json!({ "image_name": "photo.jpg", "sensitive_structures": [] }).to_string(),
        ))
        .await
        .unwrap();

    match next_message(&mut client).await {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Error),
        other => panic!("expected close frame, got {:?}", other),
    }

    wait_for_sessions(&state, 0).await;
    assert_eq!(state.store.count().unwrap(), 0);
}
