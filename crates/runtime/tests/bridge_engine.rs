//! Tests for BridgeEngine against a local WebSocket sidecar

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use wa_protocol::{ConnectionUpdate, CredentialState, SocketConfig, UserRecord};
use wa_runtime::{BridgeEngine, EngineEvent, Error, TransportEngine};

fn config() -> SocketConfig {
	SocketConfig {
		print_qr_in_terminal: false,
		browser: SocketConfig::browser("WhatsApp", "Desktop", "3.0"),
		connect_timeout_ms: 120_000,
		qr_timeout_ms: None,
		mobile: None,
	}
}

fn text(frame: Message) -> Value {
	match frame {
		Message::Text(text) => serde_json::from_str(&text).unwrap(),
		other => panic!("expected text frame, got {other:?}"),
	}
}

#[tokio::test]
async fn bridge_open_pairing_and_events_round_trip() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut ws_tx, mut ws_rx) = ws.split();

		let open = text(ws_rx.next().await.unwrap().unwrap());
		assert_eq!(open["type"], "open");
		assert_eq!(open["config"]["browser"], json!(["WhatsApp", "Desktop", "3.0"]));
		ws_tx
			.send(Message::Text(json!({"type": "result", "id": open["id"], "value": null}).to_string()))
			.await
			.unwrap();

		let request = text(ws_rx.next().await.unwrap().unwrap());
		assert_eq!(request["type"], "request_pairing_code");
		assert_eq!(request["number"], "15551234567");
		ws_tx
			.send(Message::Text(json!({"type": "result", "id": request["id"], "value": "ABCD-1234"}).to_string()))
			.await
			.unwrap();

		ws_tx
			.send(Message::Text(json!({"type": "me", "user": {"id": "15551234567:4@s.whatsapp.net", "name": "Ana"}}).to_string()))
			.await
			.unwrap();
		ws_tx
			.send(Message::Text(json!({"type": "connection_update", "update": {"connection": "open"}}).to_string()))
			.await
			.unwrap();

		let send = text(ws_rx.next().await.unwrap().unwrap());
		assert_eq!(send["type"], "send_text");
		ws_tx
			.send(Message::Text(json!({"type": "result", "id": send["id"], "error": "not allowed"}).to_string()))
			.await
			.unwrap();
	});

	let engine = BridgeEngine::new(format!("ws://{addr}"));
	let mut opened = engine.open(config(), CredentialState::default()).await.unwrap();

	let code = opened.connection.request_pairing_code("15551234567").await.unwrap();
	assert_eq!(code, "ABCD-1234");

	let event = opened.events.recv().await.expect("should receive update");
	assert_eq!(event, EngineEvent::Connection(ConnectionUpdate::open()));
	assert_eq!(
		opened.connection.user(),
		Some(UserRecord {
			id: "15551234567:4@s.whatsapp.net".into(),
			name: Some("Ana".into()),
		})
	);

	let err = opened.connection.send_text("1@s.whatsapp.net", "hi").await.unwrap_err();
	assert!(matches!(err, Error::Rpc { method: "send_text", ref message } if message == "not allowed"));

	server.await.unwrap();

	// Server side is gone; the stream ends and new calls fail.
	assert_eq!(opened.events.recv().await, None);
	assert!(opened.connection.logout().await.is_err());
}

#[tokio::test]
async fn bridge_open_error_maps_to_open_failure() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut ws_tx, mut ws_rx) = ws.split();
		let open = text(ws_rx.next().await.unwrap().unwrap());
		ws_tx
			.send(Message::Text(json!({"type": "result", "id": open["id"], "error": "bad credentials"}).to_string()))
			.await
			.unwrap();
	});

	let engine = BridgeEngine::new(format!("ws://{addr}"));
	let err = engine.open(config(), CredentialState::default()).await.err().expect("open should fail");
	assert!(matches!(err, Error::Open(ref message) if message == "bad credentials"));

	server.await.unwrap();
}
