//! `GET /events`: one WebSocket per observer, fed from the event bus.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::stream::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use wa::Gateway;
use wa_protocol::{LifecycleEvent, ObserverFrame};

pub(super) async fn upgrade(State(gateway): State<Gateway>, ws: WebSocketUpgrade) -> impl IntoResponse {
	let events = gateway.subscribe();
	ws.on_upgrade(move |socket| stream_events(socket, events))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<LifecycleEvent>) {
	let (mut sender, mut receiver) = socket.split();
	debug!(target = "wa.http", "observer connected");

	loop {
		tokio::select! {
			event = events.recv() => match event {
				Ok(event) => {
					let json = match serde_json::to_string(&ObserverFrame::from(&event)) {
						Ok(json) => json,
						Err(err) => {
							warn!(target = "wa.http", error = %err, "failed to encode lifecycle event");
							continue;
						}
					};
					if sender.send(Message::Text(json.into())).await.is_err() {
						break;
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "wa.http", skipped, "observer lagged; events dropped");
				}
				Err(RecvError::Closed) => break,
			},
			incoming = receiver.next() => match incoming {
				Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
				Some(Ok(_)) => {}
			},
		}
	}

	debug!(target = "wa.http", "observer disconnected");
}
