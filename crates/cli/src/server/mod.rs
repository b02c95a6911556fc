//! HTTP surface over a [`Gateway`].
//!
//! | route                 | handler |
//! |-----------------------|---------|
//! | `GET /login/qr`       | start the QR session |
//! | `POST /pairing-code`  | start a pairing attempt in the background |
//! | `POST /pairing-direct`| request a pairing code and return it |
//! | `POST /send-message`  | send a text through a live session |
//! | `GET /logout/{mode}`  | log a session out |
//! | `GET /status`         | registry presence per mode |
//! | `GET /events`         | WebSocket stream of lifecycle events |

mod events;
mod routes;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use wa::Gateway;

pub use routes::ApiError;

pub fn router(gateway: Gateway) -> Router {
	Router::new()
		.route("/login/qr", get(routes::login_qr))
		.route("/pairing-code", post(routes::pairing_code))
		.route("/pairing-direct", post(routes::pairing_direct))
		.route("/send-message", post(routes::send_message))
		.route("/logout/{mode}", get(routes::logout))
		.route("/status", get(routes::status))
		.route("/events", get(events::upgrade))
		.layer(TraceLayer::new_for_http())
		.with_state(gateway)
}
