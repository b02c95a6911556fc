use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use wa::Gateway;
use wa_protocol::{Ack, Failure, PairingCodeReply, PairingRequest, SendMessageRequest, StatusReport};

/// A [`wa::Error`] rendered as `{"status": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub wa::Error);

impl From<wa::Error> for ApiError {
	fn from(err: wa::Error) -> Self {
		Self(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = if self.0.is_caller_error() {
			StatusCode::BAD_REQUEST
		} else {
			StatusCode::INTERNAL_SERVER_ERROR
		};
		if status.is_server_error() {
			warn!(target = "wa.http", error = %self.0, "request failed");
		}
		(status, Json(Failure::new(self.0.to_string()))).into_response()
	}
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn required_number(body: PairingRequest) -> Result<String, ApiError> {
	body.number.ok_or(ApiError(wa::Error::InvalidPhoneNumber))
}

pub(super) async fn login_qr(State(gateway): State<Gateway>) -> ApiResult<Ack> {
	Ok(Json(gateway.start_qr().await?))
}

pub(super) async fn pairing_code(State(gateway): State<Gateway>, Json(body): Json<PairingRequest>) -> ApiResult<Ack> {
	let number = required_number(body)?;
	Ok(Json(gateway.spawn_pairing(&number)?))
}

pub(super) async fn pairing_direct(State(gateway): State<Gateway>, Json(body): Json<PairingRequest>) -> ApiResult<PairingCodeReply> {
	let number = required_number(body)?;
	let code = gateway.pair_direct(&number).await?;
	Ok(Json(PairingCodeReply::issued(code)))
}

pub(super) async fn send_message(State(gateway): State<Gateway>, Json(body): Json<SendMessageRequest>) -> ApiResult<Ack> {
	gateway.send_message(&body.number, &body.message, body.mode.as_deref()).await?;
	Ok(Json(Ack::ok("Message sent")))
}

pub(super) async fn logout(State(gateway): State<Gateway>, Path(mode): Path<String>) -> ApiResult<Ack> {
	Ok(Json(gateway.logout(&mode).await?))
}

pub(super) async fn status(State(gateway): State<Gateway>) -> Json<StatusReport> {
	Json(gateway.status())
}
