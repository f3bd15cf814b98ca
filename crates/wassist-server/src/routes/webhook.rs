use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Router};
use wassist_channels::TwilioWebhookForm;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive))
}

/// Acknowledges Twilio right away. The body is empty unless a reply that
/// was throttled earlier is waiting for this sender. A form without a
/// sender is rejected before anything is dispatched.
pub async fn receive(
    State(state): State<AppState>,
    Form(form): Form<TwilioWebhookForm>,
) -> Response {
    let inbound = form.into_inbound();
    if inbound.sender.is_empty() {
        tracing::warn!(trace_id = %inbound.trace_id, "webhook without sender rejected");
        return (StatusCode::BAD_REQUEST, "missing From").into_response();
    }
    tracing::info!(
        sender = %inbound.sender,
        trace_id = %inbound.trace_id,
        has_audio = inbound.audio().is_some(),
        "webhook received"
    );
    let body = state.gateway.accept(inbound).await;
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
