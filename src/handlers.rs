use crate::consts::WEBHOOK_PATH;
use crate::twilio_types::{build_twiml, TwilioGatherPayload};
use crate::types::AppState;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(twilio_webhook))
        .route("/", get(|| async { "Hello, World!" }))
        .with_state(app_state)
}

/// Twilio `<Gather>` callback.  Always answers 200 with TwiML, whatever happened upstream.
pub async fn twilio_webhook(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    trace!(body=%String::from_utf8_lossy(&body), "webhook request body");
    // Invalid UTF-8 is decoded lossily rather than refused.
    let payload = serde_urlencoded::from_bytes::<TwilioGatherPayload>(&body).unwrap_or_else(|e| {
        warn!(error=%e, "failed to deserialize Twilio webhook payload; treating as call start");
        TwilioGatherPayload::default()
    });
    let call_sid = payload.call_sid.as_deref().unwrap_or("unknown");
    debug!(call_sid=%call_sid, confidence=?payload.confidence, "webhook callback");

    let instruction = app_state
        .dialogue
        .respond(call_sid, payload.utterance())
        .await;
    let twiml = build_twiml(&instruction);
    trace!(call_sid=%call_sid, kind=instruction.kind(), "twiml: '{}'", twiml);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    (StatusCode::OK, headers, twiml)
}
