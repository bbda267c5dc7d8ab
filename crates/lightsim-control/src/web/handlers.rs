//! HTTP request handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::hue::bridge::Bridge;
use crate::hue::models::{
    BridgeResponse, EntertainmentActionRequest, EntertainmentConfiguration, EntertainmentStatus,
    LightState, LightUpdate,
};

impl<T: Serialize> IntoResponse for BridgeResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Parse a JSON body, answering 400 with an error envelope on failure
fn json_body<T: DeserializeOwned, R>(body: &Bytes) -> Result<T, BridgeResponse<R>> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Rejected request body: {}", e);
        BridgeResponse::error(StatusCode::BAD_REQUEST, format!("invalid body: {}", e))
    })
}

/// GET /clip/v2/resource/light
pub async fn list_lights(State(bridge): State<Bridge>) -> BridgeResponse<LightState> {
    bridge.list_lights()
}

/// GET /clip/v2/resource/light/:id
pub async fn get_light(
    Path(id): Path<String>,
    State(bridge): State<Bridge>,
) -> BridgeResponse<LightState> {
    bridge.get_light(&id)
}

/// PUT /clip/v2/resource/light/:id
pub async fn put_light(
    Path(id): Path<String>,
    State(bridge): State<Bridge>,
    body: Bytes,
) -> BridgeResponse<LightState> {
    let update: LightUpdate = match json_body(&body) {
        Ok(update) => update,
        Err(resp) => return resp,
    };
    bridge.put_light(&id, &update)
}

/// GET /clip/v2/resource/entertainment_configuration
pub async fn list_entertainment_configuration(
    State(bridge): State<Bridge>,
) -> BridgeResponse<EntertainmentConfiguration> {
    bridge.list_entertainment_configuration()
}

/// PUT /clip/v2/entertainment_configuration/:id
pub async fn control_entertainment(
    Path(id): Path<String>,
    State(bridge): State<Bridge>,
    body: Bytes,
) -> BridgeResponse<EntertainmentStatus> {
    let request: EntertainmentActionRequest = match json_body(&body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    bridge.control_entertainment(&id, &request.action)
}
