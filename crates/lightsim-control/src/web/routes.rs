//! Resource API route definitions

use axum::{
    routing::{get, put},
    Router,
};

use super::handlers::{
    control_entertainment, get_light, list_entertainment_configuration, list_lights, put_light,
};
use crate::hue::bridge::Bridge;

/// Build the resource API router for `bridge`
pub fn build_router(bridge: Bridge) -> Router {
    Router::new()
        .route("/clip/v2/resource/light", get(list_lights))
        .route("/clip/v2/resource/light/:id", get(get_light).put(put_light))
        .route(
            "/clip/v2/resource/entertainment_configuration",
            get(list_entertainment_configuration),
        )
        .route(
            "/clip/v2/resource/entertainment_configuration/:id",
            put(control_entertainment),
        )
        .route(
            "/clip/v2/entertainment_configuration/:id",
            put(control_entertainment),
        )
        .with_state(bridge)
}
