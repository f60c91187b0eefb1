// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP gateway for emulated functions.
//!
//! Routes `/{project}/{region}/{name}[/*path]` to the local port of the
//! function's handler, the same URL shape the hosted platform uses.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    routing::any,
    Router,
};
use reqwest::Client;
use tower_http::trace::TraceLayer;

/// Where one function's requests go.
#[derive(Debug, Clone)]
pub struct Route {
    pub region: String,
    pub handler_port: u16,
}

/// Gateway state shared across requests.
#[derive(Clone)]
struct GatewayState {
    project: Arc<str>,
    routes: Arc<HashMap<String, Route>>,
    client: Client,
}

/// Build the gateway router for `project` with routes keyed by function name.
pub fn router(project: &str, routes: HashMap<String, Route>, client: Client) -> Router {
    let state = GatewayState {
        project: Arc::from(project),
        routes: Arc::new(routes),
        client,
    };

    Router::new()
        .route("/{project}/{region}/{name}/{*path}", any(proxy_handler))
        .route("/{project}/{region}/{name}", any(proxy_handler_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn proxy_handler_root(
    State(state): State<GatewayState>,
    Path((project, region, name)): Path<(String, String, String)>,
    req: Request<Body>,
) -> Result<impl IntoResponse, StatusCode> {
    proxy_request(state, project, region, name, req).await
}

async fn proxy_handler(
    State(state): State<GatewayState>,
    Path((project, region, name, _subpath)): Path<(String, String, String, String)>,
    req: Request<Body>,
) -> Result<impl IntoResponse, StatusCode> {
    proxy_request(state, project, region, name, req).await
}

async fn proxy_request(
    state: GatewayState,
    project: String,
    region: String,
    name: String,
    req: Request<Body>,
) -> Result<impl IntoResponse, StatusCode> {
    if project != *state.project {
        return Err(StatusCode::NOT_FOUND);
    }

    let route = state.routes.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    if route.region != region {
        return Err(StatusCode::NOT_FOUND);
    }

    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|x| x.as_str())
        .unwrap_or("/");

    // Strip "/{project}/{region}/{name}" prefix
    let prefix = format!("/{}/{}/{}", project, region, name);
    let downstream_path = match path_and_query.strip_prefix(&prefix) {
        Some("") => "/".to_string(),
        Some(stripped) if stripped.starts_with('?') => format!("/{}", stripped),
        Some(stripped) => stripped.to_string(),
        None => path_and_query.to_string(),
    };

    let uri_string = format!("http://127.0.0.1:{}{}", route.handler_port, downstream_path);
    tracing::debug!(function = %name, target = %uri_string, "Forwarding request");

    let method = req.method().clone();
    let headers = req.headers().clone();

    let body_bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let mut downstream_req = state.client.request(method, &uri_string).body(body_bytes);

    for (name, value) in &headers {
        if name != "host" {
            downstream_req = downstream_req.header(name, value);
        }
    }

    let resp = downstream_req.send().await.map_err(|e| {
        tracing::error!(function = %name, error = %e, "Function handler unreachable");
        StatusCode::BAD_GATEWAY
    })?;

    let status = resp.status();
    let mut builder = Response::builder().status(status);

    if let Some(headers_map) = builder.headers_mut() {
        for (name, value) in resp.headers() {
            headers_map.insert(name, value.clone());
        }
    }

    let resp_bytes = resp
        .bytes()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    builder
        .body(Body::from(resp_bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
