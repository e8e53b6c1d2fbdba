use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::Bytes,
        extract::{Path, Query, RawQuery, State},
        http::{HeaderMap, StatusCode, header},
        response::{Html, IntoResponse, Json, Response},
        routing::{get, post},
    },
    remoting_protocol::{ResponseBody, routes},
    serde::Deserialize,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{
    Error,
    auth::AuthResolver,
    descriptor::{ProviderSettings, api_json, api_script, provider_script},
    dispatcher::{Dispatcher, decode_form, decode_json, parse_form},
    polling::PollingRegistry,
};

// ── Shared app state ─────────────────────────────────────────────────────────

/// Everything the HTTP layer needs, assembled once by the composition root.
pub struct RemotingState {
    pub dispatcher: Dispatcher,
    pub polling: Arc<PollingRegistry>,
    pub auth: Arc<dyn AuthResolver>,
    pub provider: ProviderSettings,
    pub debug: bool,
    pub version: String,
}

type AppState = Arc<RemotingState>;

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the remoting router (shared between production startup and tests).
pub fn build_router(state: Arc<RemotingState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let url = state.provider.url.clone();
    Router::new()
        .route(&url, post(router_handler))
        .route(routes::API, get(api_handler))
        .route(routes::PROVIDER_SCRIPT, get(provider_script_handler))
        .route(
            &format!("{}/{{event}}", routes::POLLING),
            get(poll_get_handler).post(poll_post_handler),
        )
        .route(routes::HEALTH, get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the listener fails.
pub async fn serve(state: Arc<RemotingState>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let lines = [
        format!("remoting gateway v{}", state.version),
        format!("listening on {addr}, router at {}", state.provider.url),
        format!(
            "{} methods registered, {} polling events",
            state.dispatcher.registry().len(),
            state.polling.events().count()
        ),
        format!("debug mode: {}", state.debug),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────────────────

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Handler { .. } | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Upload responses are read by the client out of a hidden frame, so the
/// envelope is wrapped in a `<textarea>`.
fn upload_response(body: &ResponseBody) -> Result<Response, Error> {
    let json = serde_json::to_string(body)?
        .replace('&', "&amp;")
        .replace('<', "&lt;");
    Ok(Html(format!("<html><body><textarea>{json}</textarea></body></html>")).into_response())
}

async fn router_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let request = if is_form(&headers) {
        decode_form(&body)?
    } else {
        decode_json(&body)?
    };
    let upload = request.is_upload();
    let auth = state.auth.resolve(&headers);
    let response = state.dispatcher.dispatch(request, auth).await?;
    if upload {
        upload_response(&response)
    } else {
        Ok(Json(response).into_response())
    }
}

#[derive(Deserialize)]
struct ApiQuery {
    format: Option<String>,
}

async fn api_handler(
    State(state): State<AppState>,
    Query(query): Query<ApiQuery>,
) -> Result<Response, Error> {
    let settings = &state.provider;
    let descriptor =
        state
            .dispatcher
            .registry()
            .descriptor(&settings.url, &settings.namespace, settings.id.as_deref());
    if query.format.as_deref() == Some("json") {
        return Ok(Json(api_json(settings, &descriptor)).into_response());
    }
    let script = api_script(settings, &descriptor)?;
    Ok(([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], script).into_response())
}

async fn provider_script_handler(State(state): State<AppState>) -> Result<Response, Error> {
    let settings = &state.provider;
    let descriptor =
        state
            .dispatcher
            .registry()
            .descriptor(&settings.url, &settings.namespace, settings.id.as_deref());
    let events: Vec<&str> = state.polling.events().collect();
    let script = provider_script(&descriptor, &events)?;
    Ok(([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], script).into_response())
}

async fn poll_get_handler(
    State(state): State<AppState>,
    Path(event): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, Error> {
    let params = parse_form(query.unwrap_or_default().as_bytes());
    poll(state, event, headers, params).await
}

async fn poll_post_handler(
    State(state): State<AppState>,
    Path(event): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    let params = if is_form(&headers) || body.is_empty() {
        parse_form(&body)
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::bad_request(format!("poll parameters must be an object: {e}")))?
    };
    poll(state, event, headers, params).await
}

async fn poll(
    state: AppState,
    event: String,
    headers: HeaderMap,
    params: remoting_protocol::FormData,
) -> Result<Response, Error> {
    let auth = state.auth.resolve(&headers);
    let answer = state.polling.poll(&event, params, auth, state.debug).await?;
    Ok(Json(answer).into_response())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "actions": state.dispatcher.registry().len(),
    }))
}
