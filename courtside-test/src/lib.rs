//! An in-process stand-in for the remote connection graph, serving the same
//! endpoints the client talks to. Storage is a temporary sled database that
//! disappears with the server.

pub mod state;

use std::net::SocketAddr;
use std::sync::Once;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Extension;
use tokio::task::JoinHandle;
use courtside_client::{ClientConfig, ViewerContext};
use courtside_common::{User, UserId};

pub use state::State;

pub type Result<T> = std::result::Result<T, AppError>;

pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, error: anyhow::anyhow!(message.into()) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.error.to_string()).into_response()
    }
}

// Anything that is not already an AppError is a server fault.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: err.into() }
    }
}

pub fn app(state: State) -> axum::Router {
    axum::Router::new()
        .route("/users/networking", get(handlers::get_networking))
        .route("/connections/pending", get(handlers::get_pending))
        .route("/connections/:target", post(handlers::post_connect).delete(handlers::delete_connection))
        .route("/connections/user/:other/accept", post(handlers::post_accept))
        .route("/connections/user/:other/reject", post(handlers::post_reject))
        .layer(Extension(state))
}

pub struct StubServer {
    addr: SocketAddr,
    state: State,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn spawn() -> anyhow::Result<Self> {
        init_tracing();
        let state = State::temporary()?;
        let server = axum::Server::try_bind(&SocketAddr::from(([127, 0, 0, 1], 0)))?
            .serve(app(state.clone()).into_make_service());
        let addr = server.local_addr();
        tracing::info!("stub graph listening on {addr}");
        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                tracing::error!("stub graph stopped: {err}");
            }
        });
        Ok(Self { addr, state, handle })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn add_user(&self, id: u64, name: &str, role: &str) -> anyhow::Result<UserId> {
        let user = User {
            id: UserId(id),
            name: name.to_string(),
            role: role.to_string(),
            location: "Colombo".to_string(),
            skills: vec![role.to_string()],
            ..Default::default()
        };
        self.state.add_user(&user)?;
        Ok(user.id)
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("http://{}", self.addr))
    }

    /// The stub takes the bearer token to be the user id.
    pub fn viewer(&self, id: UserId) -> ViewerContext {
        ViewerContext::new(id).with_token(id.to_string())
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

mod handlers {
    use axum::extract::{Path, Query};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::{Extension, Json};
    use serde::Deserialize;
    use tracing::debug;
    use courtside_common::{Direction, NetworkUser, PendingRequest, RecordStatus, UserId};
    use crate::state::{is_request_from, request_date, State};
    use crate::{AppError, Result};

    #[derive(Deserialize)]
    pub struct PendingParams {
        #[serde(default)]
        direction: Direction,
    }

    fn viewer(headers: &HeaderMap) -> Result<UserId> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|id| id.trim().parse().ok())
            .map(UserId)
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "missing or malformed bearer token"))
    }

    fn known(state: &State, id: UserId) -> Result<()> {
        match state.user(id)? {
            Some(_) => Ok(()),
            None => Err(AppError::new(StatusCode::NOT_FOUND, format!("user {id} does not exist"))),
        }
    }

    pub async fn get_networking(Extension(state): Extension<State>, headers: HeaderMap) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let mut rows = Vec::new();
        for mut user in state.users()?.into_iter().filter(|u| u.id != me) {
            user.connections = state.connected_to(user.id)?.len() as u32;
            let view = state.view(me, user.id)?;
            rows.push(NetworkUser::from_view(user, view));
        }
        Ok(Json(rows))
    }

    pub async fn get_pending(Extension(state): Extension<State>, headers: HeaderMap, Query(params): Query<PendingParams>) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let mine = state.connected_to(me)?;
        let mut waiting: Vec<_> = state
            .connections()?
            .into_iter()
            .filter(|c| c.record.status == RecordStatus::Pending)
            .filter(|c| match params.direction {
                Direction::Incoming => c.record.addressee_id == me,
                Direction::Outgoing => c.record.requester_id == me,
            })
            .collect();
        waiting.sort_by(|a, b| b.seq.cmp(&a.seq));

        let mut out = Vec::with_capacity(waiting.len());
        for c in waiting {
            let other = if c.record.requester_id == me { c.record.addressee_id } else { c.record.requester_id };
            let Some(user) = state.user(other)? else { continue };
            let theirs = state.connected_to(other)?;
            out.push(PendingRequest {
                connection_id: c.record.id,
                requester_id: other,
                name: user.name,
                role: user.role,
                location: user.location,
                avatar: user.avatar,
                skills: user.skills,
                mutual_connections: mine.iter().filter(|id| theirs.contains(id)).count() as u32,
                request_date: request_date(c.requested_at),
            });
        }
        Ok(Json(out))
    }

    pub async fn post_connect(Extension(state): Extension<State>, headers: HeaderMap, Path(target): Path<u64>) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let target = UserId(target);
        debug!("{me} -> {target}: connect");
        if target == me {
            return Err(AppError::new(StatusCode::CONFLICT, "cannot connect to yourself"));
        }
        known(&state, target)?;
        match state.create_request(me, target)? {
            Some(record) => Ok(Json(record)),
            None => Err(AppError::new(StatusCode::CONFLICT, format!("a relationship with {target} already exists"))),
        }
    }

    pub async fn post_accept(Extension(state): Extension<State>, headers: HeaderMap, Path(other): Path<u64>) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let other = UserId(other);
        debug!("{me} <- {other}: accept");
        match state.accept_request(me, other)? {
            Some(record) => Ok(Json(record)),
            None => Err(no_request_from(other)),
        }
    }

    pub async fn post_reject(Extension(state): Extension<State>, headers: HeaderMap, Path(other): Path<u64>) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let other = UserId(other);
        debug!("{me} <- {other}: reject");
        if !state.delete_if(me, other, |c| is_request_from(c, other))? {
            return Err(no_request_from(other));
        }
        Ok(StatusCode::OK)
    }

    pub async fn delete_connection(Extension(state): Extension<State>, headers: HeaderMap, Path(target): Path<u64>) -> Result<impl IntoResponse> {
        let me = viewer(&headers)?;
        let target = UserId(target);
        debug!("{me} -> {target}: cancel or remove");
        let deleted = state.delete_if(me, target, |c| c.record.status == RecordStatus::Accepted || c.record.requester_id == me)?;
        if !deleted {
            return Err(AppError::new(StatusCode::NOT_FOUND, format!("no request or connection with {target}")));
        }
        Ok(StatusCode::OK)
    }

    fn no_request_from(other: UserId) -> AppError {
        AppError::new(StatusCode::NOT_FOUND, format!("no pending request from {other}"))
    }
}
