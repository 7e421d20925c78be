use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub mod capture;

/// Users whose signed requests are accepted.
pub const KNOWN_USERS: [&str; 2] = ["admin", "operator"];
/// Known but lacking permission; answered with 403.
pub const READ_ONLY_USER: &str = "guest";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateHost {
    pub name: String,
    pub address: String,
    #[serde(default = "default_agent_port")]
    pub port: u16,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_agent_port() -> u16 {
    9999
}

pub type Db = Arc<RwLock<HashMap<String, Host>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/hosts", get(list_hosts).post(create_host))
        .route("/hosts/{name}", get(get_host).delete(delete_host))
        .route("/status/{code}", get(fixed_status).post(fixed_status))
        .layer(middleware::from_fn(require_authorization))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// `username="…"` attribute of a `MtWilson` authorization header, with
/// quoted-string escapes removed.
pub fn authorization_user(header: &str) -> Option<String> {
    let attributes = header.strip_prefix("MtWilson ")?;
    let start = attributes.find("username=\"")? + "username=\"".len();
    let mut user = String::new();
    let mut chars = attributes[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(user),
            '\\' => user.push(chars.next()?),
            c => user.push(c),
        }
    }
    None
}

async fn require_authorization(request: Request, next: Next) -> Result<Response, StatusCode> {
    let user = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(authorization_user);
    match user.as_deref() {
        Some(user) if KNOWN_USERS.contains(&user) => Ok(next.run(request).await),
        Some(READ_ONLY_USER) => {
            tracing::debug!("rejecting read-only user");
            Err(StatusCode::FORBIDDEN)
        }
        _ => {
            tracing::debug!(?user, "rejecting unauthenticated request");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

async fn list_hosts(State(db): State<Db>, Query(filter): Query<HashMap<String, String>>) -> Json<Vec<Host>> {
    let hosts = db.read().await;
    let mut matching: Vec<Host> = hosts
        .values()
        .filter(|h| filter.get("name").map_or(true, |name| &h.name == name))
        .filter(|h| filter.get("address").map_or(true, |address| &h.address == address))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.name.cmp(&b.name));
    Json(matching)
}

async fn create_host(
    State(db): State<Db>,
    Json(input): Json<CreateHost>,
) -> Result<(StatusCode, Json<Host>), (StatusCode, String)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "host name must not be empty".to_string()));
    }
    let mut hosts = db.write().await;
    if hosts.contains_key(&input.name) {
        return Err((StatusCode::CONFLICT, format!("host {} is already registered", input.name)));
    }
    let host = Host {
        id: Uuid::new_v4(),
        name: input.name,
        address: input.address,
        port: input.port,
        description: input.description,
    };
    hosts.insert(host.name.clone(), host.clone());
    Ok((StatusCode::CREATED, Json(host)))
}

async fn get_host(State(db): State<Db>, Path(name): Path<String>) -> Result<Json<Host>, (StatusCode, String)> {
    let hosts = db.read().await;
    hosts
        .get(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("host {name} not found")))
}

async fn delete_host(State(db): State<Db>, Path(name): Path<String>) -> Result<StatusCode, (StatusCode, String)> {
    let mut hosts = db.write().await;
    hosts
        .remove(&name)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("host {name} not found")))
}

/// Reply with whatever status the path names.
async fn fixed_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED => {
            status.into_response()
        }
        Ok(status) if code >= 200 => (status, format!("status {code}")).into_response(),
        _ => (StatusCode::BAD_REQUEST, format!("unsupported status {code}")).into_response(),
    }
}
