use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::{
    error::{UserError, UserResult},
    state::AppState,
    users::{
        dto::{LoginResponse, MessageResponse, PublicUser, SearchQuery},
        validation::{validate_login_data, validate_new_user, validate_user_changes},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_info))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/search", get(search_users))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Bodies are read as JSON whatever the Content-Type says.
fn parse_body(body: &Bytes) -> UserResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "malformed JSON body");
        UserError::validation("Invalid JSON payload")
    })
}

/// Ids that are not integers cannot name a user.
fn parse_id(raw: &str) -> UserResult<i64> {
    raw.parse::<i64>().map_err(|_| UserError::NotFound)
}

pub async fn api_info() -> Json<Value> {
    Json(json!({
        "message": "User Management API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /users": "List all users",
            "POST /users": "Create a new user",
            "GET /user/<id>": "Get a user",
            "PUT /user/<id>": "Update a user",
            "DELETE /user/<id>": "Delete a user",
            "POST /login": "User authentication",
            "GET /search?name=xyz": "Search users by name"
        }
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> UserResult<Json<Vec<PublicUser>>> {
    Ok(Json(state.users.list_all()?))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> UserResult<(StatusCode, Json<PublicUser>)> {
    let input = validate_new_user(&parse_body(&body)?)?;
    let user = state.users.create(input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> UserResult<Json<PublicUser>> {
    Ok(Json(state.users.get(parse_id(&id)?)?))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> UserResult<Json<PublicUser>> {
    let id = parse_id(&id)?;
    let changes = validate_user_changes(&parse_body(&body)?)?;
    Ok(Json(state.users.update(id, changes)?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> UserResult<Json<MessageResponse>> {
    let message = state.users.delete(parse_id(&id)?)?;
    Ok(Json(MessageResponse {
        message: message.into(),
    }))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> UserResult<Json<LoginResponse>> {
    let creds = validate_login_data(&parse_body(&body)?)?;
    let user = state.users.authenticate(&creds.email, &creds.password)?;
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        user,
    }))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> UserResult<Json<Vec<PublicUser>>> {
    let raw = q.name.unwrap_or_default();
    if raw.is_empty() {
        return Err(UserError::validation("Name parameter is required"));
    }
    let term = raw.trim();
    if term.is_empty() {
        return Err(UserError::validation(
            "Search term must be at least 1 character",
        ));
    }
    Ok(Json(state.users.search_by_name(term)?))
}
