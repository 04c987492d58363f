//! HTTP handlers for accounts and generic document CRUD

use crate::auth::{AuthGate, Identity};
use crate::core::entity::{Persistable, PrimaryKey, Serializable};
use crate::core::error::{DocError, Result};
use crate::core::query::{Filter, Page, Projection, SortKey};
use crate::core::service::{CrudService, FieldMap};
use crate::services::UserService;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{Value, json};

/// State shared by the account handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub users: UserService,
    pub gate: AuthGate,
}

fn json_body(payload: std::result::Result<Json<FieldMap>, JsonRejection>) -> Result<FieldMap> {
    payload
        .map(|Json(fields)| fields)
        .map_err(|rejection| DocError::validation(rejection.body_text()))
}

fn with_token<T: Serializable>(entity: &T, token: String) -> Result<Value> {
    let mut body = entity.to_dict(&[])?;
    if let Value::Object(object) = &mut body {
        object.insert("auth_token".into(), Value::String(token));
    }
    Ok(body)
}

/// Register, login, identity and health routes
pub fn account_routes(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .with_state(state)
}

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FieldMap>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let user = state.users.register(json_body(payload)?).await?;
    let token = state.gate.authority().issue(&user)?;
    Ok((StatusCode::CREATED, Json(with_token(&user, token)?)))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) =
        payload.map_err(|rejection| DocError::validation(rejection.body_text()))?;
    let email = request
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| DocError::field_validation("email", "email is required"))?;

    let (user, token) = state
        .users
        .authenticate(&state.gate, &email, request.password.as_deref())
        .await?;
    Ok(Json(with_token(&user, token)?))
}

/// GET /me
pub async fn me(identity: Identity) -> Json<Identity> {
    Json(identity)
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Query string of a listing
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// JSON filter object, e.g. `{"quantity>=": 2}`
    pub filter: Option<String>,
    /// `field`, `field:asc` or `field:desc`
    pub sort: Option<String>,
    /// Comma separated projection
    pub fields: Option<String>,
}

impl ListParams {
    fn filter(&self) -> Result<Filter> {
        let mut filter = match &self.filter {
            Some(raw) => {
                let value: Value = serde_json::from_str(raw).map_err(|e| {
                    DocError::field_validation("filter", format!("filter is not JSON: {}", e))
                })?;
                Filter::from_json(&value)?
            }
            None => Filter::new(),
        };
        if let Some(sort) = &self.sort {
            let key = SortKey::parse(sort)?;
            filter = filter.sort_by(key.field, key.direction);
        }
        Ok(filter)
    }

    fn projection(&self) -> Option<Projection> {
        self.fields
            .as_deref()
            .map(|fields| Projection::new(fields.split(',').map(str::trim).filter(|f| !f.is_empty())))
    }

    fn page(&self) -> Page {
        let default = Page::default();
        Page::new(
            self.page.unwrap_or(default.number()),
            self.limit.unwrap_or(default.size()),
        )
    }
}

fn parse_key<T: Persistable>(raw: String) -> Result<T::Key> {
    T::Key::coerce(&Value::String(raw.clone())).ok_or_else(|| {
        DocError::field_validation(T::schema().key_field, format!("malformed key: {}", raw))
    })
}

/// `GET/POST /{collection}` and `GET/PUT/DELETE /{collection}/{id}`
pub fn crud_routes<T>(service: CrudService<T>) -> Router
where
    T: Persistable + Serializable,
{
    let collection = T::collection();
    Router::new()
        .route(
            &format!("/{}", collection),
            get(list_documents::<T>).post(create_document::<T>),
        )
        .route(
            &format!("/{}/{{id}}", collection),
            get(read_document::<T>)
                .put(update_document::<T>)
                .delete(delete_document::<T>),
        )
        .with_state(service)
}

async fn list_documents<T: Persistable + Serializable>(
    State(service): State<CrudService<T>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    let filter = params.filter()?;
    let page = params.page();
    let listing = service.list(filter, params.projection(), Some(page));

    let data: Vec<Value> = listing
        .stream()
        .and_then(|entity| async move { entity.to_dict(&[]) })
        .try_collect()
        .await?;
    let total = listing.count().await?;

    Ok(Json(json!({
        "data": data,
        "page": page.number(),
        "limit": page.size(),
        "total": total,
    })))
}

async fn create_document<T: Persistable + Serializable>(
    State(service): State<CrudService<T>>,
    payload: std::result::Result<Json<FieldMap>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let entity = service.create(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(entity.to_dict(&[])?)))
}

async fn read_document<T: Persistable + Serializable>(
    State(service): State<CrudService<T>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let entity = service.read(&parse_key::<T>(id)?).await?;
    Ok(Json(entity.to_dict(&[])?))
}

async fn update_document<T: Persistable + Serializable>(
    State(service): State<CrudService<T>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<FieldMap>, JsonRejection>,
) -> Result<Json<Value>> {
    let key = parse_key::<T>(id)?;
    let entity = service.update(&key, json_body(payload)?).await?;
    Ok(Json(entity.to_dict(&[])?))
}

async fn delete_document<T: Persistable + Serializable>(
    State(service): State<CrudService<T>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    service.delete(&parse_key::<T>(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
