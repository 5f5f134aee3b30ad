use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use mlwr_protocol::{
    BlobCreateRequest, ConfigCreateRequest, HealthResponse, InfoResponse, ObjectItem,
    RemoteOptions, RemotesResponse, SearchRequest, UploadOptions,
};
use mlwr_search::{search, ObjectType};
use mlwr_sync::HttpRemote;
use mlwr_types::{Dhash, ObjectKind};
use serde_json::Value;

use crate::auth::Caller;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

fn parse_id(id: &str) -> ServerResult<Dhash> {
    Dhash::from_hex(id).map_err(|e| ServerError::BadRequest(format!("invalid identifier {id:?}: {e}")))
}

fn parse_kind(kind: &str) -> ServerResult<ObjectKind> {
    kind.parse()
        .map_err(|_| ServerError::NotFound(format!("unknown object type: {kind}")))
}

fn item_json(item: &ObjectItem) -> ServerResult<Json<Value>> {
    item.to_value()
        .map(Json)
        .map_err(|e| ServerError::Internal(e.to_string()))
}

/// Body of the remote endpoints. Empty means defaults.
fn remote_options(body: &Bytes) -> ServerResult<RemoteOptions> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoteOptions::default());
    }
    serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("invalid options: {e}")))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        instance_name: state.config.instance_name.clone(),
        object_types: state
            .registry
            .type_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

pub async fn list_remotes(State(state): State<AppState>, _caller: Caller) -> Json<RemotesResponse> {
    Json(RemotesResponse {
        remotes: state.config.remote_names(),
    })
}

pub async fn get_object(
    State(state): State<AppState>,
    _caller: Caller,
    Extension(kind): Extension<ObjectKind>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let id = parse_id(&id)?;
    let object = state
        .repo
        .access(kind, &id)?
        .ok_or_else(|| ServerError::NotFound(format!("{kind} {id} not found")))?;
    item_json(&ObjectItem::from(&object))
}

pub async fn download_file(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ServerResult<Response> {
    let id = parse_id(&id)?;
    let not_found = || ServerError::NotFound(format!("file {id} not found"));
    state.repo.access(ObjectKind::File, &id)?.ok_or_else(not_found)?;
    let data = state.repo.read_content(&id)?.ok_or_else(not_found)?;
    Ok(([(CONTENT_TYPE, "application/octet-stream")], data).into_response())
}

pub async fn create_file(
    State(state): State<AppState>,
    Caller(identity): Caller,
    mut multipart: Multipart,
) -> ServerResult<Json<Value>> {
    let mut file = None;
    let mut options = UploadOptions::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        match field.name().map(str::to_owned).as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("unnamed").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                file = Some((name, data.to_vec()));
            }
            Some("options") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                options = serde_json::from_str(&text)
                    .map_err(|e| ServerError::BadRequest(format!("invalid options: {e}")))?;
            }
            _ => {}
        }
    }
    let (file_name, data) =
        file.ok_or_else(|| ServerError::BadRequest("missing 'file' part".into()))?;
    let item = state
        .uploader()
        .upload_file(&identity, &file_name, data, &options)
        .await?;
    item_json(&item)
}

pub async fn create_config(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(request): Json<ConfigCreateRequest>,
) -> ServerResult<Json<Value>> {
    let item = state.uploader().upload_config(&identity, &request).await?;
    item_json(&item)
}

pub async fn create_blob(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(request): Json<BlobCreateRequest>,
) -> ServerResult<Json<Value>> {
    let item = state.uploader().upload_blob(&identity, &request).await?;
    item_json(&item)
}

pub async fn search_objects(
    State(state): State<AppState>,
    _caller: Caller,
    Extension(queried): Extension<ObjectType>,
    Json(request): Json<SearchRequest>,
) -> ServerResult<Json<Vec<Value>>> {
    let hits = search(state.repo.as_ref(), &state.registry, queried, &request.query)?;
    let items = hits
        .iter()
        .map(|object| ObjectItem::from(object).to_value())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(Json(items))
}

pub async fn remote_pull(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path((name, kind, id)): Path<(String, String, String)>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let options = remote_options(&body)?;
    let remote = HttpRemote::connect(&state.config.remotes, &name, state.config.request_timeout())?;
    let item = state
        .federation()
        .pull(&remote, &identity, kind, &id, &options)
        .await?;
    item_json(&item)
}

pub async fn remote_push(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path((name, kind, id)): Path<(String, String, String)>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let options = remote_options(&body)?;
    let remote = HttpRemote::connect(&state.config.remotes, &name, state.config.request_timeout())?;
    let response = state
        .federation()
        .push(&remote, &identity, kind, &id, &options)
        .await?;
    Ok(Json(response))
}
