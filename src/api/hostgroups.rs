//! Hostgroup API endpoints

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{
        ClassMembership, CloneHostgroupRequest, CreateHostgroupRequest, Hostgroup,
        HostgroupDetail, HostgroupDraft, HostgroupSummary, InheritedAssociation, LookupValue,
        ParameterFlags, ResolvedParameter, SetMembershipRequest, SetParameterRequest,
        UpdateHostgroupRequest,
    },
    utils::AppError,
    AppState,
};

/// Create routes for hostgroup endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_hostgroups).post(create_hostgroup))
        .route(
            "/{id}",
            get(get_hostgroup)
                .put(update_hostgroup)
                .delete(delete_hostgroup),
        )
        .route("/{id}/children", get(get_children))
        .route("/{id}/parameters", get(get_parameters))
        .route("/{id}/parent_parameters", get(get_parent_parameters))
        .route(
            "/{id}/parameters/{name}",
            put(set_parameter).delete(remove_parameter),
        )
        .route("/{id}/parameters/{name}/bool", get(get_parameter_flags))
        .route("/{id}/inherited", get(get_inherited))
        .route("/{id}/classes", get(get_classes))
        .route("/{id}/puppetclasses", put(set_puppetclasses))
        .route("/{id}/config_groups", put(set_config_groups))
        .route("/{id}/lookup_values", get(get_lookup_values))
        .route("/{id}/clone", get(preview_clone).post(clone_hostgroup))
        .route("/{id}/hosts", post(assign_host).delete(release_host))
}

/// Query parameters for listing hostgroups
#[derive(Debug, Default, Deserialize)]
pub struct ListHostgroupsQuery {
    /// Search expression, e.g. `config_group = monitoring`
    pub search: Option<String>,
    /// Shorthand for `search=config_group = NAME`
    pub config_group: Option<String>,
}

/// Query parameters for a clone preview
#[derive(Debug, Default, Deserialize)]
pub struct ClonePreviewQuery {
    pub name: Option<String>,
}

/// Resolve a path segment holding an id or a `{id}-{slug}` token
async fn resolve_id(state: &AppState, key: &str) -> Result<Uuid, AppError> {
    Ok(state.hostgroups.find(key).await?.id)
}

/// List or search hostgroups
async fn list_hostgroups(
    State(state): State<AppState>,
    Query(query): Query<ListHostgroupsQuery>,
) -> Result<Json<Vec<HostgroupSummary>>, AppError> {
    let expression = match (query.search, query.config_group) {
        (Some(search), _) if !search.trim().is_empty() => Some(search),
        (_, Some(name)) => Some(format!("config_group = \"{}\"", name)),
        _ => None,
    };

    let hostgroups = match expression {
        Some(expression) => state.hostgroups.search(&expression).await?,
        None => state.hostgroups.list().await,
    };
    Ok(Json(hostgroups))
}

/// Create a new hostgroup
async fn create_hostgroup(
    State(state): State<AppState>,
    Json(payload): Json<CreateHostgroupRequest>,
) -> Result<(StatusCode, Json<Hostgroup>), AppError> {
    payload.validate()?;
    let ctx = state.mutation_context();
    let hostgroup = state.hostgroups.create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(hostgroup)))
}

/// Get a hostgroup with its resolved view
async fn get_hostgroup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HostgroupDetail>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.detail(id).await?))
}

/// Update a hostgroup (rename, move, attributes)
async fn update_hostgroup(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateHostgroupRequest>,
) -> Result<Json<Hostgroup>, AppError> {
    payload.validate()?;
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    Ok(Json(state.hostgroups.update(&ctx, id, payload).await?))
}

/// Delete a hostgroup; refused with 409 while it has children
async fn delete_hostgroup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    state.hostgroups.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HostgroupSummary>>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.children(id).await?))
}

/// Effective parameters with their source hostgroup
async fn get_parameters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ResolvedParameter>>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.effective_parameters(id).await?))
}

async fn get_parent_parameters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BTreeMap<String, String>>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.parent_parameters(id).await?))
}

async fn set_parameter(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Json(payload): Json<SetParameterRequest>,
) -> Result<Json<Hostgroup>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    Ok(Json(
        state
            .hostgroups
            .set_parameter(&ctx, id, &name, &payload.value)
            .await?,
    ))
}

async fn remove_parameter(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Hostgroup>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    Ok(Json(state.hostgroups.remove_parameter(&ctx, id, &name).await?))
}

/// Boolean classification of an effective parameter
async fn get_parameter_flags(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<ParameterFlags>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.parameter_flags(id, &name).await?))
}

async fn get_inherited(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<InheritedAssociation>>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.inherited_associations(id).await?))
}

async fn get_classes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClassMembership>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.membership(id).await?))
}

async fn set_puppetclasses(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SetMembershipRequest>,
) -> Result<Json<ClassMembership>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    state.hostgroups.set_puppetclasses(&ctx, id, payload.ids).await?;
    Ok(Json(state.hostgroups.membership(id).await?))
}

async fn set_config_groups(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SetMembershipRequest>,
) -> Result<Json<ClassMembership>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    state.hostgroups.set_config_groups(&ctx, id, payload.ids).await?;
    Ok(Json(state.hostgroups.membership(id).await?))
}

async fn get_lookup_values(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LookupValue>>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(state.hostgroups.lookup_values(id).await?))
}

/// Unsaved clone of a hostgroup; nothing is persisted
async fn preview_clone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ClonePreviewQuery>,
) -> Result<Json<HostgroupDraft>, AppError> {
    let id = resolve_id(&state, &id).await?;
    Ok(Json(
        state
            .hostgroups
            .build_clone(id, query.name.as_deref())
            .await?,
    ))
}

/// Clone a hostgroup and persist the copy
async fn clone_hostgroup(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CloneHostgroupRequest>,
) -> Result<(StatusCode, Json<Hostgroup>), AppError> {
    payload.validate()?;
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    let hostgroup = state
        .hostgroups
        .clone_hostgroup(&ctx, id, payload.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(hostgroup)))
}

async fn assign_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Hostgroup>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    Ok(Json(state.hostgroups.assign_host(&ctx, id).await?))
}

async fn release_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Hostgroup>, AppError> {
    let id = resolve_id(&state, &id).await?;
    let ctx = state.mutation_context();
    Ok(Json(state.hostgroups.release_host(&ctx, id).await?))
}
