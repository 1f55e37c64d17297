use super::common::{paginate, PaginationParams};
use crate::{
    auth::AuthUser,
    entities::{project::Model as Project, task::Model as Task},
    errors::ServiceError,
    handlers::AppState,
    services::projects::{ProjectDetail, ProjectInput},
    ApiResponse, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    params(PaginationParams),
    responses(
        (status = 200, description = "Projects, newest first", body = ApiResponse<PaginatedResponse<Project>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Project>>>, ServiceError> {
    let (page, per_page) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .projects
        .list_projects(user.user_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, per_page))))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = ProjectInput,
    responses(
        (status = 201, description = "Project created", body = ApiResponse<Project>),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProjectInput>,
) -> Result<(StatusCode, Json<ApiResponse<Project>>), ServiceError> {
    let created = state
        .services
        .projects
        .create_project(user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project with its tasks", body = ApiResponse<ProjectDetail>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProjectDetail>>, ServiceError> {
    let detail = state.services.projects.get_project(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/tasks",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Tasks of the project", body = ApiResponse<Vec<Task>>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn list_project_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Task>>>, ServiceError> {
    let tasks = state
        .services
        .projects
        .list_project_tasks(user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(tasks)))
}

#[utoipa::path(
    put,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectInput,
    responses(
        (status = 200, description = "Project updated", body = ApiResponse<Project>),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectInput>,
) -> Result<Json<ApiResponse<Project>>, ServiceError> {
    let updated = state
        .services
        .projects
        .update_project(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Removes the project and every task under it
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project and its tasks deleted"),
        (status = 404, description = "Project not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.projects.delete_project(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/tasks", get(list_project_tasks))
}
