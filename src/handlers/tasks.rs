use super::common::{paginate, PaginationParams};
use crate::{
    auth::AuthUser,
    entities::task::Model as Task,
    errors::ServiceError,
    handlers::AppState,
    services::tasks::{TaskInput, TaskView},
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
    path = "/api/v1/tasks",
    params(PaginationParams),
    responses(
        (status = 200, description = "Tasks with their project", body = ApiResponse<PaginatedResponse<TaskView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<TaskView>>>, ServiceError> {
    let (page, per_page) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .tasks
        .list_tasks(user.user_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, per_page))))
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    request_body = TaskInput,
    responses(
        (status = 201, description = "Task created", body = ApiResponse<Task>),
        (status = 422, description = "Validation error or unknown project", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<TaskInput>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ServiceError> {
    let created = state.services.tasks.create_task(user.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task with its project", body = ApiResponse<TaskView>),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TaskView>>, ServiceError> {
    let task = state.services.tasks.get_task(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(task)))
}

#[utoipa::path(
    put,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskInput,
    responses(
        (status = 200, description = "Task updated", body = ApiResponse<Task>),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "tasks"
)]
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskInput>,
) -> Result<Json<ApiResponse<Task>>, ServiceError> {
    let updated = state
        .services
        .tasks
        .update_task(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "tasks"
)]
pub async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.tasks.delete_task(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}
