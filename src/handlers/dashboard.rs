use crate::{
    auth::AuthUser, errors::ServiceError, handlers::AppState,
    services::dashboard::DashboardSummary, ApiResponse,
};
use axum::{extract::State, routing::get, Json, Router};

#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Workspace summary", body = ApiResponse<DashboardSummary>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.dashboard.summary(user.user_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}
