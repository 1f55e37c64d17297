use super::common::{paginate, PaginationParams};
use crate::{
    auth::AuthUser,
    entities::customer::Model as Customer,
    errors::ServiceError,
    handlers::AppState,
    services::customers::CustomerInput,
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
    path = "/api/v1/customers",
    params(PaginationParams),
    responses(
        (status = 200, description = "Customers, newest first", body = ApiResponse<PaginatedResponse<Customer>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Customer>>>, ServiceError> {
    let (page, per_page) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .customers
        .list_customers(user.user_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, per_page))))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CustomerInput,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<Customer>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CustomerInput>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>), ServiceError> {
    let created = state
        .services
        .customers
        .create_customer(user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Customer>>, ServiceError> {
    let customer = state.services.customers.get_customer(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = CustomerInput,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CustomerInput>,
) -> Result<Json<ApiResponse<Customer>>, ServiceError> {
    let updated = state
        .services
        .customers
        .update_customer(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.customers.delete_customer(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}
