use crate::{
    auth::AuthUser,
    entities::payment::Model as Payment,
    errors::ServiceError,
    handlers::AppState,
    services::payments::{InvoiceBalance, PaymentInput, RecordedPayment},
    ApiResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}/payments",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Payments, latest first", body = ApiResponse<Vec<Payment>>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ServiceError> {
    let payments = state
        .services
        .payments
        .list_payments(user.user_id, invoice_id)
        .await?;
    Ok(Json(ApiResponse::success(payments)))
}

/// Records a payment and re-derives the invoice status
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/payments",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = PaymentInput,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<RecordedPayment>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<PaymentInput>,
) -> Result<(StatusCode, Json<ApiResponse<RecordedPayment>>), ServiceError> {
    let recorded = state
        .services
        .payments
        .record_payment(user.user_id, invoice_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            recorded,
            "Payment recorded successfully",
        )),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{id}/payments/{payment_id}",
    params(
        ("id" = Uuid, Path, description = "Invoice id"),
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    responses(
        (status = 200, description = "Payment deleted, invoice balance returned", body = ApiResponse<InvoiceBalance>),
        (status = 404, description = "Invoice or payment not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "payments"
)]
pub async fn delete_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path((invoice_id, payment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<InvoiceBalance>>, ServiceError> {
    let balance = state
        .services
        .payments
        .delete_payment(user.user_id, invoice_id, payment_id)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        balance,
        "Payment deleted successfully",
    )))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/invoices/:id/payments",
            get(list_payments).post(record_payment),
        )
        .route("/invoices/:id/payments/:payment_id", delete(delete_payment))
}
