use super::common::{paginate, PaginationParams};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::AppState,
    reports::invoice_pdf::PdfSettings,
    services::invoices::{InvoiceDetail, InvoiceInput, InvoiceView},
    ApiResponse, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PdfQuery {
    /// Present to display the document inline instead of downloading it
    pub print: Option<String>,
}

impl PdfQuery {
    fn inline(&self) -> bool {
        self.print.is_some()
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(PaginationParams),
    responses(
        (status = 200, description = "Invoices, newest first", body = ApiResponse<PaginatedResponse<InvoiceView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<InvoiceView>>>, ServiceError> {
    let (page, per_page) = params.resolve(&state.config);
    let (items, total) = state
        .services
        .invoices
        .list_invoices(user.user_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(paginate(items, total, page, per_page))))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = InvoiceInput,
    responses(
        (status = 201, description = "Invoice created with the next number", body = ApiResponse<InvoiceView>),
        (status = 409, description = "Invoice number could not be allocated", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InvoiceInput>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceView>>), ServiceError> {
    let created = state
        .services
        .invoices
        .create_invoice(user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with payments and balance", body = ApiResponse<InvoiceDetail>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceDetail>>, ServiceError> {
    let detail = state.services.invoices.get_invoice(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = InvoiceInput,
    responses(
        (status = 200, description = "Invoice updated", body = ApiResponse<InvoiceView>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoiceInput>,
) -> Result<Json<ApiResponse<InvoiceView>>, ServiceError> {
    let updated = state
        .services
        .invoices
        .update_invoice(user.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 204, description = "Invoice and its payments deleted"),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.invoices.delete_invoice(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}/pdf",
    params(("id" = Uuid, Path, description = "Invoice id"), PdfQuery),
    responses(
        (status = 200, description = "Invoice document", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "invoices"
)]
pub async fn invoice_pdf(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PdfQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let document = state
        .services
        .invoices
        .render_pdf(user.user_id, id, &PdfSettings::from(&state.config))
        .await?;

    let disposition = if query.inline() { "inline" } else { "attachment" };
    info!(invoice_id = %id, disposition, size = document.bytes.len(), "Invoice PDF rendered");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("{}; filename=\"{}\"", disposition, document.file_name),
            ),
        ],
        document.bytes,
    ))
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/invoices/:id/pdf", get(invoice_pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_flag_selects_inline() {
        assert!(!PdfQuery::default().inline());
        for value in ["", "1", "true", "false", "0"] {
            let q = PdfQuery {
                print: Some(value.into()),
            };
            assert!(q.inline(), "{value:?}");
        }
    }
}
