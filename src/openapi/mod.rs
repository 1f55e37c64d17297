use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BizDesk API",
        version = "1.0.0",
        description = r#"
# BizDesk API

Back office for a small service business: customers, projects, tasks and
invoices with partial payments and PDF export.

## Authentication

Register or log in under `/auth` and send the returned token on every
`/api/v1` request:

```
Authorization: Bearer <your-jwt-token>
```

Every record belongs to the account that created it. Records of other
accounts answer `404 Not Found`.

## Invoice status

Recording or deleting a payment re-derives the invoice status from the
payment sum: fully covered invoices become `paid`, partly covered ones
`partially_paid`, and invoices without payments fall back to `sent`
(drafts stay `draft`).

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 15).
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Accounts and tokens"),
        (name = "dashboard", description = "Workspace summary"),
        (name = "customers", description = "Customer records"),
        (name = "projects", description = "Projects and their tasks"),
        (name = "tasks", description = "Billable tasks"),
        (name = "invoices", description = "Invoices and PDF export"),
        (name = "payments", description = "Partial payments against invoices"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    paths(
        crate::auth::register_handler,
        crate::auth::login_handler,
        crate::auth::me_handler,
        crate::auth::logout_handler,

        crate::handlers::dashboard::dashboard,

        crate::handlers::customers::list_customers,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,

        crate::handlers::projects::list_projects,
        crate::handlers::projects::create_project,
        crate::handlers::projects::get_project,
        crate::handlers::projects::list_project_tasks,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,

        crate::handlers::tasks::list_tasks,
        crate::handlers::tasks::create_task,
        crate::handlers::tasks::get_task,
        crate::handlers::tasks::update_task,
        crate::handlers::tasks::delete_task,

        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::update_invoice,
        crate::handlers::invoices::delete_invoice,
        crate::handlers::invoices::invoice_pdf,

        crate::handlers::payments::list_payments,
        crate::handlers::payments::record_payment,
        crate::handlers::payments::delete_payment,

        crate::handlers::health::liveness_check,
        crate::handlers::health::readiness_check,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::errors::ErrorResponse,

            crate::auth::RegisterRequest,
            crate::auth::LoginCredentials,
            crate::auth::AuthResponse,
            crate::auth::TokenResponse,
            crate::auth::UserResponse,

            crate::entities::customer::Model,
            crate::entities::project::Model,
            crate::entities::task::Model,
            crate::entities::task::TaskStatus,
            crate::entities::task::TaskType,
            crate::entities::invoice::InvoiceStatus,
            crate::entities::invoice::LineItem,
            crate::entities::payment::Model,
            crate::entities::payment::PaymentMethod,

            crate::services::customers::CustomerInput,
            crate::services::projects::ProjectInput,
            crate::services::projects::ProjectDetail,
            crate::services::tasks::TaskInput,
            crate::services::tasks::TaskView,
            crate::services::tasks::ProjectRef,
            crate::services::invoices::InvoiceInput,
            crate::services::invoices::InvoiceView,
            crate::services::invoices::InvoiceDetail,
            crate::services::payments::PaymentInput,
            crate::services::payments::InvoiceBalance,
            crate::services::payments::RecordedPayment,
            crate::services::dashboard::DashboardSummary,
            crate::handlers::health::HealthResponse,
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
