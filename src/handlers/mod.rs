pub mod common;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod payments;
pub mod projects;
pub mod tasks;

use crate::db::DbPool;
use crate::services::{
    customers::CustomerService, dashboard::DashboardService, invoices::InvoiceService,
    payments::PaymentService, projects::ProjectService, tasks::TaskService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub customers: Arc<CustomerService>,
    pub projects: Arc<ProjectService>,
    pub tasks: Arc<TaskService>,
    pub invoices: Arc<InvoiceService>,
    pub payments: Arc<PaymentService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            projects: Arc::new(ProjectService::new(db_pool.clone())),
            tasks: Arc::new(TaskService::new(db_pool.clone())),
            invoices: Arc::new(InvoiceService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(db_pool.clone())),
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }
}
