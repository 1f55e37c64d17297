use crate::{
    entities::{
        customer,
        invoice::{self, InvoiceStatus},
        project, task,
    },
    errors::ServiceError,
    services::{invoice_status::money, invoices::InvoiceView},
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const RECENT_LIMIT: u64 = 5;

/// Headline figures for an owner's workspace
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_projects: u64,
    pub total_tasks: u64,
    pub total_customers: u64,
    pub total_invoices: u64,
    /// Sum of all invoice totals, paid or not
    #[schema(value_type = String, example = "12500.00")]
    pub total_revenue: Decimal,
    pub pending_invoices: u64,
    pub paid_invoices: u64,
    pub recent_invoices: Vec<InvoiceView>,
    pub recent_projects: Vec<project::Model>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, owner_id: Uuid) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;

        let total_projects = project::Entity::find()
            .filter(project::Column::OwnerId.eq(owner_id))
            .count(db)
            .await?;
        let total_tasks = task::Entity::find()
            .filter(task::Column::OwnerId.eq(owner_id))
            .count(db)
            .await?;
        let total_customers = customer::Entity::find()
            .filter(customer::Column::OwnerId.eq(owner_id))
            .count(db)
            .await?;
        let total_invoices = invoice::Entity::find()
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .count(db)
            .await?;
        let paid_invoices = invoice::Entity::find()
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .filter(invoice::Column::Status.eq(InvoiceStatus::Paid))
            .count(db)
            .await?;
        let pending_invoices = invoice::Entity::find()
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .filter(invoice::Column::Status.ne(InvoiceStatus::Paid))
            .count(db)
            .await?;

        let totals: Vec<Decimal> = invoice::Entity::find()
            .select_only()
            .column(invoice::Column::Total)
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .into_tuple()
            .all(db)
            .await?;

        let recent_invoices = invoice::Entity::find()
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .order_by_desc(invoice::Column::CreatedAt)
            .limit(RECENT_LIMIT)
            .all(db)
            .await?
            .into_iter()
            .map(InvoiceView::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let recent_projects = project::Entity::find()
            .filter(project::Column::OwnerId.eq(owner_id))
            .order_by_desc(project::Column::CreatedAt)
            .limit(RECENT_LIMIT)
            .all(db)
            .await?;

        Ok(DashboardSummary {
            total_projects,
            total_tasks,
            total_customers,
            total_invoices,
            total_revenue: money(totals.into_iter().sum()),
            pending_invoices,
            paid_invoices,
            recent_invoices,
            recent_projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::invoices::{InvoiceInput, InvoiceService};
    use crate::services::projects::{ProjectInput, ProjectService};
    use rust_decimal_macros::dec;

    fn invoice_input(total: Decimal, status: InvoiceStatus) -> InvoiceInput {
        InvoiceInput {
            customer_id: None,
            customer_name: "Acme Ltd".into(),
            customer_email: "ap@acme.test".into(),
            customer_address: None,
            invoice_date: "2024-03-01".parse().unwrap(),
            due_date: "2024-03-31".parse().unwrap(),
            subtotal: total,
            tax: dec!(0),
            total,
            status,
            notes: None,
            items: None,
        }
    }

    #[tokio::test]
    async fn summary_counts_only_own_records() {
        let db = Arc::new(test_pool().await);
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;
        let other = crate::test_support::insert_user(&db, "other@example.com").await;
        let invoices = InvoiceService::new(db.clone());
        let projects = ProjectService::new(db.clone());

        for i in 0..6 {
            projects
                .create_project(
                    owner,
                    ProjectInput {
                        name: format!("P{}", i),
                        description: None,
                    },
                )
                .await
                .unwrap();
        }
        invoices
            .create_invoice(owner, invoice_input(dec!(1000), InvoiceStatus::Paid))
            .await
            .unwrap();
        invoices
            .create_invoice(owner, invoice_input(dec!(250.50), InvoiceStatus::Sent))
            .await
            .unwrap();
        invoices
            .create_invoice(other, invoice_input(dec!(9999), InvoiceStatus::Sent))
            .await
            .unwrap();

        let summary = DashboardService::new(db).summary(owner).await.unwrap();
        assert_eq!(summary.total_projects, 6);
        assert_eq!(summary.total_invoices, 2);
        assert_eq!(summary.paid_invoices, 1);
        assert_eq!(summary.pending_invoices, 1);
        assert_eq!(summary.total_revenue, dec!(1250.50));
        assert_eq!(summary.recent_projects.len(), 5);
        assert_eq!(summary.recent_invoices.len(), 2);
        assert_eq!(summary.total_customers, 0);
    }

    #[tokio::test]
    async fn every_unpaid_status_counts_as_pending() {
        let db = Arc::new(test_pool().await);
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;
        let invoices = InvoiceService::new(db.clone());

        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Paid,
        ] {
            invoices
                .create_invoice(owner, invoice_input(dec!(100), status))
                .await
                .unwrap();
        }

        let summary = DashboardService::new(db).summary(owner).await.unwrap();
        assert_eq!(summary.total_invoices, 5);
        assert_eq!(summary.paid_invoices, 1);
        assert_eq!(summary.pending_invoices, 4);
        assert_eq!(summary.total_revenue, dec!(500.00));
    }
}
