use crate::{
    entities::{
        invoice,
        payment::{self, PaymentMethod},
    },
    errors::ServiceError,
    services::{
        customers::blank_to_none,
        invoice_status::{derive_status, money, remaining_amount},
        invoices::{self, InvoiceView},
        validation::positive,
    },
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentInput {
    #[validate(custom = "positive")]
    #[schema(value_type = String, example = "400.00")]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

/// Invoice state after its payments changed
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceBalance {
    pub invoice: InvoiceView,
    #[schema(value_type = String, example = "400.00")]
    pub total_paid: Decimal,
    #[schema(value_type = String, example = "600.00")]
    pub remaining_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordedPayment {
    pub payment: payment::Model,
    pub balance: InvoiceBalance,
}

/// Records and removes partial payments, keeping the invoice status in
/// step with the payment sum.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Payments of one invoice, latest payment date first
    #[instrument(skip(self))]
    pub async fn list_payments(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        invoices::find_owned(&*self.db, owner_id, invoice_id).await?;

        let payments = payment::Entity::find()
            .filter(payment::Column::InvoiceId.eq(invoice_id))
            .order_by_desc(payment::Column::PaymentDate)
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(payments)
    }

    #[instrument(skip(self, input), fields(amount = %input.amount))]
    pub async fn record_payment(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        input: PaymentInput,
    ) -> Result<RecordedPayment, ServiceError> {
        let txn = self.db.begin().await?;

        let invoice = invoices::find_owned(&txn, owner_id, invoice_id).await?;
        input.validate()?;

        let now = Utc::now();
        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice_id),
            owner_id: Set(owner_id),
            amount: Set(money(input.amount)),
            payment_date: Set(input.payment_date),
            payment_method: Set(input.payment_method),
            notes: Set(blank_to_none(input.notes)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let balance = settle(&txn, invoice).await?;
        txn.commit().await?;

        info!(
            payment_id = %payment.id,
            %invoice_id,
            status = %balance.invoice.status,
            "Payment recorded"
        );
        Ok(RecordedPayment { payment, balance })
    }

    #[instrument(skip(self))]
    pub async fn delete_payment(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<InvoiceBalance, ServiceError> {
        let txn = self.db.begin().await?;

        let invoice = invoices::find_owned(&txn, owner_id, invoice_id).await?;
        let found = payment::Entity::find_by_id(payment_id).one(&txn).await?;
        match found {
            Some(p) if p.invoice_id == invoice_id => {}
            Some(_) => {
                warn!(%payment_id, %invoice_id, "Payment does not belong to invoice");
                return Err(payment_not_found(payment_id));
            }
            None => return Err(payment_not_found(payment_id)),
        }

        payment::Entity::delete_by_id(payment_id).exec(&txn).await?;
        let balance = settle(&txn, invoice).await?;
        txn.commit().await?;

        info!(%payment_id, %invoice_id, status = %balance.invoice.status, "Payment deleted");
        Ok(balance)
    }
}

/// Re-reads the payment sum and persists the derived status.
async fn settle(
    txn: &DatabaseTransaction,
    invoice: invoice::Model,
) -> Result<InvoiceBalance, ServiceError> {
    let paid = total_paid(txn, invoice.id).await?;
    let status = derive_status(invoice.total, paid, invoice.status);
    let total = invoice.total;

    let invoice = if status != invoice.status {
        let previous = invoice.status;
        let mut model: invoice::ActiveModel = invoice.into();
        model.status = Set(status);
        model.updated_at = Set(Utc::now());
        let updated = model.update(txn).await?;
        info!(invoice_id = %updated.id, from = %previous, to = %status, "Invoice status changed");
        updated
    } else {
        invoice
    };

    Ok(InvoiceBalance {
        invoice: InvoiceView::try_from(invoice)?,
        total_paid: paid,
        remaining_amount: remaining_amount(total, paid),
    })
}

/// Sum of all payments recorded against an invoice.
pub(crate) async fn total_paid<C: ConnectionTrait>(
    conn: &C,
    invoice_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let amounts: Vec<Decimal> = payment::Entity::find()
        .select_only()
        .column(payment::Column::Amount)
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .into_tuple()
        .all(conn)
        .await?;

    Ok(money(amounts.into_iter().sum()))
}

fn payment_not_found(payment_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Payment {} not found", payment_id))
}
