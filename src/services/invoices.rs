use crate::{
    entities::{
        invoice::{self, InvoiceStatus, LineItem},
        payment, project, task,
    },
    errors::ServiceError,
    reports::invoice_pdf,
    services::{
        customers::{self, blank_to_none},
        invoice_numbering::next_invoice_number,
        invoice_status::{money, remaining_amount},
        tasks,
        validation::{non_negative, not_blank, percentage, FieldErrorSet},
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const MAX_NUMBER_ATTEMPTS: u32 = 3;

/// Create/replace payload for an invoice
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct InvoiceInput {
    /// Copies the customer's current details onto the invoice when set
    pub customer_id: Option<Uuid>,
    #[validate(
        length(max = 255, message = "Customer name may not exceed 255 characters"),
        custom = "not_blank"
    )]
    #[serde(default)]
    pub customer_name: String,
    #[validate(
        email(message = "A valid customer email is required"),
        length(max = 255, message = "Customer email may not exceed 255 characters")
    )]
    #[serde(default)]
    pub customer_email: String,
    pub customer_address: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "1000.00")]
    pub subtotal: Decimal,
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "0.00")]
    pub tax: Decimal,
    #[validate(custom = "non_negative")]
    #[schema(value_type = String, example = "1000.00")]
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    /// Omitted on update keeps the stored items
    pub items: Option<Vec<LineItem>>,
}

/// An invoice as returned to its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InvoiceView {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_address: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<invoice::Model> for InvoiceView {
    type Error = ServiceError;

    fn try_from(model: invoice::Model) -> Result<Self, Self::Error> {
        let items = model.line_items().map_err(|e| {
            ServiceError::InternalError(format!(
                "invoice {} has unreadable items: {}",
                model.id, e
            ))
        })?;

        Ok(Self {
            id: model.id,
            customer_id: model.customer_id,
            invoice_number: model.invoice_number,
            customer_name: model.customer_name,
            customer_email: model.customer_email,
            customer_address: model.customer_address,
            invoice_date: model.invoice_date,
            due_date: model.due_date,
            subtotal: model.subtotal,
            tax: model.tax,
            total: model.total,
            status: model.status,
            notes: model.notes,
            items,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Invoice with its payments and balance
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: InvoiceView,
    pub payments: Vec<payment::Model>,
    #[schema(value_type = String, example = "400.00")]
    pub total_paid: Decimal,
    #[schema(value_type = String, example = "600.00")]
    pub remaining_amount: Decimal,
}

/// A rendered invoice document
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DatabaseConnection>,
}

impl InvoiceService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists invoices newest first
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        owner_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<InvoiceView>, u64), ServiceError> {
        let paginator = invoice::Entity::find()
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let invoices = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(InvoiceView::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((invoices, total))
    }

    /// Creates an invoice under the next number of the owner's sequence.
    #[instrument(skip(self, input))]
    pub async fn create_invoice(
        &self,
        owner_id: Uuid,
        mut input: InvoiceInput,
    ) -> Result<InvoiceView, ServiceError> {
        self.apply_customer_snapshot(owner_id, &mut input).await?;
        self.validate_input(owner_id, &input).await?;
        let items = normalize_items(input.items.take().unwrap_or_default());

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            match self.insert_numbered(owner_id, &input, &items).await {
                Ok(created) => {
                    info!(
                        invoice_id = %created.id,
                        invoice_number = %created.invoice_number,
                        status = %created.status,
                        "Invoice created"
                    );
                    return InvoiceView::try_from(created);
                }
                Err(ServiceError::DatabaseError(e))
                    if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    warn!(%owner_id, attempt, "Invoice number collision, allocating again");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Conflict(
            "Could not allocate a unique invoice number".to_string(),
        ))
    }

    async fn insert_numbered(
        &self,
        owner_id: Uuid,
        input: &InvoiceInput,
        items: &[LineItem],
    ) -> Result<invoice::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let invoice_number = next_invoice_number(&txn, owner_id).await?;
        let now = Utc::now();
        let created = invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            customer_id: Set(input.customer_id),
            invoice_number: Set(invoice_number),
            customer_name: Set(input.customer_name.trim().to_string()),
            customer_email: Set(input.customer_email.trim().to_string()),
            customer_address: Set(blank_to_none(input.customer_address.clone())),
            invoice_date: Set(input.invoice_date),
            due_date: Set(input.due_date),
            subtotal: Set(money(input.subtotal)),
            tax: Set(money(input.tax)),
            total: Set(money(input.total)),
            status: Set(input.status),
            notes: Set(blank_to_none(input.notes.clone())),
            items: Set(items_json(items)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if created.status == InvoiceStatus::Paid {
            mark_items_paid(&txn, owner_id, items).await?;
        }

        txn.commit().await?;
        Ok(created)
    }

    /// Invoice with payments, balance and item task details filled in.
    #[instrument(skip(self))]
    pub async fn get_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, ServiceError> {
        let found = find_owned(&*self.db, owner_id, invoice_id).await?;
        let mut view = InvoiceView::try_from(found)?;
        self.enrich_items(owner_id, &mut view.items).await?;

        let payments = payment::Entity::find()
            .filter(payment::Column::InvoiceId.eq(invoice_id))
            .order_by_desc(payment::Column::PaymentDate)
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        let paid = money(payments.iter().map(|p| p.amount).sum());
        let remaining = remaining_amount(view.total, paid);

        Ok(InvoiceDetail {
            invoice: view,
            payments,
            total_paid: paid,
            remaining_amount: remaining,
        })
    }

    /// Replaces the editable fields. The number never changes and omitted
    /// items keep the stored list.
    #[instrument(skip(self, input))]
    pub async fn update_invoice(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        mut input: InvoiceInput,
    ) -> Result<InvoiceView, ServiceError> {
        let existing = find_owned(&*self.db, owner_id, invoice_id).await?;
        self.apply_customer_snapshot(owner_id, &mut input).await?;
        self.validate_input(owner_id, &input).await?;

        let items = match input.items.take() {
            Some(items) => normalize_items(items),
            None => InvoiceView::try_from(existing.clone())?.items,
        };

        let txn = self.db.begin().await?;
        let mut model: invoice::ActiveModel = existing.into();
        model.customer_id = Set(input.customer_id);
        model.customer_name = Set(input.customer_name.trim().to_string());
        model.customer_email = Set(input.customer_email.trim().to_string());
        model.customer_address = Set(blank_to_none(input.customer_address));
        model.invoice_date = Set(input.invoice_date);
        model.due_date = Set(input.due_date);
        model.subtotal = Set(money(input.subtotal));
        model.tax = Set(money(input.tax));
        model.total = Set(money(input.total));
        model.status = Set(input.status);
        model.notes = Set(blank_to_none(input.notes));
        model.items = Set(items_json(&items)?);
        model.updated_at = Set(Utc::now());

        let updated = model.update(&txn).await?;
        if updated.status == InvoiceStatus::Paid {
            mark_items_paid(&txn, owner_id, &items).await?;
        }
        txn.commit().await?;

        info!(%invoice_id, status = %updated.status, "Invoice updated");
        InvoiceView::try_from(updated)
    }

    /// Deletes an invoice together with its payments
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, owner_id: Uuid, invoice_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        find_owned(&txn, owner_id, invoice_id).await?;
        let removed_payments = payment::Entity::delete_many()
            .filter(payment::Column::InvoiceId.eq(invoice_id))
            .exec(&txn)
            .await?
            .rows_affected;
        invoice::Entity::delete_by_id(invoice_id).exec(&txn).await?;

        txn.commit().await?;
        info!(%invoice_id, removed_payments, "Invoice deleted");
        Ok(())
    }

    /// Renders the invoice as a PDF named `invoice-{number}.pdf`.
    #[instrument(skip(self))]
    pub async fn render_pdf(
        &self,
        owner_id: Uuid,
        invoice_id: Uuid,
        settings: &invoice_pdf::PdfSettings,
    ) -> Result<InvoiceDocument, ServiceError> {
        let detail = self.get_invoice(owner_id, invoice_id).await?;
        let bytes = invoice_pdf::render_invoice_pdf(&detail, settings)?;

        Ok(InvoiceDocument {
            file_name: format!("invoice-{}.pdf", detail.invoice.invoice_number),
            bytes,
        })
    }

    async fn apply_customer_snapshot(
        &self,
        owner_id: Uuid,
        input: &mut InvoiceInput,
    ) -> Result<(), ServiceError> {
        let Some(customer_id) = input.customer_id else {
            return Ok(());
        };

        match customers::find_owned(&*self.db, owner_id, customer_id).await {
            Ok(customer) => {
                input.customer_name = customer.name;
                input.customer_email = customer.email;
                input.customer_address = customer.address;
                Ok(())
            }
            Err(ServiceError::NotFound(_)) => {
                warn!(%owner_id, %customer_id, "Ignoring unknown customer on invoice");
                input.customer_id = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn validate_input(&self, owner_id: Uuid, input: &InvoiceInput) -> Result<(), ServiceError> {
        let mut errors = FieldErrorSet::new();
        errors.merge(input.validate());

        if input.due_date < input.invoice_date {
            errors.add("due_date", "The due date must be on or after the invoice date");
        }

        let items = input.items.as_deref().unwrap_or_default();
        let project_ids: Vec<Uuid> = items.iter().filter_map(|i| i.project_id).collect();
        let task_ids: Vec<Uuid> = items.iter().filter_map(|i| i.task_id).collect();
        let owned_projects = owned_ids::<project::Entity, _>(
            &*self.db,
            project::Column::Id,
            project::Column::OwnerId,
            owner_id,
            &project_ids,
        )
        .await?;
        let owned_tasks = owned_ids::<task::Entity, _>(
            &*self.db,
            task::Column::Id,
            task::Column::OwnerId,
            owner_id,
            &task_ids,
        )
        .await?;

        for (i, item) in items.iter().enumerate() {
            errors.check(format!("items.{}.description", i), item.description.as_str(), not_blank);
            errors.check(format!("items.{}.price", i), &item.price, non_negative);
            if let Some(discount) = &item.discount {
                errors.check(format!("items.{}.discount", i), discount, percentage);
            }
            if matches!(item.project_id, Some(id) if !owned_projects.contains(&id)) {
                errors.add(
                    format!("items.{}.project_id", i),
                    "The selected project is invalid",
                );
            }
            if matches!(item.task_id, Some(id) if !owned_tasks.contains(&id)) {
                errors.add(format!("items.{}.task_id", i), "The selected task is invalid");
            }
        }

        errors.into_result()
    }

    async fn enrich_items(&self, owner_id: Uuid, items: &mut [LineItem]) -> Result<(), ServiceError> {
        let wanted: Vec<Uuid> = items
            .iter()
            .filter(|i| i.task_name.is_none() || i.task_type.is_none())
            .filter_map(|i| i.task_id)
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let live: HashMap<Uuid, task::Model> = task::Entity::find()
            .filter(task::Column::OwnerId.eq(owner_id))
            .filter(task::Column::Id.is_in(wanted))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        for item in items.iter_mut() {
            if let Some(found) = item.task_id.and_then(|id| live.get(&id)) {
                item.task_name.get_or_insert_with(|| found.name.clone());
                item.task_type.get_or_insert(found.task_type);
            }
        }
        Ok(())
    }
}

/// Loads an invoice owned by `owner_id`; foreign records read as missing.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    invoice_id: Uuid,
) -> Result<invoice::Model, ServiceError> {
    match invoice::Entity::find_by_id(invoice_id).one(conn).await? {
        Some(found) if found.owner_id == owner_id => Ok(found),
        Some(_) => {
            warn!(%owner_id, %invoice_id, "Rejected access to another owner's invoice");
            Err(not_found(invoice_id))
        }
        None => Err(not_found(invoice_id)),
    }
}

fn not_found(invoice_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Invoice {} not found", invoice_id))
}

async fn owned_ids<E, C>(
    conn: &C,
    id_col: E::Column,
    owner_col: E::Column,
    owner_id: Uuid,
    ids: &[Uuid],
) -> Result<HashSet<Uuid>, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let found: Vec<Uuid> = E::find()
        .select_only()
        .column(id_col)
        .filter(owner_col.eq(owner_id))
        .filter(id_col.is_in(ids.iter().copied()))
        .into_tuple()
        .all(conn)
        .await?;

    Ok(found.into_iter().collect())
}

async fn mark_items_paid<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    items: &[LineItem],
) -> Result<(), ServiceError> {
    let task_ids: Vec<Uuid> = items.iter().filter_map(|i| i.task_id).collect();
    let marked = tasks::mark_paid(conn, owner_id, &task_ids).await?;
    if marked > 0 {
        info!(marked, "Tasks marked paid by invoice");
    }
    Ok(())
}

fn normalize_items(items: Vec<LineItem>) -> Vec<LineItem> {
    items
        .into_iter()
        .map(|item| LineItem {
            description: item.description.trim().to_string(),
            price: money(item.price),
            discount: item.discount.map(|d| d.round_dp(2)),
            task_name: blank_to_none(item.task_name),
            ..item
        })
        .collect()
}

fn items_json(items: &[LineItem]) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(items)
        .map_err(|e| ServiceError::InternalError(format!("cannot encode invoice items: {}", e)))
}
