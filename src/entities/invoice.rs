use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::task::TaskType;

/// Invoice lifecycle state.
///
/// `Draft` and `Overdue` are only ever chosen by the user; the remaining
/// states are also derived from the payment sum.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "partially_paid")]
    PartiallyPaid,
    #[sea_orm(string_value = "overdue")]
    Overdue,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// One entry of an invoice's inline item list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub description: String,
    #[schema(value_type = String, example = "250.00")]
    pub price: Decimal,
    /// Percentage, 0 to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "invoices")]
#[schema(as = Invoice)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub customer_address: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[schema(value_type = String, example = "1000.00")]
    pub subtotal: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub tax: Decimal,
    #[schema(value_type = String, example = "1000.00")]
    pub total: Decimal,
    pub status: InvoiceStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<LineItem>)]
    pub items: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Decodes the stored item list. A null column reads as no items.
    pub fn line_items(&self) -> Result<Vec<LineItem>, serde_json::Error> {
        if self.items.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.items.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "SetNull"
    )]
    Customer,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payment,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn line_items_decode_with_optional_fields_absent() {
        let item: LineItem =
            serde_json::from_value(json!({"description": "Design", "price": "120.50"})).unwrap();
        assert_eq!(item.price, dec!(120.50));
        assert!(item.task_id.is_none());
        assert!(item.discount.is_none());
    }

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_value(InvoiceStatus::PartiallyPaid).unwrap(),
            json!("partially_paid")
        );
        assert_eq!(InvoiceStatus::PartiallyPaid.to_string(), "partially_paid");
        let parsed: InvoiceStatus = serde_json::from_value(json!("overdue")).unwrap();
        assert_eq!(parsed, InvoiceStatus::Overdue);
    }
}
