use crate::{
    entities::{customer, invoice},
    errors::ServiceError,
    services::validation::not_blank,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Create/replace payload for a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInput {
    #[validate(
        length(max = 255, message = "Name may not exceed 255 characters"),
        custom = "not_blank"
    )]
    pub name: String,
    #[validate(
        email(message = "A valid email address is required"),
        length(max = 255, message = "Email may not exceed 255 characters")
    )]
    pub email: String,
    #[validate(length(max = 50, message = "Phone may not exceed 50 characters"))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Service for managing an owner's customers
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists customers newest first
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        owner_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let paginator = customer::Entity::find()
            .filter(customer::Column::OwnerId.eq(owner_id))
            .order_by_desc(customer::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((customers, total))
    }

    #[instrument(skip(self, input))]
    pub async fn create_customer(
        &self,
        owner_id: Uuid,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(input.name.trim().to_string()),
            email: Set(input.email.trim().to_string()),
            phone: Set(blank_to_none(input.phone)),
            address: Set(blank_to_none(input.address)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        info!(customer_id = %created.id, "Customer created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_customer(
        &self,
        owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<customer::Model, ServiceError> {
        find_owned(&*self.db, owner_id, customer_id).await
    }

    /// Replaces the editable fields. Existing invoices keep their snapshot.
    #[instrument(skip(self, input))]
    pub async fn update_customer(
        &self,
        owner_id: Uuid,
        customer_id: Uuid,
        input: CustomerInput,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;

        let existing = find_owned(&*self.db, owner_id, customer_id).await?;
        let mut model: customer::ActiveModel = existing.into();
        model.name = Set(input.name.trim().to_string());
        model.email = Set(input.email.trim().to_string());
        model.phone = Set(blank_to_none(input.phone));
        model.address = Set(blank_to_none(input.address));
        model.updated_at = Set(Utc::now());

        let updated = model.update(&*self.db).await?;
        info!(%customer_id, "Customer updated");
        Ok(updated)
    }

    /// Deletes a customer; invoices that linked to it keep their snapshot
    /// and lose the live link.
    #[instrument(skip(self))]
    pub async fn delete_customer(
        &self,
        owner_id: Uuid,
        customer_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        find_owned(&txn, owner_id, customer_id).await?;

        invoice::Entity::update_many()
            .col_expr(
                invoice::Column::CustomerId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(invoice::Column::CustomerId.eq(customer_id))
            .filter(invoice::Column::OwnerId.eq(owner_id))
            .exec(&txn)
            .await?;

        customer::Entity::delete_by_id(customer_id).exec(&txn).await?;
        txn.commit().await?;

        info!(%customer_id, "Customer deleted");
        Ok(())
    }
}

/// Loads a customer owned by `owner_id`; foreign records read as missing.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    customer_id: Uuid,
) -> Result<customer::Model, ServiceError> {
    match customer::Entity::find_by_id(customer_id).one(conn).await? {
        Some(found) if found.owner_id == owner_id => Ok(found),
        Some(_) => {
            warn!(%owner_id, %customer_id, "Rejected access to another owner's customer");
            Err(not_found(customer_id))
        }
        None => Err(not_found(customer_id)),
    }
}

fn not_found(customer_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Customer {} not found", customer_id))
}

pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use assert_matches::assert_matches;

    async fn seeded() -> (CustomerService, Uuid, Uuid) {
        let db = Arc::new(test_pool().await);
        let alice = crate::test_support::insert_user(&db, "alice@example.com").await;
        let bob = crate::test_support::insert_user(&db, "bob@example.com").await;
        (CustomerService::new(db), alice, bob)
    }

    fn input(name: &str) -> CustomerInput {
        CustomerInput {
            name: name.into(),
            email: "billing@acme.test".into(),
            phone: Some("  ".into()),
            address: Some("1 Main St".into()),
        }
    }

    #[tokio::test]
    async fn create_and_fetch_scoped_to_owner() {
        let (svc, alice, bob) = seeded().await;
        let created = svc.create_customer(alice, input("Acme")).await.unwrap();
        assert_eq!(created.phone, None);

        let fetched = svc.get_customer(alice, created.id).await.unwrap();
        assert_eq!(fetched.name, "Acme");

        let err = svc.get_customer(bob, created.id).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn invalid_payload_reports_fields() {
        let (svc, alice, _) = seeded().await;
        let mut bad = input("");
        bad.email = "nope".into();
        match svc.create_customer(alice, bad).await {
            Err(ServiceError::FieldValidation(fields)) => {
                assert!(fields.contains_key("name"));
                assert!(fields.contains_key("email"));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn list_is_paginated_per_owner() {
        let (svc, alice, bob) = seeded().await;
        for i in 0..3 {
            svc.create_customer(alice, input(&format!("C{}", i)))
                .await
                .unwrap();
        }
        svc.create_customer(bob, input("Other")).await.unwrap();

        let (page1, total) = svc.list_customers(alice, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page1.len(), 2);
        let (page2, _) = svc.list_customers(alice, 2, 2).await.unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[tokio::test]
    async fn foreign_owner_cannot_update_or_delete() {
        let (svc, alice, bob) = seeded().await;
        let created = svc.create_customer(alice, input("Acme")).await.unwrap();

        assert_matches!(
            svc.update_customer(bob, created.id, input("Hijack")).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            svc.delete_customer(bob, created.id).await,
            Err(ServiceError::NotFound(_))
        );

        svc.delete_customer(alice, created.id).await.unwrap();
        assert_matches!(
            svc.get_customer(alice, created.id).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
