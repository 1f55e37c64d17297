//! Per-owner invoice number allocation.
//!
//! Each owner has one row in `invoice_sequences`. Allocation runs inside the
//! caller's transaction: the row is created on first use (seeded with the
//! owner's existing invoice count), bumped with a single atomic update and
//! read back.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{invoice, invoice_sequence},
    errors::ServiceError,
};

pub const INVOICE_PREFIX: &str = "INV-";

/// `INV-` followed by the value zero-padded to seven digits.
pub fn format_invoice_number(value: i64) -> String {
    format!("{}{:07}", INVOICE_PREFIX, value)
}

/// Allocates the next invoice number for `owner_id`.
pub async fn next_invoice_number<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
) -> Result<String, ServiceError> {
    ensure_sequence(conn, owner_id).await?;

    invoice_sequence::Entity::update_many()
        .col_expr(
            invoice_sequence::Column::LastValue,
            Expr::col(invoice_sequence::Column::LastValue).add(1),
        )
        .col_expr(invoice_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(invoice_sequence::Column::OwnerId.eq(owner_id))
        .exec(conn)
        .await?;

    let sequence = invoice_sequence::Entity::find_by_id(owner_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("invoice sequence missing for {}", owner_id))
        })?;

    let number = format_invoice_number(sequence.last_value);
    debug!(%owner_id, %number, "Allocated invoice number");
    Ok(number)
}

async fn ensure_sequence<C: ConnectionTrait>(conn: &C, owner_id: Uuid) -> Result<(), ServiceError> {
    if invoice_sequence::Entity::find_by_id(owner_id)
        .one(conn)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let existing = invoice::Entity::find()
        .filter(invoice::Column::OwnerId.eq(owner_id))
        .count(conn)
        .await?;

    let seed = invoice_sequence::ActiveModel {
        owner_id: Set(owner_id),
        last_value: Set(existing as i64),
        updated_at: Set(Utc::now()),
    };

    match invoice_sequence::Entity::insert(seed)
        .on_conflict(
            OnConflict::column(invoice_sequence::Column::OwnerId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
    {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use sea_orm::TransactionTrait;

    #[test]
    fn formats_with_seven_digit_padding() {
        assert_eq!(format_invoice_number(1), "INV-0000001");
        assert_eq!(format_invoice_number(1234567), "INV-1234567");
        assert_eq!(format_invoice_number(12345678), "INV-12345678");
    }

    #[tokio::test]
    async fn sequences_are_independent_per_owner() {
        let db = test_pool().await;
        let alice = crate::test_support::insert_user(&db, "alice@example.com").await;
        let bob = crate::test_support::insert_user(&db, "bob@example.com").await;

        assert_eq!(next_invoice_number(&db, alice).await.unwrap(), "INV-0000001");
        assert_eq!(next_invoice_number(&db, alice).await.unwrap(), "INV-0000002");
        assert_eq!(next_invoice_number(&db, bob).await.unwrap(), "INV-0000001");
        assert_eq!(next_invoice_number(&db, alice).await.unwrap(), "INV-0000003");
    }

    #[tokio::test]
    async fn rolled_back_allocation_is_not_consumed() {
        let db = test_pool().await;
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;

        let txn = db.begin().await.unwrap();
        assert_eq!(next_invoice_number(&txn, owner).await.unwrap(), "INV-0000001");
        txn.rollback().await.unwrap();

        assert_eq!(next_invoice_number(&db, owner).await.unwrap(), "INV-0000001");
    }
}
