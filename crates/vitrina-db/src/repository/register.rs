//! # Register Repository (apertura / cierre)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open(store, opening) ──► session Open                                  │
//! │        │                                                                │
//! │        │  payments taken at the store point at the session              │
//! │        ▼                                                                │
//! │  close(counted) ──► Σ payments per method (voided sales excluded)       │
//! │                     expected = opening + cash                           │
//! │                     difference = counted − expected                     │
//! │                     columns frozen, session Closed                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only one session per store may be open; the partial unique index
//! `idx_register_one_open` enforces it under concurrency.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::stock::{begin_write, enabled_store};
use crate::error::{DbError, DbResult};
use vitrina_core::register::{PaymentTotals, Reconciliation, RegisterReport};
use vitrina_core::validation::validate_opening_cents;
use vitrina_core::{new_id, CoreError, Money, Payment, RegisterSession, RegisterStatus, Sale};

#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Opens a session at a store with the given opening float.
    pub async fn open(
        &self,
        store_id: &str,
        user_id: &str,
        opening_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<RegisterSession> {
        validate_opening_cents(opening_cents)?;

        let mut tx = begin_write(&self.pool).await?;
        enabled_store(&mut tx, store_id).await?;

        if let Some(open) = open_session_at(&mut tx, store_id).await? {
            warn!(store_id = %store_id, session_id = %open.id, "Register already open");
            return Err(CoreError::RegisterAlreadyOpen {
                store_id: store_id.to_string(),
                session_id: open.id,
            }
            .into());
        }

        let session = RegisterSession {
            id: new_id(),
            store_id: store_id.to_string(),
            status: RegisterStatus::Open,
            opened_by: user_id.to_string(),
            opened_at: Utc::now(),
            opening_cents,
            closed_by: None,
            closed_at: None,
            counted_cash_cents: None,
            cash_total_cents: 0,
            card_total_cents: 0,
            transfer_total_cents: 0,
            sales_count: 0,
            sales_total_cents: 0,
            expected_cash_cents: None,
            difference_cents: None,
            notes: notes.map(str::to_string),
        };

        sqlx::query(
            r#"
            INSERT INTO register_sessions (
                id, store_id, status, opened_by, opened_at, opening_cents, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.store_id)
        .bind(session.status)
        .bind(&session.opened_by)
        .bind(session.opened_at)
        .bind(session.opening_cents)
        .bind(&session.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::Core(CoreError::RegisterAlreadyOpen {
                store_id: store_id.to_string(),
                session_id: "unknown".to_string(),
            }),
            other => other,
        })?;

        tx.commit().await?;

        info!(id = %session.id, store_id = %store_id, opening = opening_cents, "Register opened");
        Ok(session)
    }

    /// The open session at a store, if any.
    pub async fn current(&self, store_id: &str) -> DbResult<Option<RegisterSession>> {
        let mut conn = self.pool.acquire().await?;
        open_session_at(&mut conn, store_id).await
    }

    /// Closes the open session of a store and freezes its reconciliation.
    pub async fn close(
        &self,
        store_id: &str,
        user_id: &str,
        counted_cash_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<RegisterReport> {
        validate_opening_cents(counted_cash_cents)?;

        let mut tx = begin_write(&self.pool).await?;
        let session = open_session_at(&mut tx, store_id)
            .await?
            .ok_or_else(|| CoreError::RegisterNotOpen {
                store_id: store_id.to_string(),
            })?;

        let totals = session_totals(&mut tx, &session.id).await?;
        let (sales_count, sales_total_cents) = session_sales_totals(&mut tx, &session.id).await?;
        let reconciliation = Reconciliation::compute(
            Money::from_cents(session.opening_cents),
            &totals,
            Money::from_cents(counted_cash_cents),
        );

        debug!(
            id = %session.id,
            expected = reconciliation.expected_cash.cents(),
            counted = counted_cash_cents,
            "Closing register"
        );

        sqlx::query(
            r#"
            UPDATE register_sessions SET
                status = ?2, closed_by = ?3, closed_at = ?4, counted_cash_cents = ?5,
                cash_total_cents = ?6, card_total_cents = ?7, transfer_total_cents = ?8,
                sales_count = ?9, sales_total_cents = ?10,
                expected_cash_cents = ?11, difference_cents = ?12,
                notes = COALESCE(?13, notes)
            WHERE id = ?1
            "#,
        )
        .bind(&session.id)
        .bind(RegisterStatus::Closed)
        .bind(user_id)
        .bind(Utc::now())
        .bind(counted_cash_cents)
        .bind(totals.cash.cents())
        .bind(totals.card.cents())
        .bind(totals.transfer.cents())
        .bind(sales_count)
        .bind(sales_total_cents)
        .bind(reconciliation.expected_cash.cents())
        .bind(reconciliation.difference.cents())
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        let session = fetch_session(&mut tx, &session.id).await?;
        let sales = session_sales(&mut tx, &session.id).await?;
        tx.commit().await?;

        if reconciliation.is_balanced() {
            info!(id = %session.id, store_id = %store_id, "Register closed balanced");
        } else {
            warn!(
                id = %session.id,
                store_id = %store_id,
                difference = reconciliation.difference.cents(),
                "Register closed with a difference"
            );
        }

        Ok(RegisterReport {
            session,
            totals,
            reconciliation: Some(reconciliation),
            sales,
        })
    }

    /// Report of one session: live totals while open, frozen ones once closed.
    pub async fn report(&self, session_id: &str) -> DbResult<RegisterReport> {
        let mut conn = self.pool.acquire().await?;
        let session = fetch_session(&mut conn, session_id).await?;
        let sales = session_sales(&mut conn, session_id).await?;

        let (totals, reconciliation) = match RegisterReport::stored_reconciliation(&session) {
            Some(rec) => (rec.totals, Some(rec)),
            None => (session_totals(&mut conn, session_id).await?, None),
        };

        Ok(RegisterReport {
            session,
            totals,
            reconciliation,
            sales,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RegisterSession>> {
        let session =
            sqlx::query_as::<_, RegisterSession>("SELECT * FROM register_sessions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    /// Session history, newest first.
    pub async fn list(&self, store_id: Option<&str>, limit: u32) -> DbResult<Vec<RegisterSession>> {
        let sessions = sqlx::query_as::<_, RegisterSession>(
            r#"
            SELECT * FROM register_sessions
            WHERE (?1 IS NULL OR store_id = ?1)
            ORDER BY opened_at DESC
            LIMIT ?2
            "#,
        )
        .bind(store_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }
}

/// The open session at a store, inside a transaction.
pub(crate) async fn open_session_at(
    conn: &mut SqliteConnection,
    store_id: &str,
) -> DbResult<Option<RegisterSession>> {
    let session = sqlx::query_as::<_, RegisterSession>(
        "SELECT * FROM register_sessions WHERE store_id = ?1 AND status = ?2",
    )
    .bind(store_id)
    .bind(RegisterStatus::Open)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(session)
}

/// Like [`open_session_at`], failing with `RegisterNotOpen`.
pub(crate) async fn require_open_session(
    conn: &mut SqliteConnection,
    store_id: &str,
) -> DbResult<RegisterSession> {
    open_session_at(conn, store_id).await?.ok_or_else(|| {
        DbError::Core(CoreError::RegisterNotOpen {
            store_id: store_id.to_string(),
        })
    })
}

async fn fetch_session(conn: &mut SqliteConnection, id: &str) -> DbResult<RegisterSession> {
    sqlx::query_as::<_, RegisterSession>("SELECT * FROM register_sessions WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("RegisterSession", id))
}

/// Payments that went into a session, per method. Payments of voided
/// sales were handed back and are left out.
async fn session_totals(conn: &mut SqliteConnection, session_id: &str) -> DbResult<PaymentTotals> {
    let payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT p.* FROM payments p
        JOIN sales s ON s.id = p.sale_id
        WHERE p.register_session_id = ?1 AND s.status != 'voided'
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(PaymentTotals::from_payments(&payments))
}

/// Count and total of the sales rung up in a session that still stand.
async fn session_sales_totals(conn: &mut SqliteConnection, session_id: &str) -> DbResult<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM sales
        WHERE register_session_id = ?1 AND status IN ('completed', 'layaway')
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Sales that took money through a session.
async fn session_sales(conn: &mut SqliteConnection, session_id: &str) -> DbResult<Vec<Sale>> {
    let sales = sqlx::query_as::<_, Sale>(
        r#"
        SELECT * FROM sales WHERE id IN (
            SELECT sale_id FROM payments WHERE register_session_id = ?1
        )
        ORDER BY created_at
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(sales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::user_at;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_open_once_per_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, Some(&store.id)).await;

        let session = db.registers().open(&store.id, &user, 5000, None).await.unwrap();
        assert!(session.is_open());
        assert_eq!(db.registers().current(&store.id).await.unwrap().unwrap().id, session.id);

        let err = db.registers().open(&store.id, &user, 0, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::RegisterAlreadyOpen { .. })));

        assert!(db.registers().open(&store.id, &user, -1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_close_empty_session() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, Some(&store.id)).await;

        db.registers().open(&store.id, &user, 2000, None).await.unwrap();
        for counted in [-1, vitrina_core::MAX_AMOUNT_CENTS + 1] {
            let err = db.registers().close(&store.id, &user, counted, None).await.unwrap_err();
            assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
        }
        let report = db.registers().close(&store.id, &user, 1900, Some("short")).await.unwrap();

        let rec = report.reconciliation.unwrap();
        assert_eq!(rec.expected_cash.cents(), 2000);
        assert_eq!(rec.difference.cents(), -100);
        assert!(!report.session.is_open());
        assert_eq!(report.session.difference_cents, Some(-100));
        assert!(report.sales.is_empty());

        assert!(db.registers().current(&store.id).await.unwrap().is_none());

        // The stored report matches what close returned
        let again = db.registers().report(&report.session.id).await.unwrap();
        assert_eq!(again.reconciliation, Some(rec));

        // A new session can be opened after closing
        db.registers().open(&store.id, &user, 0, None).await.unwrap();
        assert_eq!(db.registers().list(Some(&store.id), 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_close_without_open_session() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.stores().create("Centro", None).await.unwrap();
        let user = user_at(&db, None).await;

        let err = db.registers().close(&store.id, &user, 0, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::RegisterNotOpen { .. })));
    }
}
