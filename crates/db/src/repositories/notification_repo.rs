//! Repository for the `notifications` table.

use sqlx::PgPool;

use praxis_core::notification::NewNotification;
use praxis_core::types::DbId;

use crate::models::notification::NotificationRow;

/// Column list for notifications queries.
pub(crate) const COLUMNS: &str = "id, accountant_id, template, body, read_at, created_at";

pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification, returning the created row.
    pub async fn insert(
        pool: &PgPool,
        input: &NewNotification,
    ) -> Result<NotificationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (accountant_id, template, body)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(input.accountant_id)
            .bind(&input.template)
            .bind(&input.body)
            .fetch_one(pool)
            .await
    }

    /// An accountant's notifications, newest first.
    pub async fn list_for_accountant(
        pool: &PgPool,
        accountant_id: DbId,
        unread_only: bool,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE accountant_id = $1 AND ($2 = FALSE OR read_at IS NULL)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(accountant_id)
            .bind(unread_only)
            .fetch_all(pool)
            .await
    }

    /// Stamp a notification read. Returns `false` when the id does not
    /// exist or belongs to a different accountant; marking an already-read
    /// notification keeps its original read_at.
    pub async fn mark_read(
        pool: &PgPool,
        id: DbId,
        accountant_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications
             SET read_at = COALESCE(read_at, now())
             WHERE id = $1 AND accountant_id = $2",
        )
        .bind(id)
        .bind(accountant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
