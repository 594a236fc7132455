use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountStore, DataStore, StoreError, StoreResult};
use crate::models::account::{Account, NewAccount};
use crate::models::habit::{Habit, NewHabit};
use crate::models::habit_log::{HabitLog, LogQuery, Toggled};

pub async fn create_pool(database_url: &str, acquire_timeout: Duration) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
        .map_err(map_sqlx)
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn select_habits(&self, owner: Uuid) -> StoreResult<Vec<Habit>> {
        sqlx::query_as::<_, Habit>(
            r#"
            SELECT id, user_id, name, description, created_at FROM habits
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn find_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<Option<Habit>> {
        sqlx::query_as::<_, Habit>(
            "SELECT id, user_id, name, description, created_at FROM habits WHERE id = $1 AND user_id = $2",
        )
        .bind(habit_id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_habit(&self, row: NewHabit) -> StoreResult<Habit> {
        sqlx::query_as::<_, Habit>(
            r#"
            INSERT INTO habits (id, user_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.user_id)
        .bind(&row.name)
        .bind(&row.description)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn delete_habit(&self, owner: Uuid, habit_id: Uuid) -> StoreResult<bool> {
        // habit_logs rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
            .bind(habit_id)
            .bind(owner)
            .execute(&self.db)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn select_logs(&self, owner: Uuid, query: &LogQuery) -> StoreResult<Vec<HabitLog>> {
        sqlx::query_as::<_, HabitLog>(
            r#"
            SELECT id, habit_id, user_id, logged_date, created_at FROM habit_logs
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR habit_id = $2)
              AND ($3::date IS NULL OR logged_date >= $3)
              AND ($4::date IS NULL OR logged_date <= $4)
            ORDER BY logged_date ASC
            "#,
        )
        .bind(owner)
        .bind(query.habit_id)
        .bind(query.start_date)
        .bind(query.end_date)
        .fetch_all(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn toggle_log(
        &self,
        owner: Uuid,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Toggled> {
        let mut tx = self.db.begin().await.map_err(map_sqlx)?;

        let removed = sqlx::query_as::<_, HabitLog>(
            r#"
            DELETE FROM habit_logs
            WHERE habit_id = $1 AND user_id = $2 AND logged_date = $3
            RETURNING id, habit_id, user_id, logged_date, created_at
            "#,
        )
        .bind(habit_id)
        .bind(owner)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let toggled = match removed {
            Some(log) => Toggled::Unchecked(log),
            None => {
                let inserted = sqlx::query_as::<_, HabitLog>(
                    r#"
                    INSERT INTO habit_logs (id, habit_id, user_id, logged_date)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (habit_id, logged_date) DO NOTHING
                    RETURNING id, habit_id, user_id, logged_date, created_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(habit_id)
                .bind(owner)
                .bind(date)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx)?;

                match inserted {
                    Some(log) => Toggled::Checked(log),
                    None => {
                        // A concurrent writer checked the cell first; report the row it made.
                        let existing = sqlx::query_as::<_, HabitLog>(
                            r#"
                            SELECT id, habit_id, user_id, logged_date, created_at FROM habit_logs
                            WHERE habit_id = $1 AND user_id = $2 AND logged_date = $3
                            "#,
                        )
                        .bind(habit_id)
                        .bind(owner)
                        .bind(date)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(map_sqlx)?;
                        Toggled::Checked(existing)
                    }
                }
            }
        };

        tx.commit().await.map_err(map_sqlx)?;
        Ok(toggled)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert_account(&self, row: NewAccount) -> StoreResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, email, password_hash, confirmed)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, confirmed, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.email)
        .bind(&row.password_hash)
        .bind(row.confirmed)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, confirmed, created_at FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn confirm_account(&self, account_id: Uuid) -> StoreResult<Option<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts SET confirmed = true
            WHERE id = $1
            RETURNING id, email, password_hash, confirmed, created_at
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_sqlx)
    }

    async fn revoke_session(
        &self,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < NOW()")
            .execute(&self.db)
            .await
            .map_err(map_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO revoked_sessions (token_hash, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn is_session_revoked(&self, token_hash: &str) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM revoked_sessions WHERE token_hash = $1)",
        )
        .bind(token_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_sqlx)
    }
}
