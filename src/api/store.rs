//! Signup storage.
//!
//! One table of `{id, email, created_at}` rows. Email uniqueness is the store's
//! job: Postgres enforces it with the `waitlist_signups_email_key` constraint and
//! the in-memory table checks and inserts under a single lock, so a duplicate that
//! slips past the API's pre-check still comes back as [`StoreError::Conflict`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info_span, Instrument};
use utoipa::ToSchema;

/// DSN scheme that selects the in-process store instead of Postgres.
pub const MEMORY_DSN: &str = "memory://";

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignupRecord {
    pub id: i64,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    Conflict(String),
    #[error("signup not found: {0}")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Signup store handed to the handlers; cloning shares the same backend.
#[derive(Clone, Debug)]
pub enum Store {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl Store {
    /// Open the store selected by `dsn`: `memory://` or a Postgres connection string.
    ///
    /// # Errors
    /// Returns an error if Postgres is unreachable or the schema cannot be applied.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        if dsn.starts_with(MEMORY_DSN) {
            debug!("Using in-memory signup store");
            return Ok(Self::memory());
        }

        Ok(Self::Postgres(PgStore::connect(dsn).await?))
    }

    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::default())
    }

    /// # Errors
    /// Returns [`StoreError::Database`] if the lookup fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>, StoreError> {
        match self {
            Self::Postgres(store) => store.find_by_email(email).await,
            Self::Memory(store) => Ok(store.find_by_email(email).await),
        }
    }

    /// # Errors
    /// Returns [`StoreError::Conflict`] if the email is already stored.
    pub async fn insert(&self, email: &str) -> Result<SignupRecord, StoreError> {
        match self {
            Self::Postgres(store) => store.insert(email).await,
            Self::Memory(store) => store.insert(email).await,
        }
    }

    /// All signups, newest first.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn list_all(&self) -> Result<Vec<SignupRecord>, StoreError> {
        match self {
            Self::Postgres(store) => store.list_all().await,
            Self::Memory(store) => Ok(store.list_all().await),
        }
    }

    /// # Errors
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        match self {
            Self::Postgres(store) => store.count().await,
            Self::Memory(store) => Ok(store.count().await),
        }
    }

    /// Remove a signup and return it.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no signup has this id.
    pub async fn delete_by_id(&self, id: i64) -> Result<SignupRecord, StoreError> {
        match self {
            Self::Postgres(store) => store.delete_by_id(id).await,
            Self::Memory(store) => store.delete_by_id(id).await,
        }
    }

    /// # Errors
    /// Returns [`StoreError::Database`] if the backend does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres and make sure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the connection or the schema setup fails.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self::from_pool(pool);

        store.migrate().await?;

        Ok(store)
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        let statements = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty());

        for (index, statement) in statements.enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>, StoreError> {
        let query = "SELECT id, email, created_at FROM waitlist_signups WHERE email = $1";
        let span = query_span("SELECT", query);

        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn insert(&self, email: &str) -> Result<SignupRecord, StoreError> {
        let query = r"
            INSERT INTO waitlist_signups (email)
            VALUES ($1)
            RETURNING id, email, created_at
        ";
        let span = query_span("INSERT", query);

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(query)
            .bind(email)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .and_then(|row| record_from_row(&row));

        match inserted {
            Ok(record) => {
                tx.commit().await?;

                Ok(record)
            }
            Err(err) => {
                tx.rollback().await?;

                if is_unique_violation(&err) {
                    Err(StoreError::Conflict(email.to_string()))
                } else {
                    Err(StoreError::Database(err))
                }
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<SignupRecord>, StoreError> {
        let query = r"
            SELECT id, email, created_at
            FROM waitlist_signups
            ORDER BY created_at DESC, id DESC
        ";
        let span = query_span("SELECT", query);

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let query = "SELECT COUNT(*) AS count FROM waitlist_signups";
        let span = query_span("SELECT", query);

        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.try_get("count")?)
    }

    async fn delete_by_id(&self, id: i64) -> Result<SignupRecord, StoreError> {
        let query = "DELETE FROM waitlist_signups WHERE id = $1 RETURNING id, email, created_at";
        let span = query_span("DELETE", query);

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        match row {
            Some(row) => Ok(record_from_row(&row)?),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }
}

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn record_from_row(row: &PgRow) -> Result<SignupRecord, sqlx::Error> {
    Ok(SignupRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// In-process store; ids start at 1 and are never reused.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    table: Arc<Mutex<MemoryTable>>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    last_id: i64,
    rows: BTreeMap<i64, SignupRecord>,
}

impl MemoryStore {
    async fn find_by_email(&self, email: &str) -> Option<SignupRecord> {
        let table = self.table.lock().await;

        table.rows.values().find(|row| row.email == email).cloned()
    }

    async fn insert(&self, email: &str) -> Result<SignupRecord, StoreError> {
        self.insert_at(email, OffsetDateTime::now_utc()).await
    }

    async fn insert_at(
        &self,
        email: &str,
        created_at: OffsetDateTime,
    ) -> Result<SignupRecord, StoreError> {
        let mut table = self.table.lock().await;

        if table.rows.values().any(|row| row.email == email) {
            return Err(StoreError::Conflict(email.to_string()));
        }

        table.last_id += 1;

        let record = SignupRecord {
            id: table.last_id,
            email: email.to_string(),
            created_at,
        };

        table.rows.insert(record.id, record.clone());

        Ok(record)
    }

    async fn list_all(&self) -> Vec<SignupRecord> {
        let table = self.table.lock().await;

        let mut rows: Vec<SignupRecord> = table.rows.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        rows
    }

    async fn count(&self) -> i64 {
        let table = self.table.lock().await;

        i64::try_from(table.rows.len()).unwrap_or(i64::MAX)
    }

    async fn delete_by_id(&self, id: i64) -> Result<SignupRecord, StoreError> {
        let mut table = self.table.lock().await;

        table.rows.remove(&id).ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = Store::memory();

        let first = store.insert("a@x.com").await.unwrap();
        let second = store.insert("b@x.com").await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.email, "b@x.com");
    }

    #[tokio::test]
    async fn test_insert_duplicate_is_conflict() {
        let store = Store::memory();

        store.insert("a@x.com").await.unwrap();
        let result = store.insert("a@x.com").await;

        assert!(matches!(result, Err(StoreError::Conflict(email)) if email == "a@x.com"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_is_case_sensitive() {
        let store = Store::memory();

        store.insert("a@x.com").await.unwrap();
        store.insert("A@x.com").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.find_by_email("A@X.COM").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let store = Store::memory();

        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());

        let record = store.insert("a@x.com").await.unwrap();

        assert_eq!(store.find_by_email("a@x.com").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_email() {
        let store = Store::memory();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert("race@x.com").await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => conflicts += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let store = MemoryStore::default();
        let base = OffsetDateTime::now_utc();

        // insertion order differs from creation order
        store
            .insert_at("middle@x.com", base + TimeDuration::seconds(5))
            .await
            .unwrap();
        store.insert_at("oldest@x.com", base).await.unwrap();
        store
            .insert_at("newest@x.com", base + TimeDuration::seconds(10))
            .await
            .unwrap();

        let emails: Vec<String> = store
            .list_all()
            .await
            .into_iter()
            .map(|record| record.email)
            .collect();

        assert_eq!(emails, vec!["newest@x.com", "middle@x.com", "oldest@x.com"]);
    }

    #[tokio::test]
    async fn test_list_all_breaks_timestamp_ties_by_id() {
        let store = MemoryStore::default();
        let now = OffsetDateTime::now_utc();

        store.insert_at("first@x.com", now).await.unwrap();
        store.insert_at("second@x.com", now).await.unwrap();

        let ids: Vec<i64> = store.list_all().await.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = Store::memory();

        let record = store.insert("a@x.com").await.unwrap();
        store.insert("b@x.com").await.unwrap();

        let deleted = store.delete_by_id(record.id).await.unwrap();

        assert_eq!(deleted, record);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_leaves_store_unchanged() {
        let store = Store::memory();

        store.insert("a@x.com").await.unwrap();
        let before = store.list_all().await.unwrap();

        let result = store.delete_by_id(42).await;

        assert!(matches!(result, Err(StoreError::NotFound(42))));
        assert_eq!(store.list_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = Store::memory();

        let first = store.insert("a@x.com").await.unwrap();
        store.delete_by_id(first.id).await.unwrap();
        let second = store.insert("a@x.com").await.unwrap();

        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_connect_memory_dsn() {
        let store = Store::connect("memory://").await.unwrap();

        assert!(matches!(store, Store::Memory(_)));
        assert!(store.ping().await.is_ok());
    }

    #[test]
    fn test_schema_declares_email_unique() {
        assert!(SCHEMA_SQL.contains("UNIQUE (email)"));
    }

    // Runs against a real database only when WAITLIST_TEST_DSN is set.
    #[tokio::test]
    async fn test_postgres_store() {
        let Ok(dsn) = std::env::var("WAITLIST_TEST_DSN") else {
            eprintln!("Skipping Postgres store test: WAITLIST_TEST_DSN not set");
            return;
        };

        let store = PgStore::connect(&dsn).await.unwrap();
        sqlx::query("TRUNCATE waitlist_signups RESTART IDENTITY")
            .execute(&store.pool)
            .await
            .unwrap();
        let store = Store::Postgres(store);

        let first = store.insert("a@x.com").await.unwrap();
        assert!(matches!(
            store.insert("a@x.com").await,
            Err(StoreError::Conflict(_))
        ));
        let second = store.insert("b@x.com").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(
            store.find_by_email("a@x.com").await.unwrap(),
            Some(first.clone())
        );

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed.first().map(|r| r.id), Some(second.id));

        assert_eq!(store.delete_by_id(first.id).await.unwrap().email, "a@x.com");
        assert!(matches!(
            store.delete_by_id(first.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.ping().await.is_ok());
    }
}
