use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    FromRow, PgPool, Postgres, Row, Transaction,
};
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CreateOutcome, CredentialRecord, MfaRecord, UserStore};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const SELECT_CREDENTIALS: &str = r"
    SELECT u.id, u.username, u.password_hash,
           COALESCE(
               array_agg(r.role ORDER BY r.role) FILTER (WHERE r.role IS NOT NULL),
               '{}'
           ) AS authorities,
           m.enabled AS mfa_enabled,
           m.encrypted_secret AS mfa_secret
    FROM users u
    LEFT JOIN user_roles r ON r.user_id = u.id
    LEFT JOIN mfa m ON m.user_id = u.id
";

const GROUP_CREDENTIALS: &str =
    "GROUP BY u.id, u.username, u.password_hash, m.enabled, m.encrypted_secret";

struct CredentialRow(CredentialRecord);

/// The LEFT JOIN on `mfa` yields NULL columns for accounts without a record.
fn mfa_from_columns(enabled: Option<bool>, secret: Option<Vec<u8>>) -> Option<MfaRecord> {
    match (enabled, secret) {
        (Some(enabled), Some(encrypted_secret)) => Some(MfaRecord {
            enabled,
            encrypted_secret,
        }),
        _ => None,
    }
}

impl<'r> FromRow<'r, PgRow> for CredentialRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let authorities: Vec<String> = row.try_get("authorities")?;
        let mfa_enabled: Option<bool> = row.try_get("mfa_enabled")?;
        let mfa_secret: Option<Vec<u8>> = row.try_get("mfa_secret")?;

        Ok(Self(CredentialRecord {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            authorities: authorities.into_iter().collect(),
            mfa: mfa_from_columns(mfa_enabled, mfa_secret),
        }))
    }
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `dsn` and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the connection or schema setup fails.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to apply schema")?;
        Ok(())
    }

    async fn write_roles(
        tx: &mut Transaction<'_, Postgres>,
        record: &CredentialRecord,
    ) -> Result<()> {
        for role in &record.authorities {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(record.id)
                .bind(role)
                .execute(&mut **tx)
                .await
                .context("Failed to insert role")?;
        }
        Ok(())
    }

    async fn write_mfa(tx: &mut Transaction<'_, Postgres>, record: &CredentialRecord) -> Result<()> {
        match &record.mfa {
            Some(mfa) => {
                sqlx::query(
                    r"
                    INSERT INTO mfa (user_id, enabled, encrypted_secret)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_id) DO UPDATE
                    SET enabled = EXCLUDED.enabled, encrypted_secret = EXCLUDED.encrypted_secret
                    ",
                )
                .bind(record.id)
                .bind(mfa.enabled)
                .bind(&mfa.encrypted_secret)
                .execute(&mut **tx)
                .await
                .context("Failed to write MFA record")?;
            }
            None => {
                sqlx::query("DELETE FROM mfa WHERE user_id = $1")
                    .bind(record.id)
                    .execute(&mut **tx)
                    .await
                    .context("Failed to delete MFA record")?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let query = format!("{SELECT_CREDENTIALS} WHERE u.username = $1 {GROUP_CREDENTIALS}");
        let row = sqlx::query_as::<_, CredentialRow>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")?;
        Ok(row.map(|CredentialRow(record)| record))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CredentialRecord>> {
        let query = format!("{SELECT_CREDENTIALS} WHERE u.id = $1 {GROUP_CREDENTIALS}");
        let row = sqlx::query_as::<_, CredentialRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")?;
        Ok(row.map(|CredentialRow(record)| record))
    }

    #[instrument(skip(self, record), fields(user_id = %record.id))]
    async fn create(&self, record: &CredentialRecord) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            ",
        )
        .bind(record.id)
        .bind(&record.username)
        .bind(&record.password_hash)
        .execute(&mut *tx)
        .await
        .context("Failed to insert user")?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("username already taken");
            return Ok(CreateOutcome::UsernameTaken);
        }

        Self::write_roles(&mut tx, record).await?;
        Self::write_mfa(&mut tx, record).await?;

        tx.commit().await?;

        Ok(CreateOutcome::Created)
    }

    #[instrument(skip(self, record), fields(user_id = %record.id))]
    async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET username = $2, password_hash = $3 WHERE id = $1")
            .bind(record.id)
            .bind(&record.username)
            .bind(&record.password_hash)
            .execute(&mut *tx)
            .await
            .context("Failed to update user")?;

        if updated.rows_affected() == 0 {
            return Err(anyhow!("account {} does not exist", record.id));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(record.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear roles")?;

        Self::write_roles(&mut tx, record).await?;
        Self::write_mfa(&mut tx, record).await?;

        tx.commit().await?;

        Ok(())
    }
}
