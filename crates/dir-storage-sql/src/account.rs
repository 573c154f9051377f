//! `PostgreSQL` implementation of the account storage provider.

use async_trait::async_trait;
use dir_model::{AccountSchema, LocalAccount};
use dir_storage::error::{StorageError, StorageResult};
use dir_storage::{AccountSearchCriteria, AccountStore, ImportScope};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::AccountRow;
use crate::error::from_sqlx_error;

/// `PostgreSQL` account storage provider.
pub struct PgAccountStore {
    pool: PgPool,
    schema: AccountSchema,
}

impl PgAccountStore {
    /// Creates a new `PostgreSQL` account store.
    #[must_use]
    pub const fn new(pool: PgPool, schema: AccountSchema) -> Self {
        Self { pool, schema }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert(&self, account: &LocalAccount) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO accounts (
                id, username, guid, domain, password, fields,
                created_at, updated_at, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(account.id)
        .bind(self.schema.username(account))
        .bind(self.schema.guid(account))
        .bind(self.schema.domain(account))
        .bind(self.schema.password(account))
        .bind(sqlx::types::Json(&account.fields))
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| self.conflict(account, e))?;

        Ok(())
    }

    async fn update(&self, account: &LocalAccount) -> StorageResult<()> {
        let result = sqlx::query(
            r"UPDATE accounts SET
                username = $2, guid = $3, domain = $4, password = $5,
                fields = $6, updated_at = $7, deleted_at = $8
            WHERE id = $1",
        )
        .bind(account.id)
        .bind(self.schema.username(account))
        .bind(self.schema.guid(account))
        .bind(self.schema.domain(account))
        .bind(self.schema.password(account))
        .bind(sqlx::types::Json(&account.fields))
        .bind(chrono::Utc::now())
        .bind(account.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| self.conflict(account, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(account.id));
        }

        Ok(())
    }

    /// Reports unique violations against the identifier column.
    fn conflict(&self, account: &LocalAccount, err: sqlx::Error) -> StorageError {
        match from_sqlx_error(err) {
            StorageError::Duplicate { .. } => StorageError::duplicate(
                &self.schema.guid_column,
                self.schema.guid(account).unwrap_or_default(),
            ),
            other => other,
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    fn schema(&self) -> &AccountSchema {
        &self.schema
    }

    async fn find_for_import(&self, scope: &ImportScope) -> StorageResult<Option<LocalAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(
            r"SELECT * FROM accounts
            WHERE (($1 <> '' AND guid = $1)
                OR ($2 <> '' AND username = $2 AND (guid IS NULL OR guid = '')))
            AND ($3 OR deleted_at IS NULL)
            ORDER BY CASE WHEN guid = $1 THEN 0 ELSE 1 END, id
            LIMIT 1",
        )
        .bind(&scope.guid)
        .bind(&scope.username)
        .bind(scope.with_trashed)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(row.map(LocalAccount::from))
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<LocalAccount>> {
        let row: Option<AccountRow> = sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(row.map(LocalAccount::from))
    }

    async fn get_by_username(
        &self,
        username: &str,
        with_trashed: bool,
    ) -> StorageResult<Option<LocalAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(
            r"SELECT * FROM accounts
            WHERE username = $1 AND ($2 OR deleted_at IS NULL)
            ORDER BY id LIMIT 1",
        )
        .bind(username)
        .bind(with_trashed)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(row.map(LocalAccount::from))
    }

    async fn save(&self, account: &mut LocalAccount) -> StorageResult<()> {
        if account.exists() {
            self.update(account).await?;
        } else {
            self.insert(account).await?;
        }

        account.mark_persisted();
        tracing::trace!(account_id = %account.id, "Saved account");
        Ok(())
    }

    async fn search(&self, criteria: &AccountSearchCriteria) -> StorageResult<Vec<LocalAccount>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = criteria.max_results.map(|max| max as i64);

        let rows: Vec<AccountRow> = sqlx::query_as(
            r"SELECT * FROM accounts
            WHERE ($1::text IS NULL OR domain = $1)
            AND (NOT $2 OR (guid IS NOT NULL AND guid <> ''))
            AND ($3 OR deleted_at IS NULL)
            ORDER BY id
            LIMIT $4",
        )
        .bind(criteria.domain.as_deref())
        .bind(criteria.imported_only)
        .bind(criteria.with_trashed)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(rows.into_iter().map(LocalAccount::from).collect())
    }
}
