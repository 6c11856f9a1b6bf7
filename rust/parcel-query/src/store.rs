//! Ordinary table reads and writes: templates, opportunity types and the saved-search log.

use crate::{
    db::{PgConnectionManager, PgPool},
    error::{Result, ServiceError},
    models::{
        NewSavedSearchRow, OpportunityType, OpportunityTypeRow, QueryTemplate, QueryTemplateRow,
        SavedSearchRecord, SavedSearchRow,
    },
    schema::{opportunity_types, query_templates, saved_searches},
};
use async_trait::async_trait;
use bb8::PooledConnection;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::error;

/// Read-only catalog of operator-authored templates and opportunity types.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn template(&self, id: &str) -> Result<Option<QueryTemplate>>;
    async fn templates(&self) -> Result<Vec<QueryTemplate>>;
    async fn opportunity_type(&self, id: &str) -> Result<Option<OpportunityType>>;
    async fn opportunity_types(&self) -> Result<Vec<OpportunityType>>;
}

/// Append-only audit log of executed searches.
#[async_trait]
pub trait SearchLog: Send + Sync {
    async fn append(&self, record: SavedSearchRecord) -> Result<()>;

    /// Records for one caller, newest first.
    async fn list(&self, caller_id: &str, offset: i64, limit: i64) -> Result<Vec<SavedSearchRow>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, PgConnectionManager>> {
        self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to acquire database connection");
            ServiceError::Internal(anyhow::anyhow!("{err:?}"))
        })
    }
}

fn decode_template(row: QueryTemplateRow) -> Result<QueryTemplate> {
    let id = row.id.clone();
    row.into_template().map_err(|err| {
        ServiceError::Internal(anyhow::anyhow!(
            "template {id} has an unreadable parameter schema: {err}"
        ))
    })
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn template(&self, id: &str) -> Result<Option<QueryTemplate>> {
        let mut conn = self.conn().await?;
        let row = query_templates::table
            .filter(query_templates::id.eq(id))
            .select(QueryTemplateRow::as_select())
            .first::<QueryTemplateRow>(&mut *conn)
            .await
            .optional()
            .map_err(|err| ServiceError::Internal(err.into()))?;

        row.map(decode_template).transpose()
    }

    async fn templates(&self) -> Result<Vec<QueryTemplate>> {
        let mut conn = self.conn().await?;
        let rows: Vec<QueryTemplateRow> = query_templates::table
            .select(QueryTemplateRow::as_select())
            .order((query_templates::category.asc(), query_templates::name.asc()))
            .load(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;

        rows.into_iter().map(decode_template).collect()
    }

    async fn opportunity_type(&self, id: &str) -> Result<Option<OpportunityType>> {
        let mut conn = self.conn().await?;
        let row = opportunity_types::table
            .filter(opportunity_types::id.eq(id))
            .select(OpportunityTypeRow::as_select())
            .first::<OpportunityTypeRow>(&mut *conn)
            .await
            .optional()
            .map_err(|err| ServiceError::Internal(err.into()))?;

        Ok(row.map(OpportunityType::from))
    }

    async fn opportunity_types(&self) -> Result<Vec<OpportunityType>> {
        let mut conn = self.conn().await?;
        let rows: Vec<OpportunityTypeRow> = opportunity_types::table
            .select(OpportunityTypeRow::as_select())
            .order(opportunity_types::name.asc())
            .load(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;

        Ok(rows.into_iter().map(OpportunityType::from).collect())
    }
}

#[async_trait]
impl SearchLog for PgStore {
    async fn append(&self, record: SavedSearchRecord) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::insert_into(saved_searches::table)
            .values(NewSavedSearchRow::from(record))
            .execute(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;
        Ok(())
    }

    async fn list(&self, caller_id: &str, offset: i64, limit: i64) -> Result<Vec<SavedSearchRow>> {
        let mut conn = self.conn().await?;
        saved_searches::table
            .filter(saved_searches::caller_id.eq(caller_id))
            .select(SavedSearchRow::as_select())
            .order((saved_searches::created_at.desc(), saved_searches::id.desc()))
            .offset(offset)
            .limit(limit)
            .load(&mut *conn)
            .await
            .map_err(|err| ServiceError::Internal(err.into()))
    }
}
