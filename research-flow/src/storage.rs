use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::context::{MedicalContext, Sex};
use crate::error::{FlowError, Result};
use crate::pipeline::InvestigationState;

/// Small denormalized view of the patient, kept alongside the full state so
/// list displays never have to open the whole context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummaryRecord {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub symptom_count: u32,
    pub red_flag_count: u32,
}

impl PatientSummaryRecord {
    pub fn from_context(context: &MedicalContext) -> Self {
        Self {
            age: context.patient_profile.age,
            sex: context.patient_profile.sex,
            symptom_count: context.patient_profile.symptoms.len() as u32,
            red_flag_count: context.red_flags.len() as u32,
        }
    }
}

/// Snapshot of one investigation as the persistence layer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub id: String,
    pub state: InvestigationState,
    pub context: MedicalContext,
    pub patient_summary: PatientSummaryRecord,
    pub updated_at: DateTime<Utc>,
}

impl InvestigationRecord {
    pub fn new(id: impl Into<String>, state: InvestigationState, context: MedicalContext) -> Self {
        let patient_summary = PatientSummaryRecord::from_context(&context);
        Self {
            id: id.into(),
            state,
            context,
            patient_summary,
            updated_at: Utc::now(),
        }
    }
}

/// Trait for storing and retrieving investigation snapshots
#[async_trait]
pub trait InvestigationStore: Send + Sync {
    async fn save(&self, record: InvestigationRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<InvestigationRecord>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list_ids(&self) -> Result<Vec<String>>;
}

/// In-memory implementation of InvestigationStore
pub struct InMemoryInvestigationStore {
    records: Arc<DashMap<String, InvestigationRecord>>,
}

impl InMemoryInvestigationStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryInvestigationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvestigationStore for InMemoryInvestigationStore {
    async fn save(&self, record: InvestigationRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InvestigationRecord>> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.remove(id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.records.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// Postgres implementation of InvestigationStore. State and context are kept
/// as JSONB so schema migrations track the Rust types, not the other way
/// around.
pub struct PostgresInvestigationStore {
    pool: sqlx::PgPool,
}

impl PostgresInvestigationStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage_error)?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn with_pool(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS investigations (
                id TEXT PRIMARY KEY,
                state JSONB NOT NULL,
                context JSONB NOT NULL,
                patient_summary JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }
}

#[async_trait]
impl InvestigationStore for PostgresInvestigationStore {
    async fn save(&self, record: InvestigationRecord) -> Result<()> {
        let state = serde_json::to_value(&record.state).map_err(storage_error)?;
        let context = serde_json::to_value(&record.context).map_err(storage_error)?;
        let patient_summary =
            serde_json::to_value(record.patient_summary).map_err(storage_error)?;
        sqlx::query(
            r#"
            INSERT INTO investigations (id, state, context, patient_summary, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET state = EXCLUDED.state,
                context = EXCLUDED.context,
                patient_summary = EXCLUDED.patient_summary,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.id)
        .bind(state)
        .bind(context)
        .bind(patient_summary)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InvestigationRecord>> {
        let row = sqlx::query(
            "SELECT id, state, context, patient_summary, updated_at FROM investigations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let state: serde_json::Value = row.try_get("state").map_err(storage_error)?;
        let context: serde_json::Value = row.try_get("context").map_err(storage_error)?;
        let patient_summary: serde_json::Value =
            row.try_get("patient_summary").map_err(storage_error)?;
        Ok(Some(InvestigationRecord {
            id: row.try_get("id").map_err(storage_error)?,
            state: serde_json::from_value(state).map_err(storage_error)?,
            context: serde_json::from_value(context).map_err(storage_error)?,
            patient_summary: serde_json::from_value(patient_summary).map_err(storage_error)?,
            updated_at: row.try_get("updated_at").map_err(storage_error)?,
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM investigations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM investigations ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.into_iter()
            .map(|row| row.try_get("id").map_err(storage_error))
            .collect()
    }
}

fn storage_error(err: impl std::fmt::Display) -> FlowError {
    FlowError::Storage(err.to_string())
}
