//! Workflow definition repository.

use super::{backend, decode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darkroom_core::WorkflowId;
use darkroom_engine::WorkflowDefinition;
use darkroom_engine::graph::WorkflowGraph;
use darkroom_engine::store::{DefinitionStore, StoreError};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for definition queries.
#[derive(FromRow)]
struct DefinitionRow {
    id: String,
    name: String,
    trigger_event: String,
    is_active: bool,
    conditions: Option<serde_json::Value>,
    graph: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DefinitionRow {
    fn try_into_definition(self) -> Result<WorkflowDefinition, StoreError> {
        let id = WorkflowId::from_str(&self.id)
            .map_err(|e| decode(&format!("invalid workflow id '{}'", self.id), e))?;

        let mut graph: WorkflowGraph = serde_json::from_value(self.graph)
            .map_err(|e| decode(&format!("invalid graph for workflow '{id}'"), e))?;
        graph.rebuild_index_map();

        Ok(WorkflowDefinition {
            id,
            name: self.name,
            trigger_event: self.trigger_event,
            is_active: self.is_active,
            conditions: self.conditions.unwrap_or(serde_json::Value::Null),
            graph,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres-backed definition store.
pub struct PgDefinitionStore {
    pool: PgPool,
}

impl PgDefinitionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DefinitionStore for PgDefinitionStore {
    async fn fetch(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError> {
        let row: Option<DefinitionRow> = sqlx::query_as(
            r#"
            SELECT id, name, trigger_event, is_active, conditions, graph, created_at, updated_at
            FROM workflow_definitions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DefinitionRow::try_into_definition).transpose()
    }

    async fn find_active_by_event(
        &self,
        event: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(
            r#"
            SELECT id, name, trigger_event, is_active, conditions, graph, created_at, updated_at
            FROM workflow_definitions
            WHERE trigger_event = $1 AND is_active
            ORDER BY id
            "#,
        )
        .bind(event)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(DefinitionRow::try_into_definition)
            .collect()
    }
}
