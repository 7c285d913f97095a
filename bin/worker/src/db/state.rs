//! Run and continuation repository.
//!
//! `update_run` and `suspend_run` enforce the engine's optimistic
//! concurrency contract with `WHERE version = expected` guards;
//! `suspend_run` wraps the run update and the continuation insert in
//! one transaction.

use super::{backend, decode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darkroom_core::{ContinuationId, RunId, WorkflowId};
use darkroom_engine::continuation::{ContinuationStatus, ScheduledContinuation};
use darkroom_engine::node::NodeId;
use darkroom_engine::run::{Run, RunStatus, TraceEntry};
use darkroom_engine::store::{StateStore, StoreError};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;

/// Row type for run queries.
#[derive(FromRow)]
struct RunRow {
    id: String,
    workflow_id: String,
    trigger_event: String,
    trigger_payload: serde_json::Value,
    status: String,
    current_node_id: Option<String>,
    execution_path: serde_json::Value,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    dry_run: bool,
    version: i64,
}

impl RunRow {
    fn try_into_run(self) -> Result<Run, StoreError> {
        let id = RunId::from_str(&self.id)
            .map_err(|e| decode(&format!("invalid run id '{}'", self.id), e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode(&format!("invalid workflow id '{}'", self.workflow_id), e))?;
        let status = RunStatus::from_str(&self.status)
            .map_err(|e| decode(&format!("invalid status for run '{id}'"), e))?;
        let current_node_id = self
            .current_node_id
            .map(|n| {
                NodeId::from_str(&n).map_err(|e| decode(&format!("invalid node id '{n}'"), e))
            })
            .transpose()?;
        let execution_path: Vec<TraceEntry> = serde_json::from_value(self.execution_path)
            .map_err(|e| decode(&format!("invalid execution path for run '{id}'"), e))?;
        let version = u64::try_from(self.version)
            .map_err(|e| decode(&format!("invalid version for run '{id}'"), e))?;

        Ok(Run {
            id,
            workflow_id,
            trigger_event: self.trigger_event,
            trigger_payload: self.trigger_payload,
            status,
            current_node_id,
            execution_path,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
            dry_run: self.dry_run,
            version,
        })
    }
}

/// Row type for continuation queries.
#[derive(FromRow)]
struct ContinuationRow {
    id: String,
    run_id: String,
    node_id: String,
    payload: serde_json::Value,
    scheduled_for: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

impl ContinuationRow {
    fn try_into_continuation(self) -> Result<ScheduledContinuation, StoreError> {
        let id = ContinuationId::from_str(&self.id)
            .map_err(|e| decode(&format!("invalid continuation id '{}'", self.id), e))?;
        let run_id = RunId::from_str(&self.run_id)
            .map_err(|e| decode(&format!("invalid run id '{}'", self.run_id), e))?;
        let node_id = NodeId::from_str(&self.node_id)
            .map_err(|e| decode(&format!("invalid node id '{}'", self.node_id), e))?;
        let status = ContinuationStatus::from_str(&self.status)
            .map_err(|e| decode(&format!("invalid status for continuation '{id}'"), e))?;

        Ok(ScheduledContinuation {
            id,
            run_id,
            node_id,
            payload: self.payload,
            scheduled_for: self.scheduled_for,
            status,
            created_at: self.created_at,
        })
    }
}

/// Postgres-backed run state store.
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn encode_path(run: &Run) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(&run.execution_path)
            .map_err(|e| decode(&format!("failed to encode execution path for run '{}'", run.id), e))
    }

    async fn guarded_update(
        tx: &mut Transaction<'_, Postgres>,
        run: &Run,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let expected = i64::try_from(expected_version)
            .map_err(|e| decode("invalid expected version", e))?;
        let version = i64::try_from(run.version)
            .map_err(|e| decode("invalid run version", e))?;

        let result = sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = $2, current_node_id = $3, execution_path = $4,
                completed_at = $5, error_message = $6, version = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.status.as_str())
        .bind(run.current_node_id.map(|n| n.to_string()))
        .bind(Self::encode_path(run)?)
        .bind(run.completed_at)
        .bind(&run.error_message)
        .bind(version)
        .bind(expected)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict { run_id: run.id });
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        let version =
            i64::try_from(run.version).map_err(|e| decode("invalid run version", e))?;

        sqlx::query(
            r#"
            INSERT INTO workflow_runs
                (id, workflow_id, trigger_event, trigger_payload, status, current_node_id,
                 execution_path, started_at, completed_at, error_message, dry_run, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.workflow_id.to_string())
        .bind(&run.trigger_event)
        .bind(&run.trigger_payload)
        .bind(run.status.as_str())
        .bind(run.current_node_id.map(|n| n.to_string()))
        .bind(Self::encode_path(run)?)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(&run.error_message)
        .bind(run.dry_run)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn fetch_run(&self, id: RunId) -> Result<Option<Run>, StoreError> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, trigger_event, trigger_payload, status, current_node_id,
                   execution_path, started_at, completed_at, error_message, dry_run, version
            FROM workflow_runs
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(RunRow::try_into_run).transpose()
    }

    async fn update_run(&self, run: &Run, expected_version: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::guarded_update(&mut tx, run, expected_version).await?;
        tx.commit().await.map_err(backend)
    }

    async fn suspend_run(
        &self,
        run: &Run,
        continuation: &ScheduledContinuation,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::guarded_update(&mut tx, run, expected_version).await?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_continuations
                (id, run_id, node_id, payload, scheduled_for, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(continuation.id.to_string())
        .bind(continuation.run_id.to_string())
        .bind(continuation.node_id.to_string())
        .bind(&continuation.payload)
        .bind(continuation.scheduled_for)
        .bind(continuation.status.as_str())
        .bind(continuation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn due_continuations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledContinuation>, StoreError> {
        let rows: Vec<ContinuationRow> = sqlx::query_as(
            r#"
            SELECT id, run_id, node_id, payload, scheduled_for, status, created_at
            FROM scheduled_continuations
            WHERE status = 'pending' AND scheduled_for <= $1
            ORDER BY scheduled_for
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(ContinuationRow::try_into_continuation)
            .collect()
    }

    async fn mark_continuation(
        &self,
        id: ContinuationId,
        status: ContinuationStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE scheduled_continuations
            SET status = $2
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn cancel_pending_continuations(&self, run_id: RunId) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_continuations
            SET status = 'cancelled'
            WHERE run_id = $1 AND status = 'pending'
            "#,
        )
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected())
    }
}
