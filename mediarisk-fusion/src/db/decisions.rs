//! Decision record storage

use super::DecisionSink;
use crate::pipeline::{Decision, LivenessRecord};
use async_trait::async_trait;
use mediarisk_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

/// SQLite-backed [`DecisionSink`]
#[derive(Clone)]
pub struct SqliteDecisionStore {
    pool: SqlitePool,
}

impl SqliteDecisionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// A fused decision as read back from the database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDecision {
    pub analysis_id: Uuid,
    pub pipeline: String,
    pub aggregate_score: f64,
    pub classification: String,
    pub confidence: String,
    pub contributing_signals: BTreeMap<String, f64>,
    pub failure_count: usize,
    pub processing_time_ms: u64,
    pub created_at: String,
}

/// Stored value of a serde enum (e.g. `"MANIPULATED"`)
fn enum_label<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Ok(other.to_string()),
        Err(e) => Err(Error::Internal(format!("Failed to serialize label: {}", e))),
    }
}

#[async_trait]
impl DecisionSink for SqliteDecisionStore {
    async fn record_decision(&self, decision: &Decision) -> Result<()> {
        // Prepare all data before touching the pool
        let contributing = serde_json::to_string(&decision.result.contributing_signals)
            .map_err(|e| Error::Internal(format!("Failed to serialize signals: {}", e)))?;
        let failures = serde_json::to_string(&decision.failures)
            .map_err(|e| Error::Internal(format!("Failed to serialize failures: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO fusion_decisions (
                analysis_id, pipeline, aggregate_score, classification, confidence,
                contributing_signals, failures, processing_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(decision.analysis_id.to_string())
        .bind(decision.pipeline.as_str())
        .bind(decision.result.aggregate_score)
        .bind(enum_label(&decision.result.classification)?)
        .bind(enum_label(&decision.result.confidence)?)
        .bind(contributing)
        .bind(failures)
        .bind(decision.processing_time_ms as i64)
        .bind(decision.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(analysis_id = %decision.analysis_id, "Decision persisted");
        Ok(())
    }

    async fn record_liveness(&self, record: &LivenessRecord) -> Result<()> {
        let attack_type = record.attack_type.as_ref().map(enum_label).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO liveness_decisions (
                analysis_id, security_level, decision, is_live, fused_score,
                confidence_level, attack_type, processing_time_ms, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.analysis_id.to_string())
        .bind(record.security_level.as_str())
        .bind(&record.decision)
        .bind(record.is_live)
        .bind(record.fused_score)
        .bind(&record.confidence_level)
        .bind(attack_type)
        .bind(record.processing_time_ms as i64)
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(analysis_id = %record.analysis_id, "Liveness decision persisted");
        Ok(())
    }
}

/// Number of stored fused decisions
pub async fn count_decisions(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fusion_decisions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Number of stored liveness decisions
pub async fn count_liveness_decisions(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM liveness_decisions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Load one fused decision by id
pub async fn load_decision(pool: &SqlitePool, analysis_id: Uuid) -> Result<Option<StoredDecision>> {
    let row = sqlx::query(
        r#"
        SELECT analysis_id, pipeline, aggregate_score, classification, confidence,
               contributing_signals, failures, processing_time_ms, created_at
        FROM fusion_decisions
        WHERE analysis_id = ?
        "#,
    )
    .bind(analysis_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let contributing_json: String = row.get("contributing_signals");
    let contributing_signals: BTreeMap<String, f64> = serde_json::from_str(&contributing_json)
        .map_err(|e| Error::Internal(format!("Corrupt contributing_signals: {}", e)))?;

    let failures_json: String = row.get("failures");
    let failures: Vec<serde_json::Value> = serde_json::from_str(&failures_json)
        .map_err(|e| Error::Internal(format!("Corrupt failures: {}", e)))?;

    let processing_time_ms: i64 = row.get("processing_time_ms");

    Ok(Some(StoredDecision {
        analysis_id,
        pipeline: row.get("pipeline"),
        aggregate_score: row.get("aggregate_score"),
        classification: row.get("classification"),
        confidence: row.get("confidence"),
        contributing_signals,
        failure_count: failures.len(),
        processing_time_ms: processing_time_ms.max(0) as u64,
        created_at: row.get("created_at"),
    }))
}
