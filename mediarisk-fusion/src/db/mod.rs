//! Decision persistence
//!
//! Fused and liveness decisions are written to SQLite after the response has
//! been produced. The pipelines only see the [`DecisionSink`] trait.

pub mod decisions;

pub use decisions::SqliteDecisionStore;

use crate::pipeline::{Decision, LivenessRecord};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;

/// Destination for finished decisions
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn record_decision(&self, decision: &Decision) -> mediarisk_common::Result<()>;

    async fn record_liveness(&self, record: &LivenessRecord) -> mediarisk_common::Result<()>;
}

/// Initialize database connection pool
///
/// Creates the parent directory and the database file if needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create decision tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fusion_decisions (
            analysis_id TEXT PRIMARY KEY,
            pipeline TEXT NOT NULL,
            aggregate_score REAL NOT NULL,
            classification TEXT NOT NULL,
            confidence TEXT NOT NULL,
            contributing_signals TEXT NOT NULL,
            failures TEXT NOT NULL DEFAULT '[]',
            processing_time_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS liveness_decisions (
            analysis_id TEXT PRIMARY KEY,
            security_level TEXT NOT NULL,
            decision TEXT NOT NULL,
            is_live INTEGER NOT NULL,
            fused_score REAL,
            confidence_level TEXT NOT NULL,
            attack_type TEXT,
            processing_time_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (fusion_decisions, liveness_decisions)");

    Ok(())
}
