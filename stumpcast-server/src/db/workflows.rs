//! Workflow persistence

use crate::db::speeches::parse_timestamp;
use crate::models::{Workflow, WorkflowStatus};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use stumpcast_common::{Error, Result};
use uuid::Uuid;

/// Partial update of a workflow's mutable fields
///
/// `None` fields are left untouched; `updated_at` is always bumped.
#[derive(Debug, Default, Clone)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub script: Option<String>,
    pub audio_url: Option<String>,
    pub rss_url: Option<String>,
    pub status: Option<WorkflowStatus>,
}

/// Persist a freshly created workflow.
pub async fn create_workflow(pool: &SqlitePool, workflow: &Workflow) -> Result<()> {
    let speech_ids = serde_json::to_string(&workflow.speech_ids)
        .map_err(|e| Error::Internal(format!("Failed to serialize speech ids: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO workflows (
            id, name, speech_ids, script, audio_url, rss_url,
            status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(workflow.id.to_string())
    .bind(&workflow.name)
    .bind(speech_ids)
    .bind(&workflow.script)
    .bind(&workflow.audio_url)
    .bind(&workflow.rss_url)
    .bind(workflow.status.as_str())
    .bind(workflow.created_at.to_rfc3339())
    .bind(workflow.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a workflow by id.
pub async fn get_workflow(pool: &SqlitePool, id: Uuid) -> Result<Option<Workflow>> {
    let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(workflow_from_row).transpose()
}

/// Apply a partial update; returns the refreshed workflow.
pub async fn update_workflow(
    pool: &SqlitePool,
    id: Uuid,
    update: WorkflowUpdate,
) -> Result<Workflow> {
    let mut sets = vec!["updated_at = ?".to_string()];
    let mut binds: Vec<String> = vec![chrono::Utc::now().to_rfc3339()];

    if let Some(name) = update.name {
        sets.push("name = ?".to_string());
        binds.push(name);
    }
    if let Some(script) = update.script {
        sets.push("script = ?".to_string());
        binds.push(script);
    }
    if let Some(audio_url) = update.audio_url {
        sets.push("audio_url = ?".to_string());
        binds.push(audio_url);
    }
    if let Some(rss_url) = update.rss_url {
        sets.push("rss_url = ?".to_string());
        binds.push(rss_url);
    }
    if let Some(status) = update.status {
        sets.push("status = ?".to_string());
        binds.push(status.as_str().to_string());
    }

    let sql = format!("UPDATE workflows SET {} WHERE id = ?", sets.join(", "));
    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let result = query.bind(id.to_string()).execute(pool).await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Workflow not found: {}", id)));
    }

    get_workflow(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Workflow not found: {}", id)))
}

/// Number of workflows by status (status endpoint)
pub async fn count_workflows(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM workflows")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn workflow_from_row(row: &SqliteRow) -> Result<Workflow> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Bad workflow id in store: {}", e)))?;

    let speech_ids: String = row.get("speech_ids");
    let speech_ids: Vec<String> = serde_json::from_str(&speech_ids)
        .map_err(|e| Error::Internal(format!("Bad speech id list in store: {}", e)))?;

    let status: String = row.get("status");
    let status = WorkflowStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown workflow status: {}", status)))?;

    Ok(Workflow {
        id,
        name: row.get("name"),
        speech_ids,
        script: row.get("script"),
        audio_url: row.get("audio_url"),
        rss_url: row.get("rss_url"),
        status,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
