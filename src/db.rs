//! SQLite store for benchmark runs and per-document results.

use crate::error::StoreError;
use crate::types::{EntityMap, EvaluationMetrics};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const SCHEMA_VERSION: i64 = 2;

/// Averages for one pipeline over one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub created_at: String,
    pub pipeline_name: String,
    pub dataset: String,
    pub documents: i64,
    pub avg_cer: Option<f64>,
    pub avg_wer: Option<f64>,
    pub avg_entity_accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub run_id: i64,
    pub document: String,
    pub metrics: Option<EvaluationMetrics>,
    pub entities: EntityMap,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
}

pub struct RunStore {
    conn: Mutex<Connection>,
}

impl RunStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                pipeline_name TEXT NOT NULL,
                dataset TEXT NOT NULL,
                documents INTEGER NOT NULL,
                avg_cer REAL,
                avg_wer REAL,
                avg_entity_accuracy REAL
            );
            CREATE TABLE IF NOT EXISTS document_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL,
                document TEXT NOT NULL,
                metrics TEXT,
                entities TEXT NOT NULL,
                error_message TEXT,
                FOREIGN KEY (run_id) REFERENCES runs(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_document_results_run ON document_results(run_id);
            ",
        )?;

        // Migration 002: per-document timing
        let current_version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(1);
        if current_version < 2 {
            if let Err(e) = conn.execute("ALTER TABLE document_results ADD COLUMN duration_ms INTEGER", []) {
                if !e.to_string().contains("duplicate column") {
                    return Err(e.into());
                }
            }
            conn.execute("UPDATE schema_version SET version = 2", [])?;
        }
        debug!(version = SCHEMA_VERSION, "run store ready");

        Ok(RunStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))?)
    }

    pub fn record_run(
        &self,
        pipeline_name: &str,
        dataset: &str,
        documents: usize,
        avg_cer: Option<f64>,
        avg_wer: Option<f64>,
        avg_entity_accuracy: Option<f64>,
    ) -> Result<i64, StoreError> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO runs (created_at, pipeline_name, dataset, documents, avg_cer, avg_wer, avg_entity_accuracy) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                created_at,
                pipeline_name,
                dataset,
                documents as i64,
                avg_cer,
                avg_wer,
                avg_entity_accuracy
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_document(
        &self,
        run_id: i64,
        document: &str,
        metrics: Option<&EvaluationMetrics>,
        entities: &EntityMap,
        error_message: Option<&str>,
        duration_ms: Option<i64>,
    ) -> Result<i64, StoreError> {
        let metrics_str = match metrics {
            Some(m) => Some(serde_json::to_string(m)?),
            None => None,
        };
        let entities_str = serde_json::to_string(entities)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO document_results (run_id, document, metrics, entities, error_message, duration_ms) VALUES (?, ?, ?, ?, ?, ?)",
            params![run_id, document, metrics_str, entities_str, error_message, duration_ms],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent first.
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, pipeline_name, dataset, documents, avg_cer, avg_wer, avg_entity_accuracy FROM runs ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                created_at: row.get(1)?,
                pipeline_name: row.get(2)?,
                dataset: row.get(3)?,
                documents: row.get(4)?,
                avg_cer: row.get(5)?,
                avg_wer: row.get(6)?,
                avg_entity_accuracy: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let run = conn
            .query_row(
                "SELECT id, created_at, pipeline_name, dataset, documents, avg_cer, avg_wer, avg_entity_accuracy FROM runs WHERE id = ?",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        pipeline_name: row.get(2)?,
                        dataset: row.get(3)?,
                        documents: row.get(4)?,
                        avg_cer: row.get(5)?,
                        avg_wer: row.get(6)?,
                        avg_entity_accuracy: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Results of one run in insertion order.
    pub fn run_documents(&self, run_id: i64) -> Result<Vec<DocumentRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, run_id, document, metrics, entities, error_message, duration_ms FROM document_results WHERE run_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<i64>>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, run_id, document, metrics, entities, error, duration_ms) = row?;
            out.push(DocumentRecord {
                id,
                run_id,
                document,
                metrics: match metrics {
                    Some(m) => Some(serde_json::from_str::<EvaluationMetrics>(&m)?),
                    None => None,
                },
                entities: serde_json::from_str(&entities)?,
                error,
                duration_ms,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_is_migrated() {
        let store = RunStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn runs_and_documents_round_trip() {
        let store = RunStore::open_in_memory().unwrap();
        let first = store.record_run("Raw OCR", "train", 2, Some(0.1), Some(0.2), None).unwrap();
        let second = store
            .record_run("Raw OCR + Entity Analysis", "train", 2, Some(0.1), Some(0.2), Some(0.75))
            .unwrap();

        let metrics = EvaluationMetrics {
            ocr_cer: Some(0.1),
            ..Default::default()
        };
        let mut entities = EntityMap::new();
        entities.insert("total".into(), "9.00".into());
        store
            .record_document(second, "X001", Some(&metrics), &entities, None, Some(1200))
            .unwrap();
        store
            .record_document(second, "X002", None, &EntityMap::new(), Some("No ground truth found"), None)
            .unwrap();

        let runs = store.list_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);
        assert_eq!(runs[0].avg_entity_accuracy, Some(0.75));

        let docs = store.run_documents(second).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metrics, Some(metrics));
        assert_eq!(docs[0].entities, entities);
        assert_eq!(docs[1].error.as_deref(), Some("No ground truth found"));
        assert!(store.run_documents(first).unwrap().is_empty());
        assert!(store.get_run(9999).unwrap().is_none());
    }
}
