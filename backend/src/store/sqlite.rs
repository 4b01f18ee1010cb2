use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use mapaction_common::IncidentId;
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection};

use crate::models::PredictionRecord;

/// SQLite-backed store for completed predictions.
pub struct PredictionStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

fn incident_id_to_sql(id: &IncidentId) -> Value {
    match id {
        IncidentId::Number(n) => Value::Integer(*n),
        IncidentId::Text(s) => Value::Text(s.clone()),
    }
}

fn incident_id_from_sql(value: Value) -> IncidentId {
    match value {
        Value::Integer(n) => IncidentId::Number(n),
        Value::Text(s) => IncidentId::Text(s),
        other => IncidentId::Text(format!("{:?}", other)),
    }
}

impl PredictionStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        if path != ":memory:" {
            // Create parent directories if needed
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                incident_id NOT NULL,
                incident_type TEXT NOT NULL,
                piste_solution TEXT NOT NULL,
                impact_potentiel TEXT NOT NULL,
                context TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_predictions_incident_id ON predictions(incident_id)",
            [],
        )?;

        tracing::info!("Prediction store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert one completed prediction. Returns the row id.
    pub fn insert(&self, record: &PredictionRecord) -> Result<i64, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        conn.execute(
            "INSERT INTO predictions (incident_id, incident_type, piste_solution, impact_potentiel, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                incident_id_to_sql(&record.incident_id),
                record.incident_type,
                record.piste_solution,
                record.impact_potentiel,
                record.context,
                record.created_at.to_rfc3339(),
            ],
        )?;

        let row_id = conn.last_insert_rowid();
        tracing::debug!(
            "Saved prediction {} for incident {}",
            row_id,
            record.incident_id
        );
        Ok(row_id)
    }

    /// All predictions stored for an incident, oldest first.
    pub fn records_for_incident(
        &self,
        incident_id: &IncidentId,
    ) -> Result<Vec<PredictionRecord>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT incident_id, incident_type, piste_solution, impact_potentiel, context, created_at
             FROM predictions WHERE incident_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![incident_id_to_sql(incident_id)], |row| {
            let created_at: String = row.get(5)?;
            Ok(PredictionRecord {
                incident_id: incident_id_from_sql(row.get(0)?),
                incident_type: row.get(1)?,
                piste_solution: row.get(2)?,
                impact_potentiel: row.get(3)?,
                context: row.get(4)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                    })?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Total number of stored predictions.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
