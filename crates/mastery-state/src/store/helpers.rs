//! Row conversion helpers for the store module

use crate::error::Error;
use crate::record::{CrewRunRecord, PhaseRecord, TaskRecord};
use crate::status::Status;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Format a timestamp for storage
///
/// Fixed-width UTC text, so lexical ordering in SQL matches time ordering.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("invalid timestamp: {e}")))
}

fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>, Error> {
    s.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_status(s: &str) -> Result<Status, Error> {
    s.parse().map_err(Error::Serialization)
}

/// Read the `status` column of a row
pub(crate) fn status_column(row: &SqliteRow) -> Result<Status, Error> {
    let status: String = row.try_get("status")?;
    parse_status(&status)
}

/// Convert a SQLite row to a TaskRecord
pub(crate) fn row_to_task(row: &SqliteRow) -> Result<TaskRecord, Error> {
    let status_str: String = row.try_get("status")?;
    let created_at_str: String = row.try_get("created_at")?;
    let updated_at_str: String = row.try_get("updated_at")?;
    let metadata_str: Option<String> = row.try_get("metadata")?;

    let metadata = metadata_str
        .map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| Error::Serialization(format!("invalid json: {e}")))
        })
        .transpose()?;

    Ok(TaskRecord {
        crew_name: row.try_get("crew_name")?,
        task_id: row.try_get("task_id")?,
        task_name: row.try_get("task_name")?,
        status: parse_status(&status_str)?,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
        artifacts_path: row.try_get("artifacts_path")?,
        metadata,
    })
}

/// Convert a SQLite row to a CrewRunRecord
pub(crate) fn row_to_run(row: &SqliteRow) -> Result<CrewRunRecord, Error> {
    let status_str: String = row.try_get("status")?;
    let started_at_str: String = row.try_get("started_at")?;

    Ok(CrewRunRecord {
        crew_name: row.try_get("crew_name")?,
        run_id: row.try_get("run_id")?,
        status: parse_status(&status_str)?,
        started_at: parse_timestamp(&started_at_str)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
        error_message: row.try_get("error_message")?,
    })
}

/// Convert a SQLite row to a PhaseRecord
pub(crate) fn row_to_phase(row: &SqliteRow) -> Result<PhaseRecord, Error> {
    let number: i64 = row.try_get("phase_number")?;
    let status_str: String = row.try_get("status")?;

    Ok(PhaseRecord {
        phase_number: u32::try_from(number)
            .map_err(|e| Error::Serialization(format!("invalid phase number {number}: {e}")))?,
        phase_name: row.try_get("phase_name")?,
        status: parse_status(&status_str)?,
        started_at: parse_optional_timestamp(row.try_get("started_at")?)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
    })
}
