//! Dose history database operations.

use rusqlite::{params, Row};

use super::{Database, DbError, DbResult};
use crate::models::{DoseLog, DoseUnit, SyringeType};

impl Database {
    /// Record a dose.
    pub fn insert_dose_log(&self, log: &DoseLog) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO dose_logs (
                id, user_id, protocol_id, substance_name, dose_value, unit,
                calculated_volume, volume_ml, syringe_type, recommended_marking,
                logged_at, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                log.id,
                log.user_id,
                log.protocol_id,
                log.substance_name,
                log.dose_value,
                log.unit.as_str(),
                log.calculated_volume,
                log.volume_ml,
                log.syringe_type.as_str(),
                log.recommended_marking,
                log.logged_at,
                log.notes,
            ],
        )?;
        tracing::debug!(log_id = %log.id, "Recorded dose");
        Ok(())
    }

    /// Most recent doses of a user (`None` for local-only history), newest first.
    pub fn list_dose_logs(&self, user_id: Option<&str>, limit: usize) -> DbResult<Vec<DoseLog>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, protocol_id, substance_name, dose_value, unit,
                   calculated_volume, volume_ml, syringe_type, recommended_marking,
                   logged_at, notes
            FROM dose_logs
            WHERE user_id IS ?1
            ORDER BY logged_at DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit as i64], DoseLogRow::from_row)?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?.try_into()?);
        }
        Ok(logs)
    }

    /// Doses recorded against a protocol, newest first.
    pub fn list_dose_logs_for_protocol(&self, protocol_id: &str) -> DbResult<Vec<DoseLog>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, protocol_id, substance_name, dose_value, unit,
                   calculated_volume, volume_ml, syringe_type, recommended_marking,
                   logged_at, notes
            FROM dose_logs
            WHERE protocol_id = ?
            ORDER BY logged_at DESC
            "#,
        )?;

        let rows = stmt.query_map([protocol_id], DoseLogRow::from_row)?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?.try_into()?);
        }
        Ok(logs)
    }

    /// Delete a dose log entry.
    pub fn delete_dose_log(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM dose_logs WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct DoseLogRow {
    id: String,
    user_id: Option<String>,
    protocol_id: Option<String>,
    substance_name: String,
    dose_value: f64,
    unit: String,
    calculated_volume: f64,
    volume_ml: f64,
    syringe_type: String,
    recommended_marking: Option<f64>,
    logged_at: String,
    notes: Option<String>,
}

impl DoseLogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            protocol_id: row.get(2)?,
            substance_name: row.get(3)?,
            dose_value: row.get(4)?,
            unit: row.get(5)?,
            calculated_volume: row.get(6)?,
            volume_ml: row.get(7)?,
            syringe_type: row.get(8)?,
            recommended_marking: row.get(9)?,
            logged_at: row.get(10)?,
            notes: row.get(11)?,
        })
    }
}

impl TryFrom<DoseLogRow> for DoseLog {
    type Error = DbError;

    fn try_from(row: DoseLogRow) -> Result<Self, Self::Error> {
        let unit = DoseUnit::from_label(&row.unit)
            .ok_or_else(|| DbError::Constraint(format!("Unknown dose unit: {}", row.unit)))?;
        let syringe_type = SyringeType::from_label(&row.syringe_type).ok_or_else(|| {
            DbError::Constraint(format!("Unknown syringe type: {}", row.syringe_type))
        })?;

        Ok(DoseLog {
            id: row.id,
            user_id: row.user_id,
            protocol_id: row.protocol_id,
            substance_name: row.substance_name,
            dose_value: row.dose_value,
            unit,
            calculated_volume: row.calculated_volume,
            volume_ml: row.volume_ml,
            syringe_type,
            recommended_marking: row.recommended_marking,
            logged_at: row.logged_at,
            notes: row.notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ProtocolRepository;
    use crate::models::{
        CalculationResult, ConcentrationUnit, DoseSpec, DosingProtocol, Frequency, NewProtocol,
        SyringeSpec,
    };
    use chrono::{NaiveDate, NaiveTime};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_log(substance: &str, logged_at: &str) -> DoseLog {
        let dose = DoseSpec::new(5.0, DoseUnit::Mg);
        let syringe = SyringeSpec::new(SyringeType::Standard, "3 ml");
        let result = CalculationResult::success(0.5, 0.5, 0.5, vec![]);
        let mut log = DoseLog::from_calculation(substance.into(), &dose, &syringe, &result).unwrap();
        log.logged_at = logged_at.into();
        log
    }

    #[test]
    fn test_insert_and_list() {
        let db = setup_db();
        db.insert_dose_log(&make_log("First", "2024-01-01T10:00:00+00:00"))
            .unwrap();
        db.insert_dose_log(&make_log("Second", "2024-01-02T10:00:00+00:00"))
            .unwrap();

        let logs = db.list_dose_logs(None, 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].substance_name, "Second");
        assert_eq!(logs[1].unit, DoseUnit::Mg);
        assert_eq!(logs[1].recommended_marking, Some(0.5));

        let limited = db.list_dose_logs(None, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_history_is_per_user() {
        let db = setup_db();
        let mut log = make_log("Mine", "2024-01-01T10:00:00+00:00");
        log.user_id = Some("user-1".into());
        db.insert_dose_log(&log).unwrap();
        db.insert_dose_log(&make_log("Local", "2024-01-01T11:00:00+00:00"))
            .unwrap();

        let mine = db.list_dose_logs(Some("user-1"), 10).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].substance_name, "Mine");
    }

    #[test]
    fn test_protocol_link_survives_protocol_delete() {
        let db = setup_db();
        let protocol = DosingProtocol::create(NewProtocol {
            compound_name: "C".into(),
            concentration: 10.0,
            concentration_unit: ConcentrationUnit::MgPerMl,
            weekly_target_dose: 10.0,
            frequency: Frequency::OnceWeekly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            user_id: None,
        })
        .unwrap();
        db.save_protocol(&protocol).unwrap();

        let mut log = make_log("C", "2024-01-01T09:00:00+00:00");
        log.protocol_id = Some(protocol.id.clone());
        db.insert_dose_log(&log).unwrap();
        assert_eq!(db.list_dose_logs_for_protocol(&protocol.id).unwrap().len(), 1);

        db.delete_protocol(&protocol.id, None).unwrap();

        let logs = db.list_dose_logs(None, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].protocol_id, None);
    }

    #[test]
    fn test_delete_log() {
        let db = setup_db();
        let log = make_log("X", "2024-01-01T10:00:00+00:00");
        db.insert_dose_log(&log).unwrap();

        assert!(db.delete_dose_log(&log.id).unwrap());
        assert!(db.list_dose_logs(None, 10).unwrap().is_empty());
    }
}
