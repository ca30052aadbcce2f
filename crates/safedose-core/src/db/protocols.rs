//! Dosing protocol database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult, ProtocolRepository};
use crate::models::{
    parse_hhmm, AmountUnit, ConcentrationUnit, DosingProtocol, Frequency, ProtocolSchedule,
};

const PROTOCOL_COLUMNS: &str = r#"
    id, user_id, compound_name, concentration, concentration_unit,
    weekly_target_dose, weekly_target_unit, frequency, start_date, start_time,
    schedule, is_active, created_at, updated_at
"#;

impl ProtocolRepository for Database {
    fn save_protocol(&self, protocol: &DosingProtocol) -> DbResult<()> {
        let schedule_json = serde_json::to_string(&protocol.schedule)?;

        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO dosing_protocols (
                id, user_id, compound_name, concentration, concentration_unit,
                weekly_target_dose, weekly_target_unit, frequency, start_date, start_time,
                schedule, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                compound_name = excluded.compound_name,
                concentration = excluded.concentration,
                concentration_unit = excluded.concentration_unit,
                weekly_target_dose = excluded.weekly_target_dose,
                weekly_target_unit = excluded.weekly_target_unit,
                frequency = excluded.frequency,
                start_date = excluded.start_date,
                start_time = excluded.start_time,
                schedule = excluded.schedule,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            WHERE dosing_protocols.user_id IS excluded.user_id
            "#,
            params![
                protocol.id,
                protocol.user_id,
                protocol.compound_name,
                protocol.concentration,
                protocol.concentration_unit.as_str(),
                protocol.weekly_target_dose,
                protocol.weekly_target_unit.as_str(),
                protocol.frequency.as_str(),
                protocol.start_date.format("%Y-%m-%d").to_string(),
                protocol.start_time.format("%H:%M").to_string(),
                schedule_json,
                protocol.is_active,
                protocol.created_at,
                protocol.updated_at,
            ],
        )?;

        if rows_affected == 0 {
            tracing::warn!(protocol_id = %protocol.id, "Refused save over another user's protocol");
            return Err(DbError::Constraint(format!(
                "protocol {} belongs to another user",
                protocol.id
            )));
        }

        tracing::debug!(
            protocol_id = %protocol.id,
            frequency = %protocol.frequency,
            slots = protocol.schedule.len(),
            "Saved dosing protocol"
        );
        Ok(())
    }

    fn load_protocol(&self, id: &str) -> DbResult<Option<DosingProtocol>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM dosing_protocols WHERE id = ?", PROTOCOL_COLUMNS),
                [id],
                ProtocolRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    fn list_protocols(&self, user_id: Option<&str>) -> DbResult<Vec<DosingProtocol>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM dosing_protocols WHERE user_id IS ?1 ORDER BY created_at DESC",
            PROTOCOL_COLUMNS
        ))?;

        let rows = stmt.query_map([user_id], ProtocolRow::from_row)?;

        let mut protocols = Vec::new();
        for row in rows {
            protocols.push(row?.try_into()?);
        }
        Ok(protocols)
    }

    fn delete_protocol(&self, id: &str, user_id: Option<&str>) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM dosing_protocols WHERE id = ?1 AND user_id IS ?2",
            params![id, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    fn set_protocol_active(
        &self,
        id: &str,
        user_id: Option<&str>,
        active: bool,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE dosing_protocols SET is_active = ?3, updated_at = ?4
            WHERE id = ?1 AND user_id IS ?2
            "#,
            params![id, user_id, active, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }
}

impl Database {
    /// List only the active protocols of a user.
    pub fn list_active_protocols(&self, user_id: Option<&str>) -> DbResult<Vec<DosingProtocol>> {
        Ok(self
            .list_protocols(user_id)?
            .into_iter()
            .filter(|p| p.is_active)
            .collect())
    }
}

/// Intermediate row struct for database mapping.
struct ProtocolRow {
    id: String,
    user_id: Option<String>,
    compound_name: String,
    concentration: f64,
    concentration_unit: String,
    weekly_target_dose: f64,
    weekly_target_unit: String,
    frequency: String,
    start_date: String,
    start_time: String,
    schedule: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl ProtocolRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            compound_name: row.get(2)?,
            concentration: row.get(3)?,
            concentration_unit: row.get(4)?,
            weekly_target_dose: row.get(5)?,
            weekly_target_unit: row.get(6)?,
            frequency: row.get(7)?,
            start_date: row.get(8)?,
            start_time: row.get(9)?,
            schedule: row.get(10)?,
            is_active: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl TryFrom<ProtocolRow> for DosingProtocol {
    type Error = DbError;

    fn try_from(row: ProtocolRow) -> Result<Self, Self::Error> {
        let schedule: Vec<ProtocolSchedule> = serde_json::from_str(&row.schedule)?;

        let concentration_unit = ConcentrationUnit::from_label(&row.concentration_unit)
            .ok_or_else(|| constraint("concentration unit", &row.concentration_unit))?;
        let weekly_target_unit = AmountUnit::from_label(&row.weekly_target_unit)
            .ok_or_else(|| constraint("weekly target unit", &row.weekly_target_unit))?;
        let frequency: Frequency = row
            .frequency
            .parse()
            .map_err(|_| constraint("frequency", &row.frequency))?;
        let start_date = NaiveDate::parse_from_str(&row.start_date, "%Y-%m-%d")
            .map_err(|_| constraint("start date", &row.start_date))?;
        let start_time =
            parse_hhmm(&row.start_time).ok_or_else(|| constraint("start time", &row.start_time))?;

        Ok(DosingProtocol {
            id: row.id,
            compound_name: row.compound_name,
            concentration: row.concentration,
            concentration_unit,
            weekly_target_dose: row.weekly_target_dose,
            weekly_target_unit,
            frequency,
            start_date,
            start_time,
            schedule,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
        })
    }
}

fn constraint(field: &str, value: &str) -> DbError {
    DbError::Constraint(format!("Unknown {}: {}", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewProtocol;
    use chrono::NaiveTime;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_protocol(name: &str, user_id: Option<&str>) -> DosingProtocol {
        DosingProtocol::create(NewProtocol {
            compound_name: name.into(),
            concentration: 200.0,
            concentration_unit: ConcentrationUnit::MgPerMl,
            weekly_target_dose: 150.0,
            frequency: Frequency::TwiceWeekly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            user_id: user_id.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let db = setup_db();
        let protocol = make_protocol("Test C", Some("user-1"));

        db.save_protocol(&protocol).unwrap();

        let loaded = db.load_protocol(&protocol.id).unwrap().unwrap();
        assert_eq!(loaded, protocol);
    }

    #[test]
    fn test_load_missing() {
        let db = setup_db();
        assert!(db.load_protocol("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_is_upsert() {
        let db = setup_db();
        let mut protocol = make_protocol("Test C", None);
        db.save_protocol(&protocol).unwrap();

        protocol.compound_name = "Renamed".into();
        protocol.touch();
        db.save_protocol(&protocol).unwrap();

        let all = db.list_protocols(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].compound_name, "Renamed");
    }

    #[test]
    fn test_list_by_owner() {
        let db = setup_db();
        db.save_protocol(&make_protocol("A", Some("user-1"))).unwrap();
        db.save_protocol(&make_protocol("B", Some("user-1"))).unwrap();
        db.save_protocol(&make_protocol("C", Some("user-2"))).unwrap();
        db.save_protocol(&make_protocol("Local", None)).unwrap();

        assert_eq!(db.list_protocols(Some("user-1")).unwrap().len(), 2);
        assert_eq!(db.list_protocols(Some("user-2")).unwrap().len(), 1);

        let local = db.list_protocols(None).unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].compound_name, "Local");
    }

    #[test]
    fn test_set_active_and_delete() {
        let db = setup_db();
        let protocol = make_protocol("A", Some("user-1"));
        db.save_protocol(&protocol).unwrap();

        assert!(db.set_protocol_active(&protocol.id, Some("user-1"), false).unwrap());
        assert!(!db.load_protocol(&protocol.id).unwrap().unwrap().is_active);
        assert!(db.list_active_protocols(Some("user-1")).unwrap().is_empty());

        assert!(db.delete_protocol(&protocol.id, Some("user-1")).unwrap());
        assert!(!db.delete_protocol(&protocol.id, Some("user-1")).unwrap());
        assert!(!db.set_protocol_active(&protocol.id, Some("user-1"), true).unwrap());
    }

    #[test]
    fn test_other_users_cannot_mutate() {
        let db = setup_db();
        let protocol = make_protocol("A", Some("user-1"));
        db.save_protocol(&protocol).unwrap();

        assert!(!db.set_protocol_active(&protocol.id, Some("user-2"), false).unwrap());
        assert!(!db.set_protocol_active(&protocol.id, None, false).unwrap());
        assert!(!db.delete_protocol(&protocol.id, Some("user-2")).unwrap());
        assert!(!db.delete_protocol(&protocol.id, None).unwrap());

        let loaded = db.load_protocol(&protocol.id).unwrap().unwrap();
        assert!(loaded.is_active);
    }

    #[test]
    fn test_save_cannot_change_owner() {
        let db = setup_db();
        let protocol = make_protocol("A", Some("user-1"));
        db.save_protocol(&protocol).unwrap();

        let mut hijacked = protocol.clone();
        hijacked.user_id = Some("user-2".into());
        hijacked.compound_name = "Hijacked".into();
        assert!(matches!(
            db.save_protocol(&hijacked),
            Err(DbError::Constraint(_))
        ));

        let mut local = protocol.clone();
        local.user_id = None;
        assert!(matches!(db.save_protocol(&local), Err(DbError::Constraint(_))));

        let loaded = db.load_protocol(&protocol.id).unwrap().unwrap();
        assert_eq!(loaded, protocol);
        assert!(db.list_protocols(Some("user-2")).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let db = setup_db();
        let protocol = make_protocol("A", None);
        db.save_protocol(&protocol).unwrap();

        db.conn()
            .execute(
                "UPDATE dosing_protocols SET concentration_unit = 'grains' WHERE id = ?",
                [&protocol.id],
            )
            .unwrap();

        assert!(matches!(
            db.load_protocol(&protocol.id),
            Err(DbError::Constraint(_))
        ));
    }
}
