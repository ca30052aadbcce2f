//! SafeDose Core Library
//!
//! Local-first dose volume calculation and dosing protocol scheduling.
//!
//! # Architecture
//!
//! ```text
//! Free text ("5 mg/mL", "10 units") → Unit Parser
//!                                         │
//!                   DoseSpec + ConcentrationSpec + SyringeSpec
//!                                         │
//!                               Dose Volume Calculator
//!                                         │
//!                               Syringe Marking Selector
//!                                         │
//!                  CalculationResult { volume, marking, warnings }
//!                                         │
//!                                    Dose history
//!
//! Protocol form → Scheduler → ProtocolRepository → Next-Dose Resolver
//! ```
//!
//! # Core Principle
//!
//! **Calculations never raise.** Every failure is returned as a value so the
//! caller can show it next to the inputs that caused it.
//!
//! # Modules
//!
//! - [`units`]: Free-text quantity parsing and unit conversion
//! - [`calculator`]: Draw volume and marking selection
//! - [`protocol`]: Schedule generation and next-dose resolution
//! - [`models`]: Domain types (DoseSpec, DosingProtocol, DoseLog, etc.)
//! - [`config`]: Marking catalog and safety range
//! - [`db`]: SQLite persistence for protocols and dose history

pub mod calculator;
pub mod config;
pub mod db;
pub mod models;
pub mod protocol;
pub mod units;

// Re-export commonly used types
pub use calculator::{calculate_volume, select_marking, DoseCalculator};
pub use config::{SafeDoseConfig, VolumeRange};
pub use db::{Database, ProtocolRepository};
pub use models::{
    CalculatedDose, CalculationResult, ConcentrationSpec, DoseLog, DoseSpec, DosingProtocol,
    ErrorKind, Frequency, MarkingCatalog, NewProtocol, NextDose, SyringeSpec, SyringeType, Warning,
};
pub use protocol::{create_schedule, get_next_doses};
pub use units::{parse_amount, parse_quantity, UnitParser};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use models::{AmountUnit, ConcentrationUnit, DoseUnit, ProtocolSchedule};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SafeDoseError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for SafeDoseError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => SafeDoseError::NotFound(what),
            other => SafeDoseError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SafeDoseError {
    fn from(e: serde_json::Error) -> Self {
        SafeDoseError::SerializationError(e.to_string())
    }
}

impl From<config::ConfigError> for SafeDoseError {
    fn from(e: config::ConfigError) -> Self {
        SafeDoseError::ConfigError(e.to_string())
    }
}

impl From<ErrorKind> for SafeDoseError {
    fn from(e: ErrorKind) -> Self {
        SafeDoseError::CalculationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SafeDoseError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        SafeDoseError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<SafeDoseCore>, SafeDoseError> {
    let db = Database::open(&path)?;
    Ok(SafeDoseCore::new(db, DoseCalculator::new()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<SafeDoseCore>, SafeDoseError> {
    let db = Database::open_in_memory()?;
    Ok(SafeDoseCore::new(db, DoseCalculator::new()))
}

/// Open a database and calculate with a JSON configuration
/// (custom marking catalog and/or safety range).
#[uniffi::export]
pub fn open_database_with_config(
    path: String,
    config_json: String,
) -> Result<Arc<SafeDoseCore>, SafeDoseError> {
    let config = SafeDoseConfig::from_json_str(&config_json)?;
    let db = Database::open(&path)?;
    Ok(SafeDoseCore::new(db, DoseCalculator::with_config(config)))
}

/// Install a `tracing` subscriber writing to stderr.
///
/// `filter` uses `RUST_LOG` syntax, e.g. `"safedose_core=debug"`. Calling it
/// again after a subscriber is installed has no effect.
#[uniffi::export]
pub fn init_logging(filter: String) -> Result<(), SafeDoseError> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|e| SafeDoseError::InvalidInput(format!("Invalid log filter: {}", e)))?;

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialized");
    }
    Ok(())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe calculator and database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct SafeDoseCore {
    db: Arc<Mutex<Database>>,
    calculator: DoseCalculator,
}

impl SafeDoseCore {
    fn new(db: Database, calculator: DoseCalculator) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            calculator,
        })
    }
}

#[uniffi::export]
impl SafeDoseCore {
    // =========================================================================
    // Calculator Operations
    // =========================================================================

    /// Calculate the volume to draw. Calculation failures are reported in
    /// the result; only unrecognized unit or syringe labels are errors.
    pub fn calculate_volume(
        &self,
        request: FfiDoseRequest,
    ) -> Result<FfiCalculationResult, SafeDoseError> {
        let input = DoseInput::try_from(&request)?;
        let result = self.calculator.calculate_volume(
            &input.dose,
            input.concentration.as_ref(),
            &input.syringe,
        );
        Ok(FfiCalculationResult::new(result, input.syringe.syringe_type))
    }

    /// Nearest marking for a volume already on the syringe's scale.
    pub fn select_marking(
        &self,
        volume: f64,
        syringe_type: String,
        syringe_volume: String,
    ) -> Result<FfiMarkingSelection, SafeDoseError> {
        let syringe = SyringeSpec::new(parse_syringe_type(&syringe_type)?, syringe_volume);
        let markings = self.calculator.config().marking_catalog.markings_for(&syringe)?;
        Ok(calculator::select_marking(volume, markings)?.into())
    }

    /// Parse a free-text quantity. Never fails.
    pub fn parse_quantity(&self, input: String) -> FfiParsedQuantity {
        units::parse_quantity(&input).into()
    }

    /// Syringe volume labels known for a syringe type.
    pub fn syringe_labels(&self, syringe_type: String) -> Result<Vec<String>, SafeDoseError> {
        let syringe_type = parse_syringe_type(&syringe_type)?;
        Ok(self.calculator.config().marking_catalog.labels(syringe_type))
    }

    // =========================================================================
    // Protocol Operations
    // =========================================================================

    /// Create a protocol, generate its schedule and persist it.
    pub fn create_protocol(&self, input: FfiNewProtocol) -> Result<FfiProtocol, SafeDoseError> {
        let new_protocol = NewProtocol::try_from(input)?;
        let protocol = DosingProtocol::create(new_protocol)?;

        let db = self.db.lock()?;
        db.save_protocol(&protocol)?;
        Ok(protocol.into())
    }

    /// Get a protocol by ID. Protocols of other users are not visible.
    pub fn get_protocol(
        &self,
        user_id: Option<String>,
        protocol_id: String,
    ) -> Result<Option<FfiProtocol>, SafeDoseError> {
        let db = self.db.lock()?;
        let protocol = db
            .load_protocol(&protocol_id)?
            .filter(|p| p.is_owned_by(user_id.as_deref()));
        Ok(protocol.map(|p| p.into()))
    }

    /// List protocols of a user (`None` for local-only protocols).
    pub fn list_protocols(
        &self,
        user_id: Option<String>,
    ) -> Result<Vec<FfiProtocol>, SafeDoseError> {
        let db = self.db.lock()?;
        let protocols = db.list_protocols(user_id.as_deref())?;
        Ok(protocols.into_iter().map(|p| p.into()).collect())
    }

    /// Activate or pause a protocol. Returns false if the user owns no such protocol.
    pub fn set_protocol_active(
        &self,
        user_id: Option<String>,
        protocol_id: String,
        active: bool,
    ) -> Result<bool, SafeDoseError> {
        let db = self.db.lock()?;
        Ok(db.set_protocol_active(&protocol_id, user_id.as_deref(), active)?)
    }

    /// Delete a protocol. Logged doses keep their history but lose the link.
    pub fn delete_protocol(
        &self,
        user_id: Option<String>,
        protocol_id: String,
    ) -> Result<bool, SafeDoseError> {
        let db = self.db.lock()?;
        Ok(db.delete_protocol(&protocol_id, user_id.as_deref())?)
    }

    /// Per-dose amounts of a stored protocol.
    pub fn dose_amounts(
        &self,
        user_id: Option<String>,
        protocol_id: String,
    ) -> Result<FfiCalculatedDose, SafeDoseError> {
        let db = self.db.lock()?;
        let protocol = load_owned(&db, &protocol_id, user_id.as_deref())?;
        Ok(protocol.dose_amounts()?.into())
    }

    /// Upcoming doses across a user's active protocols, soonest first.
    ///
    /// `now` is local wall-clock time as `YYYY-MM-DDTHH:MM[:SS]`.
    pub fn next_doses(
        &self,
        user_id: Option<String>,
        now: String,
    ) -> Result<Vec<FfiNextDose>, SafeDoseError> {
        let now = parse_local_datetime(&now)?;
        let db = self.db.lock()?;
        let protocols = db.list_protocols(user_id.as_deref())?;
        Ok(get_next_doses(&protocols, now)
            .into_iter()
            .map(|d| d.into())
            .collect())
    }

    // =========================================================================
    // Dose History Operations
    // =========================================================================

    /// Calculate a dose and record it. A failed calculation is not logged, and
    /// a linked protocol must belong to the same user.
    pub fn log_dose(&self, request: FfiLogDoseRequest) -> Result<FfiDoseLog, SafeDoseError> {
        let input = DoseInput::try_from(&request.dose)?;
        let result = self.calculator.calculate_volume(
            &input.dose,
            input.concentration.as_ref(),
            &input.syringe,
        );
        if let Some(error) = result.error {
            return Err(error.into());
        }

        let mut log = DoseLog::from_calculation(
            request.substance_name,
            &input.dose,
            &input.syringe,
            &result,
        )
        .ok_or_else(|| SafeDoseError::CalculationError("calculation produced no volume".into()))?;

        let db = self.db.lock()?;
        if let Some(protocol_id) = &request.protocol_id {
            load_owned(&db, protocol_id, request.user_id.as_deref())?;
        }

        log.user_id = request.user_id;
        log.protocol_id = request.protocol_id;
        log.notes = request.notes;
        db.insert_dose_log(&log)?;
        Ok(log.into())
    }

    /// Most recent logged doses, newest first.
    pub fn list_dose_logs(
        &self,
        user_id: Option<String>,
        limit: u32,
    ) -> Result<Vec<FfiDoseLog>, SafeDoseError> {
        let db = self.db.lock()?;
        let logs = db.list_dose_logs(user_id.as_deref(), limit as usize)?;
        Ok(logs.into_iter().map(|l| l.into()).collect())
    }
}

// =========================================================================
// Input Parsing
// =========================================================================

struct DoseInput {
    dose: DoseSpec,
    concentration: Option<ConcentrationSpec>,
    syringe: SyringeSpec,
}

impl TryFrom<&FfiDoseRequest> for DoseInput {
    type Error = SafeDoseError;

    fn try_from(request: &FfiDoseRequest) -> Result<Self, Self::Error> {
        let unit = DoseUnit::from_label(&request.dose_unit)
            .ok_or_else(|| invalid("dose unit", &request.dose_unit))?;

        let concentration = match &request.concentration {
            None => None,
            Some(FfiConcentration::Direct { amount, unit }) => {
                let unit = ConcentrationUnit::from_label(unit)
                    .ok_or_else(|| invalid("concentration unit", unit))?;
                Some(ConcentrationSpec::direct(*amount, unit))
            }
            Some(FfiConcentration::FromTotal {
                total_amount,
                total_amount_unit,
                solution_volume_ml,
            }) => {
                let unit = AmountUnit::from_label(total_amount_unit)
                    .ok_or_else(|| invalid("total amount unit", total_amount_unit))?;
                Some(ConcentrationSpec::from_total(*total_amount, unit, *solution_volume_ml))
            }
        };

        Ok(Self {
            dose: DoseSpec::new(request.dose_value, unit),
            concentration,
            syringe: SyringeSpec::new(
                parse_syringe_type(&request.syringe_type)?,
                request.syringe_volume.clone(),
            ),
        })
    }
}

/// Load a protocol owned by `user_id`; another user's protocol is `NotFound`.
fn load_owned(
    db: &Database,
    protocol_id: &str,
    user_id: Option<&str>,
) -> Result<DosingProtocol, SafeDoseError> {
    db.load_protocol(protocol_id)?
        .filter(|p| p.is_owned_by(user_id))
        .ok_or_else(|| SafeDoseError::NotFound(format!("protocol {}", protocol_id)))
}

fn invalid(what: &str, value: &str) -> SafeDoseError {
    SafeDoseError::InvalidInput(format!("Unknown {}: {}", what, value))
}

fn parse_syringe_type(label: &str) -> Result<SyringeType, SafeDoseError> {
    SyringeType::from_label(label).ok_or_else(|| invalid("syringe type", label))
}

fn parse_local_datetime(value: &str) -> Result<NaiveDateTime, SafeDoseError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .map_err(|_| invalid("date-time", value))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe concentration input.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiConcentration {
    Direct {
        amount: f64,
        unit: String,
    },
    FromTotal {
        total_amount: f64,
        total_amount_unit: String,
        solution_volume_ml: f64,
    },
}

/// FFI-safe dose calculation request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseRequest {
    pub dose_value: f64,
    pub dose_unit: String,
    pub concentration: Option<FfiConcentration>,
    pub syringe_type: String,
    pub syringe_volume: String,
}

/// FFI-safe calculation result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalculationResult {
    pub calculated_volume: Option<f64>,
    pub volume_ml: Option<f64>,
    pub recommended_marking: Option<f64>,
    pub marking_label: String,
    /// "mL" or "units", the scale the volume and marking are read on
    pub scale_unit: String,
    pub warnings: Vec<String>,
    pub warning_messages: Vec<String>,
    pub error: Option<String>,
    pub error_message: Option<String>,
}

impl FfiCalculationResult {
    fn new(result: CalculationResult, syringe_type: SyringeType) -> Self {
        Self {
            marking_label: result.marking_label(),
            scale_unit: syringe_type.scale_unit().to_string(),
            calculated_volume: result.calculated_volume,
            volume_ml: result.volume_ml,
            recommended_marking: result.recommended_marking,
            warnings: result.warnings.iter().map(|w| format!("{:?}", w)).collect(),
            warning_messages: result
                .warnings
                .iter()
                .map(|w| w.message().to_string())
                .collect(),
            error: result.error.map(|e| format!("{:?}", e)),
            error_message: result.error.map(|e| e.to_string()),
        }
    }
}

/// FFI-safe marking selection.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMarkingSelection {
    pub marking: f64,
    pub warning: Option<String>,
}

impl From<models::MarkingSelection> for FfiMarkingSelection {
    fn from(selection: models::MarkingSelection) -> Self {
        Self {
            marking: selection.marking,
            warning: selection.warning.map(|w| format!("{:?}", w)),
        }
    }
}

/// FFI-safe parsed quantity.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParsedQuantity {
    /// `None` when the text had no number
    pub amount: Option<f64>,
    /// Original text when no number was found
    pub opaque_text: Option<String>,
    pub unit: Option<String>,
    pub family: Option<String>,
}

impl From<units::ParsedQuantity> for FfiParsedQuantity {
    fn from(parsed: units::ParsedQuantity) -> Self {
        let (amount, opaque_text) = match parsed.amount {
            units::Amount::Numeric(value) => (Some(value), None),
            units::Amount::Opaque(text) => (None, Some(text)),
        };
        Self {
            amount,
            opaque_text,
            unit: parsed.unit.map(|u| u.as_str().to_string()),
            family: parsed.unit.map(|u| format!("{:?}", u.family())),
        }
    }
}

/// FFI-safe protocol creation input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewProtocol {
    pub compound_name: String,
    pub concentration: f64,
    pub concentration_unit: String,
    pub weekly_target_dose: f64,
    /// "1x-week", "2x-week", "3x-week" or "daily"
    pub frequency: String,
    /// YYYY-MM-DD
    pub start_date: String,
    /// HH:MM
    pub start_time: String,
    pub user_id: Option<String>,
}

impl TryFrom<FfiNewProtocol> for NewProtocol {
    type Error = SafeDoseError;

    fn try_from(input: FfiNewProtocol) -> Result<Self, Self::Error> {
        let concentration_unit = ConcentrationUnit::from_label(&input.concentration_unit)
            .ok_or_else(|| invalid("concentration unit", &input.concentration_unit))?;
        let frequency: Frequency = input
            .frequency
            .parse()
            .map_err(SafeDoseError::InvalidInput)?;
        let start_date = NaiveDate::parse_from_str(input.start_date.trim(), "%Y-%m-%d")
            .map_err(|_| invalid("start date", &input.start_date))?;
        let start_time = models::parse_hhmm(&input.start_time)
            .ok_or_else(|| invalid("start time", &input.start_time))?;

        Ok(NewProtocol {
            compound_name: input.compound_name,
            concentration: input.concentration,
            concentration_unit,
            weekly_target_dose: input.weekly_target_dose,
            frequency,
            start_date,
            start_time,
            user_id: input.user_id,
        })
    }
}

/// FFI-safe schedule entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScheduleEntry {
    pub id: String,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u32,
    pub time: String,
    pub dose_amount: f64,
    pub unit: String,
}

impl From<ProtocolSchedule> for FfiScheduleEntry {
    fn from(entry: ProtocolSchedule) -> Self {
        Self {
            id: entry.id,
            day_of_week: entry.day_of_week,
            time: entry.time.format("%H:%M").to_string(),
            dose_amount: entry.dose_amount,
            unit: entry.unit.as_str().to_string(),
        }
    }
}

/// FFI-safe dosing protocol.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProtocol {
    pub id: String,
    pub compound_name: String,
    pub concentration: f64,
    pub concentration_unit: String,
    pub weekly_target_dose: f64,
    pub weekly_target_unit: String,
    pub frequency: String,
    pub start_date: String,
    pub start_time: String,
    pub schedule: Vec<FfiScheduleEntry>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub user_id: Option<String>,
}

impl From<DosingProtocol> for FfiProtocol {
    fn from(protocol: DosingProtocol) -> Self {
        Self {
            id: protocol.id,
            compound_name: protocol.compound_name,
            concentration: protocol.concentration,
            concentration_unit: protocol.concentration_unit.as_str().to_string(),
            weekly_target_dose: protocol.weekly_target_dose,
            weekly_target_unit: protocol.weekly_target_unit.as_str().to_string(),
            frequency: protocol.frequency.as_str().to_string(),
            start_date: protocol.start_date.format("%Y-%m-%d").to_string(),
            start_time: protocol.start_time.format("%H:%M").to_string(),
            schedule: protocol.schedule.into_iter().map(|e| e.into()).collect(),
            is_active: protocol.is_active,
            created_at: protocol.created_at,
            updated_at: protocol.updated_at,
            user_id: protocol.user_id,
        }
    }
}

/// FFI-safe per-dose amounts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalculatedDose {
    pub amount_per_dose: f64,
    pub volume_per_dose: f64,
    pub syringe_units: f64,
    pub syringe_type: String,
}

impl From<CalculatedDose> for FfiCalculatedDose {
    fn from(dose: CalculatedDose) -> Self {
        Self {
            amount_per_dose: dose.amount_per_dose,
            volume_per_dose: dose.volume_per_dose,
            syringe_units: dose.syringe_units,
            syringe_type: dose.syringe_type.as_str().to_string(),
        }
    }
}

/// FFI-safe upcoming dose.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNextDose {
    pub schedule_id: String,
    pub protocol_id: String,
    /// YYYY-MM-DDTHH:MM:SS, local wall-clock time
    pub next_date_time: String,
    pub dose_info: FfiCalculatedDose,
    pub compound_name: String,
}

impl From<NextDose> for FfiNextDose {
    fn from(dose: NextDose) -> Self {
        Self {
            schedule_id: dose.schedule_id,
            protocol_id: dose.protocol_id,
            next_date_time: dose.next_date_time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            dose_info: dose.dose_info.into(),
            compound_name: dose.compound_name,
        }
    }
}

/// FFI-safe request to calculate and record a dose.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLogDoseRequest {
    pub substance_name: String,
    pub dose: FfiDoseRequest,
    pub protocol_id: Option<String>,
    pub user_id: Option<String>,
    pub notes: Option<String>,
}

/// FFI-safe dose log entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoseLog {
    pub id: String,
    pub user_id: Option<String>,
    pub protocol_id: Option<String>,
    pub substance_name: String,
    pub dose_value: f64,
    pub unit: String,
    pub calculated_volume: f64,
    pub volume_ml: f64,
    pub syringe_type: String,
    pub recommended_marking: Option<f64>,
    pub logged_at: String,
    pub notes: Option<String>,
}

impl From<DoseLog> for FfiDoseLog {
    fn from(log: DoseLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            protocol_id: log.protocol_id,
            substance_name: log.substance_name,
            dose_value: log.dose_value,
            unit: log.unit.as_str().to_string(),
            calculated_volume: log.calculated_volume,
            volume_ml: log.volume_ml,
            syringe_type: log.syringe_type.as_str().to_string(),
            recommended_marking: log.recommended_marking,
            logged_at: log.logged_at,
            notes: log.notes,
        }
    }
}
