//! Dosing protocol models.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::dose::{AmountUnit, ConcentrationUnit};

/// How often a protocol doses within a week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Frequency {
    #[serde(rename = "1x-week")]
    OnceWeekly,
    #[serde(rename = "2x-week")]
    TwiceWeekly,
    #[serde(rename = "3x-week")]
    ThriceWeekly,
    #[serde(rename = "daily")]
    Daily,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::OnceWeekly,
        Frequency::TwiceWeekly,
        Frequency::ThriceWeekly,
        Frequency::Daily,
    ];

    pub fn doses_per_week(&self) -> u32 {
        match self {
            Frequency::OnceWeekly => 1,
            Frequency::TwiceWeekly => 2,
            Frequency::ThriceWeekly => 3,
            Frequency::Daily => 7,
        }
    }

    /// Spacing between doses in days. Fractional; truncated when applied to dates.
    pub fn days_between(&self) -> f64 {
        match self {
            Frequency::OnceWeekly => 7.0,
            Frequency::TwiceWeekly => 3.5,
            Frequency::ThriceWeekly => 2.33,
            Frequency::Daily => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OnceWeekly => "1x-week",
            Frequency::TwiceWeekly => "2x-week",
            Frequency::ThriceWeekly => "3x-week",
            Frequency::Daily => "daily",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::ALL
            .iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown frequency: {}", s))
    }
}

/// Syringe size recommended for a protocol dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyringeSize {
    #[serde(rename = "1mL")]
    OneMl,
    #[serde(rename = "3mL")]
    ThreeMl,
    #[serde(rename = "5mL")]
    FiveMl,
    #[serde(rename = "10mL")]
    TenMl,
}

impl SyringeSize {
    /// Smallest syringe that holds the volume.
    pub fn for_volume(volume_ml: f64) -> Self {
        if volume_ml > 5.0 {
            SyringeSize::TenMl
        } else if volume_ml > 3.0 {
            SyringeSize::FiveMl
        } else if volume_ml > 1.0 {
            SyringeSize::ThreeMl
        } else {
            SyringeSize::OneMl
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyringeSize::OneMl => "1mL",
            SyringeSize::ThreeMl => "3mL",
            SyringeSize::FiveMl => "5mL",
            SyringeSize::TenMl => "10mL",
        }
    }
}

/// One recurring slot within a protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolSchedule {
    pub id: String,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u32,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub dose_amount: f64,
    pub unit: AmountUnit,
}

/// A recurring dosing plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosingProtocol {
    pub id: String,
    pub compound_name: String,
    /// Concentration of the prepared vial
    pub concentration: f64,
    pub concentration_unit: ConcentrationUnit,
    pub weekly_target_dose: f64,
    pub weekly_target_unit: AmountUnit,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    /// Generated at creation
    pub schedule: Vec<ProtocolSchedule>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Owner; `None` for a local-only protocol
    pub user_id: Option<String>,
}

impl DosingProtocol {
    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Activate or pause the protocol.
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.touch();
    }

    /// `None` matches local-only protocols.
    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        self.user_id.as_deref() == user_id
    }
}

/// Input for creating a protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProtocol {
    pub compound_name: String,
    pub concentration: f64,
    pub concentration_unit: ConcentrationUnit,
    pub weekly_target_dose: f64,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub user_id: Option<String>,
}

/// Per-dose amounts derived from a protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CalculatedDose {
    pub amount_per_dose: f64,
    /// mL
    pub volume_per_dose: f64,
    /// Reading on the recommended syringe (units on a 1 mL syringe, mL otherwise)
    pub syringe_units: f64,
    pub syringe_type: SyringeSize,
}

/// The next occurrence of a scheduled dose. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NextDose {
    pub schedule_id: String,
    pub protocol_id: String,
    pub next_date_time: NaiveDateTime,
    pub dose_info: CalculatedDose,
    pub compound_name: String,
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// `HH:MM` serde representation for schedule times.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_hhmm(&raw)
            .ok_or_else(|| de::Error::custom(format!("expected HH:MM, got {:?}", raw)))
    }
}
