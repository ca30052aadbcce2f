//! Weekly schedule generation and per-dose amounts.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use crate::models::{
    is_positive, CalculatedDose, ConcentrationUnit, DosingProtocol, ErrorKind, Frequency,
    NewProtocol, ProtocolSchedule, SyringeSize,
};

/// Generate the recurring slots of a protocol.
///
/// Doses are spread evenly: every entry carries `weekly_target_dose / doses_per_week`.
/// Daily protocols get one entry per weekday (Sunday first); other frequencies
/// step from `start_date` by `days_between`, truncated to whole days.
pub fn create_schedule(
    weekly_target_dose: f64,
    frequency: Frequency,
    concentration: f64,
    concentration_unit: ConcentrationUnit,
    start_date: NaiveDate,
    start_time: NaiveTime,
) -> Result<Vec<ProtocolSchedule>, ErrorKind> {
    if !is_positive(weekly_target_dose) {
        return Err(ErrorKind::InvalidDose);
    }
    if !is_positive(concentration) {
        return Err(ErrorKind::InvalidConcentration);
    }

    let doses_per_week = frequency.doses_per_week();
    let dose_amount = weekly_target_dose / f64::from(doses_per_week);
    let unit = concentration_unit.amount_unit();

    let entry = |day_of_week: u32| ProtocolSchedule {
        id: uuid::Uuid::new_v4().to_string(),
        day_of_week,
        time: start_time,
        dose_amount,
        unit,
    };

    let schedule = match frequency {
        Frequency::Daily => (0..7).map(entry).collect(),
        _ => (0..doses_per_week)
            .map(|i| {
                let offset = (f64::from(i) * frequency.days_between()).trunc() as i64;
                let date = start_date + Duration::days(offset);
                entry(date.weekday().num_days_from_sunday())
            })
            .collect(),
    };

    Ok(schedule)
}

/// Per-dose amount, volume and recommended syringe for a protocol.
pub fn calculate_dose_amounts(protocol: &DosingProtocol) -> Result<CalculatedDose, ErrorKind> {
    dose_amounts(
        protocol.weekly_target_dose,
        protocol.frequency,
        protocol.concentration,
    )
}

/// Per-dose amounts from raw protocol values.
pub fn dose_amounts(
    weekly_target_dose: f64,
    frequency: Frequency,
    concentration: f64,
) -> Result<CalculatedDose, ErrorKind> {
    if !is_positive(weekly_target_dose) {
        return Err(ErrorKind::InvalidDose);
    }
    if !is_positive(concentration) {
        return Err(ErrorKind::InvalidConcentration);
    }

    let amount_per_dose = weekly_target_dose / f64::from(frequency.doses_per_week());
    let volume_per_dose = amount_per_dose / concentration;
    let syringe_type = SyringeSize::for_volume(volume_per_dose);
    let syringe_units = match syringe_type {
        SyringeSize::OneMl => volume_per_dose * 100.0,
        _ => volume_per_dose,
    };

    Ok(CalculatedDose {
        amount_per_dose,
        volume_per_dose,
        syringe_units,
        syringe_type,
    })
}

impl DosingProtocol {
    /// Create a protocol and generate its schedule.
    pub fn create(new: NewProtocol) -> Result<Self, ErrorKind> {
        let schedule = create_schedule(
            new.weekly_target_dose,
            new.frequency,
            new.concentration,
            new.concentration_unit,
            new.start_date,
            new.start_time,
        )?;

        let now = chrono::Utc::now().to_rfc3339();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            compound_name: new.compound_name.trim().to_string(),
            concentration: new.concentration,
            concentration_unit: new.concentration_unit,
            weekly_target_dose: new.weekly_target_dose,
            weekly_target_unit: new.concentration_unit.amount_unit(),
            frequency: new.frequency,
            start_date: new.start_date,
            start_time: new.start_time,
            schedule,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
            user_id: new.user_id,
        })
    }

    /// Per-dose amounts for this protocol.
    pub fn dose_amounts(&self) -> Result<CalculatedDose, ErrorKind> {
        calculate_dose_amounts(self)
    }
}
