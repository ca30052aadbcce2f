//! Next-dose resolution.
//!
//! Recomputed from the injected wall-clock time on every call; nothing is cached.

use chrono::{Datelike, Duration, NaiveDateTime};

use crate::models::{DosingProtocol, NextDose, ProtocolSchedule};

/// Next occurrence of every schedule slot of every active protocol, soonest first.
pub fn get_next_doses(protocols: &[DosingProtocol], now: NaiveDateTime) -> Vec<NextDose> {
    let mut next: Vec<NextDose> = protocols
        .iter()
        .filter(|protocol| protocol.is_active)
        .flat_map(|protocol| next_doses_for(protocol, now))
        .collect();

    next.sort_by(|a, b| a.next_date_time.cmp(&b.next_date_time));
    next
}

/// Next occurrence of each slot of one protocol, unsorted. Ignores `is_active`.
pub fn next_doses_for(protocol: &DosingProtocol, now: NaiveDateTime) -> Vec<NextDose> {
    let dose_info = match protocol.dose_amounts() {
        Ok(dose_info) => dose_info,
        Err(error) => {
            tracing::warn!(
                protocol_id = %protocol.id,
                error = ?error,
                "Skipping protocol with invalid dose values"
            );
            return Vec::new();
        }
    };

    protocol
        .schedule
        .iter()
        .filter_map(|entry| {
            let next_date_time = next_occurrence(entry, now)?;
            Some(NextDose {
                schedule_id: entry.id.clone(),
                protocol_id: protocol.id.clone(),
                next_date_time,
                dose_info,
                compound_name: protocol.compound_name.clone(),
            })
        })
        .collect()
}

/// Next time a slot falls strictly after `now`.
///
/// A slot on today's weekday whose time has already passed (or is exactly now)
/// moves to next week. Returns `None` for a day outside 0..=6 or when the
/// occurrence falls past the last representable date.
pub fn next_occurrence(entry: &ProtocolSchedule, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if entry.day_of_week > 6 {
        tracing::warn!(
            schedule_id = %entry.id,
            day_of_week = entry.day_of_week,
            "Skipping schedule entry with invalid weekday"
        );
        return None;
    }

    let today = now.weekday().num_days_from_sunday();
    let days_until = (entry.day_of_week + 7 - today) % 7;

    let candidate = now
        .date()
        .checked_add_signed(Duration::days(i64::from(days_until)))
        .map(|date| date.and_time(entry.time));
    let next = match candidate {
        Some(candidate) if days_until == 0 && candidate <= now => {
            candidate.checked_add_signed(Duration::days(7))
        }
        other => other,
    };

    if next.is_none() {
        tracing::warn!(
            schedule_id = %entry.id,
            now = %now,
            "Skipping schedule entry beyond the supported date range"
        );
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AmountUnit, ConcentrationUnit, Frequency, NewProtocol};
    use chrono::{NaiveDate, NaiveTime};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn slot(day_of_week: u32, h: u32, m: u32) -> ProtocolSchedule {
        ProtocolSchedule {
            id: format!("slot-{}", day_of_week),
            day_of_week,
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            dose_amount: 1.0,
            unit: AmountUnit::Mg,
        }
    }

    fn protocol(name: &str, frequency: Frequency, start: NaiveDate) -> DosingProtocol {
        DosingProtocol::create(NewProtocol {
            compound_name: name.into(),
            concentration: 10.0,
            concentration_unit: ConcentrationUnit::MgPerMl,
            weekly_target_dose: 14.0,
            frequency,
            start_date: start,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            user_id: None,
        })
        .unwrap()
    }

    #[test]
    fn test_passed_today_moves_to_next_week() {
        // 2024-01-01 is a Monday
        let next = next_occurrence(&slot(1, 10, 0), at(2024, 1, 1, 14, 0)).unwrap();
        assert_eq!(next, at(2024, 1, 8, 10, 0));
    }

    #[test]
    fn test_later_today_stays_today() {
        let next = next_occurrence(&slot(1, 10, 0), at(2024, 1, 1, 9, 59)).unwrap();
        assert_eq!(next, at(2024, 1, 1, 10, 0));
    }

    #[test]
    fn test_exactly_now_moves_to_next_week() {
        let next = next_occurrence(&slot(1, 10, 0), at(2024, 1, 1, 10, 0)).unwrap();
        assert_eq!(next, at(2024, 1, 8, 10, 0));
    }

    #[test]
    fn test_week_wraparound() {
        // Saturday evening, next Sunday slot is tomorrow
        let next = next_occurrence(&slot(0, 8, 0), at(2024, 1, 6, 22, 0)).unwrap();
        assert_eq!(next, at(2024, 1, 7, 8, 0));

        // Wednesday, Monday slot is five days away
        let next = next_occurrence(&slot(1, 8, 0), at(2024, 1, 3, 12, 0)).unwrap();
        assert_eq!(next, at(2024, 1, 8, 8, 0));
    }

    #[test]
    fn test_invalid_weekday_is_skipped() {
        assert!(next_occurrence(&slot(7, 8, 0), at(2024, 1, 3, 12, 0)).is_none());
    }

    #[test]
    fn test_end_of_calendar_is_skipped() {
        let last_day = NaiveDate::MAX.and_hms_opt(23, 0, 0).unwrap();
        let today = last_day.weekday().num_days_from_sunday();

        assert!(next_occurrence(&slot(today, 10, 0), last_day).is_none());
        assert!(next_occurrence(&slot((today + 1) % 7, 10, 0), last_day).is_none());
        assert_eq!(
            next_occurrence(&slot(today, 23, 30), last_day),
            Some(NaiveDate::MAX.and_hms_opt(23, 30, 0).unwrap())
        );

        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let daily = protocol("Daily", Frequency::Daily, monday);
        assert!(get_next_doses(&[daily], last_day).is_empty());
    }

    #[test]
    fn test_sorted_and_inactive_excluded() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let daily = protocol("Daily", Frequency::Daily, monday);
        let weekly = protocol("Weekly", Frequency::OnceWeekly, monday);
        let mut paused = protocol("Paused", Frequency::Daily, monday);
        paused.set_active(false);

        let now = at(2024, 1, 3, 12, 0);
        let next = get_next_doses(&[weekly, paused, daily], now);

        assert_eq!(next.len(), 8);
        assert!(next.iter().all(|n| n.compound_name != "Paused"));
        assert!(next.windows(2).all(|w| w[0].next_date_time <= w[1].next_date_time));
        // Wednesday's 10:00 slot has passed; Thursday is the soonest
        assert_eq!(next[0].next_date_time, at(2024, 1, 4, 10, 0));
        assert!(next.iter().all(|n| n.next_date_time > now));
    }

    #[test]
    fn test_dose_info_attached() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let weekly = protocol("Weekly", Frequency::OnceWeekly, monday);
        let next = get_next_doses(&[weekly.clone()], at(2024, 1, 1, 8, 0));

        assert_eq!(next.len(), 1);
        assert_eq!(next[0].protocol_id, weekly.id);
        assert_eq!(next[0].schedule_id, weekly.schedule[0].id);
        assert_eq!(next[0].dose_info.amount_per_dose, 14.0);
        assert_eq!(next[0].dose_info.volume_per_dose, 1.4);
    }

    #[test]
    fn test_corrupt_protocol_is_skipped() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut broken = protocol("Broken", Frequency::Daily, monday);
        broken.concentration = 0.0;

        assert!(get_next_doses(&[broken], at(2024, 1, 1, 8, 0)).is_empty());
    }
}
