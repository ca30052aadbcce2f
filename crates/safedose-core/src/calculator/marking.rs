//! Syringe marking selection.
//!
//! Rules:
//! - Below the first marking: first marking, `BelowMinimum`
//! - Above the last marking: last marking, `ExceedsCapacity`
//! - Otherwise the nearest marking; ties go to the lower one (under-draw)

use crate::models::{validate_markings, ErrorKind, MarkingSelection, Warning};

const RELATIVE_TOLERANCE: f64 = 1e-9;

/// Pick the marking to draw to for a volume on the syringe scale.
pub fn select_marking(volume: f64, markings: &[f64]) -> Result<MarkingSelection, ErrorKind> {
    validate_markings(markings)?;
    if !volume.is_finite() {
        return Err(ErrorKind::InvalidDose);
    }

    // validated as non-empty above
    let (min, max) = (markings[0], markings[markings.len() - 1]);
    // Decimal markings are inexact in binary; absorb that drift.
    let tolerance = RELATIVE_TOLERANCE * max;

    if volume < min - tolerance {
        return Ok(MarkingSelection {
            marking: min,
            warning: Some(Warning::BelowMinimum),
        });
    }
    if volume > max + tolerance {
        return Ok(MarkingSelection {
            marking: max,
            warning: Some(Warning::ExceedsCapacity),
        });
    }
    let volume = volume.clamp(min, max);

    // First marking >= volume; exists because volume <= max.
    let upper_idx = markings.partition_point(|m| *m < volume);
    let upper = markings[upper_idx];
    if upper_idx == 0 {
        return Ok(MarkingSelection {
            marking: upper,
            warning: None,
        });
    }

    let lower = markings[upper_idx - 1];
    let (to_lower, to_upper) = (volume - lower, upper - volume);
    // Round up only when the upper marking is clearly nearer.
    let marking = if to_lower - to_upper > RELATIVE_TOLERANCE * (upper - lower) {
        upper
    } else {
        lower
    };

    Ok(MarkingSelection {
        marking,
        warning: None,
    })
}
