//! Dosing protocols: schedule generation and next-dose resolution.
//!
//! Pipeline: Protocol form → Scheduler → Repository → Next-Dose Resolver

mod next_dose;
mod scheduler;

pub use next_dose::*;
pub use scheduler::*;
