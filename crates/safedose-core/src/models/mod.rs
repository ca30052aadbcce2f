//! Domain models for the SafeDose core.

mod calculation;
mod dose;
mod dose_log;
mod protocol;
mod syringe;

pub use calculation::*;
pub use dose::*;
pub use dose_log::*;
pub use protocol::*;
pub use syringe::*;
