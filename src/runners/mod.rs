//! One-tick runners for the two task types (§4.E, §4.F). Each `tick()` is
//! driven by the scheduler, which owns polling cadence and cancellation.

pub mod full;
pub mod incremental;
