//! In-memory guard state for the control loop: the unchanged-file
//! lockout countdown table and the repeat-inspection guard (spec §4.4).

pub mod inspection;
pub mod lockout;

pub use inspection::InspectionGuard;
pub use lockout::LockoutTable;
