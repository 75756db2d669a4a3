//! Robot subsystems.
//!
//! - `drive_base`: shifting tank drivetrain with encoders and an IMU

pub mod drive_base;

pub use drive_base::{DriveBase, DriveError, DriveTelemetry};
