//! Command dispatch for the drive base.
//!
//! The scheduler owning the control loop pushes [`DriveCommand`]s into
//! [`DRIVE_CHANNEL`]; [`DriveController::drive_ch`] drains it and applies each
//! command to the [`DriveBase`].

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::utils::{
    config::RobotMap,
    hardware::RobotHardware,
    subsystems::{DriveBase, DriveError, DriveTelemetry},
};

/// Channel used to receive drive commands (`DriveCommand` messages).
pub static DRIVE_CHANNEL: embassy_sync::channel::Channel<CriticalSectionRawMutex, DriveCommand, 16> =
    embassy_sync::channel::Channel::new();

/// Drive command variants.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "dc", rename_all = "snake_case")] // dc = drive command
pub enum DriveCommand {
    /// Tank drive with left and right outputs.
    Move { l: f64, r: f64 },
    ShiftUp,
    ShiftDown,
    ResetDistance,
    ResetGyro,
    /// Report a telemetry snapshot.
    Read,
}

/// Decode one JSON drive command.
pub fn parse_command(bytes: &[u8]) -> Result<DriveCommand, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub struct DriveController<H: RobotHardware> {
    pub drive: DriveBase<H>,
}

impl<H: RobotHardware> DriveController<H> {
    /// Build the drive base. Failure is fatal to the caller.
    pub fn new(
        hw: &H,
        map: &RobotMap,
    ) -> Result<Self, DriveError<H::Error>> {
        let drive = DriveBase::new(hw, map)?;
        tracing::info!(followers = drive.follower_count(), "drive base ready");
        Ok(DriveController { drive })
    }

    /// Apply one command. Returns telemetry for `Read`.
    pub fn execute_command(
        &mut self,
        command: DriveCommand,
    ) -> Option<DriveTelemetry> {
        match command {
            DriveCommand::Move { l, r } => self.drive.drive(l, r),
            DriveCommand::ShiftUp => self.drive.shift_up(),
            DriveCommand::ShiftDown => self.drive.shift_down(),
            DriveCommand::ResetDistance => self.drive.reset_distance(),
            DriveCommand::ResetGyro => self.drive.reset_gyro(),
            DriveCommand::Read => return Some(self.drive.telemetry()),
        }
        None
    }

    pub async fn drive_ch(&mut self) -> ! {
        loop {
            let command = DRIVE_CHANNEL.receiver().receive().await;
            tracing::debug!(?command, "drive command");
            if let Some(telemetry) = self.execute_command(command) {
                tracing::info!(?telemetry, "drive telemetry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(br#"{"dc":"move","l":0.5,"r":-0.5}"#).unwrap(),
            DriveCommand::Move { l: 0.5, r: -0.5 }
        );
        assert_eq!(
            parse_command(br#"{"dc":"shift_down"}"#).unwrap(),
            DriveCommand::ShiftDown
        );
        assert_eq!(
            parse_command(br#"{"dc":"reset_gyro"}"#).unwrap(),
            DriveCommand::ResetGyro
        );
        assert!(parse_command(br#"{"dc":"fly"}"#).is_err());
        assert!(parse_command(br#"{"dc":"move","l":0.5}"#).is_err());
    }
}
