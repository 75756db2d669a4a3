//! Wiring map for the drive base.
//!
//! Every CAN id, pneumatic channel and DIO channel the drivetrain is wired
//! to, plus the physical constants the distance conversion is derived from.
//! The compile-time table lives in [`defaults`]; a [`RobotMap`] is built once
//! at start-up (optionally from JSON), validated, and then only read.

extern crate alloc;

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::utils::{hardware::ImuPort, math::units};

/// Highest addressable CAN device id (63 is broadcast).
pub const MAX_CAN_ID: u8 = 62;
/// Channels per pneumatic control module.
pub const PCM_CHANNELS: u8 = 8;
/// DIO channels on the controller: 10 onboard plus 16 on the MXP header.
pub const DIO_CHANNELS: u8 = 26;

/// Compile-time wiring table.
pub mod defaults {
    use crate::utils::hardware::ImuPort;

    pub const PCM_ID: u8 = 62;

    // Motors, index 0 is the primary
    pub const DRIVE_LEFT: [u8; 3] = [1, 2, 3];
    pub const DRIVE_RIGHT: [u8; 3] = [4, 5, 6];
    pub const DRIVE_LEFT_INVERTED: bool = true;
    pub const DRIVE_RIGHT_INVERTED: bool = false;
    /// Volts per second.
    pub const DRIVE_RAMP_RATE: f64 = 24.0;

    // Solenoid channels (forward, reverse)
    pub const LEFT_SHIFTER: (u8, u8) = (0, 1);
    pub const RIGHT_SHIFTER: (u8, u8) = (2, 3);

    // DIO channels (A, B)
    pub const ENCODER_LEFT: (u8, u8) = (0, 1);
    pub const ENCODER_RIGHT: (u8, u8) = (2, 3);

    pub const IMU_PORT: ImuPort = ImuPort::SpiMxp;

    pub const HIGH_GEAR_RATIO: f64 = 0.224;
    /// Inches.
    pub const DRIVE_WHEEL_RADIUS: f64 = 2.0;
    /// Tuned on the practice robot.
    pub const MAGIC_DRIVE_CONSTANT: f64 = 1.0 / 240.0 * 59.0 / 48.0 * 51.0 / 48.0;
}

/// Reasons a wiring map is rejected at start-up.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    EmptyMotorGroup,
    CanIdOutOfRange(u8),
    DuplicateCanId(u8),
    PcmIdOutOfRange(u8),
    SolenoidChannelOutOfRange(u8),
    SolenoidChannelConflict(u8),
    DioChannelOutOfRange(u8),
    DioChannelConflict(u8),
    InvalidDistancePerPulse(f64),
    InvalidRampRate(f64),
}

impl core::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "wiring map is not valid JSON: {}", e),
            ConfigError::EmptyMotorGroup => write!(f, "motor group has no primary"),
            ConfigError::CanIdOutOfRange(id) => {
                write!(f, "CAN id {} is above {}", id, MAX_CAN_ID)
            }
            ConfigError::DuplicateCanId(id) => write!(f, "CAN id {} is used twice", id),
            ConfigError::PcmIdOutOfRange(id) => {
                write!(f, "PCM id {} is above {}", id, MAX_CAN_ID)
            }
            ConfigError::SolenoidChannelOutOfRange(ch) => {
                write!(f, "solenoid channel {} does not exist", ch)
            }
            ConfigError::SolenoidChannelConflict(ch) => {
                write!(f, "solenoid channel {} is used twice", ch)
            }
            ConfigError::DioChannelOutOfRange(ch) => write!(f, "DIO channel {} does not exist", ch),
            ConfigError::DioChannelConflict(ch) => write!(f, "DIO channel {} is used twice", ch),
            ConfigError::InvalidDistancePerPulse(v) => {
                write!(f, "distance per pulse must be positive, got {}", v)
            }
            ConfigError::InvalidRampRate(v) => {
                write!(f, "ramp rate must be non-negative, got {}", v)
            }
        }
    }
}

/// Wiring map for the drivetrain.
///
/// Missing JSON fields fall back to [`defaults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotMap {
    pub pcm_id: u8,
    pub drive_left: Vec<u8>,
    pub drive_right: Vec<u8>,
    pub drive_left_inverted: bool,
    pub drive_right_inverted: bool,
    pub drive_ramp_rate: f64,
    pub left_shifter: (u8, u8),
    pub right_shifter: (u8, u8),
    pub encoder_left: (u8, u8),
    pub encoder_right: (u8, u8),
    pub imu_port: ImuPort,
    pub high_gear_ratio: f64,
    pub drive_wheel_radius: f64,
    pub magic_drive_constant: f64,
}

impl Default for RobotMap {
    fn default() -> Self {
        RobotMap {
            pcm_id: defaults::PCM_ID,
            drive_left: defaults::DRIVE_LEFT.to_vec(),
            drive_right: defaults::DRIVE_RIGHT.to_vec(),
            drive_left_inverted: defaults::DRIVE_LEFT_INVERTED,
            drive_right_inverted: defaults::DRIVE_RIGHT_INVERTED,
            drive_ramp_rate: defaults::DRIVE_RAMP_RATE,
            left_shifter: defaults::LEFT_SHIFTER,
            right_shifter: defaults::RIGHT_SHIFTER,
            encoder_left: defaults::ENCODER_LEFT,
            encoder_right: defaults::ENCODER_RIGHT,
            imu_port: defaults::IMU_PORT,
            high_gear_ratio: defaults::HIGH_GEAR_RATIO,
            drive_wheel_radius: defaults::DRIVE_WHEEL_RADIUS,
            magic_drive_constant: defaults::MAGIC_DRIVE_CONSTANT,
        }
    }
}

impl RobotMap {
    /// Parse a JSON wiring map and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let map: RobotMap = serde_json::from_slice(bytes).map_err(ConfigError::Parse)?;
        map.validate()?;
        Ok(map)
    }

    /// Wheel circumference in inches.
    pub fn drive_wheel_circumference(&self) -> f64 {
        units::wheel_circumference(self.drive_wheel_radius)
    }

    pub fn drive_conversion_factor(&self) -> f64 {
        units::drive_conversion_factor(
            self.high_gear_ratio,
            self.drive_wheel_circumference(),
            self.magic_drive_constant,
        )
    }

    /// Inches of travel per encoder pulse.
    pub fn drive_inches_per_pulse(&self) -> f64 {
        self.drive_conversion_factor()
    }

    /// Reject maps that would mis-wire the drivetrain or corrupt distance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drive_left.is_empty() || self.drive_right.is_empty() {
            return Err(ConfigError::EmptyMotorGroup);
        }
        let mut can_ids: Vec<u8> = Vec::new();
        for &id in self.drive_left.iter().chain(self.drive_right.iter()) {
            if id > MAX_CAN_ID {
                return Err(ConfigError::CanIdOutOfRange(id));
            }
            if can_ids.contains(&id) {
                return Err(ConfigError::DuplicateCanId(id));
            }
            can_ids.push(id);
        }

        if self.pcm_id > MAX_CAN_ID {
            return Err(ConfigError::PcmIdOutOfRange(self.pcm_id));
        }
        let shifters = [
            self.left_shifter.0,
            self.left_shifter.1,
            self.right_shifter.0,
            self.right_shifter.1,
        ];
        check_channels(
            &shifters,
            PCM_CHANNELS,
            ConfigError::SolenoidChannelOutOfRange,
            ConfigError::SolenoidChannelConflict,
        )?;

        let encoders = [
            self.encoder_left.0,
            self.encoder_left.1,
            self.encoder_right.0,
            self.encoder_right.1,
        ];
        check_channels(
            &encoders,
            DIO_CHANNELS,
            ConfigError::DioChannelOutOfRange,
            ConfigError::DioChannelConflict,
        )?;

        let per_pulse = self.drive_inches_per_pulse();
        if !per_pulse.is_finite() || per_pulse <= 0.0 {
            return Err(ConfigError::InvalidDistancePerPulse(per_pulse));
        }
        if !self.drive_ramp_rate.is_finite() || self.drive_ramp_rate < 0.0 {
            return Err(ConfigError::InvalidRampRate(self.drive_ramp_rate));
        }
        Ok(())
    }
}

/// Every channel below `limit` and none used twice.
fn check_channels(
    channels: &[u8],
    limit: u8,
    out_of_range: fn(u8) -> ConfigError,
    conflict: fn(u8) -> ConfigError,
) -> Result<(), ConfigError> {
    for (i, &ch) in channels.iter().enumerate() {
        if ch >= limit {
            return Err(out_of_range(ch));
        }
        if channels[..i].contains(&ch) {
            return Err(conflict(ch));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let map = RobotMap::default();
        map.validate().unwrap();
        assert_eq!(map.pcm_id, 62);
        assert_eq!(map.drive_left, [1, 2, 3]);
        assert_eq!(map.drive_right, [4, 5, 6]);
    }

    #[test]
    fn test_inches_per_pulse_follows_inputs() {
        let map = RobotMap::default();
        assert!((map.drive_inches_per_pulse() - 0.015_318).abs() < 1e-5);

        let bigger = RobotMap {
            drive_wheel_radius: 3.0,
            ..RobotMap::default()
        };
        let ratio = bigger.drive_inches_per_pulse() / map.drive_inches_per_pulse();
        assert!((ratio - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_distance_per_pulse_rejected() {
        let map = RobotMap {
            high_gear_ratio: 0.0,
            ..RobotMap::default()
        };
        assert!(matches!(
            map.validate(),
            Err(ConfigError::InvalidDistancePerPulse(_))
        ));
    }

    #[test]
    fn test_wiring_conflicts_rejected() {
        let duplicate_motor = RobotMap {
            drive_right: [4, 3, 6].to_vec(),
            ..RobotMap::default()
        };
        assert!(matches!(
            duplicate_motor.validate(),
            Err(ConfigError::DuplicateCanId(3))
        ));

        let shared_channel = RobotMap {
            right_shifter: (1, 2),
            ..RobotMap::default()
        };
        assert!(matches!(
            shared_channel.validate(),
            Err(ConfigError::SolenoidChannelConflict(1))
        ));

        let missing_channel = RobotMap {
            left_shifter: (0, 8),
            ..RobotMap::default()
        };
        assert!(matches!(
            missing_channel.validate(),
            Err(ConfigError::SolenoidChannelOutOfRange(8))
        ));

        let encoder_clash = RobotMap {
            encoder_right: (1, 3),
            ..RobotMap::default()
        };
        assert!(matches!(
            encoder_clash.validate(),
            Err(ConfigError::DioChannelConflict(1))
        ));

        let no_primary = RobotMap {
            drive_left: Vec::new(),
            ..RobotMap::default()
        };
        assert!(matches!(
            no_primary.validate(),
            Err(ConfigError::EmptyMotorGroup)
        ));
    }

    #[test]
    fn test_from_json_overrides_defaults() {
        let json = br#"{ "pcm_id": 10, "drive_right_inverted": true, "imu_port": "usb" }"#;
        let map = RobotMap::from_json(json).unwrap();
        assert_eq!(map.pcm_id, 10);
        assert!(map.drive_right_inverted);
        assert_eq!(map.imu_port, ImuPort::Usb);
        assert_eq!(map.drive_left, [1, 2, 3]);

        let bad = br#"{ "drive_ramp_rate": -1.0 }"#;
        assert!(matches!(
            RobotMap::from_json(bad),
            Err(ConfigError::InvalidRampRate(_))
        ));
        assert!(matches!(
            RobotMap::from_json(b"not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
