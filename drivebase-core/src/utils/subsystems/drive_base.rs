//! Shifting tank drivetrain.
//!
//! Owns both motor groups, the two shifter cylinders, the wheel encoders and
//! the IMU. Construction acquires every device through a [`RobotHardware`]
//! factory and stops at the first failure; the drivetrain has no degraded
//! mode.
//!
//! Every handle is driven from the control loop thread only.

extern crate alloc;

use alloc::vec::Vec;

use serde::Serialize;

use crate::utils::{
    config::{ConfigError, RobotMap},
    hardware::{
        ControlMode, DoubleSolenoid, ImuPort, InertialSensor, MotorController, PidSource,
        QuadratureEncoder, RobotHardware, SolenoidValue,
    },
};

/// Errors raised while building the drive base.
#[derive(Debug)]
pub enum DriveError<E: core::fmt::Debug> {
    Config(ConfigError),
    Motor {
        can_id: u8,
        error: E,
    },
    Solenoid {
        module: u8,
        forward_channel: u8,
        reverse_channel: u8,
        error: E,
    },
    Encoder {
        a_channel: u8,
        b_channel: u8,
        error: E,
    },
    Imu {
        port: ImuPort,
        error: E,
    },
}

impl<E: core::fmt::Debug + core::fmt::Display> core::fmt::Display for DriveError<E> {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            DriveError::Config(e) => write!(f, "invalid wiring map: {}", e),
            DriveError::Motor { can_id, error } => {
                write!(f, "motor controller {}: {}", can_id, error)
            }
            DriveError::Solenoid {
                module,
                forward_channel,
                reverse_channel,
                error,
            } => write!(
                f,
                "solenoid {}/{}-{}: {}",
                module, forward_channel, reverse_channel, error
            ),
            DriveError::Encoder {
                a_channel,
                b_channel,
                error,
            } => write!(f, "encoder {}-{}: {}", a_channel, b_channel, error),
            DriveError::Imu { port, error } => write!(f, "IMU on {:?}: {}", port, error),
        }
    }
}

impl<E: core::fmt::Debug> From<ConfigError> for DriveError<E> {
    fn from(e: ConfigError) -> Self {
        DriveError::Config(e)
    }
}

/// Snapshot of the drivetrain for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DriveTelemetry {
    pub left_output: f64,
    pub right_output: f64,
    pub shifter: SolenoidValue,
    pub distance: f64,
    pub angle: f64,
}

pub struct DriveBase<H: RobotHardware> {
    left_motor: H::Motor,
    right_motor: H::Motor,
    followers: Vec<H::Motor>,
    left_shifter: H::Solenoid,
    right_shifter: H::Solenoid,
    left_encoder: H::Encoder,
    right_encoder: H::Encoder,
    imu: H::Imu,
}

impl<H: RobotHardware> DriveBase<H> {
    /// Validate `map` and acquire every drivetrain device in wiring order.
    ///
    /// # Errors
    ///
    /// Returns the first device that could not be acquired, or the
    /// validation failure. Nothing is retried.
    pub fn new(
        hw: &H,
        map: &RobotMap,
    ) -> Result<Self, DriveError<H::Error>> {
        map.validate()?;

        let motor = |can_id: u8| {
            hw.motor_controller(can_id)
                .map_err(|error| DriveError::Motor { can_id, error })
        };

        // Primaries. The left flag drives both inversion and output reversal.
        let mut left_motor = motor(map.drive_left[0])?;
        left_motor.set_inverted(map.drive_left_inverted);
        left_motor.reverse_output(map.drive_left_inverted);
        left_motor.set_voltage_ramp_rate(map.drive_ramp_rate);

        let mut right_motor = motor(map.drive_right[0])?;
        right_motor.set_inverted(map.drive_right_inverted);
        right_motor.reverse_output(map.drive_right_inverted);
        right_motor.set_voltage_ramp_rate(map.drive_ramp_rate);
        tracing::info!(
            left = left_motor.device_id(),
            right = right_motor.device_id(),
            "drive primaries configured"
        );

        // Followers take no configuration of their own.
        let mut followers = Vec::with_capacity(map.drive_left.len() + map.drive_right.len() - 2);
        let groups = [
            (&map.drive_left[1..], &left_motor),
            (&map.drive_right[1..], &right_motor),
        ];
        for (ports, leader) in groups {
            for &can_id in ports {
                let mut follower = motor(can_id)?;
                follower.set_control_mode(ControlMode::Follower);
                follower.follow(leader);
                tracing::debug!(can_id, leader = leader.device_id(), "follower bound");
                followers.push(follower);
            }
        }

        let solenoid = |(forward_channel, reverse_channel): (u8, u8)| {
            hw.double_solenoid(map.pcm_id, forward_channel, reverse_channel)
                .map_err(|error| DriveError::Solenoid {
                    module: map.pcm_id,
                    forward_channel,
                    reverse_channel,
                    error,
                })
        };
        let left_shifter = solenoid(map.left_shifter)?;
        let right_shifter = solenoid(map.right_shifter)?;
        tracing::info!(pcm = map.pcm_id, "shifters configured");

        let encoder = |(a_channel, b_channel): (u8, u8)| {
            hw.encoder(a_channel, b_channel)
                .map_err(|error| DriveError::Encoder {
                    a_channel,
                    b_channel,
                    error,
                })
        };
        let inches_per_pulse = map.drive_inches_per_pulse();
        let mut left_encoder = encoder(map.encoder_left)?;
        left_encoder.set_distance_per_pulse(inches_per_pulse);
        // Only the left encoder is reversed; unconfirmed whether the right
        // side is mounted mirrored.
        left_encoder.set_reverse_direction(map.drive_left_inverted);

        let mut right_encoder = encoder(map.encoder_right)?;
        right_encoder.set_distance_per_pulse(inches_per_pulse);
        tracing::info!(inches_per_pulse, "encoders configured");

        let imu = hw.imu(map.imu_port).map_err(|error| DriveError::Imu {
            port: map.imu_port,
            error,
        })?;
        tracing::info!(port = ?map.imu_port, "IMU configured");

        Ok(DriveBase {
            left_motor,
            right_motor,
            followers,
            left_shifter,
            right_shifter,
            left_encoder,
            right_encoder,
            imu,
        })
    }

    /// Tank drive: command each side's primary, followers mirror it.
    ///
    /// Outputs are nominally in `[-1.0, 1.0]` and are not clamped here.
    pub fn drive(
        &mut self,
        left: f64,
        right: f64,
    ) {
        self.left_motor.set(left);
        self.right_motor.set(right);
    }

    /// Shift both gearboxes into high gear.
    pub fn shift_up(&mut self) {
        self.left_shifter.set(SolenoidValue::Forward);
        self.right_shifter.set(SolenoidValue::Forward);
    }

    /// Shift both gearboxes into low gear.
    pub fn shift_down(&mut self) {
        self.left_shifter.set(SolenoidValue::Reverse);
        self.right_shifter.set(SolenoidValue::Reverse);
    }

    /// Commanded position of the left shifter.
    pub fn shifter_state(&self) -> SolenoidValue {
        self.left_shifter.get()
    }

    pub fn reset_distance(&mut self) {
        self.left_encoder.reset();
        self.right_encoder.reset();
    }

    /// Left side distance in inches since the last reset.
    pub fn distance(&self) -> f64 {
        self.left_encoder.distance()
    }

    pub fn right_distance(&self) -> f64 {
        self.right_encoder.distance()
    }

    /// Left encoder as a closed-loop feedback source.
    pub fn distance_source(&self) -> &dyn PidSource {
        &self.left_encoder
    }

    pub fn reset_gyro(&mut self) {
        self.imu.reset();
    }

    /// Yaw in degrees relative to the last gyro reset.
    pub fn angle(&self) -> f64 {
        self.imu.yaw()
    }

    /// IMU as a closed-loop feedback source.
    pub fn angle_source(&self) -> &dyn PidSource {
        &self.imu
    }

    /// Number of follower controllers bound at construction.
    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    pub fn telemetry(&self) -> DriveTelemetry {
        DriveTelemetry {
            left_output: self.left_motor.get(),
            right_output: self.right_motor.get(),
            shifter: self.shifter_state(),
            distance: self.distance(),
            angle: self.angle(),
        }
    }
}
