//! Hardware capability traits for the drive base.
//!
//! The drive subsystem never names a vendor driver. It is handed a
//! [`RobotHardware`] factory and builds every handle through it, so the same
//! subsystem runs against the robot's controllers or against [`sim`].
//!
//! - `sim`: in-memory hardware layer used by the tests and `sim-bot`
//! - `pin_solenoid`: double solenoid driven by two `embedded-hal` output pins,
//!   and a factory wrapper that builds shifters from it

pub mod pin_solenoid;
pub mod sim;

use serde::{Deserialize, Serialize};

pub use pin_solenoid::{GpioSolenoids, OutputPins, PinPairSolenoid};

/// Control mode of a motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Output is the commanded fraction of bus voltage.
    #[default]
    PercentVbus,
    /// Output mirrors another controller's applied output.
    Follower,
}

/// Position of a double-acting pneumatic actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolenoidValue {
    /// Neither valve energised.
    #[default]
    Off,
    Forward,
    Reverse,
}

/// Port an inertial sensor is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImuPort {
    /// SPI on the expansion (MXP) header.
    SpiMxp,
    /// I2C on the expansion (MXP) header.
    I2cMxp,
    /// USB serial.
    Usb,
}

/// What a feedback source reports to a closed-loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidSourceType {
    Displacement,
    Rate,
}

/// A sensor usable as the feedback input of an external closed-loop
/// controller.
pub trait PidSource {
    fn pid_source_type(&self) -> PidSourceType {
        PidSourceType::Displacement
    }

    /// Current process variable.
    fn pid_get(&self) -> f64;
}

/// A smart motor controller on the CAN bus.
pub trait MotorController {
    /// CAN device id this handle was constructed for.
    fn device_id(&self) -> u8;

    /// Command an output in `[-1.0, 1.0]`. Values outside are passed to the
    /// controller unchanged; saturation is the controller's job.
    fn set(
        &mut self,
        output: f64,
    );

    /// Last commanded output.
    fn get(&self) -> f64;

    fn set_inverted(
        &mut self,
        inverted: bool,
    );

    /// Reverse the closed-loop output sign.
    fn reverse_output(
        &mut self,
        reversed: bool,
    );

    /// Limit output slew in volts per second.
    fn set_voltage_ramp_rate(
        &mut self,
        volts_per_second: f64,
    );

    fn set_control_mode(
        &mut self,
        mode: ControlMode,
    );

    /// Bind this controller to mirror `leader`.
    fn follow(
        &mut self,
        leader: &Self,
    );
}

/// A two-position pneumatic actuator. Fire and forget: there is no feedback
/// that the cylinder actually moved.
pub trait DoubleSolenoid {
    fn set(
        &mut self,
        value: SolenoidValue,
    );

    /// Last commanded position.
    fn get(&self) -> SolenoidValue;
}

/// A two-channel quadrature encoder accumulating linear distance.
pub trait QuadratureEncoder: PidSource {
    fn set_distance_per_pulse(
        &mut self,
        distance_per_pulse: f64,
    );

    fn set_reverse_direction(
        &mut self,
        reversed: bool,
    );

    /// Zero the pulse count.
    fn reset(&mut self);

    /// Raw pulse count since the last reset.
    fn raw(&self) -> i64;

    /// Accumulated distance in the units of distance-per-pulse.
    fn distance(&self) -> f64;
}

/// An inertial measurement unit reporting heading.
pub trait InertialSensor: PidSource {
    /// Make the current heading the new zero.
    fn reset(&mut self);

    /// Yaw in degrees relative to the last reset, in `[-180, 180)`.
    fn yaw(&self) -> f64;
}

/// Factory for every hardware handle the drive base owns.
///
/// Each constructor either returns a live handle or the reason the device
/// could not be acquired. Implementations must not retry.
pub trait RobotHardware {
    type Error: core::fmt::Debug + core::fmt::Display;
    type Motor: MotorController;
    type Solenoid: DoubleSolenoid;
    type Encoder: QuadratureEncoder;
    type Imu: InertialSensor;

    fn motor_controller(
        &self,
        can_id: u8,
    ) -> Result<Self::Motor, Self::Error>;

    fn double_solenoid(
        &self,
        module: u8,
        forward_channel: u8,
        reverse_channel: u8,
    ) -> Result<Self::Solenoid, Self::Error>;

    fn encoder(
        &self,
        a_channel: u8,
        b_channel: u8,
    ) -> Result<Self::Encoder, Self::Error>;

    fn imu(
        &self,
        port: ImuPort,
    ) -> Result<Self::Imu, Self::Error>;
}
