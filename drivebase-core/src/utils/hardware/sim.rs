//! Simulated hardware layer.
//!
//! All device state lives in one [`SimState`] shared through a
//! `&RefCell<SimState>`, the same way several drivers share one bus. Handles
//! built by [`SimHardware`] write into it, and tests or a plant model read it
//! back (or push sensor motion into it).

use core::cell::RefCell;

use embedded_hal::digital::{ErrorType, OutputPin};
use hashbrown::{HashMap, HashSet};

use super::{
    ControlMode, DoubleSolenoid, ImuPort, InertialSensor, MotorController, OutputPins, PidSource,
    QuadratureEncoder, RobotHardware, SolenoidValue,
};
use crate::utils::math::units::wrap_degrees;

/// An addressable resource on the simulated robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimDevice {
    /// CAN motor controller by device id.
    Motor(u8),
    /// One channel of a pneumatic control module.
    Solenoid { module: u8, channel: u8 },
    /// Digital I/O channel.
    Dio(u8),
    /// General purpose output line.
    Gpio(u8),
    Imu(ImuPort),
}

/// Why a simulated device could not be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// The device was removed with [`SimState::unplug`].
    Unplugged(SimDevice),
    /// Another handle already owns the resource.
    AlreadyAllocated(SimDevice),
}

impl core::fmt::Display for SimError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            SimError::Unplugged(device) => write!(f, "{:?} is not connected", device),
            SimError::AlreadyAllocated(device) => write!(f, "{:?} is already allocated", device),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimMotorState {
    pub output: f64,
    pub inverted: bool,
    pub output_reversed: bool,
    pub ramp_rate: f64,
    pub mode: ControlMode,
    pub leader: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimEncoderState {
    pub pulses: i64,
    pub distance_per_pulse: f64,
    pub reversed: bool,
}

impl SimEncoderState {
    /// Pulse count as the encoder reports it, after direction reversal.
    fn count(&self) -> i64 {
        if self.reversed {
            -self.pulses
        } else {
            self.pulses
        }
    }

    fn distance(&self) -> f64 {
        self.count() as f64 * self.distance_per_pulse
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimImuState {
    /// Heading since power-on, unbounded.
    pub raw_yaw: f64,
    /// Raw heading captured at the last reset.
    pub reference: f64,
}

/// Backing store for every simulated device.
#[derive(Debug, Default)]
pub struct SimState {
    motors: HashMap<u8, SimMotorState>,
    solenoids: HashMap<(u8, u8), SolenoidValue>,
    encoders: HashMap<u8, SimEncoderState>,
    imus: HashMap<ImuPort, SimImuState>,
    pins: HashMap<u8, bool>,
    claimed: HashSet<SimDevice>,
    unplugged: HashSet<SimDevice>,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make later construction of `device` fail.
    pub fn unplug(
        &mut self,
        device: SimDevice,
    ) {
        self.unplugged.insert(device);
    }

    /// Claim every device or none of them.
    fn claim(
        &mut self,
        devices: &[SimDevice],
    ) -> Result<(), SimError> {
        for device in devices {
            if self.unplugged.contains(device) {
                return Err(SimError::Unplugged(*device));
            }
            if self.claimed.contains(device) {
                return Err(SimError::AlreadyAllocated(*device));
            }
        }
        self.claimed.extend(devices.iter().copied());
        Ok(())
    }

    pub fn motor(
        &self,
        can_id: u8,
    ) -> Option<&SimMotorState> {
        self.motors.get(&can_id)
    }

    /// Follow leader links to the controller whose output is commanded
    /// directly.
    fn resolve_leader(
        &self,
        can_id: u8,
    ) -> Option<&SimMotorState> {
        let mut state = self.motors.get(&can_id)?;
        // bounded so a follower loop cannot spin forever
        for _ in 0..self.motors.len() {
            match (state.mode, state.leader) {
                (ControlMode::Follower, Some(leader)) => state = self.motors.get(&leader)?,
                _ => return Some(state),
            }
        }
        None
    }

    /// Commanded output of a controller; followers report their leader's.
    pub fn output(
        &self,
        can_id: u8,
    ) -> Option<f64> {
        self.resolve_leader(can_id).map(|leader| leader.output)
    }

    /// Output after the leader's inversion is applied.
    pub fn applied_output(
        &self,
        can_id: u8,
    ) -> Option<f64> {
        self.resolve_leader(can_id).map(|leader| {
            if leader.inverted {
                -leader.output
            } else {
                leader.output
            }
        })
    }

    /// Position of the solenoid whose forward channel is `forward_channel`.
    pub fn solenoid(
        &self,
        module: u8,
        forward_channel: u8,
    ) -> Option<SolenoidValue> {
        self.solenoids.get(&(module, forward_channel)).copied()
    }

    pub fn encoder(
        &self,
        a_channel: u8,
    ) -> Option<&SimEncoderState> {
        self.encoders.get(&a_channel)
    }

    /// Advance an encoder by `pulses` counts.
    pub fn add_pulses(
        &mut self,
        a_channel: u8,
        pulses: i64,
    ) {
        if let Some(encoder) = self.encoders.get_mut(&a_channel) {
            encoder.pulses += pulses;
        }
    }

    /// Level of a GPIO output, `true` when high.
    pub fn pin(
        &self,
        channel: u8,
    ) -> Option<bool> {
        self.pins.get(&channel).copied()
    }

    pub fn imu(
        &self,
        port: ImuPort,
    ) -> Option<&SimImuState> {
        self.imus.get(&port)
    }

    /// Turn the robot by `degrees` as seen by the IMU on `port`.
    pub fn rotate(
        &mut self,
        port: ImuPort,
        degrees: f64,
    ) {
        if let Some(imu) = self.imus.get_mut(&port) {
            imu.raw_yaw += degrees;
        }
    }
}

/// [`RobotHardware`] backed by a shared [`SimState`].
#[derive(Clone, Copy)]
pub struct SimHardware<'a> {
    bus: &'a RefCell<SimState>,
}

impl<'a> SimHardware<'a> {
    pub fn new(bus: &'a RefCell<SimState>) -> Self {
        Self { bus }
    }
}

impl<'a> RobotHardware for SimHardware<'a> {
    type Error = SimError;
    type Motor = SimMotor<'a>;
    type Solenoid = SimSolenoid<'a>;
    type Encoder = SimEncoder<'a>;
    type Imu = SimImu<'a>;

    fn motor_controller(
        &self,
        can_id: u8,
    ) -> Result<Self::Motor, Self::Error> {
        let mut state = self.bus.borrow_mut();
        state.claim(&[SimDevice::Motor(can_id)])?;
        state.motors.insert(can_id, SimMotorState::default());
        Ok(SimMotor {
            can_id,
            bus: self.bus,
        })
    }

    fn double_solenoid(
        &self,
        module: u8,
        forward_channel: u8,
        reverse_channel: u8,
    ) -> Result<Self::Solenoid, Self::Error> {
        let mut state = self.bus.borrow_mut();
        state.claim(&[
            SimDevice::Solenoid {
                module,
                channel: forward_channel,
            },
            SimDevice::Solenoid {
                module,
                channel: reverse_channel,
            },
        ])?;
        state
            .solenoids
            .insert((module, forward_channel), SolenoidValue::Off);
        Ok(SimSolenoid {
            key: (module, forward_channel),
            bus: self.bus,
        })
    }

    fn encoder(
        &self,
        a_channel: u8,
        b_channel: u8,
    ) -> Result<Self::Encoder, Self::Error> {
        let mut state = self.bus.borrow_mut();
        state.claim(&[SimDevice::Dio(a_channel), SimDevice::Dio(b_channel)])?;
        state.encoders.insert(
            a_channel,
            SimEncoderState {
                distance_per_pulse: 1.0,
                ..Default::default()
            },
        );
        Ok(SimEncoder {
            a_channel,
            bus: self.bus,
        })
    }

    fn imu(
        &self,
        port: ImuPort,
    ) -> Result<Self::Imu, Self::Error> {
        let mut state = self.bus.borrow_mut();
        state.claim(&[SimDevice::Imu(port)])?;
        state.imus.insert(port, SimImuState::default());
        Ok(SimImu {
            port,
            bus: self.bus,
        })
    }
}

impl<'a> OutputPins for SimHardware<'a> {
    type Error = SimError;
    type Pin = SimPin<'a>;

    fn output_pin(
        &self,
        channel: u8,
    ) -> Result<Self::Pin, Self::Error> {
        let mut state = self.bus.borrow_mut();
        state.claim(&[SimDevice::Gpio(channel)])?;
        state.pins.insert(channel, false);
        Ok(SimPin {
            channel,
            bus: self.bus,
        })
    }
}

pub struct SimPin<'a> {
    channel: u8,
    bus: &'a RefCell<SimState>,
}

impl ErrorType for SimPin<'_> {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.borrow_mut().pins.insert(self.channel, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.borrow_mut().pins.insert(self.channel, true);
        Ok(())
    }
}

pub struct SimMotor<'a> {
    can_id: u8,
    bus: &'a RefCell<SimState>,
}

impl SimMotor<'_> {
    fn with_state(
        &self,
        f: impl FnOnce(&mut SimMotorState),
    ) {
        if let Some(state) = self.bus.borrow_mut().motors.get_mut(&self.can_id) {
            f(state);
        }
    }
}

impl MotorController for SimMotor<'_> {
    fn device_id(&self) -> u8 {
        self.can_id
    }

    fn set(
        &mut self,
        output: f64,
    ) {
        let can_id = self.can_id;
        self.with_state(|state| match state.mode {
            ControlMode::PercentVbus => state.output = output,
            ControlMode::Follower => {
                tracing::warn!(can_id, output, "set ignored on a follower");
            }
        });
    }

    fn get(&self) -> f64 {
        self.bus.borrow().output(self.can_id).unwrap_or(0.0)
    }

    fn set_inverted(
        &mut self,
        inverted: bool,
    ) {
        self.with_state(|state| state.inverted = inverted);
    }

    fn reverse_output(
        &mut self,
        reversed: bool,
    ) {
        self.with_state(|state| state.output_reversed = reversed);
    }

    fn set_voltage_ramp_rate(
        &mut self,
        volts_per_second: f64,
    ) {
        self.with_state(|state| state.ramp_rate = volts_per_second);
    }

    fn set_control_mode(
        &mut self,
        mode: ControlMode,
    ) {
        self.with_state(|state| state.mode = mode);
    }

    fn follow(
        &mut self,
        leader: &Self,
    ) {
        let leader = leader.can_id;
        self.with_state(|state| {
            state.mode = ControlMode::Follower;
            state.leader = Some(leader);
        });
    }
}

pub struct SimSolenoid<'a> {
    key: (u8, u8),
    bus: &'a RefCell<SimState>,
}

impl DoubleSolenoid for SimSolenoid<'_> {
    fn set(
        &mut self,
        value: SolenoidValue,
    ) {
        self.bus.borrow_mut().solenoids.insert(self.key, value);
    }

    fn get(&self) -> SolenoidValue {
        self.bus
            .borrow()
            .solenoids
            .get(&self.key)
            .copied()
            .unwrap_or_default()
    }
}

pub struct SimEncoder<'a> {
    a_channel: u8,
    bus: &'a RefCell<SimState>,
}

impl SimEncoder<'_> {
    fn with_state(
        &self,
        f: impl FnOnce(&mut SimEncoderState),
    ) {
        if let Some(state) = self.bus.borrow_mut().encoders.get_mut(&self.a_channel) {
            f(state);
        }
    }
}

impl PidSource for SimEncoder<'_> {
    fn pid_get(&self) -> f64 {
        self.distance()
    }
}

impl QuadratureEncoder for SimEncoder<'_> {
    fn set_distance_per_pulse(
        &mut self,
        distance_per_pulse: f64,
    ) {
        self.with_state(|state| state.distance_per_pulse = distance_per_pulse);
    }

    fn set_reverse_direction(
        &mut self,
        reversed: bool,
    ) {
        self.with_state(|state| state.reversed = reversed);
    }

    fn reset(&mut self) {
        self.with_state(|state| state.pulses = 0);
    }

    fn raw(&self) -> i64 {
        self.bus
            .borrow()
            .encoders
            .get(&self.a_channel)
            .map_or(0, SimEncoderState::count)
    }

    fn distance(&self) -> f64 {
        self.bus
            .borrow()
            .encoders
            .get(&self.a_channel)
            .map_or(0.0, SimEncoderState::distance)
    }
}

pub struct SimImu<'a> {
    port: ImuPort,
    bus: &'a RefCell<SimState>,
}

impl PidSource for SimImu<'_> {
    fn pid_get(&self) -> f64 {
        self.yaw()
    }
}

impl InertialSensor for SimImu<'_> {
    fn reset(&mut self) {
        if let Some(imu) = self.bus.borrow_mut().imus.get_mut(&self.port) {
            imu.reference = imu.raw_yaw;
        }
    }

    fn yaw(&self) -> f64 {
        self.bus
            .borrow()
            .imus
            .get(&self.port)
            .map_or(0.0, |imu| wrap_degrees(imu.raw_yaw - imu.reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unplugged_motor_fails() {
        let bus = RefCell::new(SimState::new());
        bus.borrow_mut().unplug(SimDevice::Motor(3));
        let hw = SimHardware::new(&bus);

        assert!(hw.motor_controller(2).is_ok());
        assert_eq!(
            hw.motor_controller(3).err(),
            Some(SimError::Unplugged(SimDevice::Motor(3)))
        );
    }

    #[test]
    fn test_channels_cannot_be_claimed_twice() {
        let bus = RefCell::new(SimState::new());
        let hw = SimHardware::new(&bus);

        let _first = hw.double_solenoid(62, 0, 1).unwrap();
        let clash = SimDevice::Solenoid {
            module: 62,
            channel: 1,
        };
        assert_eq!(
            hw.double_solenoid(62, 1, 2).err(),
            Some(SimError::AlreadyAllocated(clash))
        );
        // the failed claim must not have taken channel 2
        assert!(hw.double_solenoid(62, 2, 3).is_ok());

        let _encoder = hw.encoder(0, 1).unwrap();
        assert_eq!(
            hw.encoder(1, 4).err(),
            Some(SimError::AlreadyAllocated(SimDevice::Dio(1)))
        );
    }

    #[test]
    fn test_follower_mirrors_leader() {
        let bus = RefCell::new(SimState::new());
        let hw = SimHardware::new(&bus);
        let mut leader = hw.motor_controller(1).unwrap();
        let mut follower = hw.motor_controller(2).unwrap();
        leader.set_inverted(true);
        follower.set_control_mode(ControlMode::Follower);
        follower.follow(&leader);

        leader.set(0.25);
        follower.set(0.9);

        assert_eq!(follower.get(), 0.25);
        assert_eq!(bus.borrow().output(2), Some(0.25));
        assert_eq!(bus.borrow().applied_output(2), Some(-0.25));
    }

    #[test]
    fn test_encoder_distance_and_reset() {
        let bus = RefCell::new(SimState::new());
        let hw = SimHardware::new(&bus);
        let mut encoder = hw.encoder(4, 5).unwrap();
        encoder.set_distance_per_pulse(0.5);
        encoder.set_reverse_direction(true);

        bus.borrow_mut().add_pulses(4, 10);
        assert_eq!(encoder.raw(), -10);
        assert_eq!(encoder.distance(), -5.0);
        assert_eq!(encoder.pid_get(), -5.0);

        encoder.reset();
        assert_eq!(encoder.raw(), 0);
        assert_eq!(encoder.distance(), 0.0);

        encoder.set_reverse_direction(false);
        bus.borrow_mut().add_pulses(4, 3);
        assert_eq!(encoder.raw(), 3);
        assert_eq!(encoder.distance(), 1.5);
    }

    #[test]
    fn test_imu_reset_sets_reference() {
        let bus = RefCell::new(SimState::new());
        let hw = SimHardware::new(&bus);
        let mut imu = hw.imu(ImuPort::SpiMxp).unwrap();

        bus.borrow_mut().rotate(ImuPort::SpiMxp, 200.0);
        assert!((imu.yaw() - -160.0).abs() < 1e-9);

        imu.reset();
        assert_eq!(imu.yaw(), 0.0);

        bus.borrow_mut().rotate(ImuPort::SpiMxp, -30.0);
        assert!((imu.yaw() - -30.0).abs() < 1e-9);
    }
}
