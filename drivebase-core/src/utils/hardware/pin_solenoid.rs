//! Double solenoid driven directly by two valve coils on GPIO.
//!
//! Used where the valves hang off plain output pins instead of a pneumatic
//! control module. Both coils are never energised together: the coil being
//! released is written first.
//!
//! [`GpioSolenoids`] plugs the adapter into any [`RobotHardware`] factory,
//! taking pins from an [`OutputPins`] source.

use embedded_hal::digital::OutputPin;

use super::{DoubleSolenoid, ImuPort, RobotHardware, SolenoidValue};

/// `DoubleSolenoid` over a forward and a reverse coil pin.
pub struct PinPairSolenoid<F, R> {
    forward: F,
    reverse: R,
    value: SolenoidValue,
}

impl<F, R> PinPairSolenoid<F, R>
where
    F: OutputPin,
    R: OutputPin,
{
    /// Wrap two pins. The coils are assumed released.
    pub fn new(
        forward: F,
        reverse: R,
    ) -> Self {
        Self {
            forward,
            reverse,
            value: SolenoidValue::Off,
        }
    }

    /// Give the pins back.
    pub fn release(self) -> (F, R) {
        (self.forward, self.reverse)
    }

    /// Write the coils for `value`, keeping `self.value` equal to what the
    /// coils hold after each successful write.
    fn drive(
        &mut self,
        value: SolenoidValue,
    ) -> Result<(), PinFault> {
        match value {
            SolenoidValue::Off => {
                self.forward.set_low().map_err(|_| PinFault::Forward)?;
                self.value = self.released(SolenoidValue::Forward);
                self.reverse.set_low().map_err(|_| PinFault::Reverse)?;
            }
            SolenoidValue::Forward => {
                self.reverse.set_low().map_err(|_| PinFault::Reverse)?;
                self.value = self.released(SolenoidValue::Reverse);
                self.forward.set_high().map_err(|_| PinFault::Forward)?;
            }
            SolenoidValue::Reverse => {
                self.forward.set_low().map_err(|_| PinFault::Forward)?;
                self.value = self.released(SolenoidValue::Forward);
                self.reverse.set_high().map_err(|_| PinFault::Reverse)?;
            }
        }
        self.value = value;
        Ok(())
    }

    /// Position left once the coil for `coil` is de-energised.
    fn released(
        &self,
        coil: SolenoidValue,
    ) -> SolenoidValue {
        if self.value == coil {
            SolenoidValue::Off
        } else {
            self.value
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PinFault {
    Forward,
    Reverse,
}

impl<F, R> DoubleSolenoid for PinPairSolenoid<F, R>
where
    F: OutputPin,
    R: OutputPin,
{
    fn set(
        &mut self,
        value: SolenoidValue,
    ) {
        if let Err(fault) = self.drive(value) {
            tracing::error!(?fault, ?value, now = ?self.value, "solenoid coil write failed");
        }
    }

    fn get(&self) -> SolenoidValue {
        self.value
    }
}

/// Source of GPIO output pins by channel.
pub trait OutputPins {
    type Error: core::fmt::Debug + core::fmt::Display;
    type Pin: OutputPin;

    fn output_pin(
        &self,
        channel: u8,
    ) -> Result<Self::Pin, Self::Error>;
}

/// [`RobotHardware`] whose double solenoids are coil pairs on GPIO.
///
/// Every other device comes from `inner`; the solenoid module id is unused
/// and the two channels name the forward and reverse pins.
pub struct GpioSolenoids<H, P> {
    inner: H,
    pins: P,
}

impl<H, P> GpioSolenoids<H, P> {
    pub fn new(
        inner: H,
        pins: P,
    ) -> Self {
        Self { inner, pins }
    }
}

impl<H, P> RobotHardware for GpioSolenoids<H, P>
where
    H: RobotHardware,
    P: OutputPins<Error = H::Error>,
{
    type Error = H::Error;
    type Motor = H::Motor;
    type Solenoid = PinPairSolenoid<P::Pin, P::Pin>;
    type Encoder = H::Encoder;
    type Imu = H::Imu;

    fn motor_controller(
        &self,
        can_id: u8,
    ) -> Result<Self::Motor, Self::Error> {
        self.inner.motor_controller(can_id)
    }

    fn double_solenoid(
        &self,
        _module: u8,
        forward_channel: u8,
        reverse_channel: u8,
    ) -> Result<Self::Solenoid, Self::Error> {
        let forward = self.pins.output_pin(forward_channel)?;
        let reverse = self.pins.output_pin(reverse_channel)?;
        Ok(PinPairSolenoid::new(forward, reverse))
    }

    fn encoder(
        &self,
        a_channel: u8,
        b_channel: u8,
    ) -> Result<Self::Encoder, Self::Error> {
        self.inner.encoder(a_channel, b_channel)
    }

    fn imu(
        &self,
        port: ImuPort,
    ) -> Result<Self::Imu, Self::Error> {
        self.inner.imu(port)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::MockError;
    use std::io::ErrorKind;

    #[test]
    fn test_failed_energise_reports_off() {
        let forward = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High)
                .with_error(MockError::Io(ErrorKind::NotConnected)),
        ]);
        let reverse = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);

        let mut solenoid = PinPairSolenoid::new(forward, reverse);
        solenoid.set(SolenoidValue::Reverse);
        assert_eq!(solenoid.get(), SolenoidValue::Reverse);

        // reverse coil released, forward coil never energised
        solenoid.set(SolenoidValue::Forward);
        assert_eq!(solenoid.get(), SolenoidValue::Off);

        let (mut forward, mut reverse) = solenoid.release();
        forward.done();
        reverse.done();
    }

    #[test]
    fn test_failed_release_keeps_value() {
        let forward = PinMock::new(&[PinTransaction::set(PinState::High)]);
        let reverse = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low)
                .with_error(MockError::Io(ErrorKind::NotConnected)),
        ]);

        let mut solenoid = PinPairSolenoid::new(forward, reverse);
        solenoid.set(SolenoidValue::Forward);
        assert_eq!(solenoid.get(), SolenoidValue::Forward);

        // nothing was written, forward coil still energised
        solenoid.set(SolenoidValue::Forward);
        assert_eq!(solenoid.get(), SolenoidValue::Forward);

        let (mut forward, mut reverse) = solenoid.release();
        forward.done();
        reverse.done();
    }

    #[test]
    fn test_forward_then_reverse() {
        let forward = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let reverse = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ]);

        let mut solenoid = PinPairSolenoid::new(forward, reverse);
        assert_eq!(solenoid.get(), SolenoidValue::Off);

        solenoid.set(SolenoidValue::Forward);
        assert_eq!(solenoid.get(), SolenoidValue::Forward);
        solenoid.set(SolenoidValue::Reverse);
        assert_eq!(solenoid.get(), SolenoidValue::Reverse);

        let (mut forward, mut reverse) = solenoid.release();
        forward.done();
        reverse.done();
    }

    #[test]
    fn test_off_releases_both_coils() {
        let forward = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let reverse = PinMock::new(&[PinTransaction::set(PinState::Low)]);

        let mut solenoid = PinPairSolenoid::new(forward, reverse);
        solenoid.set(SolenoidValue::Off);
        assert_eq!(solenoid.get(), SolenoidValue::Off);

        let (mut forward, mut reverse) = solenoid.release();
        forward.done();
        reverse.done();
    }
}
