//! Utility re-exports and helper macros for the drive base.
//!
//! - `config`: wiring map and its validation
//! - `controllers`: drive command channel and dispatcher
//! - `hardware`: capability traits, simulated hardware and adapters
//! - `math`: unit conversions
//! - `subsystems`: the drive base itself
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod hardware;
pub mod math;
pub mod subsystems;

pub use config::RobotMap;
pub use controllers::{DriveCommand, DriveController, DRIVE_CHANNEL};
pub use subsystems::DriveBase;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
