//! Wiring map and drive subsystem for a shifting tank drivetrain.
//!
//! The subsystem is generic over a hardware factory so it runs against the
//! robot or against `utils::hardware::sim`; see `drivebase-app/sim-bot`.
#![no_std]

pub mod utils;
