//! Math utilities for the drive base.
//!
//! This module provides the unit conversions the wiring map derives its
//! physical constants from, and heading normalisation for yaw readings.

pub mod units;
