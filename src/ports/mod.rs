//! Port traits at the I/O seams of the engine.

pub mod bar_port;
pub mod clock_port;
pub mod config_port;
pub mod report_port;
