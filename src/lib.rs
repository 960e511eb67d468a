//! Frameseek - frame-accurate seeking for video files
//!
//! This library crate exposes the command implementations for integration testing.

pub mod config;
pub mod media;
pub mod report;
pub mod simulate;
