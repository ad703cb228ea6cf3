//! Shared utilities for mirrorwalk.
//!
//! This crate provides common utilities used across the mirrorwalk
//! workspace:
//! - Logging setup with tracing
//! - Output path selection (collision-free naming)
//! - RAII-based timing for operation measurement

pub mod log;
pub mod path;
pub mod timing;

pub use timing::TimingGuard;
