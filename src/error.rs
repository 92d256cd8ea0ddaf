// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the configurator
//!
//! The configuration state machine reports hardware and layout failures
//! through its completion callback, never through these types. They cover
//! everything around it: loading the topology file and parsing names.

use std::path::PathBuf;

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Unrecognised multi-display state name
    #[error("Unknown display state: {0}")]
    UnknownDisplayState(String),

    /// Unrecognised power state name
    #[error("Unknown power state: {0}")]
    UnknownPowerState(String),

    /// Topology file is not valid KDL or has unexpected nodes
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] knuffel::Error),

    /// Topology file decodes but describes something unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// No topology file at the expected location
    #[error("Configuration file {} not found", .0.display())]
    ConfigNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;
