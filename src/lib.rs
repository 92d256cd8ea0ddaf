// SPDX-License-Identifier: GPL-3.0-only
//! Display configuration
//!
//! Reconciles the desired multi-monitor topology and power state against the
//! displays that are actually connected: picks a topology, plans modesets,
//! applies them through a platform [`delegate`], falls back to software
//! mirroring when hardware mirroring fails and reports one final outcome.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod configurator;
pub mod delegate;
pub mod display;
pub mod error;
pub mod layout;
pub mod task;

#[cfg(test)]
mod testing;

pub use configurator::DisplayConfigurator;
pub use task::{ConfigurationOutcome, UpdateDisplayConfigurationTask};
