// SPDX-License-Identifier: GPL-3.0-only
//! Display configuration tasks
//!
//! [`UpdateDisplayConfigurationTask`] orchestrates one complete
//! reconfiguration and uses [`ConfigureDisplaysTask`] to apply modeset plans.

mod configure;
mod update;

pub use configure::{ConfigureDisplaysTask, ConfigureStatus};
pub use update::{CancelHandle, ConfigurationOutcome, ResponseCallback, UpdateDisplayConfigurationTask};
