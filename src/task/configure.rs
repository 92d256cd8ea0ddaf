// SPDX-License-Identifier: GPL-3.0-only
//! Applies a modeset plan to the hardware
//!
//! Every request is sent to the delegate concurrently. When the hardware
//! refuses a mode, the request is retried with the next smaller mode the
//! display supports until one is accepted or the display runs out of modes.

use futures::future::join_all;

use crate::delegate::NativeDisplayDelegate;
use crate::display::DisplayConfigureRequest;

/// Outcome of applying a modeset plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStatus {
    /// Every display was configured as requested
    Success,
    /// Every display was configured, some at a smaller fallback mode
    PartialSuccess,
    /// At least one display could not be configured at all
    Error,
}

impl ConfigureStatus {
    fn merge(self, other: ConfigureStatus) -> ConfigureStatus {
        match (self, other) {
            (ConfigureStatus::Error, _) | (_, ConfigureStatus::Error) => ConfigureStatus::Error,
            (ConfigureStatus::PartialSuccess, _) | (_, ConfigureStatus::PartialSuccess) => {
                ConfigureStatus::PartialSuccess
            }
            _ => ConfigureStatus::Success,
        }
    }
}

pub struct ConfigureDisplaysTask<'a> {
    delegate: &'a dyn NativeDisplayDelegate,
    requests: Vec<DisplayConfigureRequest>,
}

impl<'a> ConfigureDisplaysTask<'a> {
    pub fn new(delegate: &'a dyn NativeDisplayDelegate, requests: Vec<DisplayConfigureRequest>) -> Self {
        Self { delegate, requests }
    }

    pub async fn run(self) -> ConfigureStatus {
        let delegate = self.delegate;
        let statuses = join_all(
            self.requests
                .into_iter()
                .map(|request| configure_display(delegate, request)),
        )
        .await;

        let status = statuses
            .into_iter()
            .fold(ConfigureStatus::Success, ConfigureStatus::merge);
        debug!(?status, "Configure displays finished");
        status
    }
}

async fn configure_display(
    delegate: &dyn NativeDisplayDelegate,
    mut request: DisplayConfigureRequest,
) -> ConfigureStatus {
    let mut status = ConfigureStatus::Success;

    loop {
        debug!("Configuring {}", request);
        if delegate.configure(&request).await {
            return status;
        }

        let next_mode = request
            .mode
            .and_then(|mode| request.display.next_smaller_mode(&mode));
        match next_mode {
            Some(mode) => {
                info!(
                    display_id = request.display.display_id,
                    "Modeset rejected, falling back to {}", mode
                );
                request.mode = Some(mode);
                status = ConfigureStatus::PartialSuccess;
            }
            None => {
                error!(display_id = request.display.display_id, "Failed to configure {}", request);
                return ConfigureStatus::Error;
            }
        }
    }
}
