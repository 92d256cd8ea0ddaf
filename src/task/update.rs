// SPDX-License-Identifier: GPL-3.0-only
//! One display reconfiguration, from hardware query to final report
//!
//! [`UpdateDisplayConfigurationTask`] reconciles a requested multi-display
//! state and power state with the connected hardware:
//!
//! 1. query the delegate for the connected displays,
//! 2. pick a multi-display state if the caller left it unset and decide
//!    whether anything needs to change,
//! 3. ask the layout manager for a modeset plan and apply it,
//! 4. if hardware mirroring failed, retry in extended mode with software
//!    mirroring,
//! 5. force DPMS on if the power state changed and report through the
//!    callback.
//!
//! # Ownership
//!
//! The caller owns the task and drives [`run`](UpdateDisplayConfigurationTask::run)
//! to completion exactly once. The only suspension points are the delegate
//! query and the modeset. Dropping the task, or the `run` future, at any
//! point stops it: nothing else holds a path back into the task. Callers that
//! need to stop a task they no longer poll directly use
//! [`CancelHandle`]; the task checks it after every suspension point and
//! stops without touching the hardware again and without invoking the
//! callback.
//!
//! The display server is grabbed in [`new`](UpdateDisplayConfigurationTask::new)
//! and released when the task is dropped, so it stays locked for the whole
//! update including the mirroring retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::delegate::NativeDisplayDelegate;
use crate::display::{
    DisplayId, DisplayPowerState, DisplaySnapshot, MultipleDisplayState, PowerFlags, Size,
    display_power,
};
use crate::layout::DisplayLayoutManager;

use super::configure::{ConfigureDisplaysTask, ConfigureStatus};

/// Final report of a configuration task
#[derive(Debug, Clone)]
pub struct ConfigurationOutcome {
    pub success: bool,
    pub displays: Vec<Arc<DisplaySnapshot>>,
    pub framebuffer_size: Size,
    pub display_state: MultipleDisplayState,
    pub power_state: DisplayPowerState,
}

pub type ResponseCallback = Box<dyn FnOnce(ConfigurationOutcome) + Send>;

/// Shared flag that stops a running task at its next continuation
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct UpdateDisplayConfigurationTask {
    delegate: Arc<dyn NativeDisplayDelegate>,
    layout_manager: Arc<dyn DisplayLayoutManager>,

    new_display_state: MultipleDisplayState,
    new_power_state: DisplayPowerState,
    power_flags: PowerFlags,
    background_color_argb: u32,
    force_configure: bool,
    callback: Option<ResponseCallback>,

    /// Set once it is known that the update changes power state
    force_dpms: bool,
    /// Displays reported by the delegate for this run
    cached_displays: Vec<Arc<DisplaySnapshot>>,
    framebuffer_size: Size,

    server_grabbed: bool,
    started: bool,
    cancel: CancelHandle,
}

impl UpdateDisplayConfigurationTask {
    /// Create the task and grab the display server.
    ///
    /// `new_display_state` may be [`MultipleDisplayState::Invalid`], in which
    /// case the task picks one from the connected displays.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        delegate: Arc<dyn NativeDisplayDelegate>,
        layout_manager: Arc<dyn DisplayLayoutManager>,
        new_display_state: MultipleDisplayState,
        new_power_state: DisplayPowerState,
        power_flags: PowerFlags,
        background_color_argb: u32,
        force_configure: bool,
        callback: ResponseCallback,
    ) -> Self {
        let server_grabbed = delegate.grab_server();
        if !server_grabbed {
            warn!("Could not grab the display server, configuring anyway");
        }

        Self {
            delegate,
            layout_manager,
            new_display_state,
            new_power_state,
            power_flags,
            background_color_argb,
            force_configure,
            callback: Some(callback),
            force_dpms: false,
            cached_displays: Vec::new(),
            framebuffer_size: Size::default(),
            server_grabbed,
            started: false,
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the update. Resolves once the callback has been invoked, or once
    /// the task noticed it was cancelled.
    pub async fn run(&mut self) {
        if self.started {
            warn!("Display configuration task can only run once");
            return;
        }
        self.started = true;

        let displays = self.delegate.get_displays().await;
        if self.is_cancelled() {
            return;
        }
        self.on_displays_updated(displays).await;
    }

    fn is_cancelled(&self) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!("Display configuration task cancelled");
        }
        cancelled
    }

    async fn on_displays_updated(&mut self, displays: Vec<Arc<DisplaySnapshot>>) {
        self.cached_displays = displays;

        if self.cached_displays.len() > 1 && self.background_color_argb != 0 {
            self.delegate.set_background_color(self.background_color_argb);
        }

        // Without displays the only possible state is headless, whatever
        // the caller pinned.
        if self.new_display_state == MultipleDisplayState::Invalid || self.cached_displays.is_empty() {
            self.new_display_state = self.choose_display_state();
        }

        info!(
            displays = self.cached_displays.len(),
            state = %self.new_display_state,
            power = %self.new_power_state,
            "Updating display configuration"
        );

        let should_configure = self.should_configure();
        self.force_dpms =
            should_configure && !self.cached_displays.is_empty() && self.should_force_dpms();

        if should_configure {
            let status = self.enter_state().await;
            if self.is_cancelled() {
                return;
            }
            self.on_state_entered(status).await;
        } else {
            // Nothing to apply; report what the hardware is actually doing.
            self.new_power_state = self.layout_manager.get_power_state();
            debug!("Display configuration unchanged, skipping modeset");
            self.finish_configuration(true);
        }
    }

    /// Multi-display state for the cached displays under the requested power
    /// state.
    pub fn choose_display_state(&self) -> MultipleDisplayState {
        match self.cached_displays.len() {
            0 => MultipleDisplayState::Headless,
            1 => MultipleDisplayState::Single,
            count => {
                let (_, num_on) = display_power(&self.cached_displays, self.new_power_state);
                if num_on == 1 {
                    // Drive the one lit display at its native mode.
                    return MultipleDisplayState::Single;
                }
                if num_on >= 3 {
                    return MultipleDisplayState::MultiExtended;
                }
                if count == 2 {
                    return match self.layout_manager.get_state_controller() {
                        Some(controller) => {
                            let display_ids: Vec<DisplayId> = self
                                .cached_displays
                                .iter()
                                .map(|display| display.display_id)
                                .collect();
                            controller.get_state_for_display_ids(&display_ids)
                        }
                        None => MultipleDisplayState::DualExtended,
                    };
                }

                // Three or more displays with none or two of them lit, e.g.
                // everything powered off. The extended layout keeps every
                // display's geometry.
                warn!(count, num_on, "No natural display state for this power state, using multi-extended");
                MultipleDisplayState::MultiExtended
            }
        }
    }

    /// Whether the hardware has to be reconfigured at all
    pub fn should_configure(&self) -> bool {
        if self.force_configure {
            return true;
        }

        if self.cached_displays.len() == 1 && self.cached_displays[0].is_internal() {
            return true;
        }

        if !self
            .power_flags
            .contains(PowerFlags::ONLY_IF_SINGLE_INTERNAL_DISPLAY)
        {
            return true;
        }

        self.new_display_state != self.layout_manager.get_display_state()
    }

    /// Whether DPMS must be forced on once the configuration succeeds
    pub fn should_force_dpms(&self) -> bool {
        self.new_power_state != DisplayPowerState::AllOff
            && (self.layout_manager.get_power_state() != self.new_power_state
                || self.power_flags.contains(PowerFlags::FORCE_PROBE))
    }

    /// Lay out `new_display_state` and apply it
    async fn enter_state(&mut self) -> ConfigureStatus {
        let Some(layout) = self.layout_manager.get_display_layout(
            &self.cached_displays,
            self.new_display_state,
            self.new_power_state,
        ) else {
            warn!(state = %self.new_display_state, "Layout manager cannot lay out displays");
            return ConfigureStatus::Error;
        };

        self.framebuffer_size = layout.framebuffer_size;
        if layout.requests.is_empty() {
            return ConfigureStatus::Success;
        }

        if self.framebuffer_size.is_empty() {
            debug_assert!(false, "layout with requests but an empty framebuffer");
            error!(state = %self.new_display_state, "Layout has requests but an empty framebuffer");
            return ConfigureStatus::Error;
        }

        self.delegate.create_frame_buffer(self.framebuffer_size);
        ConfigureDisplaysTask::new(self.delegate.as_ref(), layout.requests)
            .run()
            .await
    }

    async fn on_state_entered(&mut self, status: ConfigureStatus) {
        let mut success = status != ConfigureStatus::Error;
        // Mirroring is all or nothing: both displays at the same mode.
        if self.new_display_state == MultipleDisplayState::DualMirror
            && status == ConfigureStatus::PartialSuccess
        {
            success = false;
        }

        let layout_manager = self.layout_manager.clone();
        if let Some(mirroring) = layout_manager.get_software_mirroring_controller() {
            let mut enable_software_mirroring = false;

            if !success && self.new_display_state == MultipleDisplayState::DualMirror {
                if layout_manager.get_display_state() != MultipleDisplayState::DualExtended
                    || layout_manager.get_power_state() != self.new_power_state
                    || self.force_configure
                {
                    info!("Hardware mirroring failed, retrying in extended mode with software mirroring");
                    self.new_display_state = MultipleDisplayState::DualExtended;
                    let status = self.enter_state().await;
                    if self.is_cancelled() {
                        return;
                    }
                    self.on_enable_software_mirroring(status);
                    return;
                }

                // Already extended; mirror in software on top of it.
                success = layout_manager.get_display_state() == MultipleDisplayState::DualExtended;
                enable_software_mirroring = success;
                if success {
                    self.new_display_state = MultipleDisplayState::DualExtended;
                }
            }

            mirroring.set_software_mirroring(enable_software_mirroring);
        }

        self.finish_configuration(success);
    }

    fn on_enable_software_mirroring(&mut self, status: ConfigureStatus) {
        let success = status != ConfigureStatus::Error;
        if let Some(mirroring) = self.layout_manager.get_software_mirroring_controller() {
            mirroring.set_software_mirroring(success);
        }
        self.finish_configuration(success);
    }

    fn finish_configuration(&mut self, success: bool) {
        if success && self.force_dpms {
            self.delegate.force_dpms_on();
        }

        let Some(callback) = self.callback.take() else {
            warn!("Display configuration already reported");
            return;
        };

        if success {
            info!(
                state = %self.new_display_state,
                power = %self.new_power_state,
                framebuffer = %self.framebuffer_size,
                "Display configuration succeeded"
            );
        } else {
            warn!(state = %self.new_display_state, "Display configuration failed");
        }

        callback(ConfigurationOutcome {
            success,
            displays: self.cached_displays.clone(),
            framebuffer_size: self.framebuffer_size,
            display_state: self.new_display_state,
            power_state: self.new_power_state,
        });
    }
}

impl Drop for UpdateDisplayConfigurationTask {
    fn drop(&mut self) {
        if self.server_grabbed {
            self.delegate.ungrab_server();
        }
    }
}
