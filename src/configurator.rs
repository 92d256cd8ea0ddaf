// SPDX-License-Identifier: GPL-3.0-only
//! Owner of display configuration
//!
//! [`DisplayConfigurator`] keeps what the user asked for (multi-display
//! state, power state, background color) and what the hardware is currently
//! doing, and turns every change request into one
//! [`UpdateDisplayConfigurationTask`]. Requests take `&mut self`, so only one
//! task runs at a time and the server grab never nests.
//!
//! The configurator is also the [`DisplayLayoutManager`] its tasks consult:
//! [`ConfiguratorLayout`] shares the current state, the optional policy
//! controllers and the layout planner with every task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::delegate::NativeDisplayDelegate;
use crate::display::{
    DisplayId, DisplayPowerState, DisplaySnapshot, MultipleDisplayState, PowerFlags, Size,
};
use crate::layout::{
    DisplayLayout, DisplayLayoutManager, SoftwareMirroringController, StateController, plan_layout,
};
use crate::task::{ConfigurationOutcome, ResponseCallback, UpdateDisplayConfigurationTask};

/// Notified after every configuration attempt
pub trait DisplayConfiguratorObserver: Send + Sync {
    fn on_display_mode_changed(&self, _displays: &[Arc<DisplaySnapshot>]) {}

    fn on_display_mode_change_failed(
        &self,
        _displays: &[Arc<DisplaySnapshot>],
        _failed_state: MultipleDisplayState,
    ) {
    }

    fn on_power_state_changed(&self, _power_state: DisplayPowerState) {}
}

/// The same mirror-vs-extend answer for every pair of displays
#[derive(Debug, Clone, Copy)]
pub struct FixedStatePolicy(pub MultipleDisplayState);

impl StateController for FixedStatePolicy {
    fn get_state_for_display_ids(&self, _display_ids: &[DisplayId]) -> MultipleDisplayState {
        self.0
    }
}

/// Software mirroring switch for hosts that mirror by copying the desktop
#[derive(Debug, Default)]
pub struct SoftwareMirroringFlag(AtomicBool);

impl SoftwareMirroringController for SoftwareMirroringFlag {
    fn set_software_mirroring(&self, enabled: bool) {
        if self.0.swap(enabled, Ordering::SeqCst) != enabled {
            info!(enabled, "Software mirroring toggled");
        }
    }

    fn software_mirroring_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
struct CurrentState {
    display_state: MultipleDisplayState,
    power_state: DisplayPowerState,
}

/// Layout manager backed by the configurator's current state
pub struct ConfiguratorLayout {
    current: Mutex<CurrentState>,
    state_controller: Option<Arc<dyn StateController>>,
    mirroring_controller: Option<Arc<dyn SoftwareMirroringController>>,
}

impl ConfiguratorLayout {
    fn current(&self) -> MutexGuard<'_, CurrentState> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current(&self, display_state: MultipleDisplayState, power_state: DisplayPowerState) {
        let mut current = self.current();
        current.display_state = display_state;
        current.power_state = power_state;
    }
}

impl DisplayLayoutManager for ConfiguratorLayout {
    fn get_display_layout(
        &self,
        displays: &[Arc<DisplaySnapshot>],
        new_display_state: MultipleDisplayState,
        new_power_state: DisplayPowerState,
    ) -> Option<DisplayLayout> {
        plan_layout(
            displays,
            new_display_state,
            new_power_state,
            self.state_controller.as_deref(),
        )
    }

    fn get_display_state(&self) -> MultipleDisplayState {
        self.current().display_state
    }

    fn get_power_state(&self) -> DisplayPowerState {
        self.current().power_state
    }

    fn get_software_mirroring_controller(&self) -> Option<&dyn SoftwareMirroringController> {
        self.mirroring_controller.as_deref()
    }

    fn get_state_controller(&self) -> Option<&dyn StateController> {
        self.state_controller.as_deref()
    }
}

pub struct DisplayConfigurator {
    delegate: Arc<dyn NativeDisplayDelegate>,
    state_controller: Option<Arc<dyn StateController>>,
    mirroring_controller: Option<Arc<dyn SoftwareMirroringController>>,
    layout: Arc<ConfiguratorLayout>,
    observers: Vec<Arc<dyn DisplayConfiguratorObserver>>,

    /// `Invalid` lets each task pick the state from the connected displays
    requested_display_state: MultipleDisplayState,
    requested_power_state: DisplayPowerState,
    /// Power state to restore on resume
    power_state_before_suspend: Option<DisplayPowerState>,
    background_color_argb: u32,

    cached_displays: Vec<Arc<DisplaySnapshot>>,
    framebuffer_size: Size,
}

impl DisplayConfigurator {
    pub fn new(delegate: Arc<dyn NativeDisplayDelegate>) -> Self {
        Self {
            delegate,
            state_controller: None,
            mirroring_controller: None,
            layout: Arc::new(ConfiguratorLayout {
                current: Mutex::new(CurrentState {
                    display_state: MultipleDisplayState::Invalid,
                    power_state: DisplayPowerState::AllOn,
                }),
                state_controller: None,
                mirroring_controller: None,
            }),
            observers: Vec::new(),
            requested_display_state: MultipleDisplayState::Invalid,
            requested_power_state: DisplayPowerState::AllOn,
            power_state_before_suspend: None,
            background_color_argb: 0,
            cached_displays: Vec::new(),
            framebuffer_size: Size::default(),
        }
    }

    pub fn with_state_controller(mut self, controller: Arc<dyn StateController>) -> Self {
        self.state_controller = Some(controller);
        self.rebuild_layout();
        self
    }

    pub fn with_mirroring_controller(mut self, controller: Arc<dyn SoftwareMirroringController>) -> Self {
        self.mirroring_controller = Some(controller);
        self.rebuild_layout();
        self
    }

    fn rebuild_layout(&mut self) {
        let current = *self.layout.current();
        self.layout = Arc::new(ConfiguratorLayout {
            current: Mutex::new(current),
            state_controller: self.state_controller.clone(),
            mirroring_controller: self.mirroring_controller.clone(),
        });
    }

    pub fn add_observer(&mut self, observer: Arc<dyn DisplayConfiguratorObserver>) {
        self.observers.push(observer);
    }

    pub fn current_display_state(&self) -> MultipleDisplayState {
        self.layout.get_display_state()
    }

    pub fn current_power_state(&self) -> DisplayPowerState {
        self.layout.get_power_state()
    }

    pub fn requested_power_state(&self) -> DisplayPowerState {
        self.requested_power_state
    }

    /// Displays as reported at the start of the last successful configuration
    pub fn cached_displays(&self) -> &[Arc<DisplaySnapshot>] {
        &self.cached_displays
    }

    pub fn framebuffer_size(&self) -> Size {
        self.framebuffer_size
    }

    /// First configuration after startup. Always touches the hardware.
    pub async fn force_initial_configure(&mut self, background_color_argb: u32) -> ConfigurationOutcome {
        info!("Running initial display configuration");
        self.background_color_argb = background_color_argb;
        self.run_task(PowerFlags::empty(), true).await
    }

    /// Request a multi-display state and power state in one run
    pub async fn configure(
        &mut self,
        state: MultipleDisplayState,
        power_state: DisplayPowerState,
        flags: PowerFlags,
        force_configure: bool,
    ) -> ConfigurationOutcome {
        self.requested_display_state = state;
        self.requested_power_state = power_state;
        self.run_task(flags, force_configure).await
    }

    pub fn set_background_color(&mut self, background_color_argb: u32) {
        self.background_color_argb = background_color_argb;
    }

    /// Pin a multi-display state
    pub async fn set_display_mode(&mut self, state: MultipleDisplayState) -> bool {
        info!(%state, "Display mode requested");
        self.requested_display_state = state;
        self.run_task(PowerFlags::empty(), false).await.success
    }

    pub async fn set_display_power(&mut self, power_state: DisplayPowerState, flags: PowerFlags) -> bool {
        info!(power = %power_state, ?flags, "Display power requested");
        self.requested_power_state = power_state;
        self.run_task(flags, false).await.success
    }

    /// Displays were connected or disconnected
    pub async fn on_configuration_changed(&mut self) -> bool {
        info!("Display configuration changed, re-probing");
        self.requested_display_state = MultipleDisplayState::Invalid;
        self.run_task(PowerFlags::empty(), false).await.success
    }

    /// Power every display off, remembering the power state to restore
    pub async fn suspend_displays(&mut self) -> bool {
        if self.power_state_before_suspend.is_none() {
            self.power_state_before_suspend = Some(self.requested_power_state);
        }
        self.set_display_power(DisplayPowerState::AllOff, PowerFlags::FORCE_PROBE)
            .await
    }

    pub async fn resume_displays(&mut self) -> bool {
        let power_state = self
            .power_state_before_suspend
            .take()
            .unwrap_or(self.requested_power_state);
        self.set_display_power(power_state, PowerFlags::FORCE_PROBE).await
    }

    async fn run_task(&mut self, power_flags: PowerFlags, force_configure: bool) -> ConfigurationOutcome {
        let (sender, receiver) = oneshot::channel();
        let callback: ResponseCallback = Box::new(move |outcome| {
            let _ = sender.send(outcome);
        });

        let mut task = UpdateDisplayConfigurationTask::new(
            self.delegate.clone(),
            self.layout.clone(),
            self.requested_display_state,
            self.requested_power_state,
            power_flags,
            self.background_color_argb,
            force_configure,
            callback,
        );
        task.run().await;
        // Release the server before observers react to the new state.
        drop(task);

        let outcome = match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Display configuration task finished without reporting");
                ConfigurationOutcome {
                    success: false,
                    displays: self.cached_displays.clone(),
                    framebuffer_size: self.framebuffer_size,
                    display_state: self.requested_display_state,
                    power_state: self.requested_power_state,
                }
            }
        };
        self.on_configured(&outcome);
        outcome
    }

    fn on_configured(&mut self, outcome: &ConfigurationOutcome) {
        if !outcome.success {
            warn!(state = %outcome.display_state, "Failed to apply display configuration");
            for observer in &self.observers {
                observer.on_display_mode_change_failed(&outcome.displays, outcome.display_state);
            }
            return;
        }

        let previous_power_state = self.layout.get_power_state();
        self.layout
            .set_current(outcome.display_state, outcome.power_state);
        self.cached_displays = outcome.displays.clone();
        self.framebuffer_size = outcome.framebuffer_size;

        for observer in &self.observers {
            observer.on_display_mode_changed(&outcome.displays);
        }
        if previous_power_state != outcome.power_state {
            for observer in &self.observers {
                observer.on_power_state_changed(outcome.power_state);
            }
        }
    }
}
