// SPDX-License-Identifier: GPL-3.0-only
//! Shared fixtures for unit tests

use std::sync::{Arc, Mutex};

use crate::display::{
    DisplayConnectionType, DisplayId, DisplayMode, DisplayPowerState, DisplaySnapshot,
    MultipleDisplayState,
};
use crate::layout::{
    DisplayLayout, DisplayLayoutManager, SoftwareMirroringController, StateController, plan_layout,
};
use crate::task::{ConfigurationOutcome, ResponseCallback};

/// 1920x1200 laptop panel, also supports 1920x1080 and 1280x720
pub fn internal_panel(id: DisplayId) -> Arc<DisplaySnapshot> {
    let native = DisplayMode::new(1920, 1200, 60.0);
    Arc::new(DisplaySnapshot::new(
        id,
        DisplayConnectionType::Internal,
        "eDP-1",
        vec![native, DisplayMode::new(1920, 1080, 60.0), DisplayMode::new(1280, 720, 60.0)],
        Some(native),
    ))
}

/// 2560x1440 monitor, also supports 1920x1080 and 1280x720
pub fn external_monitor(id: DisplayId) -> Arc<DisplaySnapshot> {
    let native = DisplayMode::new(2560, 1440, 59.95);
    Arc::new(DisplaySnapshot::new(
        id,
        DisplayConnectionType::External,
        format!("DP-{}", id),
        vec![native, DisplayMode::new(1920, 1080, 60.0), DisplayMode::new(1280, 720, 60.0)],
        Some(native),
    ))
}

/// Callback that stores every outcome it receives
pub fn outcome_recorder() -> (Arc<Mutex<Vec<ConfigurationOutcome>>>, ResponseCallback) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    let callback: ResponseCallback = Box::new(move |outcome| sink.lock().unwrap().push(outcome));
    (outcomes, callback)
}

#[derive(Default)]
pub struct RecordingMirroring {
    pub calls: Mutex<Vec<bool>>,
}

impl SoftwareMirroringController for RecordingMirroring {
    fn set_software_mirroring(&self, enabled: bool) {
        self.calls.lock().unwrap().push(enabled);
    }

    fn software_mirroring_enabled(&self) -> bool {
        self.calls.lock().unwrap().last().copied().unwrap_or(false)
    }
}

pub struct FixedStateController {
    pub state: MultipleDisplayState,
    pub seen_ids: Mutex<Vec<Vec<DisplayId>>>,
}

impl StateController for FixedStateController {
    fn get_state_for_display_ids(&self, display_ids: &[DisplayId]) -> MultipleDisplayState {
        self.seen_ids.lock().unwrap().push(display_ids.to_vec());
        self.state
    }
}

/// Layout manager with a fixed "current" state that plans real layouts and
/// records which states it was asked to lay out
pub struct MockLayoutManager {
    pub display_state: MultipleDisplayState,
    pub power_state: DisplayPowerState,
    pub mirroring: Option<RecordingMirroring>,
    pub state_controller: Option<FixedStateController>,
    pub requested_layouts: Mutex<Vec<MultipleDisplayState>>,
}

impl MockLayoutManager {
    pub fn new() -> Self {
        Self {
            display_state: MultipleDisplayState::Invalid,
            power_state: DisplayPowerState::AllOn,
            mirroring: None,
            state_controller: None,
            requested_layouts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_current(mut self, state: MultipleDisplayState, power: DisplayPowerState) -> Self {
        self.display_state = state;
        self.power_state = power;
        self
    }

    pub fn with_software_mirroring(mut self) -> Self {
        self.mirroring = Some(RecordingMirroring::default());
        self
    }

    pub fn with_state_controller(mut self, state: MultipleDisplayState) -> Self {
        self.state_controller = Some(FixedStateController {
            state,
            seen_ids: Mutex::new(Vec::new()),
        });
        self
    }

    pub fn mirroring_calls(&self) -> Vec<bool> {
        self.mirroring
            .as_ref()
            .map(|mirroring| mirroring.calls.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn layout_requests(&self) -> Vec<MultipleDisplayState> {
        self.requested_layouts.lock().unwrap().clone()
    }
}

impl DisplayLayoutManager for MockLayoutManager {
    fn get_display_layout(
        &self,
        displays: &[Arc<DisplaySnapshot>],
        new_display_state: MultipleDisplayState,
        new_power_state: DisplayPowerState,
    ) -> Option<DisplayLayout> {
        self.requested_layouts.lock().unwrap().push(new_display_state);
        plan_layout(displays, new_display_state, new_power_state, self.get_state_controller())
    }

    fn get_display_state(&self) -> MultipleDisplayState {
        self.display_state
    }

    fn get_power_state(&self) -> DisplayPowerState {
        self.power_state
    }

    fn get_software_mirroring_controller(&self) -> Option<&dyn SoftwareMirroringController> {
        self.mirroring
            .as_ref()
            .map(|mirroring| mirroring as &dyn SoftwareMirroringController)
    }

    fn get_state_controller(&self) -> Option<&dyn StateController> {
        self.state_controller
            .as_ref()
            .map(|controller| controller as &dyn StateController)
    }
}
