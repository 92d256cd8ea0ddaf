// SPDX-License-Identifier: GPL-3.0-only
//! In-memory display hardware
//!
//! Behaves like a display server with a fixed set of connected displays.
//! Successful modesets are applied to the stored snapshots so the next
//! [`get_displays`](NativeDisplayDelegate::get_displays) reflects them, and
//! modes listed as rejected fail the way a CRTC without enough bandwidth
//! would. Every call is appended to an action log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{self, BoxFuture};

use crate::display::{DisplayConfigureRequest, DisplayId, DisplaySnapshot, Size};

use super::NativeDisplayDelegate;

/// A connected display plus the modes the simulated hardware refuses
#[derive(Debug, Clone)]
pub struct SimulatedDisplay {
    pub snapshot: DisplaySnapshot,
    pub rejected_modes: Vec<Size>,
}

impl SimulatedDisplay {
    pub fn new(snapshot: DisplaySnapshot) -> Self {
        Self {
            snapshot,
            rejected_modes: Vec::new(),
        }
    }

    pub fn rejecting(mut self, size: Size) -> Self {
        self.rejected_modes.push(size);
        self
    }
}

#[derive(Debug, Default)]
struct HardwareState {
    displays: Vec<SimulatedDisplay>,
    grabbed: bool,
    framebuffer: Option<Size>,
    background_color: Option<u32>,
    actions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SimulatedDelegate {
    hardware: Mutex<HardwareState>,
}

impl SimulatedDelegate {
    pub fn new(displays: Vec<SimulatedDisplay>) -> Self {
        Self {
            hardware: Mutex::new(HardwareState {
                displays,
                ..Default::default()
            }),
        }
    }

    fn hardware(&self) -> MutexGuard<'_, HardwareState> {
        self.hardware.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the connected displays, as a hotplug would
    pub fn set_displays(&self, displays: Vec<SimulatedDisplay>) {
        let mut hardware = self.hardware();
        info!("Simulated hotplug: {} display(s) connected", displays.len());
        hardware.displays = displays;
    }

    /// Everything the delegate was asked to do, in order
    pub fn actions(&self) -> Vec<String> {
        self.hardware().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.hardware().actions.clear();
    }

    /// Number of logged actions starting with `prefix`
    pub fn count_actions(&self, prefix: &str) -> usize {
        self.hardware()
            .actions
            .iter()
            .filter(|action| action.starts_with(prefix))
            .count()
    }

    pub fn is_grabbed(&self) -> bool {
        self.hardware().grabbed
    }

    pub fn framebuffer(&self) -> Option<Size> {
        self.hardware().framebuffer
    }

    pub fn background_color(&self) -> Option<u32> {
        self.hardware().background_color
    }

    /// Current snapshot of one display
    pub fn display(&self, display_id: DisplayId) -> Option<DisplaySnapshot> {
        self.hardware()
            .displays
            .iter()
            .find(|display| display.snapshot.display_id == display_id)
            .map(|display| display.snapshot.clone())
    }
}

impl NativeDisplayDelegate for SimulatedDelegate {
    fn grab_server(&self) -> bool {
        let mut hardware = self.hardware();
        hardware.actions.push("grab".to_string());
        if hardware.grabbed {
            warn!("Simulated server already grabbed");
            return false;
        }
        hardware.grabbed = true;
        true
    }

    fn ungrab_server(&self) {
        let mut hardware = self.hardware();
        hardware.actions.push("ungrab".to_string());
        hardware.grabbed = false;
    }

    fn get_displays(&self) -> BoxFuture<'_, Vec<Arc<DisplaySnapshot>>> {
        let displays: Vec<_> = {
            let mut hardware = self.hardware();
            hardware.actions.push("get_displays".to_string());
            hardware
                .displays
                .iter()
                .map(|display| Arc::new(display.snapshot.clone()))
                .collect()
        };
        future::ready(displays).boxed()
    }

    fn configure<'a>(&'a self, request: &'a DisplayConfigureRequest) -> BoxFuture<'a, bool> {
        let mut hardware = self.hardware();
        let display_id = request.display.display_id;
        let target = match &request.mode {
            Some(mode) => mode.size.to_string(),
            None => "off".to_string(),
        };
        hardware.actions.push(format!(
            "configure({},{},{},{})",
            display_id, target, request.origin.x, request.origin.y
        ));

        let accepted = match hardware
            .displays
            .iter_mut()
            .find(|display| display.snapshot.display_id == display_id)
        {
            Some(display) => {
                let rejected = request
                    .mode
                    .is_some_and(|mode| display.rejected_modes.contains(&mode.size));
                if rejected {
                    debug!(display_id, mode = %target, "Simulated hardware rejected mode");
                    false
                } else {
                    display.snapshot.current_mode = request.mode;
                    display.snapshot.origin = request.origin;
                    true
                }
            }
            None => {
                warn!(display_id, "Configure request for a display that is not connected");
                false
            }
        };
        future::ready(accepted).boxed()
    }

    fn create_frame_buffer(&self, size: Size) {
        let mut hardware = self.hardware();
        hardware.actions.push(format!("framebuffer({})", size));
        hardware.framebuffer = Some(size);
    }

    fn set_background_color(&self, color_argb: u32) {
        let mut hardware = self.hardware();
        hardware.actions.push(format!("background({:#010x})", color_argb));
        hardware.background_color = Some(color_argb);
    }

    fn force_dpms_on(&self) {
        self.hardware().actions.push("force_dpms_on".to_string());
    }
}
