// SPDX-License-Identifier: GPL-3.0-only
//! Platform display driver abstraction
//!
//! The configuration tasks never talk to a display server directly. They go
//! through a [`NativeDisplayDelegate`], which a platform backend implements.
//! [`SimulatedDelegate`] is an in-memory implementation used by the command
//! line tool and the tests.

mod simulated;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::display::{DisplayConfigureRequest, DisplaySnapshot, Size};

pub use simulated::{SimulatedDelegate, SimulatedDisplay};

/// Common trait for all display driver backends
pub trait NativeDisplayDelegate: Send + Sync {
    /// Lock the display server against concurrent reconfiguration.
    /// Returns false if the server could not be grabbed.
    fn grab_server(&self) -> bool;

    /// Release the lock taken by [`grab_server`](Self::grab_server)
    fn ungrab_server(&self);

    /// Query the connected displays
    fn get_displays(&self) -> BoxFuture<'_, Vec<Arc<DisplaySnapshot>>>;

    /// Apply one per-display modeset. Resolves to false if the hardware
    /// refused it.
    fn configure<'a>(&'a self, request: &'a DisplayConfigureRequest) -> BoxFuture<'a, bool>;

    /// Allocate the scanout framebuffer backing all displays
    fn create_frame_buffer(&self, size: Size);

    /// Paint the root background (ARGB). Best-effort.
    fn set_background_color(&self, color_argb: u32);

    /// Turn DPMS on for every display
    fn force_dpms_on(&self);
}
