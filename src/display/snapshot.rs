// SPDX-License-Identifier: GPL-3.0-only
//! Hardware-reported display state
//!
//! A [`DisplaySnapshot`] describes one connected display exactly as the
//! platform delegate reported it. Snapshots are immutable and shared as
//! `Arc<DisplaySnapshot>`: the delegate owns the live state, configuration
//! tasks only keep clones for the duration of a single run.

use std::fmt;
use std::sync::Arc;

pub type DisplayId = u64;

/// How a display is attached to the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayConnectionType {
    /// Built-in panel (laptop eDP, LVDS, DSI)
    Internal,
    /// Anything plugged into an external connector
    External,
    /// Connection type could not be determined
    Unknown,
}

impl DisplayConnectionType {
    pub fn is_internal(self) -> bool {
        self == DisplayConnectionType::Internal
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One timing a display can be driven at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMode {
    pub size: Size,
    pub refresh_rate: f32,
    pub is_interlaced: bool,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, refresh_rate: f32) -> Self {
        Self {
            size: Size::new(width, height),
            refresh_rate,
            is_interlaced: false,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:.2}", self.size, self.refresh_rate)?;
        if self.is_interlaced {
            write!(f, "i")?;
        }
        Ok(())
    }
}

/// Immutable state of one connected display
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    pub display_id: DisplayId,
    pub connection_type: DisplayConnectionType,
    pub name: String,
    /// Physical size in millimeters
    pub physical_size: Size,
    pub modes: Vec<DisplayMode>,
    pub native_mode: Option<DisplayMode>,
    pub current_mode: Option<DisplayMode>,
    pub origin: Point,
}

impl DisplaySnapshot {
    pub fn new(
        display_id: DisplayId,
        connection_type: DisplayConnectionType,
        name: impl Into<String>,
        modes: Vec<DisplayMode>,
        native_mode: Option<DisplayMode>,
    ) -> Self {
        Self {
            display_id,
            connection_type,
            name: name.into(),
            physical_size: Size::default(),
            modes,
            native_mode,
            current_mode: None,
            origin: Point::default(),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.connection_type.is_internal()
    }

    /// Find a mode of the given size, preferring the highest refresh rate
    /// and progressive over interlaced timings.
    pub fn find_mode_by_size(&self, size: Size) -> Option<DisplayMode> {
        self.modes
            .iter()
            .filter(|mode| mode.size == size)
            .copied()
            .reduce(|best, mode| {
                let better = match (best.is_interlaced, mode.is_interlaced) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => mode.refresh_rate > best.refresh_rate,
                };
                if better { mode } else { best }
            })
    }

    /// Largest mode by pixel count
    pub fn largest_mode(&self) -> Option<DisplayMode> {
        self.modes
            .iter()
            .copied()
            .reduce(|best, mode| if mode.size.area() > best.size.area() { mode } else { best })
    }

    /// The best mode strictly smaller than `mode`, used when the hardware
    /// refuses a modeset.
    pub fn next_smaller_mode(&self, mode: &DisplayMode) -> Option<DisplayMode> {
        let current = mode.size.area();
        self.modes
            .iter()
            .filter(|candidate| candidate.size.area() < current)
            .copied()
            .reduce(|best, candidate| {
                if candidate.size.area() > best.size.area() {
                    candidate
                } else {
                    best
                }
            })
    }
}

impl fmt::Display for DisplaySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:?})", self.name, self.display_id, self.connection_type)
    }
}

/// One row of a layout plan: drive `display` at `mode` placed at `origin`.
///
/// A `None` mode powers the display off.
#[derive(Debug, Clone)]
pub struct DisplayConfigureRequest {
    pub display: Arc<DisplaySnapshot>,
    pub mode: Option<DisplayMode>,
    pub origin: Point,
}

impl DisplayConfigureRequest {
    pub fn new(display: Arc<DisplaySnapshot>, mode: Option<DisplayMode>, origin: Point) -> Self {
        Self { display, mode, origin }
    }
}

impl fmt::Display for DisplayConfigureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            Some(mode) => write!(
                f,
                "display {} -> {} at {},{}",
                self.display.display_id, mode, self.origin.x, self.origin.y
            ),
            None => write!(f, "display {} -> off", self.display.display_id),
        }
    }
}
