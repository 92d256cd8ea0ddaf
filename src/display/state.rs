// SPDX-License-Identifier: GPL-3.0-only
//! Multi-display topology and power states

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::AppError;

use super::snapshot::DisplaySnapshot;

/// How the connected displays are combined into one desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultipleDisplayState {
    /// Not decided yet; the configuration task picks a state itself
    Invalid,
    /// No displays connected
    Headless,
    /// One display, or exactly one powered on among several
    Single,
    DualMirror,
    DualExtended,
    /// Three or more displays side by side
    MultiExtended,
}

impl MultipleDisplayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultipleDisplayState::Invalid => "invalid",
            MultipleDisplayState::Headless => "headless",
            MultipleDisplayState::Single => "single",
            MultipleDisplayState::DualMirror => "dual-mirror",
            MultipleDisplayState::DualExtended => "dual-extended",
            MultipleDisplayState::MultiExtended => "multi-extended",
        }
    }
}

impl fmt::Display for MultipleDisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MultipleDisplayState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid" => Ok(MultipleDisplayState::Invalid),
            "headless" => Ok(MultipleDisplayState::Headless),
            "single" => Ok(MultipleDisplayState::Single),
            "dual-mirror" | "mirror" => Ok(MultipleDisplayState::DualMirror),
            "dual-extended" | "extended" => Ok(MultipleDisplayState::DualExtended),
            "multi-extended" => Ok(MultipleDisplayState::MultiExtended),
            other => Err(AppError::UnknownDisplayState(other.to_string())),
        }
    }
}

/// Which displays should be powered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayPowerState {
    AllOn,
    AllOff,
    InternalOffExternalOn,
    InternalOnExternalOff,
}

impl DisplayPowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayPowerState::AllOn => "all-on",
            DisplayPowerState::AllOff => "all-off",
            DisplayPowerState::InternalOffExternalOn => "internal-off-external-on",
            DisplayPowerState::InternalOnExternalOff => "internal-on-external-off",
        }
    }

    /// Whether a display of the given kind is powered under this state
    pub fn is_display_on(&self, internal: bool) -> bool {
        match self {
            DisplayPowerState::AllOn => true,
            DisplayPowerState::AllOff => false,
            DisplayPowerState::InternalOffExternalOn => !internal,
            DisplayPowerState::InternalOnExternalOff => internal,
        }
    }
}

impl fmt::Display for DisplayPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayPowerState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all-on" | "on" => Ok(DisplayPowerState::AllOn),
            "all-off" | "off" => Ok(DisplayPowerState::AllOff),
            "internal-off-external-on" => Ok(DisplayPowerState::InternalOffExternalOn),
            "internal-on-external-off" => Ok(DisplayPowerState::InternalOnExternalOff),
            other => Err(AppError::UnknownPowerState(other.to_string())),
        }
    }
}

bitflags! {
    /// Caller flags for a power or topology change
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct PowerFlags: u32 {
        /// Treat the request as a power change even when the power state is
        /// unchanged, forcing DPMS on after a successful configuration.
        const FORCE_PROBE = 1 << 0;
        /// Skip reconfiguration unless there is a single internal display or
        /// the multi-display state actually changes.
        const ONLY_IF_SINGLE_INTERNAL_DISPLAY = 1 << 1;
    }
}

/// Per-display power under `power_state`, in snapshot order, plus the
/// number of displays that end up powered on.
pub fn display_power(
    displays: &[Arc<DisplaySnapshot>],
    power_state: DisplayPowerState,
) -> (Vec<bool>, usize) {
    let power: Vec<bool> = displays
        .iter()
        .map(|display| power_state.is_display_on(display.is_internal()))
        .collect();
    let num_on = power.iter().filter(|on| **on).count();
    (power, num_on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayConnectionType, DisplayMode};

    fn create_test_displays() -> Vec<Arc<DisplaySnapshot>> {
        let mode = DisplayMode::new(1920, 1080, 60.0);
        vec![
            Arc::new(DisplaySnapshot::new(1, DisplayConnectionType::Internal, "eDP-1", vec![mode], Some(mode))),
            Arc::new(DisplaySnapshot::new(2, DisplayConnectionType::External, "DP-1", vec![mode], Some(mode))),
            Arc::new(DisplaySnapshot::new(3, DisplayConnectionType::Unknown, "VGA-1", vec![mode], Some(mode))),
        ]
    }

    #[test]
    fn test_display_power_all_on() {
        let displays = create_test_displays();
        let (power, num_on) = display_power(&displays, DisplayPowerState::AllOn);
        assert_eq!(power, vec![true, true, true]);
        assert_eq!(num_on, 3);
    }

    #[test]
    fn test_display_power_internal_off() {
        let displays = create_test_displays();
        let (power, num_on) = display_power(&displays, DisplayPowerState::InternalOffExternalOn);
        assert_eq!(power, vec![false, true, true]);
        assert_eq!(num_on, 2);

        let (power, num_on) = display_power(&displays, DisplayPowerState::InternalOnExternalOff);
        assert_eq!(power, vec![true, false, false]);
        assert_eq!(num_on, 1);
    }

    #[test]
    fn test_state_names() {
        assert_eq!("dual-mirror".parse::<MultipleDisplayState>().unwrap(), MultipleDisplayState::DualMirror);
        assert_eq!("all-off".parse::<DisplayPowerState>().unwrap(), DisplayPowerState::AllOff);
        assert!("sideways".parse::<MultipleDisplayState>().is_err());
        assert!("dim".parse::<DisplayPowerState>().is_err());

        for state in [
            MultipleDisplayState::Headless,
            MultipleDisplayState::Single,
            MultipleDisplayState::DualExtended,
            MultipleDisplayState::MultiExtended,
        ] {
            assert_eq!(state.to_string().parse::<MultipleDisplayState>().unwrap(), state);
        }
    }
}
