// SPDX-License-Identifier: GPL-3.0-only
//! Topology file
//!
//! The command line tool reads the displays to simulate and the
//! configuration to request from a KDL document:
//!
//! ```kdl
//! background-color 0xff000000
//! display-state "dual-mirror"
//! power-state "all-on"
//! force-configure
//! software-mirroring true
//! mirror-policy "extended"
//!
//! display 1 type="internal" name="eDP-1" width-mm=302 height-mm=189 {
//!     mode 1920 1200 refresh=60.0 native=true
//!     mode 1920 1080 refresh=60.0
//! }
//! display 2 type="external" name="DP-1" {
//!     mode 2560 1440 refresh=59.95 native=true
//!     mode 1920 1080 refresh=60.0
//!     reject 1920 1080
//! }
//! ```
//!
//! `force-probe`, `only-if-single-internal` and `force-configure` are flags:
//! present means set. `reject` lists modes the simulated hardware refuses to
//! set.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::delegate::SimulatedDisplay;
use crate::display::{
    DisplayConnectionType, DisplayId, DisplayMode, DisplayPowerState, DisplaySnapshot,
    MultipleDisplayState, PowerFlags, Size,
};
use crate::error::{AppError, Result as AppResult};

pub const APP_DIR: &str = "display-configurator";
pub const CONFIG_FILE_NAME: &str = "topology.kdl";

/// Largest mode width or height accepted, so display origins stay in range
pub const MAX_MODE_DIMENSION: u32 = i32::MAX as u32;

#[derive(Debug, Clone)]
pub struct Config {
    pub background_color_argb: u32,
    pub display_state: MultipleDisplayState,
    pub power_state: DisplayPowerState,
    pub power_flags: PowerFlags,
    pub force_configure: bool,
    /// Offer software mirroring when hardware mirroring fails
    pub software_mirroring: bool,
    /// Mirror-vs-extend choice for two displays; `None` means extend
    pub mirror_policy: Option<MultipleDisplayState>,
    pub displays: Vec<SimulatedDisplay>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            background_color_argb: 0,
            display_state: MultipleDisplayState::Invalid,
            power_state: DisplayPowerState::AllOn,
            power_flags: PowerFlags::empty(),
            force_configure: false,
            software_mirroring: true,
            mirror_policy: None,
            displays: Vec::new(),
        }
    }
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
struct Topology {
    #[knuffel(child, unwrap(argument))]
    background_color: Option<u32>,
    #[knuffel(child, unwrap(argument, str))]
    display_state: Option<MultipleDisplayState>,
    #[knuffel(child, unwrap(argument, str))]
    power_state: Option<DisplayPowerState>,
    #[knuffel(child)]
    force_probe: bool,
    #[knuffel(child)]
    only_if_single_internal: bool,
    #[knuffel(child)]
    force_configure: bool,
    #[knuffel(child, unwrap(argument))]
    software_mirroring: Option<bool>,
    #[knuffel(child, unwrap(argument, str))]
    mirror_policy: Option<MultipleDisplayState>,
    #[knuffel(children(name = "display"))]
    displays: Vec<DisplayNode>,
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
struct DisplayNode {
    #[knuffel(argument)]
    id: DisplayId,
    #[knuffel(property(name = "type"), default)]
    connection: ConnectionKind,
    #[knuffel(property)]
    name: Option<String>,
    #[knuffel(property(name = "width-mm"))]
    width_mm: Option<u32>,
    #[knuffel(property(name = "height-mm"))]
    height_mm: Option<u32>,
    #[knuffel(children(name = "mode"))]
    modes: Vec<ModeNode>,
    #[knuffel(children(name = "reject"))]
    rejected: Vec<ResolutionNode>,
}

#[derive(knuffel::DecodeScalar, Debug, Clone, Copy, PartialEq)]
enum ConnectionKind {
    Internal,
    External,
    Unknown,
}

impl Default for ConnectionKind {
    fn default() -> Self {
        Self::External
    }
}

impl From<ConnectionKind> for DisplayConnectionType {
    fn from(kind: ConnectionKind) -> Self {
        match kind {
            ConnectionKind::Internal => Self::Internal,
            ConnectionKind::External => Self::External,
            ConnectionKind::Unknown => Self::Unknown,
        }
    }
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
struct ModeNode {
    #[knuffel(argument)]
    width: u32,
    #[knuffel(argument)]
    height: u32,
    #[knuffel(property, default = 60.0)]
    refresh: f64,
    #[knuffel(property, default)]
    native: bool,
    #[knuffel(property, default)]
    interlaced: bool,
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
struct ResolutionNode {
    #[knuffel(argument)]
    width: u32,
    #[knuffel(argument)]
    height: u32,
}

/// `$XDG_CONFIG_HOME/display-configurator/topology.kdl`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

pub fn load(path: &Path) -> AppResult<Config> {
    if !path.exists() {
        return Err(AppError::ConfigNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(CONFIG_FILE_NAME);
    let config = Config::parse(file_name, &text)?;
    info!(
        path = %path.display(),
        displays = config.displays.len(),
        "Loaded topology"
    );
    Ok(config)
}

impl Config {
    pub fn parse(file_name: &str, text: &str) -> AppResult<Self> {
        let topology = knuffel::parse::<Topology>(file_name, text)?;
        Config::try_from(topology)
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(text: &str) -> AppResult<Self> {
        Config::parse(CONFIG_FILE_NAME, text)
    }
}

impl TryFrom<Topology> for Config {
    type Error = AppError;

    fn try_from(topology: Topology) -> AppResult<Self> {
        let mut config = Config::default();

        if let Some(color) = topology.background_color {
            config.background_color_argb = color;
        }
        if let Some(state) = topology.display_state {
            config.display_state = state;
        }
        if let Some(power_state) = topology.power_state {
            config.power_state = power_state;
        }
        config.power_flags.set(PowerFlags::FORCE_PROBE, topology.force_probe);
        config.power_flags.set(
            PowerFlags::ONLY_IF_SINGLE_INTERNAL_DISPLAY,
            topology.only_if_single_internal,
        );
        config.force_configure = topology.force_configure;
        if let Some(enabled) = topology.software_mirroring {
            config.software_mirroring = enabled;
        }

        if let Some(policy) = topology.mirror_policy {
            if !matches!(
                policy,
                MultipleDisplayState::DualMirror | MultipleDisplayState::DualExtended
            ) {
                return Err(AppError::Config(format!(
                    "mirror-policy must be mirror or extended, not {}",
                    policy
                )));
            }
            config.mirror_policy = Some(policy);
        }

        for node in topology.displays {
            let display_id = node.id;
            if config
                .displays
                .iter()
                .any(|existing| existing.snapshot.display_id == display_id)
            {
                return Err(AppError::Config(format!("display {} defined twice", display_id)));
            }
            config.displays.push(node.try_into()?);
        }

        Ok(config)
    }
}

impl TryFrom<DisplayNode> for SimulatedDisplay {
    type Error = AppError;

    fn try_from(node: DisplayNode) -> AppResult<Self> {
        let display_id = node.id;
        if node.modes.is_empty() {
            return Err(AppError::Config(format!("display {} has no modes", display_id)));
        }

        let mut modes = Vec::with_capacity(node.modes.len());
        let mut native_mode = None;
        for mode_node in &node.modes {
            let mode = DisplayMode {
                size: mode_size(display_id, mode_node.width, mode_node.height)?,
                refresh_rate: mode_node.refresh as f32,
                is_interlaced: mode_node.interlaced,
            };
            if mode_node.native {
                native_mode = Some(mode);
            }
            modes.push(mode);
        }

        let rejected_modes = node
            .rejected
            .iter()
            .map(|reject| mode_size(display_id, reject.width, reject.height))
            .collect::<AppResult<Vec<_>>>()?;

        let name = node.name.unwrap_or_else(|| format!("display-{}", display_id));
        let mut snapshot =
            DisplaySnapshot::new(display_id, node.connection.into(), name, modes, native_mode);
        if let (Some(width), Some(height)) = (node.width_mm, node.height_mm) {
            snapshot.physical_size = Size::new(width, height);
        }

        Ok(SimulatedDisplay {
            snapshot,
            rejected_modes,
        })
    }
}

fn mode_size(display_id: DisplayId, width: u32, height: u32) -> AppResult<Size> {
    let valid = 1..=MAX_MODE_DIMENSION;
    if !valid.contains(&width) || !valid.contains(&height) {
        return Err(AppError::Config(format!(
            "display {}: invalid mode size {}x{}",
            display_id, width, height
        )));
    }
    Ok(Size::new(width, height))
}
