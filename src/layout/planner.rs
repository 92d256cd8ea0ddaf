// SPDX-License-Identifier: GPL-3.0-only
//! Modeset planning for each multi-display state
//!
//! Single: every powered display is driven at its selected mode at the
//! origin. Mirror: both displays are driven at the largest resolution they
//! have in common. Extended: displays are stacked top to bottom, separated
//! by [`VERTICAL_GAP`] pixels, inside one framebuffer.

use std::sync::Arc;

use crate::display::{
    DisplayConfigureRequest, DisplayMode, DisplayPowerState, DisplaySnapshot, MultipleDisplayState,
    Point, Size, display_power,
};

use super::{DisplayLayout, StateController};

/// Vertical space between stacked displays in extended mode
pub const VERTICAL_GAP: u32 = 60;

/// Compute the layout for `state` under `power_state`, or `None` if the
/// displays cannot be arranged that way.
pub fn plan_layout(
    displays: &[Arc<DisplaySnapshot>],
    state: MultipleDisplayState,
    power_state: DisplayPowerState,
    state_controller: Option<&dyn StateController>,
) -> Option<DisplayLayout> {
    let (power, num_on) = display_power(displays, power_state);
    let requests: Vec<DisplayConfigureRequest> = displays
        .iter()
        .map(|display| DisplayConfigureRequest::new(display.clone(), None, Point::default()))
        .collect();

    match state {
        MultipleDisplayState::Invalid => {
            warn!("Cannot lay out the invalid display state");
            None
        }
        MultipleDisplayState::Headless => {
            if !displays.is_empty() {
                warn!(count = displays.len(), "Headless layout requested with displays connected");
                return None;
            }
            Some(DisplayLayout::default())
        }
        MultipleDisplayState::Single => {
            if displays.len() != 1 && num_on != 1 {
                warn!(count = displays.len(), num_on, "Single layout needs exactly one powered display");
                return None;
            }
            single_layout(requests, &power, state_controller)
        }
        MultipleDisplayState::DualMirror | MultipleDisplayState::DualExtended => {
            if displays.len() != 2 || (num_on != 0 && num_on != 2) {
                warn!(count = displays.len(), num_on, "Dual layout needs two displays in the same power state");
                return None;
            }
            if state == MultipleDisplayState::DualMirror {
                mirror_layout(requests, &power)
            } else {
                extended_layout(requests, &power, state_controller)
            }
        }
        MultipleDisplayState::MultiExtended => {
            if displays.len() < 3 {
                warn!(count = displays.len(), "Multi-extended layout needs at least three displays");
                return None;
            }
            extended_layout(requests, &power, state_controller)
        }
    }
}

/// Mode a display is driven at outside of mirror mode: the user's
/// resolution if the display supports it, else native, else the largest.
fn selected_mode(
    snapshot: &DisplaySnapshot,
    state_controller: Option<&dyn StateController>,
) -> Option<DisplayMode> {
    let display_id = snapshot.display_id;
    let user_mode = state_controller
        .and_then(|controller| controller.get_resolution_for_display_id(display_id))
        .and_then(|size| {
            let mode = snapshot.find_mode_by_size(size);
            if mode.is_none() {
                debug!(display_id, %size, "User resolution not supported, using native mode");
            }
            mode
        });

    let mode = user_mode
        .or(snapshot.native_mode)
        .or_else(|| snapshot.largest_mode());
    if mode.is_none() {
        warn!(display_id, "Display reports no usable modes");
    }
    mode
}

fn single_layout(
    mut requests: Vec<DisplayConfigureRequest>,
    power: &[bool],
    state_controller: Option<&dyn StateController>,
) -> Option<DisplayLayout> {
    let lone_display = requests.len() == 1;
    let mut framebuffer_size = Size::default();

    for (request, on) in requests.iter_mut().zip(power) {
        // A lone display still sizes the framebuffer while it is off.
        if !*on && !lone_display {
            continue;
        }
        let mode = selected_mode(&request.display, state_controller)?;
        framebuffer_size = mode.size;
        if *on {
            request.mode = Some(mode);
        }
    }

    Some(DisplayLayout {
        requests,
        framebuffer_size,
    })
}

/// Largest resolution every display supports
fn mirror_size(requests: &[DisplayConfigureRequest]) -> Option<Size> {
    let (first, rest) = requests.split_first()?;
    first
        .display
        .modes
        .iter()
        .map(|mode| mode.size)
        .filter(|size| rest.iter().all(|request| request.display.find_mode_by_size(*size).is_some()))
        .max_by_key(|size| size.area())
}

fn mirror_layout(mut requests: Vec<DisplayConfigureRequest>, power: &[bool]) -> Option<DisplayLayout> {
    let Some(size) = mirror_size(&requests) else {
        warn!("No resolution shared by both displays, hardware mirroring unavailable");
        return None;
    };

    for (request, on) in requests.iter_mut().zip(power) {
        if *on {
            request.mode = request.display.find_mode_by_size(size);
        }
    }

    Some(DisplayLayout {
        requests,
        framebuffer_size: size,
    })
}

fn extended_layout(
    mut requests: Vec<DisplayConfigureRequest>,
    power: &[bool],
    state_controller: Option<&dyn StateController>,
) -> Option<DisplayLayout> {
    let mut framebuffer_size = Size::default();

    for (request, on) in requests.iter_mut().zip(power) {
        let mode = selected_mode(&request.display, state_controller)?;
        if framebuffer_size.height > 0 {
            framebuffer_size.height = framebuffer_size.height.checked_add(VERTICAL_GAP)?;
        }
        let Ok(y) = i32::try_from(framebuffer_size.height) else {
            warn!(height = framebuffer_size.height, "Extended layout exceeds the coordinate space");
            return None;
        };
        request.origin = Point::new(0, y);
        if *on {
            request.mode = Some(mode);
        }
        framebuffer_size.width = framebuffer_size.width.max(mode.size.width);
        let Some(height) = framebuffer_size.height.checked_add(mode.size.height) else {
            warn!(height = mode.size.height, "Extended layout exceeds the coordinate space");
            return None;
        };
        framebuffer_size.height = height;
    }

    Some(DisplayLayout {
        requests,
        framebuffer_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayConnectionType, DisplayId};

    fn internal_panel() -> Arc<DisplaySnapshot> {
        let native = DisplayMode::new(1920, 1200, 60.0);
        Arc::new(DisplaySnapshot::new(
            1,
            DisplayConnectionType::Internal,
            "eDP-1",
            vec![native, DisplayMode::new(1920, 1080, 60.0), DisplayMode::new(1280, 720, 60.0)],
            Some(native),
        ))
    }

    fn external_monitor(id: DisplayId) -> Arc<DisplaySnapshot> {
        let native = DisplayMode::new(2560, 1440, 59.95);
        Arc::new(DisplaySnapshot::new(
            id,
            DisplayConnectionType::External,
            format!("DP-{}", id),
            vec![native, DisplayMode::new(1920, 1080, 60.0), DisplayMode::new(1280, 720, 60.0)],
            Some(native),
        ))
    }

    struct FixedResolution(Size);

    impl StateController for FixedResolution {
        fn get_state_for_display_ids(&self, _display_ids: &[DisplayId]) -> MultipleDisplayState {
            MultipleDisplayState::DualExtended
        }

        fn get_resolution_for_display_id(&self, _display_id: DisplayId) -> Option<Size> {
            Some(self.0)
        }
    }

    #[test]
    fn test_headless() {
        let layout = plan_layout(&[], MultipleDisplayState::Headless, DisplayPowerState::AllOn, None).unwrap();
        assert!(layout.requests.is_empty());
        assert!(layout.framebuffer_size.is_empty());

        let displays = vec![internal_panel()];
        assert!(plan_layout(&displays, MultipleDisplayState::Headless, DisplayPowerState::AllOn, None).is_none());
    }

    #[test]
    fn test_single_uses_native_mode() {
        let displays = vec![internal_panel()];
        let layout = plan_layout(&displays, MultipleDisplayState::Single, DisplayPowerState::AllOn, None).unwrap();
        assert_eq!(layout.framebuffer_size, Size::new(1920, 1200));
        assert_eq!(layout.requests[0].mode.unwrap().size, Size::new(1920, 1200));
    }

    #[test]
    fn test_single_display_off_keeps_framebuffer() {
        let displays = vec![internal_panel()];
        let layout = plan_layout(&displays, MultipleDisplayState::Single, DisplayPowerState::AllOff, None).unwrap();
        assert_eq!(layout.framebuffer_size, Size::new(1920, 1200));
        assert!(layout.requests[0].mode.is_none());
    }

    #[test]
    fn test_single_with_internal_off() {
        let displays = vec![internal_panel(), external_monitor(2)];
        let layout = plan_layout(
            &displays,
            MultipleDisplayState::Single,
            DisplayPowerState::InternalOffExternalOn,
            None,
        )
        .unwrap();
        assert!(layout.requests[0].mode.is_none());
        assert_eq!(layout.requests[1].mode.unwrap().size, Size::new(2560, 1440));
        assert_eq!(layout.framebuffer_size, Size::new(2560, 1440));
    }

    #[test]
    fn test_single_rejects_two_powered_displays() {
        let displays = vec![internal_panel(), external_monitor(2)];
        assert!(plan_layout(&displays, MultipleDisplayState::Single, DisplayPowerState::AllOn, None).is_none());
    }

    #[test]
    fn test_mirror_uses_largest_common_resolution() {
        let displays = vec![internal_panel(), external_monitor(2)];
        let layout = plan_layout(&displays, MultipleDisplayState::DualMirror, DisplayPowerState::AllOn, None).unwrap();
        assert_eq!(layout.framebuffer_size, Size::new(1920, 1080));
        for request in &layout.requests {
            assert_eq!(request.mode.unwrap().size, Size::new(1920, 1080));
            assert_eq!(request.origin, Point::default());
        }
    }

    #[test]
    fn test_mirror_without_common_resolution() {
        let odd = DisplayMode::new(1366, 768, 60.0);
        let displays = vec![
            Arc::new(DisplaySnapshot::new(1, DisplayConnectionType::Internal, "eDP-1", vec![odd], Some(odd))),
            external_monitor(2),
        ];
        assert!(plan_layout(&displays, MultipleDisplayState::DualMirror, DisplayPowerState::AllOn, None).is_none());
    }

    #[test]
    fn test_extended_stacks_vertically() {
        let displays = vec![internal_panel(), external_monitor(2)];
        let layout = plan_layout(&displays, MultipleDisplayState::DualExtended, DisplayPowerState::AllOn, None).unwrap();
        assert_eq!(layout.requests[0].origin, Point::new(0, 0));
        assert_eq!(layout.requests[1].origin, Point::new(0, 1200 + VERTICAL_GAP as i32));
        assert_eq!(layout.framebuffer_size, Size::new(2560, 1200 + VERTICAL_GAP + 1440));
    }

    #[test]
    fn test_extended_all_off_keeps_geometry() {
        let displays = vec![internal_panel(), external_monitor(2)];
        let layout = plan_layout(&displays, MultipleDisplayState::DualExtended, DisplayPowerState::AllOff, None).unwrap();
        assert!(layout.requests.iter().all(|request| request.mode.is_none()));
        assert!(!layout.framebuffer_size.is_empty());
    }

    #[test]
    fn test_dual_rejects_mixed_power() {
        let displays = vec![internal_panel(), external_monitor(2)];
        assert!(
            plan_layout(
                &displays,
                MultipleDisplayState::DualExtended,
                DisplayPowerState::InternalOffExternalOn,
                None
            )
            .is_none()
        );
    }

    #[test]
    fn test_multi_extended() {
        let displays = vec![internal_panel(), external_monitor(2), external_monitor(3)];
        let layout = plan_layout(&displays, MultipleDisplayState::MultiExtended, DisplayPowerState::AllOn, None).unwrap();
        assert_eq!(layout.requests.len(), 3);
        assert_eq!(layout.framebuffer_size.height, 1200 + 1440 + 1440 + 2 * VERTICAL_GAP);

        let two = &displays[..2];
        assert!(plan_layout(two, MultipleDisplayState::MultiExtended, DisplayPowerState::AllOn, None).is_none());
    }

    #[test]
    fn test_user_resolution() {
        let displays = vec![external_monitor(2)];
        let controller = FixedResolution(Size::new(1280, 720));
        let layout = plan_layout(
            &displays,
            MultipleDisplayState::Single,
            DisplayPowerState::AllOn,
            Some(&controller),
        )
        .unwrap();
        assert_eq!(layout.framebuffer_size, Size::new(1280, 720));

        let unsupported = FixedResolution(Size::new(800, 600));
        let layout = plan_layout(
            &displays,
            MultipleDisplayState::Single,
            DisplayPowerState::AllOn,
            Some(&unsupported),
        )
        .unwrap();
        assert_eq!(layout.framebuffer_size, Size::new(2560, 1440));
    }

    #[test]
    fn test_extended_too_tall_cannot_be_laid_out() {
        let tall = DisplayMode::new(1, 3_000_000_000, 60.0);
        let displays: Vec<_> = (1..=2)
            .map(|id| {
                Arc::new(DisplaySnapshot::new(id, DisplayConnectionType::External, format!("DP-{}", id), vec![tall], Some(tall)))
            })
            .collect();
        assert!(plan_layout(&displays, MultipleDisplayState::DualExtended, DisplayPowerState::AllOn, None).is_none());

        let tower = DisplayMode::new(1, i32::MAX as u32, 60.0);
        let displays: Vec<_> = (1..=3)
            .map(|id| {
                Arc::new(DisplaySnapshot::new(id, DisplayConnectionType::External, format!("DP-{}", id), vec![tower], Some(tower)))
            })
            .collect();
        assert!(plan_layout(&displays, MultipleDisplayState::MultiExtended, DisplayPowerState::AllOn, None).is_none());
    }

    #[test]
    fn test_invalid_state() {
        let displays = vec![internal_panel()];
        assert!(plan_layout(&displays, MultipleDisplayState::Invalid, DisplayPowerState::AllOn, None).is_none());
    }
}
