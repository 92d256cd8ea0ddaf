mod snapshot;
mod state;

pub use snapshot::{
    DisplayConfigureRequest, DisplayConnectionType, DisplayId, DisplayMode, DisplaySnapshot, Point,
    Size,
};
pub use state::{DisplayPowerState, MultipleDisplayState, PowerFlags, display_power};
