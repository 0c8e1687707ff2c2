//! Press state of the keyboard and the control context that serializes
//! every change to it.

pub mod config;
pub mod control;
pub mod gesture;
pub mod mirror;
pub mod model;
pub mod subscribe;
pub mod throttle;

pub use config::{KeybedConfig, LayoutSettings};
pub use control::{
    ControlCommand, ControlError, ControlHandle, ControlQueue, ManualContext, ThreadContext,
};
pub use gesture::KeyboardSurface;
pub use mirror::PressMirror;
pub use model::{KeyboardModel, Origin, PedalState};
