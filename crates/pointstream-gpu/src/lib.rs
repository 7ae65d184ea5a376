//! Graphics abstraction for the streaming core.
//!
//! The engine only ever touches the three-method [`GraphicsDevice`]
//! capability; the [`SoftwareDevice`] is the bundled implementation used by
//! the headless viewer and by tests.

pub mod device;
pub mod soft;

pub use device::{DeviceError, GraphicsDevice, VertexBufferId};
pub use soft::SoftwareDevice;
