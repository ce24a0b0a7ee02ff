//! VeridianOS DRM Framebuffer Core
//!
//! Framebuffer registry, validator and teardown of the display subsystem.
//! Clients describe pixel buffers with a [`ModeFbCmd2`]; the device checks
//! the description, lets the driver build a [`Framebuffer`], publishes it
//! under a numeric id, and detaches it from the display pipeline when the
//! client lets go of it.
//!
//! All state is scoped to a [`DrmDevice`] which callers pass to every entry
//! point.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod device;
pub mod error;
pub mod file;
pub mod fourcc;
pub mod framebuffer;
pub mod ioctl;
pub mod mode_object;
pub mod modeset;
pub mod task;
pub mod uapi;

pub use device::{
    BufferObjectLookup, DriverFeatures, DrmDevice, DrmDeviceBuilder, ModeConfigCaps,
    ModeConfigFuncs,
};
pub use error::{DrmError, DrmResult, ErrorKind};
pub use file::DrmFile;
pub use fourcc::{CoreFormats, FormatInfo, FormatInfoProvider};
pub use framebuffer::{
    check_src_coords, CoreModifierPolicy, FbLayout, FormatModifierPolicy, Framebuffer,
    FramebufferBuilder, FramebufferFuncs, FramebufferRef, FramebufferValidator,
};
pub use mode_object::{ModeObject, ModeObjectRef, ObjectKind, ObjectRegistry};
pub use modeset::{Crtc, CrtcFuncs, DisplayMode, ModeSet, Plane, PlaneFuncs, PlaneType};
pub use task::{CurrentTask, FixedTask, TaskComm};
pub use uapi::{ClipRect, DirtyFlags, FbCmdFlags, ModeFbCmd, ModeFbCmd2};
