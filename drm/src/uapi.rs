//! User/kernel boundary structures
//!
//! Layouts here are `#[repr(C)]` and must stay binary compatible with the
//! structures user space passes through the mode-setting ioctls.

use bitflags::bitflags;

use crate::fourcc::{
    DRM_FORMAT_ARGB8888, DRM_FORMAT_C8, DRM_FORMAT_RGB565, DRM_FORMAT_RGB888, DRM_FORMAT_XRGB1555,
    DRM_FORMAT_XRGB2101010, DRM_FORMAT_XRGB8888, MAX_PLANES,
};

/// Largest number of damage rectangles accepted by a single dirty call.
pub const DIRTY_MAX_CLIPS: usize = 256;

bitflags! {
    /// Flags of a framebuffer creation command
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct FbCmdFlags: u32 {
        /// `modifier[]` carries meaningful values
        const MODIFIERS = 1 << 1;
    }
}

bitflags! {
    /// Annotations on a dirty-rectangle flush
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u32 {
        /// Clips come in (source, destination) pairs
        const ANNOTATE_COPY = 0x01;
        /// Clips are filled with `color`
        const ANNOTATE_FILL = 0x02;
    }
}

/// Multi-planar framebuffer creation command.
///
/// `fb_id` is written back on success, every other field is input.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFbCmd2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; MAX_PLANES],
    pub pitches: [u32; MAX_PLANES],
    pub offsets: [u32; MAX_PLANES],
    pub modifier: [u64; MAX_PLANES],
}

/// Single-plane legacy creation command, format given as bpp/depth.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFbCmd {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    pub handle: u32,
}

/// Damage rectangle in framebuffer pixels, `x2`/`y2` exclusive.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipRect {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

/// Map a legacy bits-per-pixel/depth pair to a fourcc code.
pub fn legacy_fb_format(bpp: u32, depth: u32) -> Option<u32> {
    match (bpp, depth) {
        (8, 8) => Some(DRM_FORMAT_C8),
        (16, 15) => Some(DRM_FORMAT_XRGB1555),
        (16, 16) => Some(DRM_FORMAT_RGB565),
        (24, 24) => Some(DRM_FORMAT_RGB888),
        (32, 24) => Some(DRM_FORMAT_XRGB8888),
        (32, 30) => Some(DRM_FORMAT_XRGB2101010),
        (32, 32) => Some(DRM_FORMAT_ARGB8888),
        _ => None,
    }
}

impl From<&ModeFbCmd> for ModeFbCmd2 {
    fn from(legacy: &ModeFbCmd) -> Self {
        let mut cmd = ModeFbCmd2 {
            fb_id: legacy.fb_id,
            width: legacy.width,
            height: legacy.height,
            pixel_format: legacy_fb_format(legacy.bpp, legacy.depth).unwrap_or(0),
            ..Default::default()
        };
        cmd.handles[0] = legacy.handle;
        cmd.pitches[0] = legacy.pitch;
        cmd
    }
}
