//! Framebuffer creation command checks
//!
//! [`FramebufferValidator::validate`] decides whether a [`ModeFbCmd2`] can
//! become a framebuffer on a device. It is a pure function of the device
//! capabilities and the command; nothing is allocated or published here.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. flag bits
//! 2. pixel format
//! 3. dimensions against the device limits
//! 4. a handle for every plane the format uses
//! 5. unused planes carry no state
//! 6. modifier discipline and the per-format modifier policy
//! 7. per-plane minimum pitch
//! 8. per-plane extent fits in 32 bits and in its buffer object

use core::cmp::max;

use crate::{
    device::{BufferObjectLookup, ModeConfigCaps},
    error::{DrmError, DrmResult},
    fourcc::{
        modifiers::{DRM_FORMAT_MOD_LINEAR, DRM_FORMAT_MOD_SAMSUNG_64_32_TILE},
        FormatInfo, FormatInfoProvider, DRM_FORMAT_NV12, MAX_PLANES,
    },
    uapi::{FbCmdFlags, ModeFbCmd2},
};

use super::Framebuffer;

/// Decides which modifiers a format accepts.
pub trait FormatModifierPolicy: Send + Sync {
    /// Whether `cmd.modifier[plane]` is usable with `info` for this command.
    fn modifier_supported(&self, info: &FormatInfo, cmd: &ModeFbCmd2, plane: usize) -> bool;
}

/// Modifier rules every device applies.
///
/// Opaque-block formats have no linear layout, and Samsung 64x32 tiling
/// only exists for NV12 with tile-aligned planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreModifierPolicy;

impl FormatModifierPolicy for CoreModifierPolicy {
    fn modifier_supported(&self, info: &FormatInfo, cmd: &ModeFbCmd2, plane: usize) -> bool {
        match cmd.modifier[plane] {
            DRM_FORMAT_MOD_LINEAR => !info.is_opaque_block(plane),
            DRM_FORMAT_MOD_SAMSUNG_64_32_TILE => {
                let width = info.plane_width(cmd.width, plane);
                let height = info.plane_height(cmd.height, plane);
                info.format == DRM_FORMAT_NV12
                    && width % 128 == 0
                    && height % 32 == 0
                    && cmd.pitches[plane] % 128 == 0
            }
            _ => true,
        }
    }
}

/// Normalised plane information of an accepted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbLayout {
    pub info: &'static FormatInfo,
    pub flags: FbCmdFlags,
    /// Bytes each used plane needs in its buffer object, offset included
    pub min_sizes: [u64; MAX_PLANES],
}

impl FbLayout {
    pub fn num_planes(&self) -> usize {
        self.info.plane_count()
    }
}

fn reject(err: DrmError) -> DrmError {
    log::debug!("{}", err);
    err
}

/// Creation command validator bound to one device's configuration.
pub struct FramebufferValidator<'a> {
    caps: &'a ModeConfigCaps,
    formats: &'a dyn FormatInfoProvider,
    policy: &'a dyn FormatModifierPolicy,
    objects: Option<&'a dyn BufferObjectLookup>,
}

impl<'a> FramebufferValidator<'a> {
    pub fn new(caps: &'a ModeConfigCaps, formats: &'a dyn FormatInfoProvider) -> Self {
        Self {
            caps,
            formats,
            policy: &CoreModifierPolicy,
            objects: None,
        }
    }

    pub fn with_policy(mut self, policy: &'a dyn FormatModifierPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Also check each plane against the size of its buffer object.
    pub fn with_objects(mut self, objects: Option<&'a dyn BufferObjectLookup>) -> Self {
        self.objects = objects;
        self
    }

    /// Check `cmd`, returning the resolved layout on success.
    pub fn validate(&self, cmd: &ModeFbCmd2) -> DrmResult<FbLayout> {
        let flags = FbCmdFlags::from_bits(cmd.flags)
            .ok_or_else(|| reject(DrmError::InvalidFlag { flags: cmd.flags }))?;

        let info = self
            .formats
            .format_info(cmd.pixel_format)
            .filter(|info| usize::from(info.num_planes) <= MAX_PLANES)
            .ok_or_else(|| {
                reject(DrmError::UnknownFormat {
                    format: cmd.pixel_format,
                })
            })?;

        self.check_dimensions(cmd)?;
        self.check_handles(info, cmd)?;
        check_unused_planes(info, cmd, flags)?;
        self.check_modifiers(info, cmd, flags)?;
        check_pitches(info, cmd)?;
        let min_sizes = self.check_extents(info, cmd)?;

        Ok(FbLayout {
            info,
            flags,
            min_sizes,
        })
    }

    fn check_dimensions(&self, cmd: &ModeFbCmd2) -> DrmResult<()> {
        let caps = self.caps;
        let width_ok = cmd.width >= max(caps.min_width, 1) && cmd.width <= caps.max_width;
        let height_ok = cmd.height >= max(caps.min_height, 1) && cmd.height <= caps.max_height;
        if width_ok && height_ok {
            Ok(())
        } else {
            Err(reject(DrmError::BadDimensions {
                width: cmd.width,
                height: cmd.height,
            }))
        }
    }

    fn check_handles(&self, info: &FormatInfo, cmd: &ModeFbCmd2) -> DrmResult<()> {
        match cmd.handles[..info.plane_count()].iter().position(|&h| h == 0) {
            Some(plane) => Err(reject(DrmError::MissingHandle { plane })),
            None => Ok(()),
        }
    }

    fn check_modifiers(
        &self,
        info: &FormatInfo,
        cmd: &ModeFbCmd2,
        flags: FbCmdFlags,
    ) -> DrmResult<()> {
        let use_modifiers = flags.contains(FbCmdFlags::MODIFIERS);
        if use_modifiers && self.caps.fb_modifiers_not_supported {
            return Err(reject(DrmError::ModifiersUnsupported));
        }

        for plane in 0..info.plane_count() {
            let modifier = cmd.modifier[plane];
            if !use_modifiers && modifier != 0 {
                return Err(reject(DrmError::ModifierWithoutFlag { plane, modifier }));
            }
            if use_modifiers && modifier != cmd.modifier[0] {
                return Err(reject(DrmError::InconsistentModifiers { plane }));
            }
            if !self.policy.modifier_supported(info, cmd, plane) {
                return Err(reject(DrmError::UnsupportedModifier {
                    format: info.format,
                    modifier,
                }));
            }
        }
        Ok(())
    }

    fn check_extents(
        &self,
        info: &FormatInfo,
        cmd: &ModeFbCmd2,
    ) -> DrmResult<[u64; MAX_PLANES]> {
        let mut min_sizes = [0u64; MAX_PLANES];

        for (plane, min_size) in min_sizes.iter_mut().enumerate().take(info.plane_count()) {
            let height = info.plane_height(cmd.height, plane) as u64;
            let size = cmd.pitches[plane] as u64 * height + cmd.offsets[plane] as u64;
            if size > u32::MAX as u64 {
                return Err(reject(DrmError::SizeOverflow { plane }));
            }

            if let Some(objects) = self.objects {
                let handle = cmd.handles[plane];
                let available = objects.object_size(handle).ok_or_else(|| {
                    reject(DrmError::NoSuchObject {
                        resource: "buffer object",
                        id: handle,
                    })
                })?;
                if size > available {
                    return Err(reject(DrmError::SizeOverflow { plane }));
                }
            }

            *min_size = size;
        }
        Ok(min_sizes)
    }
}

fn check_unused_planes(info: &FormatInfo, cmd: &ModeFbCmd2, flags: FbCmdFlags) -> DrmResult<()> {
    let use_modifiers = flags.contains(FbCmdFlags::MODIFIERS);

    for plane in info.plane_count()..MAX_PLANES {
        if cmd.modifier[plane] != 0 {
            return Err(reject(DrmError::ModifierOnUnusedPlane { plane }));
        }
        // Without the flag, stale handles/pitches/offsets are tolerated
        if !use_modifiers {
            continue;
        }
        if cmd.handles[plane] != 0 {
            return Err(reject(DrmError::HandleOnUnusedPlane { plane }));
        }
        if cmd.pitches[plane] != 0 {
            return Err(reject(DrmError::PitchOnUnusedPlane { plane }));
        }
        if cmd.offsets[plane] != 0 {
            return Err(reject(DrmError::OffsetOnUnusedPlane { plane }));
        }
    }
    Ok(())
}

fn check_pitches(info: &FormatInfo, cmd: &ModeFbCmd2) -> DrmResult<()> {
    for plane in 0..info.plane_count() {
        // Opaque layouts have no meaningful minimum stride
        if info.is_opaque_block(plane) {
            continue;
        }

        let width = info.plane_width(cmd.width, plane);
        let min_pitch = info.min_pitch(plane, width);
        if min_pitch > u32::MAX as u64 {
            return Err(reject(DrmError::SizeOverflow { plane }));
        }
        if (cmd.pitches[plane] as u64) < min_pitch {
            return Err(reject(DrmError::PitchTooSmall {
                plane,
                pitch: cmd.pitches[plane],
                min_pitch,
            }));
        }
    }
    Ok(())
}

fn fixed_16_16(value: u64) -> (u64, u64) {
    (value >> 16, ((value & 0xffff) * 15625) >> 10)
}

/// Check that a 16.16 fixed-point source rectangle lies inside `fb`.
pub fn check_src_coords(
    src_x: u32,
    src_y: u32,
    src_w: u32,
    src_h: u32,
    fb: &Framebuffer,
) -> DrmResult<()> {
    let fb_width = (fb.width as u64) << 16;
    let fb_height = (fb.height as u64) << 16;
    let (x, y, w, h) = (src_x as u64, src_y as u64, src_w as u64, src_h as u64);

    if w > fb_width || x > fb_width - w || h > fb_height || y > fb_height - h {
        let (xi, xf) = fixed_16_16(x);
        let (yi, yf) = fixed_16_16(y);
        let (wi, wf) = fixed_16_16(w);
        let (hi, hf) = fixed_16_16(h);
        log::debug!(
            "Invalid source coordinates {}.{:06}x{}.{:06}+{}.{:06}+{}.{:06} (fb {}x{})",
            wi,
            wf,
            hi,
            hf,
            xi,
            xf,
            yi,
            yf,
            fb.width,
            fb.height
        );
        return Err(DrmError::OutOfSpace);
    }
    Ok(())
}
