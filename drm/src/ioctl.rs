//! Client-facing framebuffer entry points
//!
//! These back the mode-setting ioctls. Copying the argument structures in
//! and out of user memory is the caller's job; every function here works on
//! kernel copies and reports failures as [`DrmError`], whose
//! [`errno`](DrmError::errno) is what the ioctl returns.

use alloc::{sync::Arc, vec::Vec};

use crate::{
    device::{DriverFeatures, DrmDevice},
    error::{DrmError, DrmResult},
    file::DrmFile,
    modeset::framebuffer_remove,
    uapi::{ClipRect, DirtyFlags, FbCmdFlags, ModeFbCmd, ModeFbCmd2, DIRTY_MAX_CLIPS},
};

fn require_modeset(dev: &DrmDevice, operation: &'static str) -> DrmResult<()> {
    if dev.check_feature(DriverFeatures::MODESET) {
        Ok(())
    } else {
        Err(DrmError::NotSupported { operation })
    }
}

fn no_such_fb(id: u32) -> DrmError {
    DrmError::NoSuchObject {
        resource: "framebuffer",
        id,
    }
}

/// Create a framebuffer owned by `file`; its id is written to
/// `cmd.fb_id`.
pub fn addfb2(dev: &Arc<DrmDevice>, cmd: &mut ModeFbCmd2, file: &DrmFile) -> DrmResult<()> {
    require_modeset(dev, "addfb2")?;

    let fb = dev.internal_framebuffer_create(cmd, Some(file))?;
    log::debug!("[FB:{}]", fb.id());

    cmd.fb_id = fb.id();
    file.adopt(fb);
    Ok(())
}

/// Legacy single-plane creation with the format given as bpp/depth.
pub fn addfb(dev: &Arc<DrmDevice>, cmd: &mut ModeFbCmd, file: &DrmFile) -> DrmResult<()> {
    require_modeset(dev, "addfb")?;

    let mut cmd2 = ModeFbCmd2::from(&*cmd);
    if cmd2.pixel_format == 0 {
        log::debug!("unsupported pixel format bpp {} depth {}", cmd.bpp, cmd.depth);
        return Err(DrmError::InvalidArgument {
            name: "bpp/depth",
            value: "no matching pixel format",
        });
    }

    addfb2(dev, &mut cmd2, file)?;
    cmd.fb_id = cmd2.fb_id;
    Ok(())
}

/// Remove framebuffer `fb_id` owned by `file`.
pub fn rmfb(dev: &Arc<DrmDevice>, fb_id: u32, file: &DrmFile) -> DrmResult<()> {
    require_modeset(dev, "rmfb")?;

    let fb = dev
        .lookup_framebuffer(Some(file), fb_id)
        .ok_or_else(|| no_such_fb(fb_id))?;
    let owned = file.take(&fb);
    // Drop the lookup reference, the client's one keeps it alive
    drop(fb);

    let fb = owned.ok_or_else(|| {
        log::debug!("[FB:{}] not owned by the caller", fb_id);
        no_such_fb(fb_id)
    })?;
    framebuffer_remove(dev, fb);
    Ok(())
}

/// Describe framebuffer `cmd.fb_id`, creating client handles for its
/// buffer objects.
pub fn getfb2(dev: &Arc<DrmDevice>, cmd: &mut ModeFbCmd2, file: &DrmFile) -> DrmResult<()> {
    require_modeset(dev, "getfb2")?;

    let fb = dev
        .lookup_framebuffer(Some(file), cmd.fb_id)
        .ok_or_else(|| no_such_fb(cmd.fb_id))?;
    let funcs = fb.funcs().ok_or(DrmError::NoHook {
        hook: "create_handle",
    })?;
    let info = fb.format().ok_or(DrmError::NoFormat)?;

    let mut out = ModeFbCmd2 {
        fb_id: cmd.fb_id,
        width: fb.width,
        height: fb.height,
        pixel_format: info.format,
        ..Default::default()
    };
    if fb.flags & FbCmdFlags::MODIFIERS.bits() != 0 {
        out.flags = FbCmdFlags::MODIFIERS.bits();
    }

    for plane in 0..info.plane_count() {
        out.pitches[plane] = fb.pitches[plane];
        out.offsets[plane] = fb.offsets[plane];
        if out.flags != 0 {
            out.modifier[plane] = fb.modifier;
        }
        out.handles[plane] = funcs.create_handle(&fb, Some(file), plane)?;
    }

    *cmd = out;
    Ok(())
}

/// Flush damaged regions of framebuffer `fb_id`.
pub fn dirtyfb(
    dev: &Arc<DrmDevice>,
    fb_id: u32,
    flags: u32,
    color: u32,
    clips: &[ClipRect],
    file: &DrmFile,
) -> DrmResult<()> {
    require_modeset(dev, "dirtyfb")?;

    let fb = dev
        .lookup_framebuffer(Some(file), fb_id)
        .ok_or_else(|| no_such_fb(fb_id))?;

    let flags = DirtyFlags::from_bits_truncate(flags);
    if flags.contains(DirtyFlags::ANNOTATE_COPY | DirtyFlags::ANNOTATE_FILL) {
        return Err(DrmError::InvalidArgument {
            name: "flags",
            value: "copy and fill annotations are exclusive",
        });
    }
    // Copy annotations come in (source, destination) pairs
    if flags.contains(DirtyFlags::ANNOTATE_COPY) && clips.len() % 2 != 0 {
        return Err(DrmError::InvalidArgument {
            name: "num_clips",
            value: "odd number of clips for a copy",
        });
    }
    if clips.len() > DIRTY_MAX_CLIPS {
        return Err(DrmError::InvalidArgument {
            name: "num_clips",
            value: "too many clips",
        });
    }

    let funcs = fb.funcs().ok_or(DrmError::NoHook { hook: "dirty" })?;
    funcs.dirty(&fb, Some(file), flags, color, clips)
}

/// Drop every framebuffer `file` still owns, on client close.
///
/// Framebuffers only the client references are freed right away. The rest
/// are detached from the pipeline first, so planes and CRTCs never point at
/// a freed framebuffer.
pub fn fb_release(dev: &DrmDevice, file: &DrmFile) {
    let in_use: Vec<_> = {
        let mut fbs = file.fbs.lock();
        let (in_use, unused): (Vec<_>, Vec<_>) =
            fbs.drain(..).partition(|fb| fb.refcount() > 1);
        drop(unused);
        in_use
    };

    for fb in in_use {
        framebuffer_remove(dev, fb);
    }
}
