//! Display pipeline objects and framebuffer detach
//!
//! Planes scan out framebuffers, CRTCs compose planes into a display
//! signal. Both hold counted framebuffer references while attached. Before
//! a client's framebuffer goes away, [`legacy_remove_fb`] walks the
//! pipeline and disables every element still using it.

use alloc::sync::Arc;

use spin::{Mutex, MutexGuard};

use crate::{
    device::DrmDevice,
    error::DrmResult,
    framebuffer::{Framebuffer, FramebufferRef},
    mode_object::{ModeObjectBase, ObjectKind},
};

/// Role of a plane in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    Overlay,
    Primary,
    Cursor,
}

/// Display timing of a CRTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    /// Pixel clock in kHz
    pub clock: u32,
    pub hdisplay: u32,
    pub vdisplay: u32,
    /// Refresh rate in Hz
    pub vrefresh: u32,
}

impl DisplayMode {
    pub fn new(width: u32, height: u32, refresh: u32) -> Self {
        // ~10% horizontal and ~5% vertical blanking
        let htotal = u64::from(width) + u64::from(width / 10);
        let vtotal = u64::from(height) + u64::from(height / 20);
        let clock = (htotal.saturating_mul(vtotal) / 1000).saturating_mul(u64::from(refresh));
        Self {
            clock: u32::try_from(clock).unwrap_or(u32::MAX),
            hdisplay: width,
            vdisplay: height,
            vrefresh: refresh,
        }
    }
}

/// A CRTC configuration request
pub struct ModeSet<'a> {
    pub crtc: &'a Crtc,
    /// Framebuffer to scan out, `None` to disable
    pub fb: Option<&'a Framebuffer>,
    pub mode: Option<&'a DisplayMode>,
    pub x: u32,
    pub y: u32,
}

/// Driver hooks of a plane
pub trait PlaneFuncs: Send + Sync {
    fn disable_plane(&self, plane: &Plane) -> DrmResult<()>;
}

/// Driver hooks of a CRTC
pub trait CrtcFuncs: Send + Sync {
    fn set_config(&self, set: &ModeSet<'_>) -> DrmResult<()>;
}

/// Mutable plane state, one reference per framebuffer slot
#[derive(Debug, Default)]
pub(crate) struct PlaneState {
    pub fb: Option<FramebufferRef>,
    /// Framebuffer being replaced while a driver hook runs
    pub old_fb: Option<FramebufferRef>,
    /// Id of the CRTC the plane feeds
    pub crtc: Option<u32>,
}

impl PlaneState {
    fn scans_out(&self, fb: &Framebuffer) -> bool {
        self.fb.as_ref().is_some_and(|cur| cur.is(fb))
    }

    fn stages(&self, fb: &Framebuffer) -> bool {
        self.old_fb.as_ref().is_some_and(|old| old.is(fb))
    }
}

/// A hardware plane
pub struct Plane {
    pub(crate) base: ModeObjectBase,
    plane_type: PlaneType,
    funcs: Arc<dyn PlaneFuncs>,
    state: Mutex<PlaneState>,
}

impl Plane {
    pub fn new(plane_type: PlaneType, funcs: Arc<dyn PlaneFuncs>) -> Arc<Self> {
        Arc::new(Self {
            base: ModeObjectBase::new(ObjectKind::Plane),
            plane_type,
            funcs,
            state: Mutex::new(PlaneState::default()),
        })
    }

    pub fn id(&self) -> u32 {
        self.base.id()
    }

    pub fn plane_type(&self) -> PlaneType {
        self.plane_type
    }

    /// Lock the plane state. Never hold the guard while dropping a
    /// framebuffer reference taken out of it.
    pub(crate) fn state(&self) -> MutexGuard<'_, PlaneState> {
        self.state.lock()
    }

    /// Point the plane at `fb`, feeding `crtc`. The plane keeps the
    /// reference. Callers hold the device's modeset lock.
    pub(crate) fn attach(&self, fb: FramebufferRef, crtc: Option<u32>) {
        let previous = {
            let mut state = self.state.lock();
            state.crtc = crtc;
            state.fb.replace(fb)
        };
        drop(previous);
    }

    /// Id of the framebuffer currently scanned out.
    pub fn fb_id(&self) -> Option<u32> {
        self.state.lock().fb.as_ref().map(|fb| fb.id())
    }

    /// Id of the framebuffer staged for replacement.
    pub fn old_fb_id(&self) -> Option<u32> {
        self.state.lock().old_fb.as_ref().map(|fb| fb.id())
    }

    /// Id of the CRTC the plane feeds.
    pub fn crtc_id(&self) -> Option<u32> {
        self.state.lock().crtc
    }
}

/// Mutable CRTC state
#[derive(Debug, Default, Clone, Copy)]
pub struct CrtcState {
    pub mode: Option<DisplayMode>,
    pub x: u32,
    pub y: u32,
}

impl CrtcState {
    pub fn enabled(&self) -> bool {
        self.mode.is_some()
    }
}

/// A CRTC
pub struct Crtc {
    pub(crate) base: ModeObjectBase,
    primary: Option<Arc<Plane>>,
    funcs: Arc<dyn CrtcFuncs>,
    state: Mutex<CrtcState>,
}

impl Crtc {
    pub fn new(primary: Option<Arc<Plane>>, funcs: Arc<dyn CrtcFuncs>) -> Arc<Self> {
        Arc::new(Self {
            base: ModeObjectBase::new(ObjectKind::Crtc),
            primary,
            funcs,
            state: Mutex::new(CrtcState::default()),
        })
    }

    pub fn id(&self) -> u32 {
        self.base.id()
    }

    pub fn primary(&self) -> Option<&Arc<Plane>> {
        self.primary.as_ref()
    }

    pub fn state(&self) -> CrtcState {
        *self.state.lock()
    }

    /// Program `mode` at `(x, y)` and remember it on success. Callers hold
    /// the device's modeset lock.
    pub(crate) fn set_mode(&self, mode: DisplayMode, x: u32, y: u32) -> DrmResult<()> {
        let fb = self.primary.as_ref().and_then(|p| p.state().fb.clone());
        let set = ModeSet {
            crtc: self,
            fb: fb.as_deref(),
            mode: Some(&mode),
            x,
            y,
        };
        self.funcs.set_config(&set)?;
        *self.state.lock() = CrtcState {
            mode: Some(mode),
            x,
            y,
        };
        Ok(())
    }
}

/// Turn `crtc` off and detach its primary plane.
pub fn crtc_force_disable(crtc: &Crtc) -> DrmResult<()> {
    let set = ModeSet {
        crtc,
        fb: None,
        mode: None,
        x: 0,
        y: 0,
    };
    crtc.funcs.set_config(&set)?;
    *crtc.state.lock() = CrtcState::default();

    if let Some(primary) = crtc.primary() {
        let released = {
            let mut state = primary.state.lock();
            state.crtc = None;
            (state.fb.take(), state.old_fb.take())
        };
        drop(released);
    }
    Ok(())
}

/// Disable `plane` if it still scans out `fb`, and drop a staged
/// reference to it.
pub fn plane_force_disable(plane: &Plane, fb: &Framebuffer) {
    let stale = {
        let mut state = plane.state.lock();
        if !state.scans_out(fb) {
            let stale = if state.stages(fb) {
                state.old_fb.take()
            } else {
                None
            };
            drop(state);
            drop(stale);
            return;
        }
        let current = state.fb.take();
        core::mem::replace(&mut state.old_fb, current)
    };
    drop(stale);

    let result = plane.funcs.disable_plane(plane);

    let released = {
        let mut state = plane.state.lock();
        match result {
            Ok(()) => {
                state.crtc = None;
                state.old_fb.take()
            }
            Err(err) => {
                log::warn!(
                    "[PLANE:{}] failed to disable plane with busy fb: {}",
                    plane.id(),
                    err
                );
                state.fb = state.old_fb.take();
                None
            }
        }
    };
    drop(released);
}

/// Detach `fb` from every CRTC and plane that still uses it.
///
/// Errors from driver hooks are logged and otherwise ignored.
pub fn legacy_remove_fb(dev: &DrmDevice, fb: &Framebuffer) {
    let _modeset = dev.modeset_lock.lock();

    for crtc in dev.crtcs() {
        let scanning_out = crtc
            .primary()
            .is_some_and(|primary| primary.state().scans_out(fb));
        if scanning_out {
            if let Err(err) = crtc_force_disable(&crtc) {
                log::error!(
                    "[CRTC:{}] failed to reset crtc when fb was deleted: {}",
                    crtc.id(),
                    err
                );
            }
        }
    }

    for plane in dev.planes() {
        plane_force_disable(&plane, fb);
    }
}

/// Drop `fb`, first detaching it from the pipeline when anything besides
/// this reference still holds it.
pub fn framebuffer_remove(dev: &DrmDevice, fb: FramebufferRef) {
    if fb.refcount() > 1 {
        legacy_remove_fb(dev, &fb);
    }
    drop(fb);
}
