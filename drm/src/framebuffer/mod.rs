//! Framebuffer objects
//!
//! A [`Framebuffer`] describes how a client's buffer objects are laid out
//! as an image: format, size, and per-plane pitch and offset. Drivers build
//! one from a validated creation command and hand it to
//! [`DrmDevice::framebuffer_init`], which publishes it and returns the
//! first counted [`FramebufferRef`]. When the last reference drops, the
//! framebuffer is unpublished and the driver's `destroy` hook runs.

pub mod check;
pub mod manager;


use alloc::sync::{Arc, Weak};
use core::{
    fmt,
    ops::Deref,
    ptr,
    sync::atomic::{AtomicU32, Ordering},
};

use spin::RwLock;

pub use check::{
    check_src_coords, CoreModifierPolicy, FbLayout, FormatModifierPolicy, FramebufferValidator,
};

use crate::{
    device::DrmDevice,
    error::{DrmError, DrmResult},
    file::DrmFile,
    fourcc::{FormatInfo, FourccName, MAX_PLANES},
    mode_object::{ModeObjectBase, ObjectKind},
    task::TaskComm,
    uapi::{ClipRect, DirtyFlags, ModeFbCmd2},
};

/// Driver hooks of a framebuffer
pub trait FramebufferFuncs: Send + Sync {
    /// Release driver resources. Called once, after the framebuffer has
    /// been unpublished.
    fn destroy(&self, fb: &Framebuffer);

    /// Create a client handle for the buffer object backing `plane`.
    fn create_handle(
        &self,
        _fb: &Framebuffer,
        _file: Option<&DrmFile>,
        _plane: usize,
    ) -> DrmResult<u32> {
        Err(DrmError::NoHook {
            hook: "create_handle",
        })
    }

    /// Flush damaged regions to the display.
    fn dirty(
        &self,
        _fb: &Framebuffer,
        _file: Option<&DrmFile>,
        _flags: DirtyFlags,
        _color: u32,
        _clips: &[ClipRect],
    ) -> DrmResult<()> {
        Err(DrmError::NoHook { hook: "dirty" })
    }
}

/// A framebuffer object
pub struct Framebuffer {
    pub(crate) base: ModeObjectBase,
    dev: Weak<DrmDevice>,
    format: Option<&'static FormatInfo>,
    pub width: u32,
    pub height: u32,
    pub pitches: [u32; MAX_PLANES],
    pub offsets: [u32; MAX_PLANES],
    pub modifier: u64,
    pub flags: u32,
    funcs: RwLock<Option<Arc<dyn FramebufferFuncs>>>,
    comm: RwLock<TaskComm>,
    refcount: AtomicU32,
}

impl Framebuffer {
    /// Start building an uninitialised framebuffer for `dev`.
    pub fn builder(dev: &Arc<DrmDevice>) -> FramebufferBuilder {
        FramebufferBuilder::new(dev)
    }

    /// Fill an uninitialised framebuffer from a validated command.
    pub fn from_cmd(
        dev: &Arc<DrmDevice>,
        info: &'static FormatInfo,
        cmd: &ModeFbCmd2,
    ) -> Arc<Framebuffer> {
        Self::builder(dev).format(info).command(cmd).build()
    }

    /// Same as [`from_cmd`](Self::from_cmd) with the format resolved by
    /// the validator.
    pub fn from_layout(
        dev: &Arc<DrmDevice>,
        layout: &FbLayout,
        cmd: &ModeFbCmd2,
    ) -> Arc<Framebuffer> {
        Self::from_cmd(dev, layout.info, cmd)
    }

    /// Published id, 0 once unpublished or before init.
    pub fn id(&self) -> u32 {
        self.base.id()
    }

    pub fn format(&self) -> Option<&'static FormatInfo> {
        self.format
    }

    /// Current reference count.
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    /// Short name of the task that initialised the framebuffer.
    pub fn comm(&self) -> TaskComm {
        *self.comm.read()
    }

    pub fn device(&self) -> Option<Arc<DrmDevice>> {
        self.dev.upgrade()
    }

    pub(crate) fn belongs_to(&self, dev: &Arc<DrmDevice>) -> bool {
        ptr::eq(self.dev.as_ptr(), Arc::as_ptr(dev))
    }

    pub fn funcs(&self) -> Option<Arc<dyn FramebufferFuncs>> {
        self.funcs.read().clone()
    }

    pub(crate) fn set_funcs(&self, funcs: Arc<dyn FramebufferFuncs>) {
        *self.funcs.write() = Some(funcs);
    }

    pub(crate) fn set_comm(&self, comm: TaskComm) {
        *self.comm.write() = comm;
    }

    pub(crate) fn set_refcount(&self, count: u32) {
        self.refcount.store(count, Ordering::Release);
    }

    /// Number of planes of the framebuffer's format.
    pub fn num_planes(&self) -> usize {
        self.format.map_or(0, FormatInfo::plane_count)
    }

    /// Width in pixels of `plane`, 0 for planes the format does not have.
    pub fn plane_width(&self, plane: usize) -> u32 {
        match self.format {
            Some(info) if plane < info.plane_count() => info.plane_width(self.width, plane),
            _ => 0,
        }
    }

    /// Height in rows of `plane`, 0 for planes the format does not have.
    pub fn plane_height(&self, plane: usize) -> u32 {
        match self.format {
            Some(info) if plane < info.plane_count() => info.plane_height(self.height, plane),
            _ => 0,
        }
    }

    /// Run the driver's destroy hook.
    pub(crate) fn destroy(&self) {
        match self.funcs() {
            Some(funcs) => funcs.destroy(self),
            None => log::warn!("[FB:{}] destroyed without driver hooks", self.id()),
        }
    }

    /// Write a human-readable dump of the framebuffer.
    pub fn describe<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "framebuffer[{}]:", self.id())?;
        writeln!(out, "\tallocated by = {}", self.comm())?;
        writeln!(out, "\trefcount={}", self.refcount())?;
        match self.format {
            Some(info) => writeln!(out, "\tformat={}", FourccName(info.format))?,
            None => writeln!(out, "\tformat=<none>")?,
        }
        writeln!(out, "\tmodifier=0x{:x}", self.modifier)?;
        writeln!(out, "\tsize={}x{}", self.width, self.height)?;
        writeln!(out, "\tlayers:")?;
        for plane in 0..self.num_planes() {
            writeln!(
                out,
                "\t\tsize[{}]={}x{}",
                plane,
                self.plane_width(plane),
                self.plane_height(plane)
            )?;
            writeln!(out, "\t\tpitch[{}]={}", plane, self.pitches[plane])?;
            writeln!(out, "\t\toffset[{}]={}", plane, self.offsets[plane])?;
        }
        Ok(())
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("id", &self.id())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format.map(|info| info.format))
            .field("refcount", &self.refcount())
            .finish()
    }
}

/// Builder for uninitialised framebuffers
pub struct FramebufferBuilder {
    dev: Weak<DrmDevice>,
    format: Option<&'static FormatInfo>,
    width: u32,
    height: u32,
    pitches: [u32; MAX_PLANES],
    offsets: [u32; MAX_PLANES],
    modifier: u64,
    flags: u32,
    funcs: Option<Arc<dyn FramebufferFuncs>>,
}

impl FramebufferBuilder {
    pub fn new(dev: &Arc<DrmDevice>) -> Self {
        Self {
            dev: Arc::downgrade(dev),
            format: None,
            width: 0,
            height: 0,
            pitches: [0; MAX_PLANES],
            offsets: [0; MAX_PLANES],
            modifier: 0,
            flags: 0,
            funcs: None,
        }
    }

    pub fn format(mut self, info: &'static FormatInfo) -> Self {
        self.format = Some(info);
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn pitches(mut self, pitches: [u32; MAX_PLANES]) -> Self {
        self.pitches = pitches;
        self
    }

    pub fn offsets(mut self, offsets: [u32; MAX_PLANES]) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn modifier(mut self, modifier: u64) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Pre-set driver hooks; `framebuffer_init` replaces them.
    pub fn funcs(mut self, funcs: Arc<dyn FramebufferFuncs>) -> Self {
        self.funcs = Some(funcs);
        self
    }

    /// Copy size, layout and modifier from a creation command.
    pub fn command(mut self, cmd: &ModeFbCmd2) -> Self {
        self.width = cmd.width;
        self.height = cmd.height;
        self.pitches = cmd.pitches;
        self.offsets = cmd.offsets;
        self.modifier = cmd.modifier[0];
        self.flags = cmd.flags;
        self
    }

    pub fn build(self) -> Arc<Framebuffer> {
        Arc::new(Framebuffer {
            base: ModeObjectBase::new(ObjectKind::Framebuffer),
            dev: self.dev,
            format: self.format,
            width: self.width,
            height: self.height,
            pitches: self.pitches,
            offsets: self.offsets,
            modifier: self.modifier,
            flags: self.flags,
            funcs: RwLock::new(self.funcs),
            comm: RwLock::new(TaskComm::empty()),
            refcount: AtomicU32::new(0),
        })
    }
}

/// Counted reference to a framebuffer.
///
/// Cloning takes a reference, dropping releases it. Dropping the last
/// reference frees the framebuffer.
pub struct FramebufferRef(Arc<Framebuffer>);

impl FramebufferRef {
    /// Wrap a framebuffer whose count already includes this reference.
    pub(crate) fn adopt(fb: Arc<Framebuffer>) -> Self {
        Self(fb)
    }

    /// Take a reference unless the count already reached zero.
    pub(crate) fn get_unless_zero(fb: &Arc<Framebuffer>) -> Option<Self> {
        let mut count = fb.refcount.load(Ordering::Relaxed);
        loop {
            if count == 0 {
                return None;
            }
            match fb.refcount.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(Self(Arc::clone(fb))),
                Err(current) => count = current,
            }
        }
    }

    /// The framebuffer behind the reference, for observation that must
    /// outlive it.
    pub fn as_object(&self) -> &Arc<Framebuffer> {
        &self.0
    }

    /// Whether this reference points at `fb`.
    pub fn is(&self, fb: &Framebuffer) -> bool {
        ptr::eq(Arc::as_ptr(&self.0), fb)
    }

    fn free(&self) {
        match self.0.dev.upgrade() {
            Some(dev) => dev.framebuffer_free(&self.0),
            None => self.0.destroy(),
        }
    }
}

impl Clone for FramebufferRef {
    fn clone(&self) -> Self {
        self.0.refcount.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(&self.0))
    }
}

impl Drop for FramebufferRef {
    fn drop(&mut self) {
        if self.0.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.free();
        }
    }
}

impl Deref for FramebufferRef {
    type Target = Framebuffer;

    fn deref(&self) -> &Framebuffer {
        &self.0
    }
}

impl PartialEq for FramebufferRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for FramebufferRef {}

impl fmt::Debug for FramebufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
