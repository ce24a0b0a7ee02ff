//! Framebuffer lifecycle on a device
//!
//! Publication order is: reserve an id, link into the device list, then
//! make the id visible to lookups. Teardown reverses it: unlink, drop the
//! id, then call the driver's destroy hook.

use alloc::{sync::Arc, vec::Vec};
use core::ptr;

use crate::{
    device::DrmDevice,
    error::{DrmError, DrmResult},
    file::DrmFile,
    mode_object::{ModeObject, ObjectKind},
    uapi::ModeFbCmd2,
};

use super::{Framebuffer, FramebufferFuncs, FramebufferRef};

impl DrmDevice {
    /// Publish a driver-built framebuffer.
    ///
    /// On success the framebuffer holds one reference, returned to the
    /// caller, and is findable through
    /// [`lookup_framebuffer`](Self::lookup_framebuffer).
    pub fn framebuffer_init(
        self: &Arc<Self>,
        fb: Arc<Framebuffer>,
        funcs: Arc<dyn FramebufferFuncs>,
    ) -> DrmResult<FramebufferRef> {
        if !fb.belongs_to(self) {
            log::debug!("framebuffer initialised on a foreign device");
            return Err(DrmError::MisboundDevice);
        }
        if fb.format().is_none() {
            log::debug!("framebuffer initialised without a format");
            return Err(DrmError::NoFormat);
        }

        fb.set_comm(self.current_task().comm());
        fb.set_funcs(funcs);
        fb.set_refcount(1);

        if let Err(err) = self.registry().reserve(ModeObject::Framebuffer(Arc::clone(&fb))) {
            fb.set_refcount(0);
            return Err(err);
        }

        self.fb_list.lock().push(Arc::clone(&fb));

        if let Err(err) = self.registry().register(&fb.base) {
            self.framebuffer_cleanup(&fb);
            fb.set_refcount(0);
            return Err(err);
        }

        log::debug!("[FB:{}] published", fb.id());
        Ok(FramebufferRef::adopt(fb))
    }

    /// Unlink `fb` from the device list and release its id.
    ///
    /// Does not drop any reference and may be called repeatedly.
    pub fn framebuffer_cleanup(&self, fb: &Framebuffer) {
        let id = fb.id();
        let mut list = self.fb_list.lock();
        if let Some(pos) = list.iter().position(|f| ptr::eq(Arc::as_ptr(f), fb)) {
            list.swap_remove(pos);
        }
        self.registry().remove(&fb.base);
        drop(list);

        if id != 0 {
            log::debug!("[FB:{}] unpublished", id);
        }
    }

    /// Final teardown, run when the last reference is dropped.
    pub fn framebuffer_free(&self, fb: &Framebuffer) {
        self.framebuffer_cleanup(fb);
        fb.destroy();
    }

    /// Look up framebuffer `id`, taking a reference on success.
    pub fn lookup_framebuffer(&self, _file: Option<&DrmFile>, id: u32) -> Option<FramebufferRef> {
        self.registry()
            .lookup(id, ObjectKind::Framebuffer)
            .and_then(|object| object.into_framebuffer())
    }

    /// Validate `cmd` and have the driver build the framebuffer.
    ///
    /// The driver is only invoked for commands that pass validation, and
    /// its error is returned unchanged.
    pub fn internal_framebuffer_create(
        self: &Arc<Self>,
        cmd: &ModeFbCmd2,
        file: Option<&DrmFile>,
    ) -> DrmResult<FramebufferRef> {
        let layout = self.validator().validate(cmd)?;

        self.mode_config_funcs()
            .fb_create(self, file, &layout, cmd)
            .inspect_err(|err| log::debug!("could not create framebuffer: {}", err))
    }

    /// Number of framebuffers on the device list.
    pub fn num_fb(&self) -> usize {
        self.fb_list.lock().len()
    }

    /// Snapshot of the device framebuffer list.
    pub fn framebuffers(&self) -> Vec<Arc<Framebuffer>> {
        self.fb_list.lock().clone()
    }

    pub fn contains_framebuffer(&self, fb: &Framebuffer) -> bool {
        self.fb_list
            .lock()
            .iter()
            .any(|f| ptr::eq(Arc::as_ptr(f), fb))
    }
}
