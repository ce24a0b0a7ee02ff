//! Per-client state
//!
//! Every open of the device gets a [`DrmFile`]. Framebuffers created
//! through it are owned by it until removed or until the client goes away.

use alloc::vec::Vec;

use spin::Mutex;

use crate::framebuffer::{Framebuffer, FramebufferRef};

/// A client of the device
#[derive(Default)]
pub struct DrmFile {
    /// Framebuffers owned by this client, one reference each
    pub(crate) fbs: Mutex<Vec<FramebufferRef>>,
}

impl DrmFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_fbs(&self) -> usize {
        self.fbs.lock().len()
    }

    /// Ids of the owned framebuffers, oldest first.
    pub fn fb_ids(&self) -> Vec<u32> {
        self.fbs.lock().iter().map(|fb| fb.id()).collect()
    }

    pub fn owns(&self, fb: &Framebuffer) -> bool {
        self.fbs.lock().iter().any(|owned| owned.is(fb))
    }

    /// Hand `fb` to this client.
    pub(crate) fn adopt(&self, fb: FramebufferRef) {
        self.fbs.lock().push(fb);
    }

    /// Take the client's reference to `fb` back, if it owns one.
    pub(crate) fn take(&self, fb: &Framebuffer) -> Option<FramebufferRef> {
        let mut fbs = self.fbs.lock();
        let pos = fbs.iter().position(|owned| owned.is(fb))?;
        Some(fbs.remove(pos))
    }
}
