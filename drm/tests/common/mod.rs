//! Common fixtures for the framebuffer integration tests

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use spin::Mutex;
pub use veridian_drm::fourcc::DRM_FORMAT_XRGB8888;
use veridian_drm::{
    ioctl, ClipRect, DirtyFlags, DrmDevice, DrmFile, DrmResult, FbLayout, Framebuffer,
    FramebufferFuncs, FramebufferRef, ModeConfigCaps, ModeConfigFuncs, ModeFbCmd2,
};

/// Framebuffer hooks that record what the core asked of them
#[derive(Default)]
pub struct RecordingFbFuncs {
    pub destroyed: AtomicUsize,
    pub dirty_calls: Mutex<Vec<(DirtyFlags, u32, usize)>>,
}

impl RecordingFbFuncs {
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl FramebufferFuncs for RecordingFbFuncs {
    fn destroy(&self, _fb: &Framebuffer) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn create_handle(
        &self,
        _fb: &Framebuffer,
        _file: Option<&DrmFile>,
        plane: usize,
    ) -> DrmResult<u32> {
        Ok(100 + plane as u32)
    }

    fn dirty(
        &self,
        _fb: &Framebuffer,
        _file: Option<&DrmFile>,
        flags: DirtyFlags,
        color: u32,
        clips: &[ClipRect],
    ) -> DrmResult<()> {
        self.dirty_calls.lock().push((flags, color, clips.len()));
        Ok(())
    }
}

/// Framebuffer hooks with nothing but `destroy`
pub struct BareFbFuncs;

impl FramebufferFuncs for BareFbFuncs {
    fn destroy(&self, _fb: &Framebuffer) {}
}

/// Driver that builds framebuffers straight from the validated command
#[derive(Default)]
pub struct TestDriver {
    pub fb_funcs: Arc<RecordingFbFuncs>,
    pub created: AtomicU32,
}

impl ModeConfigFuncs for TestDriver {
    fn fb_create(
        &self,
        dev: &Arc<DrmDevice>,
        _file: Option<&DrmFile>,
        layout: &FbLayout,
        cmd: &ModeFbCmd2,
    ) -> DrmResult<FramebufferRef> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let fb = Framebuffer::from_layout(dev, layout, cmd);
        dev.framebuffer_init(fb, self.fb_funcs.clone())
    }
}

pub fn test_caps() -> ModeConfigCaps {
    ModeConfigCaps {
        min_width: 4,
        max_width: 4096,
        min_height: 4,
        max_height: 4096,
        fb_modifiers_not_supported: false,
    }
}

pub fn test_device() -> (Arc<DrmDevice>, Arc<TestDriver>) {
    let driver = Arc::new(TestDriver::default());
    let dev = DrmDevice::builder(driver.clone()).caps(test_caps()).build();
    (dev, driver)
}

pub fn xrgb_cmd(width: u32, height: u32) -> ModeFbCmd2 {
    ModeFbCmd2 {
        width,
        height,
        pixel_format: DRM_FORMAT_XRGB8888,
        handles: [1, 0, 0, 0],
        pitches: [4 * width, 0, 0, 0],
        ..Default::default()
    }
}

/// Create a 64x64 framebuffer owned by `file` and return its id.
pub fn add_fb(dev: &Arc<DrmDevice>, file: &DrmFile) -> u32 {
    let mut cmd = xrgb_cmd(64, 64);
    ioctl::addfb2(dev, &mut cmd, file).expect("addfb2 failed");
    cmd.fb_id
}

/// The framebuffer object behind `id`, without keeping a reference.
pub fn fb_object(dev: &DrmDevice, id: u32) -> Arc<Framebuffer> {
    let fb = dev.lookup_framebuffer(None, id).expect("framebuffer not found");
    Arc::clone(fb.as_object())
}
