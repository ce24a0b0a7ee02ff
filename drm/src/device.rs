//! Display devices
//!
//! [`DrmDevice`] owns everything scoped to one display controller: its mode
//! configuration limits, the object registry, the device-wide framebuffer
//! list and the pipeline objects. Devices are built once with
//! [`DrmDeviceBuilder`] and shared as `Arc<DrmDevice>`.

use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use spin::{Mutex, RwLock};

use crate::{
    error::DrmResult,
    file::DrmFile,
    fourcc::{CoreFormats, FormatInfoProvider},
    framebuffer::{
        CoreModifierPolicy, FbLayout, FormatModifierPolicy, Framebuffer, FramebufferRef,
        FramebufferValidator,
    },
    mode_object::{ModeObject, ObjectRegistry},
    modeset::{Crtc, DisplayMode, Plane},
    task::{CurrentTask, FixedTask},
    uapi::ModeFbCmd2,
};

bitflags! {
    /// Capabilities a driver advertises
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DriverFeatures: u32 {
        /// Buffer objects are managed through handles
        const GEM = 1 << 0;
        /// Kernel mode setting
        const MODESET = 1 << 1;
        /// Atomic mode setting
        const ATOMIC = 1 << 4;
    }
}

/// Framebuffer size limits of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfigCaps {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    /// Reject creation commands that carry modifiers
    pub fb_modifiers_not_supported: bool,
}

impl Default for ModeConfigCaps {
    fn default() -> Self {
        Self {
            min_width: 1,
            max_width: 8192,
            min_height: 1,
            max_height: 8192,
            fb_modifiers_not_supported: false,
        }
    }
}

/// Driver hooks of the mode configuration
pub trait ModeConfigFuncs: Send + Sync {
    /// Build and initialise a framebuffer from a validated command.
    ///
    /// Implementations normally fill a [`Framebuffer`] from `layout` and
    /// `cmd` and pass it to [`DrmDevice::framebuffer_init`].
    fn fb_create(
        &self,
        dev: &Arc<DrmDevice>,
        file: Option<&DrmFile>,
        layout: &FbLayout,
        cmd: &ModeFbCmd2,
    ) -> DrmResult<FramebufferRef>;
}

/// Resolves buffer object handles.
pub trait BufferObjectLookup: Send + Sync {
    /// Size in bytes of the object behind `handle`, `None` if unknown.
    fn object_size(&self, handle: u32) -> Option<u64>;
}

/// A display device
pub struct DrmDevice {
    caps: ModeConfigCaps,
    funcs: Arc<dyn ModeConfigFuncs>,
    driver_features: DriverFeatures,
    enabled_features: AtomicU32,
    formats: Arc<dyn FormatInfoProvider>,
    modifier_policy: Arc<dyn FormatModifierPolicy>,
    buffer_objects: Option<Arc<dyn BufferObjectLookup>>,
    current_task: Arc<dyn CurrentTask>,

    /// Device-wide framebuffer list, guarded by the fb lock
    pub(crate) fb_list: Mutex<Vec<Arc<Framebuffer>>>,
    registry: ObjectRegistry,
    /// Serialises changes to plane and CRTC state
    pub(crate) modeset_lock: Mutex<()>,
    planes: RwLock<Vec<Arc<Plane>>>,
    crtcs: RwLock<Vec<Arc<Crtc>>>,
}

impl DrmDevice {
    pub fn builder(funcs: Arc<dyn ModeConfigFuncs>) -> DrmDeviceBuilder {
        DrmDeviceBuilder::new(funcs)
    }

    pub fn caps(&self) -> &ModeConfigCaps {
        &self.caps
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn formats(&self) -> &dyn FormatInfoProvider {
        self.formats.as_ref()
    }

    pub fn driver_features(&self) -> DriverFeatures {
        self.driver_features
    }

    /// Restrict the active features to `features` (clamped to what the
    /// driver advertises).
    pub fn set_enabled_features(&self, features: DriverFeatures) {
        let enabled = features & self.driver_features;
        self.enabled_features.store(enabled.bits(), Ordering::Release);
    }

    /// Whether `feature` is advertised by the driver and enabled.
    pub fn check_feature(&self, feature: DriverFeatures) -> bool {
        let enabled =
            DriverFeatures::from_bits_truncate(self.enabled_features.load(Ordering::Acquire));
        (self.driver_features & enabled).contains(feature)
    }

    pub(crate) fn current_task(&self) -> &dyn CurrentTask {
        self.current_task.as_ref()
    }

    pub(crate) fn mode_config_funcs(&self) -> &dyn ModeConfigFuncs {
        self.funcs.as_ref()
    }

    /// Creation command validator configured for this device.
    pub fn validator(&self) -> FramebufferValidator<'_> {
        FramebufferValidator::new(&self.caps, self.formats.as_ref())
            .with_policy(self.modifier_policy.as_ref())
            .with_objects(self.buffer_objects.as_deref())
    }

    /// Register a plane and make it visible to lookups.
    pub fn add_plane(&self, plane: Arc<Plane>) -> DrmResult<u32> {
        let id = self.registry.add(ModeObject::Plane(Arc::clone(&plane)))?;
        self.planes.write().push(plane);
        Ok(id)
    }

    /// Register a CRTC and make it visible to lookups.
    pub fn add_crtc(&self, crtc: Arc<Crtc>) -> DrmResult<u32> {
        let id = self.registry.add(ModeObject::Crtc(Arc::clone(&crtc)))?;
        self.crtcs.write().push(crtc);
        Ok(id)
    }

    /// Scan `fb` out on `plane`, feeding `crtc`.
    pub fn plane_attach(&self, plane: &Plane, fb: FramebufferRef, crtc: Option<u32>) {
        let _modeset = self.modeset_lock.lock();
        plane.attach(fb, crtc);
    }

    /// Program `mode` on `crtc` with its primary plane's framebuffer at
    /// `(x, y)`.
    pub fn crtc_set_mode(
        &self,
        crtc: &Crtc,
        mode: DisplayMode,
        x: u32,
        y: u32,
    ) -> DrmResult<()> {
        let _modeset = self.modeset_lock.lock();
        crtc.set_mode(mode, x, y)
    }

    /// Snapshot of the device's planes.
    pub fn planes(&self) -> Vec<Arc<Plane>> {
        self.planes.read().clone()
    }

    /// Snapshot of the device's CRTCs.
    pub fn crtcs(&self) -> Vec<Arc<Crtc>> {
        self.crtcs.read().clone()
    }
}

/// Builder for [`DrmDevice`]
pub struct DrmDeviceBuilder {
    funcs: Arc<dyn ModeConfigFuncs>,
    caps: ModeConfigCaps,
    driver_features: DriverFeatures,
    enabled_features: Option<DriverFeatures>,
    formats: Arc<dyn FormatInfoProvider>,
    modifier_policy: Arc<dyn FormatModifierPolicy>,
    buffer_objects: Option<Arc<dyn BufferObjectLookup>>,
    current_task: Arc<dyn CurrentTask>,
}

impl DrmDeviceBuilder {
    pub fn new(funcs: Arc<dyn ModeConfigFuncs>) -> Self {
        Self {
            funcs,
            caps: ModeConfigCaps::default(),
            driver_features: DriverFeatures::MODESET,
            enabled_features: None,
            formats: Arc::new(CoreFormats),
            modifier_policy: Arc::new(CoreModifierPolicy),
            buffer_objects: None,
            current_task: Arc::new(FixedTask::default()),
        }
    }

    pub fn caps(mut self, caps: ModeConfigCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Features the driver advertises
    pub fn driver_features(mut self, features: DriverFeatures) -> Self {
        self.driver_features = features;
        self
    }

    /// Features enabled at start, defaults to all advertised ones
    pub fn enabled_features(mut self, features: DriverFeatures) -> Self {
        self.enabled_features = Some(features);
        self
    }

    pub fn formats(mut self, formats: Arc<dyn FormatInfoProvider>) -> Self {
        self.formats = formats;
        self
    }

    pub fn modifier_policy(mut self, policy: Arc<dyn FormatModifierPolicy>) -> Self {
        self.modifier_policy = policy;
        self
    }

    pub fn buffer_objects(mut self, objects: Arc<dyn BufferObjectLookup>) -> Self {
        self.buffer_objects = Some(objects);
        self
    }

    pub fn current_task(mut self, task: Arc<dyn CurrentTask>) -> Self {
        self.current_task = task;
        self
    }

    pub fn build(self) -> Arc<DrmDevice> {
        let enabled = self.enabled_features.unwrap_or(self.driver_features) & self.driver_features;

        Arc::new(DrmDevice {
            caps: self.caps,
            funcs: self.funcs,
            driver_features: self.driver_features,
            enabled_features: AtomicU32::new(enabled.bits()),
            formats: self.formats,
            modifier_policy: self.modifier_policy,
            buffer_objects: self.buffer_objects,
            current_task: self.current_task,
            fb_list: Mutex::new(Vec::new()),
            registry: ObjectRegistry::new(),
            modeset_lock: Mutex::new(()),
            planes: RwLock::new(Vec::new()),
            crtcs: RwLock::new(Vec::new()),
        })
    }
}
