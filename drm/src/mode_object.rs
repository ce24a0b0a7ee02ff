//! Mode objects and the per-device object registry
//!
//! Every user-visible display object (framebuffer, plane, CRTC) carries a
//! [`ModeObjectBase`] holding its numeric id. The [`ObjectRegistry`] hands
//! out ids, maps them back to objects, and takes lookup references on
//! refcounted kinds.

use alloc::{collections::BTreeMap, collections::BTreeSet, sync::Arc};
use core::{
    ptr,
    sync::atomic::{AtomicU32, Ordering},
};

use spin::Mutex;

use crate::{
    error::{DrmError, DrmResult},
    framebuffer::{Framebuffer, FramebufferRef},
    modeset::{Crtc, Plane},
};

/// Highest id the registry hands out.
pub const MAX_OBJECT_ID: u32 = i32::MAX as u32;

/// Object type codes as seen by user space.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Lookup filter matching every kind
    Any = 0,
    Crtc = 0xcccc_cccc,
    Plane = 0xeeee_eeee,
    Framebuffer = 0xfbfb_fbfb,
}

impl ObjectKind {
    /// Whether an object of this kind passes the lookup `filter`.
    pub fn matches(self, filter: ObjectKind) -> bool {
        filter == ObjectKind::Any || self == filter
    }
}

/// Identity shared by all mode objects.
#[derive(Debug)]
pub struct ModeObjectBase {
    id: AtomicU32,
    kind: ObjectKind,
}

impl ModeObjectBase {
    pub const fn new(kind: ObjectKind) -> Self {
        Self {
            id: AtomicU32::new(0),
            kind,
        }
    }

    /// Current id, 0 while unpublished.
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn set_id(&self, id: u32) {
        self.id.store(id, Ordering::Release);
    }
}

/// A registry entry.
#[derive(Clone)]
pub enum ModeObject {
    Framebuffer(Arc<Framebuffer>),
    Crtc(Arc<Crtc>),
    Plane(Arc<Plane>),
}

impl ModeObject {
    pub fn base(&self) -> &ModeObjectBase {
        match self {
            ModeObject::Framebuffer(fb) => &fb.base,
            ModeObject::Crtc(crtc) => &crtc.base,
            ModeObject::Plane(plane) => &plane.base,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.base().kind()
    }
}

/// Result of a successful lookup.
///
/// Framebuffers come back as a counted reference the caller releases by
/// dropping it.
pub enum ModeObjectRef {
    Framebuffer(FramebufferRef),
    Crtc(Arc<Crtc>),
    Plane(Arc<Plane>),
}

impl ModeObjectRef {
    pub fn id(&self) -> u32 {
        match self {
            ModeObjectRef::Framebuffer(fb) => fb.id(),
            ModeObjectRef::Crtc(crtc) => crtc.id(),
            ModeObjectRef::Plane(plane) => plane.id(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ModeObjectRef::Framebuffer(_) => ObjectKind::Framebuffer,
            ModeObjectRef::Crtc(_) => ObjectKind::Crtc,
            ModeObjectRef::Plane(_) => ObjectKind::Plane,
        }
    }

    pub fn into_framebuffer(self) -> Option<FramebufferRef> {
        match self {
            ModeObjectRef::Framebuffer(fb) => Some(fb),
            _ => None,
        }
    }
}

/// Smallest-free id allocator
struct IdAllocator {
    next_id: u32,
    recycled: BTreeSet<u32>,
}

impl IdAllocator {
    const fn new() -> Self {
        Self {
            next_id: 1,
            recycled: BTreeSet::new(),
        }
    }

    fn allocate(&mut self) -> DrmResult<u32> {
        // Recycled ids are always below next_id, reuse the lowest first
        if let Some(id) = self.recycled.pop_first() {
            return Ok(id);
        }

        let id = self.next_id;
        if id > MAX_OBJECT_ID {
            return Err(DrmError::IdSpaceExhausted);
        }
        self.next_id += 1;
        Ok(id)
    }

    fn recycle(&mut self, id: u32) {
        if id + 1 == self.next_id {
            self.next_id = id;
            // Fold trailing recycled ids back into the high-water mark
            while self.next_id > 1 && self.recycled.remove(&(self.next_id - 1)) {
                self.next_id -= 1;
            }
        } else {
            self.recycled.insert(id);
        }
    }
}

struct Slot {
    object: ModeObject,
    published: bool,
}

struct RegistryInner {
    ids: IdAllocator,
    objects: BTreeMap<u32, Slot>,
}

/// Per-device `{id -> object}` map
pub struct ObjectRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                ids: IdAllocator::new(),
                objects: BTreeMap::new(),
            }),
        }
    }

    /// Allocate an id for `object` and publish it in one step.
    pub fn add(&self, object: ModeObject) -> DrmResult<u32> {
        self.insert(object, true)
    }

    /// Allocate an id for `object` without making it visible to lookups.
    pub fn reserve(&self, object: ModeObject) -> DrmResult<u32> {
        self.insert(object, false)
    }

    fn insert(&self, object: ModeObject, published: bool) -> DrmResult<u32> {
        let mut inner = self.inner.lock();
        let id = inner.ids.allocate()?;
        object.base().set_id(id);
        inner.objects.insert(id, Slot { object, published });
        Ok(id)
    }

    /// Publish an object previously passed to [`reserve`](Self::reserve).
    pub fn register(&self, base: &ModeObjectBase) -> DrmResult<()> {
        let id = base.id();
        let mut inner = self.inner.lock();
        match inner.objects.get_mut(&id) {
            Some(slot) if ptr::eq(slot.object.base(), base) => {
                slot.published = true;
                Ok(())
            }
            _ => Err(DrmError::NoSuchObject {
                resource: "mode object",
                id,
            }),
        }
    }

    /// Find a published object of kind `filter`.
    ///
    /// Framebuffers whose refcount already dropped to zero are treated as
    /// absent.
    pub fn lookup(&self, id: u32, filter: ObjectKind) -> Option<ModeObjectRef> {
        if id == 0 {
            return None;
        }

        let inner = self.inner.lock();
        let slot = inner.objects.get(&id)?;
        if !slot.published || !slot.object.kind().matches(filter) {
            return None;
        }
        // Unpublished under our feet
        if slot.object.base().id() != id {
            return None;
        }

        match &slot.object {
            ModeObject::Framebuffer(fb) => {
                FramebufferRef::get_unless_zero(fb).map(ModeObjectRef::Framebuffer)
            }
            ModeObject::Crtc(crtc) => Some(ModeObjectRef::Crtc(Arc::clone(crtc))),
            ModeObject::Plane(plane) => Some(ModeObjectRef::Plane(Arc::clone(plane))),
        }
    }

    /// Unpublish the object owning `base` and release its id.
    ///
    /// Safe to call on objects that were never added or were already
    /// removed.
    pub fn remove(&self, base: &ModeObjectBase) {
        let removed = {
            let mut inner = self.inner.lock();
            let id = base.id();
            let owned = inner
                .objects
                .get(&id)
                .is_some_and(|slot| ptr::eq(slot.object.base(), base));
            if !owned {
                return;
            }
            base.set_id(0);
            inner.ids.recycle(id);
            inner.objects.remove(&id)
        };
        // The entry may hold the last Arc of the object, drop it unlocked
        drop(removed);
    }

    /// Number of ids currently allocated, published or not.
    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
