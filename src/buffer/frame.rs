//! Frame - a slot in the buffer pool.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::Page;

/// Bookkeeping for one frame: which page it holds, how many callers
/// have it pinned, and whether the bytes differ from disk.
///
/// One mutex for all three fields: the pool already mutates them
/// together under its own lock, so per-field atomics would buy
/// nothing. The mutex only makes cross-thread reads (accessors) safe.
#[derive(Clone, Copy, Default)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
}

/// A frame in the buffer pool.
///
/// The pool allocates a fixed number of frames at startup and reuses
/// them across many page identities. The page bytes sit behind a
/// rwlock taken by *callers* of the pool (the table heap) around their
/// on-page critical sections; the pool itself only touches the bytes
/// of unpinned frames, which by contract no caller still references.
pub struct Frame {
    /// The page data, behind the caller-facing rwlock.
    page: RwLock<Page>,

    /// Identity, pin count and dirty flag.
    meta: Mutex<FrameMeta>,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            meta: Mutex::new(FrameMeta::default()),
        }
    }

    /// Acquire the shared lock on the page bytes.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire the exclusive lock on the page bytes.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// The page currently loaded, if any.
    pub fn page_id(&self) -> Option<PageId> {
        self.meta.lock().page_id
    }

    pub(crate) fn set_page_id(&self, page_id: Option<PageId>) {
        self.meta.lock().page_id = page_id;
    }

    /// Current pin count.
    pub fn pin_count(&self) -> u32 {
        self.meta.lock().pin_count
    }

    /// Whether any caller still holds a pin.
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Take one pin. Returns the new pin count.
    pub(crate) fn pin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count += 1;
        meta.pin_count
    }

    /// Release one pin. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if no pin is outstanding; the pool checks before calling.
    pub(crate) fn unpin(&self) -> u32 {
        let mut meta = self.meta.lock();
        assert!(meta.pin_count > 0, "unpin without a matching pin");
        meta.pin_count -= 1;
        meta.pin_count
    }

    /// Whether the bytes changed since load or the last write-back.
    pub fn is_dirty(&self) -> bool {
        self.meta.lock().dirty
    }

    pub(crate) fn mark_dirty(&self) {
        self.meta.lock().dirty = true;
    }

    pub(crate) fn clear_dirty(&self) {
        self.meta.lock().dirty = false;
    }

    /// Return the frame to its empty state, zeroing the page bytes.
    pub(crate) fn reset(&self) {
        self.page_mut().reset();
        *self.meta.lock() = FrameMeta::default();
    }
}
