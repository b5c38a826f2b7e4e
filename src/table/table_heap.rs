//! Table heap - a file-wide heap of variable-length records.
//!
//! The heap spreads records across slotted data pages and keeps their
//! insertable free space in the inventory on page 1, so placing a
//! record costs one inventory scan instead of a file scan.

use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{PageId, Result, Rid};
use crate::table::heap_header::{HeapHeader, PageEntry};
use crate::table::table_page::TablePage;

/// The inventory header always lives on page 1: a heap is created
/// against a fresh file, whose first allocation returns exactly that id.
pub const HEAP_HEADER_PAGE_ID: PageId = PageId(1);

/// Heap of variable-length records over a buffer pool.
///
/// # Lock discipline
/// The inventory header and each data page carry their own rwlock (the
/// frame lock handed out by the pool). To stay deadlock free:
/// - the header lock is never held while waiting on a data-page lock:
///   scans read the header, release it, then lock the chosen page;
/// - inventory updates take the header write lock *while* holding the
///   mutated data page, so every entry changes in the same critical
///   section as its page;
/// - the pool's own mutex is always released before a frame lock is
///   taken.
///
/// Operations on different data pages run in parallel; readers of one
/// page are admitted concurrently.
pub struct TableHeap {
    pool: Arc<BufferPool>,
}

impl TableHeap {
    /// Open the heap over `pool`, creating and initializing the
    /// inventory header page when `is_new`.
    ///
    /// # Panics
    /// Panics if `is_new` and the header page does not come out as
    /// page 1, which means the pool was handed a non-fresh file.
    pub fn new(pool: Arc<BufferPool>, is_new: bool) -> Result<Self> {
        let heap = Self { pool };
        if is_new {
            let (page_id, frame) = heap.pool.new_page()?;
            assert_eq!(
                page_id, HEAP_HEADER_PAGE_ID,
                "heap header page must be page 1"
            );
            {
                let mut guard = frame.page_mut();
                HeapHeader::new(&mut *guard).init();
            }
            heap.pool.unpin_page(page_id, true);
        }
        Ok(heap)
    }

    /// Insert a record, returning its rid.
    ///
    /// Retries until a placement sticks: the inventory scan and the
    /// page-level insert are separate critical sections, so a concurrent
    /// insert may consume the free space first.
    ///
    /// # Errors
    /// `Error::PageFull` if the record cannot fit even on an empty page.
    pub fn insert(&self, record: &[u8]) -> Result<Rid> {
        loop {
            match self.find_page_with_space(record.len())? {
                Some(page_id) => {
                    if let Some(rid) = self.insert_into(record, page_id)? {
                        return Ok(rid);
                    }
                    // Lost the race for that page's space; rescan.
                }
                None => return self.insert_into_new_page(record),
            }
        }
    }

    /// Delete the record at `rid`. Returns false if the rid's page is
    /// not part of the heap, the slot is out of range, or the record
    /// was already deleted.
    pub fn delete(&self, rid: Rid) -> Result<bool> {
        if !self.page_in_heap(rid.page_id)? {
            return Ok(false);
        }

        let frame = self.pool.fetch_page(rid.page_id)?;
        let mut guard = frame.page_mut();
        let (deleted, free_for_insert) = {
            let mut page = TablePage::new(&mut *guard);
            let deleted = page.delete(rid);
            (deleted, page.free_space_for_insert())
        };

        if !deleted {
            drop(guard);
            self.pool.unpin_page(rid.page_id, false);
            return Ok(false);
        }

        let update = self.update_entry(rid.page_id, free_for_insert);
        drop(guard);
        self.pool.unpin_page(rid.page_id, true);
        update.map(|_| true)
    }

    /// Copy out the record at `rid`, or None if it does not exist.
    pub fn get(&self, rid: Rid) -> Result<Option<Vec<u8>>> {
        if !self.page_in_heap(rid.page_id)? {
            return Ok(None);
        }

        let frame = self.pool.fetch_page(rid.page_id)?;
        let record = {
            let guard = frame.page();
            TablePage::new(&*guard).get(rid)
        };
        self.pool.unpin_page(rid.page_id, false);
        Ok(record)
    }

    /// Scan the inventory for the first page able to take `needed`
    /// bytes. Header read lock only; released before returning.
    fn find_page_with_space(&self, needed: usize) -> Result<Option<PageId>> {
        let frame = self.pool.fetch_page(HEAP_HEADER_PAGE_ID)?;
        let found = {
            let guard = frame.page();
            let header = HeapHeader::new(&*guard);
            (0..header.num_pages() as usize)
                .map(|i| header.entry_at(i))
                .find(|entry| entry.free_for_insert >= needed as i32)
                .map(|entry| entry.page_id)
        };
        self.pool.unpin_page(HEAP_HEADER_PAGE_ID, false);
        Ok(found)
    }

    /// Whether `page_id` belongs to the heap's inventory.
    fn page_in_heap(&self, page_id: PageId) -> Result<bool> {
        let frame = self.pool.fetch_page(HEAP_HEADER_PAGE_ID)?;
        let found = {
            let guard = frame.page();
            HeapHeader::new(&*guard).find(page_id).is_some()
        };
        self.pool.unpin_page(HEAP_HEADER_PAGE_ID, false);
        Ok(found)
    }

    /// Try the slotted insert on one page. Ok(None) means another
    /// insert consumed the space first and the caller should rescan.
    fn insert_into(&self, record: &[u8], page_id: PageId) -> Result<Option<Rid>> {
        let frame = self.pool.fetch_page(page_id)?;
        let mut guard = frame.page_mut();
        let (result, free_for_insert) = {
            let mut page = TablePage::new(&mut *guard);
            let result = page.insert(record);
            (result, page.free_space_for_insert())
        };

        match result {
            Ok(rid) => {
                let update = self.update_entry(page_id, free_for_insert);
                drop(guard);
                self.pool.unpin_page(page_id, true);
                update.map(|_| Some(rid))
            }
            Err(_) => {
                drop(guard);
                self.pool.unpin_page(page_id, false);
                Ok(None)
            }
        }
    }

    /// Allocate a fresh data page, insert into it, and append its
    /// inventory entry.
    fn insert_into_new_page(&self, record: &[u8]) -> Result<Rid> {
        let (page_id, frame) = self.pool.new_page()?;
        let mut guard = frame.page_mut();
        let (result, free_for_insert) = {
            let mut page = TablePage::new(&mut *guard);
            page.init(page_id);
            // Only a record beyond page capacity can fail here; the
            // entry is appended regardless so the page stays usable.
            let result = page.insert(record);
            (result, page.free_space_for_insert())
        };

        let push = self.push_entry(page_id, free_for_insert);
        drop(guard);
        self.pool.unpin_page(page_id, true);
        push?;
        result
    }

    /// Rewrite one inventory entry. Called with the entry's data page
    /// write-locked.
    fn update_entry(&self, page_id: PageId, free_for_insert: i32) -> Result<()> {
        let frame = self.pool.fetch_page(HEAP_HEADER_PAGE_ID)?;
        {
            let mut guard = frame.page_mut();
            let mut header = HeapHeader::new(&mut *guard);
            let updated = header.set(PageEntry {
                page_id,
                free_for_insert,
            });
            debug_assert!(updated, "page missing from heap inventory");
        }
        self.pool.unpin_page(HEAP_HEADER_PAGE_ID, true);
        Ok(())
    }

    /// Append an inventory entry for a fresh data page. Called with the
    /// data page write-locked.
    fn push_entry(&self, page_id: PageId, free_for_insert: i32) -> Result<()> {
        let frame = self.pool.fetch_page(HEAP_HEADER_PAGE_ID)?;
        {
            let mut guard = frame.page_mut();
            HeapHeader::new(&mut *guard).push(PageEntry {
                page_id,
                free_for_insert,
            });
        }
        self.pool.unpin_page(HEAP_HEADER_PAGE_ID, true);
        Ok(())
    }
}
