//! File Manager - paged file I/O with a persistent free-page catalog.
//!
//! The [`FileManager`] owns a single data file divided into fixed 4 KiB
//! pages and handles:
//! - Reading and writing whole pages
//! - Allocating pages (from the free list, or by extending the file)
//! - Deallocating pages back onto the free list
//!
//! Page 0 is the on-disk allocation header ([`FileHeader`]); it is
//! rewritten after every allocate/deallocate and every page write is
//! followed by `fsync`, so completed operations survive restart.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::file_header::FileHeader;
use crate::storage::Page;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┐
/// │ Page 0   │ Page 1  │ Page 2  │  ...    │
/// │ (header) │ (4KB)   │ (4KB)   │         │
/// └──────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    N×4096
/// ```
///
/// Page N lives at file offset `N × PAGE_SIZE`. An in-memory free set
/// mirrors the header's free list for O(1) membership tests.
///
/// # Thread Safety
/// `FileManager` is single-threaded; the buffer pool serializes access
/// behind its own lock.
///
/// # Durability
/// All page writes are followed by `fsync`. Allocation and deallocation
/// rewrite page 0 before returning, so the catalog never lags the file.
pub struct FileManager {
    file: File,
    header: FileHeader,
    /// Scratch buffer for encoding page 0.
    header_page: Page,
    /// Mirror of the header's free list for O(1) lookups.
    free_set: HashSet<PageId>,
}

impl FileManager {
    /// Open an existing database file, or create it if it doesn't exist.
    ///
    /// On a fresh (empty) file a new allocation header is written; on an
    /// existing file page 0 is read back and the free set rebuilt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_size = file.metadata()?.len();

        let mut fm = Self {
            file,
            header: FileHeader::new(),
            header_page: Page::new(),
            free_set: HashSet::new(),
        };

        if file_size == 0 {
            fm.write_header()?;
        } else {
            Self::read_at(&mut fm.file, PageId::new(0), &mut fm.header_page)?;
            fm.header = FileHeader::from_page(&fm.header_page);
            fm.free_set = fm.header.free_pages().collect();
        }

        Ok(fm)
    }

    /// Allocate a page and return its id. Never returns page 0.
    ///
    /// Pops the head of the free list when one exists; otherwise the
    /// file is extended by one zeroed page at the allocation frontier.
    /// Page 0 is rewritten before returning.
    pub fn allocate(&mut self) -> Result<PageId> {
        let page_id = match self.header.pop_free_page() {
            Some(page_id) => {
                self.free_set.remove(&page_id);
                page_id
            }
            None => {
                let page_id = PageId::new(self.header.next_page_id());
                let zeroed = Page::new();
                Self::write_at(&mut self.file, page_id, &zeroed)?;
                self.header.bump_next_page_id();
                page_id
            }
        };
        self.write_header()?;
        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` if the id is beyond the frontier
    /// - `Error::DoubleFree` if the page is already free
    pub fn deallocate(&mut self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.header.next_page_id() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if self.free_set.contains(&page_id) {
            return Err(Error::DoubleFree(page_id.0));
        }
        self.header.push_free_page(page_id);
        self.free_set.insert(page_id);
        self.write_header()
    }

    /// Read a page from disk into `page`.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` / `Error::PageDeallocated` for ids
    ///   outside the live set
    /// - `Error::ShortRead` if the transfer came up short
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.validate(page_id)?;
        Self::read_at(&mut self.file, page_id, page)
    }

    /// Write a page to disk, followed by `fsync`.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` / `Error::PageDeallocated` for ids
    ///   outside the live set
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.validate(page_id)?;
        Self::write_at(&mut self.file, page_id, page)
    }

    /// The allocation frontier: the next never-used page id.
    #[inline]
    pub fn next_page_id(&self) -> u32 {
        self.header.next_page_id()
    }

    /// Number of pages currently on the free list.
    #[inline]
    pub fn num_free_pages(&self) -> usize {
        self.free_set.len()
    }

    /// Whether a page is currently on the free list.
    #[inline]
    pub fn is_free(&self, page_id: PageId) -> bool {
        self.free_set.contains(&page_id)
    }

    fn validate(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.header.next_page_id() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if self.free_set.contains(&page_id) {
            return Err(Error::PageDeallocated(page_id.0));
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.header.write_to(&mut self.header_page);
        Self::write_at(&mut self.file, PageId::new(0), &self.header_page)
    }

    fn read_at(file: &mut File, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;

        let got = file.read(page.as_mut_slice())?;
        if got < PAGE_SIZE {
            return Err(Error::ShortRead {
                page_id: page_id.0,
                got,
            });
        }
        Ok(())
    }

    fn write_at(file: &mut File, page_id: PageId, page: &Page) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.as_slice())?;
        file.sync_all()?;
        Ok(())
    }
}
