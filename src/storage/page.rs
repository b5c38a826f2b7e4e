//! Page - the fundamental 4 KiB unit of storage.

use crate::common::config::PAGE_SIZE;

/// A page of data (4 KiB, 4 KiB-aligned).
///
/// The unit of I/O between the file manager and the buffer pool, and
/// the buffer the table layer's structured views lay their formats
/// over; the `AsRef`/`AsMut` impls are what those views consume.
/// Alignment matches the transfer size so the buffers stay usable for
/// direct I/O.
///
/// Copying a page is never implicit: there is deliberately no `Clone`.
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// The page bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The page bytes, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero the page for reuse under a new identity.
    pub(crate) fn reset(&mut self) {
        self.data.fill(0);
    }
}

impl AsRef<[u8]> for Page {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl AsMut<[u8]> for Page {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
