//! Error types for heapstore.

use std::fmt;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapstore.
///
/// A single error type keeps propagation uniform across the file manager,
/// the buffer pool and the table heap.
#[derive(Debug)]
pub enum Error {
    /// I/O error from disk operations.
    Io(std::io::Error),

    /// Page id at or beyond the allocation frontier (`next_page_id`).
    InvalidPageId(u32),

    /// Read or write of a page that is currently on the free list.
    PageDeallocated(u32),

    /// Deallocate of a page that is already free.
    DoubleFree(u32),

    /// A page read transferred fewer bytes than a full page.
    ShortRead { page_id: u32, got: usize },

    /// The buffer pool has no free frames and every resident frame is pinned.
    PoolExhausted,

    /// Attempt to delete a page that is still pinned.
    PagePinned(u32),

    /// A slotted page has too little free space for the record.
    ///
    /// Internal to the table layer: the heap treats this as "retry on
    /// another page", not as a caller-visible failure.
    PageFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidPageId(pid) => write!(f, "Page {} is not in the file", pid),
            Error::PageDeallocated(pid) => write!(f, "Page {} is deallocated", pid),
            Error::DoubleFree(pid) => write!(f, "Page {} is already deallocated", pid),
            Error::ShortRead { page_id, got } => {
                write!(f, "Short read of page {}: got {} bytes", page_id, got)
            }
            Error::PoolExhausted => write!(f, "Buffer pool is full"),
            Error::PagePinned(pid) => write!(f, "Page {} is still pinned", pid),
            Error::PageFull => write!(f, "Not enough free space on page"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
