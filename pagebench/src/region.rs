use std::{io, ptr, ptr::NonNull, slice};

use crate::page_size::PageSizeClass;

#[derive(thiserror::Error, Debug)]
pub(crate) enum MapError {
    #[error("empty region requested")]
    Empty,
    #[error("{0} pages are not supported on this platform")]
    Unsupported(PageSizeClass),
    #[error("mapping length {len} overflows when rounded to {granule} bytes")]
    Overflow { len: usize, granule: usize },
    #[error("mmap {len} bytes with {class} pages: {source}")]
    Map {
        len: usize,
        class: PageSizeClass,
        #[source]
        source: io::Error,
    },
}

/// Anonymous private read-write mapping. Unmapped when dropped.
#[derive(Debug)]
pub(crate) struct Region {
    base: NonNull<u8>,
    // bytes visible through as_slice
    len: usize,
    // bytes passed to mmap and munmap, len rounded up to the page granule
    mapped: usize,
}

impl Region {
    /// Maps `len` bytes backed by pages of `class`.
    ///
    /// `granule` is the page size the class resolves to. Huge page mappings must be
    /// unmapped with a length aligned to it, so the mapping is rounded up.
    pub(crate) fn map(len: usize, class: PageSizeClass, granule: usize) -> Result<Self, MapError> {
        if len == 0 {
            return Err(MapError::Empty);
        }
        let flags = class.flags().ok_or(MapError::Unsupported(class))?;
        let mapped = len
            .checked_next_multiple_of(granule.max(1))
            .ok_or(MapError::Overflow { len, granule })?;
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(MapError::Map {
                len,
                class,
                source: io::Error::last_os_error(),
            });
        }
        let base = NonNull::new(addr as *mut u8).ok_or_else(|| MapError::Map {
            len,
            class,
            source: io::Error::new(io::ErrorKind::Other, "mmap returned null"),
        })?;
        Ok(Region { base, len, mapped })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.len) }
    }

    /// Unmaps the region now instead of at the end of the scope.
    pub(crate) fn release(self) {
        drop(self)
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        let rst = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.mapped) };
        // the length always matches the one passed to mmap, failure means the invariant is broken
        assert!(
            rst == 0,
            "munmap {:p} of {} bytes: {}",
            self.base,
            self.mapped,
            io::Error::last_os_error()
        );
    }
}
