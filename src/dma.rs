use crate::{BufferType, Device, Driver, Result, SpcmError};
use log::info;
use std::{
    alloc::{self, Layout},
    ops::Range,
    ptr::NonNull,
};

/// Minimum alignment the driver expects for host transfer buffers.
pub const PAGE_SIZE: usize = 4096;

/// Page size of the host, never below [`PAGE_SIZE`].
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return (size as usize).max(PAGE_SIZE);
        }
    }
    PAGE_SIZE
}

/// Memory the card writes acquisition data into.
///
/// Either a window of the driver's continuous memory (borrowed, never freed
/// here) or a page-aligned host allocation owned by this value.
pub struct DmaBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Option<Layout>,
}

// The buffer is plain memory; the card handle that writes into it travels
// with it on the same thread.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    /// Allocates a zeroed host buffer aligned to [`page_size`].
    pub fn allocate(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(SpcmError::invalid("buffer size", "must be non-zero"));
        }
        let layout = Layout::from_size_align(len, page_size())
            .map_err(|e| SpcmError::invalid("buffer size", e.to_string()))?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            SpcmError::invalid("buffer size", format!("could not allocate {len} bytes"))
        })?;
        Ok(Self {
            ptr,
            len,
            layout: Some(layout),
        })
    }

    /// Uses the driver's continuous memory when it holds at least `len`
    /// bytes, otherwise allocates host memory.
    pub fn for_transfer<D: Driver>(device: &mut Device<D>, len: usize) -> Result<Self> {
        let (ptr, cont_len) = device.continuous_buffer(BufferType::Data)?;
        match NonNull::new(ptr) {
            Some(ptr) if cont_len >= len as u64 && len > 0 => {
                info!("Using {len} of {cont_len} bytes of continuous memory");
                Ok(Self {
                    ptr,
                    len,
                    layout: None,
                })
            }
            _ => {
                info!("Allocating {len} byte host DMA buffer");
                Self::allocate(len)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_continuous(&self) -> bool {
        self.layout.is_none()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Bytes in `range`. Panics if the range leaves the buffer.
    pub fn read(&self, range: Range<usize>) -> &[u8] {
        assert!(
            range.start <= range.end && range.end <= self.len,
            "range {range:?} outside {} byte DMA buffer",
            self.len
        );
        // SAFETY: bounds checked above; the pointer is valid for `len` bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(range.start), range.len()) }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // SAFETY: allocated in `allocate` with this layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}
