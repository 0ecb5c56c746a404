use std::ptr::{self, NonNull};

use crate::error::{Error, Result};

/// The single contiguous region a pool carves its blocks from.
///
/// Reserved with an anonymous private `mmap` and unmapped when dropped, so
/// its capacity goes back to the OS exactly once.
pub struct Arena {
  base: NonNull<u8>,
  size: usize,
}

// SAFETY: the arena exclusively owns its mapping; every access to its bytes
// goes through the owning pool's lock or through a block handed to a caller.
unsafe impl Send for Arena {}

impl Arena {
  pub fn reserve(
    size: usize,
  ) -> Result<Self> {
    if size == 0 {
      return Err(Error::config("pool_size must be non-zero"));
    }

    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if base == libc::MAP_FAILED {
      return Err(Error::OutOfMemory { size });
    }

    NonNull::new(base.cast::<u8>())
      .map(|base| Self { base, size })
      .ok_or(Error::OutOfMemory { size })
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Arena offset of `ptr`, if it points inside the arena.
  pub fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;

    (offset < self.size).then_some(offset)
  }

  /// Pointer to `offset` bytes past the base.
  ///
  /// # Safety
  ///
  /// `offset` must not exceed the arena size.
  pub unsafe fn at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset <= self.size);

    unsafe { self.base.add(offset) }
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base.as_ptr().cast(), self.size);
    }
  }
}

impl std::fmt::Debug for Arena {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.base)
      .field("size", &self.size)
      .finish()
  }
}
