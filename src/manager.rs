use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
  config::PoolConfig,
  engine::AllocationEngine,
  error::Result,
  stats::PoolStats,
  step::SteppingMethod,
  store::SizeClass,
};

/// A pool allocator instance: one fixed arena carved into size classes.
///
/// Every call locks the instance's mutex for a short, bounded critical
/// section, so a `QuickAlloc` can be shared between threads. Separate
/// instances share nothing.
///
/// Dropping the handle (or calling [`QuickAlloc::discard`]) unmaps the arena.
/// Pointers handed out by the pool dangle from that point on.
#[derive(Debug)]
pub struct QuickAlloc {
  config: PoolConfig,
  engine: Mutex<AllocationEngine>,
}

impl QuickAlloc {
  /// Creates a pool with [`PoolConfig::default`].
  pub fn create_default() -> Result<Self> {
    Self::with_config(PoolConfig::default())
  }

  pub fn create(
    pool_size: usize,
    min_block_size: usize,
    max_block_size: usize,
    stepping_method: SteppingMethod,
    full_align: bool,
  ) -> Result<Self> {
    Self::with_config(PoolConfig::new(
      pool_size,
      min_block_size,
      max_block_size,
      stepping_method,
      full_align,
    ))
  }

  pub fn with_config(
    config: PoolConfig,
  ) -> Result<Self> {
    let engine = AllocationEngine::new(&config)?;

    debug!(
      pool_size = config.pool_size,
      classes = engine.store().classes().len(),
      full_align = config.full_align,
      alignment = config.alignment,
      "created pool"
    );

    Ok(Self {
      config,
      engine: Mutex::new(engine),
    })
  }

  /// Releases the arena back to the OS.
  pub fn discard(self) {
    debug!(stats = ?self.stats(), "discarding pool");
  }

  pub fn config(&self) -> &PoolConfig {
    &self.config
  }

  /// Snapshot of the size-class table, smallest class first.
  pub fn size_classes(&self) -> Vec<SizeClass> {
    self.engine.lock().store().classes().to_vec()
  }

  /// Allocates a block able to hold `size` bytes.
  ///
  /// Fails with [`Error::PoolExhausted`](crate::Error::PoolExhausted) when the
  /// pool has no room left; the pool is unchanged in that case.
  pub fn malloc(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    self.engine.lock().malloc(size)
  }

  /// Returns the block behind `ptr` to the pool. Null is a no-op.
  ///
  /// A pointer this pool did not hand out, or one already freed, is rejected
  /// with [`Error::InvalidPointer`](crate::Error::InvalidPointer).
  ///
  /// # Safety
  ///
  /// `ptr` must be null or point into memory the caller may read, and no
  /// other thread may be writing the bytes just in front of it.
  pub unsafe fn free(
    &self,
    ptr: *mut u8,
  ) -> Result<()> {
    unsafe { self.engine.lock().free(ptr) }
  }

  /// Resizes the block behind `ptr` to `size` bytes.
  ///
  /// A null `ptr` allocates like [`QuickAlloc::malloc`], even for a zero
  /// `size`. Otherwise a zero `size` frees the block and yields `None`. The block
  /// moves only when its class cannot hold `size`; the contents up to the
  /// smaller of both sizes are preserved. On failure the original block is
  /// still live and unchanged, and the caller remains responsible for it.
  ///
  /// # Safety
  ///
  /// Same contract as [`QuickAlloc::free`]. No other thread may access the
  /// block while it is being resized.
  pub unsafe fn realloc(
    &self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    unsafe { self.engine.lock().realloc(ptr, size) }
  }

  /// Bytes usable behind `ptr`: the size of the class it was served from.
  ///
  /// # Safety
  ///
  /// Same contract as [`QuickAlloc::free`].
  pub unsafe fn granted_size(
    &self,
    ptr: *const u8,
  ) -> Result<usize> {
    unsafe { self.engine.lock().granted_size(ptr) }
  }

  pub fn stats(&self) -> PoolStats {
    self.engine.lock().stats()
  }
}
