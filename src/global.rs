//! The process-wide default pool.
//!
//! ```text
//!   init() ──► [ live: malloc / free / realloc / ... ] ──► destroy()
//!     │                                                      │
//!     └─ AlreadyInitialized if live        NotInitialized ◄──┘ if not live
//! ```
//!
//! Convenience calls share a read lock on the slot and then contend only on
//! the pool's own mutex; `init` and `destroy` take the write lock.

use std::ptr::NonNull;

use parking_lot::RwLock;
use tracing::debug;

use crate::{
  config::PoolConfig,
  error::{Error, Result},
  manager::QuickAlloc,
  stats::PoolStats,
};

static DEFAULT: RwLock<Option<QuickAlloc>> = RwLock::new(None);

/// Creates the default pool with [`PoolConfig::default`].
pub fn init() -> Result<()> {
  init_with(PoolConfig::default())
}

/// Creates the default pool with an explicit configuration.
pub fn init_with(
  config: PoolConfig,
) -> Result<()> {
  let mut slot = DEFAULT.write();

  if slot.is_some() {
    return Err(Error::AlreadyInitialized);
  }

  *slot = Some(QuickAlloc::with_config(config)?);
  debug!("global pool initialized");

  Ok(())
}

/// Discards the default pool. Every pointer it handed out dangles afterward.
pub fn destroy() -> Result<()> {
  let pool = DEFAULT.write().take().ok_or(Error::NotInitialized)?;

  pool.discard();
  debug!("global pool destroyed");

  Ok(())
}

pub fn is_initialized() -> bool {
  DEFAULT.read().is_some()
}

fn with_default<T>(
  f: impl FnOnce(&QuickAlloc) -> Result<T>,
) -> Result<T> {
  let slot = DEFAULT.read();
  let pool = slot.as_ref().ok_or(Error::NotInitialized)?;

  f(pool)
}

/// [`QuickAlloc::malloc`] on the default pool.
pub fn malloc(
  size: usize,
) -> Result<NonNull<u8>> {
  with_default(|pool| pool.malloc(size))
}

/// [`QuickAlloc::free`] on the default pool.
///
/// # Safety
///
/// See [`QuickAlloc::free`].
pub unsafe fn free(
  ptr: *mut u8,
) -> Result<()> {
  with_default(|pool| unsafe { pool.free(ptr) })
}

/// [`QuickAlloc::realloc`] on the default pool.
///
/// # Safety
///
/// See [`QuickAlloc::realloc`].
pub unsafe fn realloc(
  ptr: *mut u8,
  size: usize,
) -> Result<Option<NonNull<u8>>> {
  with_default(|pool| unsafe { pool.realloc(ptr, size) })
}

/// [`QuickAlloc::granted_size`] on the default pool.
///
/// # Safety
///
/// See [`QuickAlloc::granted_size`].
pub unsafe fn granted_size(
  ptr: *const u8,
) -> Result<usize> {
  with_default(|pool| unsafe { pool.granted_size(ptr) })
}

pub fn stats() -> Result<PoolStats> {
  with_default(|pool| Ok(pool.stats()))
}
