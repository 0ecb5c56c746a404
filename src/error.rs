/// Errors reported by pool creation and by the allocation entry points.
///
/// Configuration and size errors are raised before any pool state is
/// touched. Exhaustion and pointer errors leave the pool exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// The creation parameters cannot describe a usable pool.
  #[error("invalid pool configuration: {0}")]
  InvalidConfig(String),

  /// Reserving the arena itself failed.
  #[error("failed to reserve a {size} byte arena")]
  OutOfMemory { size: usize },

  /// No free slot and not enough uncarved arena left for the request.
  #[error("pool exhausted while serving a {requested} byte request")]
  PoolExhausted { requested: usize },

  /// The request cannot be served by any size class.
  #[error("unserviceable allocation size {size} (largest block is {max} bytes)")]
  InvalidSize { size: usize, max: usize },

  /// The pointer is not a live allocation of this pool (includes double free).
  #[error("pointer {address:#x} is not a live allocation of this pool")]
  InvalidPointer { address: usize },

  /// A global entry point was used outside the `init`/`destroy` window.
  #[error("the global allocator is not initialized")]
  NotInitialized,

  /// `init` was called while the global allocator was already live.
  #[error("the global allocator is already initialized")]
  AlreadyInitialized,
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
  pub(crate) fn config(
    message: impl Into<String>,
  ) -> Self {
    Self::InvalidConfig(message.into())
  }

  pub(crate) fn invalid_pointer(
    ptr: *const u8,
  ) -> Self {
    Self::InvalidPointer {
      address: ptr as usize,
    }
  }
}
