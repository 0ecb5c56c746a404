use crate::{
  align,
  block::{HEADER_ALIGN, HEADER_SIZE},
  error::{Error, Result},
  step::{StepSequence, SteppingMethod},
};

pub const DEFAULT_POOL_SIZE: usize = 1 << 20;
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 16;
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1 << 16;
pub const DEFAULT_ALIGNMENT: usize = 256;

/// Upper bound on the number of size classes one pool may hold.
pub const MAX_SIZE_CLASSES: usize = 4096;

/// What `malloc(0)` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroSizePolicy {
  /// Fail with [`Error::InvalidSize`].
  #[default]
  Reject,
  /// Hand out a unique block from the smallest class.
  MinimumClass,
}

/// Creation parameters of a pool. Immutable once the pool exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
  pub pool_size: usize,
  pub min_block_size: usize,
  pub max_block_size: usize,
  pub stepping_method: SteppingMethod,
  /// Reserve padding in every slot so each payload meets `alignment`.
  pub full_align: bool,
  pub alignment: usize,
  pub zero_size: ZeroSizePolicy,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      pool_size: DEFAULT_POOL_SIZE,
      min_block_size: DEFAULT_MIN_BLOCK_SIZE,
      max_block_size: DEFAULT_MAX_BLOCK_SIZE,
      stepping_method: SteppingMethod::Doubling,
      full_align: true,
      alignment: DEFAULT_ALIGNMENT,
      zero_size: ZeroSizePolicy::Reject,
    }
  }
}

impl PoolConfig {
  pub fn new(
    pool_size: usize,
    min_block_size: usize,
    max_block_size: usize,
    stepping_method: SteppingMethod,
    full_align: bool,
  ) -> Self {
    Self {
      pool_size,
      min_block_size,
      max_block_size,
      stepping_method,
      full_align,
      ..Self::default()
    }
  }

  pub fn with_alignment(
    mut self,
    alignment: usize,
  ) -> Self {
    self.alignment = alignment;
    self
  }

  pub fn with_zero_size(
    mut self,
    policy: ZeroSizePolicy,
  ) -> Self {
    self.zero_size = policy;
    self
  }

  /// The size-class boundaries this configuration produces.
  pub fn step_sequence(&self) -> Result<StepSequence> {
    StepSequence::new(self.min_block_size, self.max_block_size, self.stepping_method)
  }

  /// Arena bytes every slot spends beyond its payload, before rounding the
  /// stride to the header alignment.
  pub fn slot_overhead(&self) -> usize {
    HEADER_SIZE + align::slot_reserve(self.alignment, self.full_align)
  }

  /// Checks every parameter, including the size-class table it produces.
  pub fn validate(&self) -> Result<()> {
    if self.pool_size == 0 {
      return Err(Error::config("pool_size must be non-zero"));
    }

    if !self.alignment.is_power_of_two() {
      return Err(Error::config(format!(
        "alignment {} is not a power of two",
        self.alignment
      )));
    }

    if self.alignment < HEADER_ALIGN {
      return Err(Error::config(format!(
        "alignment {} is below the minimum of {HEADER_ALIGN}",
        self.alignment
      )));
    }

    let classes = self.step_sequence()?.take(MAX_SIZE_CLASSES + 1).count();
    if classes > MAX_SIZE_CLASSES {
      return Err(Error::config(format!(
        "stepping produces more than {MAX_SIZE_CLASSES} size classes"
      )));
    }

    // The largest class has the largest stride.
    if self
      .max_block_size
      .checked_add(self.slot_overhead() + HEADER_ALIGN - 1)
      .is_none()
    {
      return Err(Error::config(format!(
        "block size {} overflows the slot layout",
        self.max_block_size
      )));
    }

    Ok(())
  }
}
