/// Point-in-time view of a pool's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
  /// Fixed capacity of the arena.
  pub pool_size: usize,
  /// Bytes the bump cursor has carved into slots so far.
  pub carved_bytes: usize,
  pub class_count: usize,
  /// Blocks currently handed out.
  pub live_blocks: usize,
  /// Sum of the sizes callers asked for across live blocks.
  pub requested_bytes: usize,
  /// Sum of the class sizes granted to live blocks.
  pub granted_bytes: usize,
  /// Released slots waiting on the free lists.
  pub free_slots: usize,
}

impl PoolStats {
  /// Arena bytes never carved into a slot.
  pub fn uncarved_bytes(&self) -> usize {
    self.pool_size - self.carved_bytes
  }
}
