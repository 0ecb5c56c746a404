use std::ptr::{self, NonNull};

use tracing::{trace, warn};

use crate::{
  block::BlockState,
  config::{PoolConfig, ZeroSizePolicy},
  error::{Error, Result},
  stats::PoolStats,
  store::{BlockStore, Located},
};

/// malloc/free/realloc on top of a [`BlockStore`].
///
/// Not synchronized; the owning pool serializes every call.
#[derive(Debug)]
pub struct AllocationEngine {
  store: BlockStore,
  max_block_size: usize,
  zero_size: ZeroSizePolicy,
  live_blocks: usize,
  requested_bytes: usize,
  granted_bytes: usize,
}

impl AllocationEngine {
  pub fn new(
    config: &PoolConfig,
  ) -> Result<Self> {
    Ok(Self {
      store: BlockStore::new(config)?,
      max_block_size: config.max_block_size,
      zero_size: config.zero_size,
      live_blocks: 0,
      requested_bytes: 0,
      granted_bytes: 0,
    })
  }

  pub fn store(&self) -> &BlockStore {
    &self.store
  }

  pub fn malloc(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let class = self.class_for(size)?;

    let slot = self.store.acquire(class).map_err(|_| {
      warn!(size, class, carved = self.store.carved(), "pool exhausted");
      Error::PoolExhausted { requested: size }
    })?;

    let payload = self.store.claim(slot, size);

    self.live_blocks += 1;
    self.requested_bytes += size;
    self.granted_bytes += self.store.classes()[class].size;

    trace!(size, class, offset = slot.offset, "malloc");

    Ok(payload)
  }

  /// Releases the block behind `ptr`. Null is a no-op.
  ///
  /// # Safety
  ///
  /// No other thread may be writing the bytes in front of `ptr`.
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) -> Result<()> {
    if ptr.is_null() {
      return Ok(());
    }

    let block = self.locate_live(ptr)?;

    trace!(class = block.slot.class, offset = block.slot.offset, "free");
    self.retire(block);

    Ok(())
  }

  /// Resizes the block behind `ptr`, moving it only when its class is too small.
  ///
  /// A null `ptr` behaves as [`AllocationEngine::malloc`]. Otherwise `None` is
  /// returned when `new_size` is zero, in which case the block is freed.
  /// On any error the original block and its contents are left untouched.
  ///
  /// # Safety
  ///
  /// No other thread may be accessing the block behind `ptr`.
  pub unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    new_size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if ptr.is_null() {
      return self.malloc(new_size).map(Some);
    }

    if new_size == 0 {
      unsafe { self.free(ptr)? };
      return Ok(None);
    }

    let mut block = self.locate_live(ptr)?;
    let capacity = self.store.classes()[block.slot.class].size;

    if new_size <= capacity {
      self.requested_bytes = self.requested_bytes - block.payload_size + new_size;
      self.store.resize_in_place(&mut block, new_size);

      trace!(new_size, class = block.slot.class, "realloc in place");
      return Ok(Some(self.store.payload(&block)));
    }

    let moved = self.malloc(new_size)?;

    unsafe {
      ptr::copy_nonoverlapping(
        self.store.payload(&block).as_ptr(),
        moved.as_ptr(),
        block.payload_size.min(new_size),
      );
    }

    trace!(
      new_size,
      from_class = block.slot.class,
      copied = block.payload_size,
      "realloc moved"
    );
    self.retire(block);

    Ok(Some(moved))
  }

  /// Payload capacity of the live block behind `ptr`.
  ///
  /// # Safety
  ///
  /// No other thread may be writing the bytes in front of `ptr`.
  pub unsafe fn granted_size(
    &self,
    ptr: *const u8,
  ) -> Result<usize> {
    let block = self.locate_live(ptr)?;

    Ok(self.store.classes()[block.slot.class].size)
  }

  pub fn stats(&self) -> PoolStats {
    PoolStats {
      pool_size: self.store.capacity(),
      carved_bytes: self.store.carved(),
      class_count: self.store.classes().len(),
      live_blocks: self.live_blocks,
      requested_bytes: self.requested_bytes,
      granted_bytes: self.granted_bytes,
      free_slots: self.store.free_slots(),
    }
  }

  fn class_for(
    &self,
    size: usize,
  ) -> Result<usize> {
    let unserviceable = Error::InvalidSize {
      size,
      max: self.max_block_size,
    };

    if size == 0 {
      return match self.zero_size {
        ZeroSizePolicy::Reject => Err(unserviceable),
        ZeroSizePolicy::MinimumClass => Ok(0),
      };
    }

    self.store.class_for(size).ok_or(unserviceable)
  }

  fn locate_live(
    &self,
    ptr: *const u8,
  ) -> Result<Located> {
    let block = self.store.locate(ptr).inspect_err(|_| {
      warn!(address = ptr as usize, "rejected pointer not owned by the pool");
    })?;

    if block.state == BlockState::Free {
      warn!(address = ptr as usize, class = block.slot.class, "double free");
      return Err(Error::invalid_pointer(ptr));
    }

    Ok(block)
  }

  fn retire(
    &mut self,
    block: Located,
  ) {
    self.live_blocks -= 1;
    self.requested_bytes -= block.payload_size;
    self.granted_bytes -= self.store.classes()[block.slot.class].size;

    self.store.retire(block);
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use proptest::prelude::*;

  use super::*;
  use crate::step::SteppingMethod;

  fn engine(
    pool_size: usize,
    full_align: bool,
  ) -> AllocationEngine {
    AllocationEngine::new(&PoolConfig::new(pool_size, 16, 4096, SteppingMethod::Doubling, full_align)).unwrap()
  }

  fn fill(
    ptr: NonNull<u8>,
    len: usize,
    byte: u8,
  ) {
    unsafe { ptr.as_ptr().write_bytes(byte, len) };
  }

  fn holds(
    ptr: NonNull<u8>,
    len: usize,
    byte: u8,
  ) -> bool {
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) }
      .iter()
      .all(|b| *b == byte)
  }

  #[test]
  fn test_scenario() {
    let mut engine = engine(65536, true);

    let ptr = engine.malloc(100).unwrap();
    assert_eq!(ptr.as_ptr() as usize % 256, 0);
    assert_eq!(unsafe { engine.granted_size(ptr.as_ptr()) }.unwrap(), 128);

    fill(ptr, 100, 0x11);

    let moved = unsafe { engine.realloc(ptr.as_ptr(), 200) }.unwrap().unwrap();
    assert_ne!(moved, ptr);
    assert_eq!(moved.as_ptr() as usize % 256, 0);
    assert_eq!(unsafe { engine.granted_size(moved.as_ptr()) }.unwrap(), 256);
    assert!(holds(moved, 100, 0x11));

    unsafe { engine.free(moved.as_ptr()) }.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.requested_bytes, 0);
    assert_eq!(stats.granted_bytes, 0);
    assert_eq!(stats.free_slots, 2);
  }

  #[test]
  fn test_full_align() {
    let mut engine = engine(1 << 20, true);

    for size in [1, 15, 16, 17, 100, 255, 256, 1000, 4000, 4096] {
      let ptr = engine.malloc(size).unwrap();
      assert_eq!(ptr.as_ptr() as usize % 256, 0, "malloc({size}) is misaligned");
    }
  }

  #[test]
  fn test_lifo_reuse() {
    let mut engine = engine(65536, false);

    let first = engine.malloc(60).unwrap();
    let second = engine.malloc(60).unwrap();

    unsafe {
      engine.free(first.as_ptr()).unwrap();
      engine.free(second.as_ptr()).unwrap();
    }

    // Same class, most recently freed first.
    assert_eq!(engine.malloc(33).unwrap(), second);
    assert_eq!(engine.malloc(64).unwrap(), first);
  }

  #[test]
  fn test_double_free() {
    let mut engine = engine(65536, true);
    let ptr = engine.malloc(32).unwrap();

    unsafe {
      engine.free(ptr.as_ptr()).unwrap();

      assert_eq!(
        engine.free(ptr.as_ptr()),
        Err(Error::InvalidPointer {
          address: ptr.as_ptr() as usize
        })
      );
    }

    // The rejected free did not push the slot a second time.
    assert_eq!(engine.stats().free_slots, 1);
    assert_eq!(engine.malloc(32).unwrap(), ptr);
    assert_ne!(engine.malloc(32).unwrap(), ptr);
  }

  #[test]
  fn test_free_foreign_pointer() {
    let mut engine = engine(65536, true);
    let ptr = engine.malloc(32).unwrap();
    let mut local = 0u64;

    unsafe {
      assert!(matches!(
        engine.free((&raw mut local).cast()),
        Err(Error::InvalidPointer { .. })
      ));
      assert!(matches!(
        engine.free(ptr.as_ptr().add(8)),
        Err(Error::InvalidPointer { .. })
      ));
      assert_eq!(engine.free(ptr::null_mut()), Ok(()));
    }

    assert_eq!(engine.stats().live_blocks, 1);
  }

  #[test]
  fn test_invalid_size() {
    let mut engine = engine(65536, true);

    assert_eq!(engine.malloc(4097), Err(Error::InvalidSize { size: 4097, max: 4096 }));
    assert_eq!(engine.malloc(0), Err(Error::InvalidSize { size: 0, max: 4096 }));
    assert_eq!(engine.stats().carved_bytes, 0);
  }

  #[test]
  fn test_zero_size_minimum_class() {
    let config = PoolConfig::new(65536, 16, 4096, SteppingMethod::Doubling, true).with_zero_size(ZeroSizePolicy::MinimumClass);
    let mut engine = AllocationEngine::new(&config).unwrap();

    let first = engine.malloc(0).unwrap();
    let second = engine.malloc(0).unwrap();

    assert_ne!(first, second);
    assert_eq!(unsafe { engine.granted_size(first.as_ptr()) }.unwrap(), 16);
  }

  #[test]
  fn test_exhaustion() {
    let mut engine = engine(8192, false);
    let mut blocks = Vec::new();

    loop {
      match engine.malloc(64) {
        Ok(ptr) => blocks.push(ptr),
        Err(err) => {
          assert_eq!(err, Error::PoolExhausted { requested: 64 });
          break;
        }
      }
    }

    let stats = engine.stats();
    assert!(stats.carved_bytes <= stats.pool_size);
    assert_eq!(stats.live_blocks, blocks.len());

    // Exhaustion is recoverable by freeing.
    let last = blocks.pop().unwrap();
    unsafe { engine.free(last.as_ptr()) }.unwrap();
    assert_eq!(engine.malloc(64).unwrap(), last);
  }

  #[test]
  fn test_realloc_in_place() {
    let mut engine = engine(65536, true);

    let ptr = engine.malloc(70).unwrap();
    fill(ptr, 70, 0x22);

    let grown = unsafe { engine.realloc(ptr.as_ptr(), 128) }.unwrap();
    assert_eq!(grown, Some(ptr));

    let shrunk = unsafe { engine.realloc(ptr.as_ptr(), 1) }.unwrap();
    assert_eq!(shrunk, Some(ptr));
    assert!(holds(ptr, 70, 0x22));

    assert_eq!(engine.stats().requested_bytes, 1);
    assert_eq!(engine.stats().carved_bytes, engine.store().classes()[3].stride);
  }

  #[test]
  fn test_realloc_preserves_prefix() {
    let mut engine = engine(65536, false);

    let ptr = engine.malloc(40).unwrap();
    for i in 0..40 {
      unsafe { ptr.as_ptr().add(i).write(i as u8) };
    }

    let moved = unsafe { engine.realloc(ptr.as_ptr(), 3000) }.unwrap().unwrap();

    for i in 0..40 {
      assert_eq!(unsafe { moved.as_ptr().add(i).read() }, i as u8);
    }
    assert!(matches!(
      unsafe { engine.granted_size(ptr.as_ptr()) },
      Err(Error::InvalidPointer { .. })
    ));
  }

  #[test]
  fn test_realloc_failure_keeps_original() {
    let mut engine = engine(4096, true);

    let ptr = engine.malloc(100).unwrap();
    fill(ptr, 100, 0x33);

    let carved = engine.stats().carved_bytes;

    assert_eq!(
      unsafe { engine.realloc(ptr.as_ptr(), 4000) },
      Err(Error::PoolExhausted { requested: 4000 })
    );
    assert_eq!(
      unsafe { engine.realloc(ptr.as_ptr(), 5000) },
      Err(Error::InvalidSize { size: 5000, max: 4096 })
    );

    assert!(holds(ptr, 100, 0x33));
    assert_eq!(engine.stats().carved_bytes, carved);
    assert_eq!(engine.stats().live_blocks, 1);
    unsafe { engine.free(ptr.as_ptr()) }.unwrap();
  }

  #[test]
  fn test_realloc_edges() {
    let mut engine = engine(65536, true);

    let ptr = unsafe { engine.realloc(ptr::null_mut(), 10) }.unwrap().unwrap();
    assert_eq!(engine.stats().live_blocks, 1);

    assert_eq!(unsafe { engine.realloc(ptr.as_ptr(), 0) }, Ok(None));
    assert_eq!(engine.stats().live_blocks, 0);

    assert_eq!(
      unsafe { engine.realloc(ptr::null_mut(), 0) },
      Err(Error::InvalidSize { size: 0, max: 4096 })
    );
    assert!(matches!(
      unsafe { engine.realloc(ptr.as_ptr(), 10) },
      Err(Error::InvalidPointer { .. })
    ));
    assert_eq!(engine.stats().live_blocks, 0);
  }

  #[test]
  fn test_realloc_null_follows_zero_size_policy() {
    let config = PoolConfig::new(65536, 16, 4096, SteppingMethod::Doubling, true).with_zero_size(ZeroSizePolicy::MinimumClass);
    let mut engine = AllocationEngine::new(&config).unwrap();

    let ptr = unsafe { engine.realloc(ptr::null_mut(), 0) }.unwrap().unwrap();
    assert_eq!(ptr.as_ptr() as usize % 256, 0);
    assert_eq!(unsafe { engine.granted_size(ptr.as_ptr()) }, Ok(16));
    assert_eq!(engine.stats().live_blocks, 1);

    // A live block resized to zero is still freed.
    assert_eq!(unsafe { engine.realloc(ptr.as_ptr(), 0) }, Ok(None));
    assert_eq!(engine.stats().live_blocks, 0);
  }

  #[derive(Debug, Clone)]
  enum Op {
    Malloc(usize),
    Free(usize),
    Realloc(usize, usize),
  }

  fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
      (1usize..=4096).prop_map(Op::Malloc),
      any::<usize>().prop_map(Op::Free),
      (any::<usize>(), 1usize..=4096).prop_map(|(index, size)| Op::Realloc(index, size)),
    ]
  }

  proptest! {
    #[test]
    fn prop_blocks_stay_disjoint_and_intact(
      ops in prop::collection::vec(op(), 1..200),
      full_align in any::<bool>(),
    ) {
      let mut engine = engine(256 * 1024, full_align);
      let mut live: HashMap<usize, (usize, u8)> = HashMap::new();
      let mut tag = 0u8;

      for op in ops {
        tag = tag.wrapping_add(1);

        match op {
          Op::Malloc(size) => {
            if let Ok(ptr) = engine.malloc(size) {
              fill(ptr, size, tag);
              prop_assert!(live.insert(ptr.as_ptr() as usize, (size, tag)).is_none());
            }
          }
          Op::Free(index) => {
            if live.is_empty() {
              continue;
            }
            let mut keys: Vec<usize> = live.keys().copied().collect();
            keys.sort_unstable();
            let key = keys[index % keys.len()];
            live.remove(&key);
            let freed = unsafe { engine.free(key as *mut u8) };
            prop_assert!(freed.is_ok());
          }
          Op::Realloc(index, size) => {
            if live.is_empty() {
              continue;
            }
            let mut keys: Vec<usize> = live.keys().copied().collect();
            keys.sort_unstable();
            let key = keys[index % keys.len()];
            let (old_size, old_tag) = live[&key];

            match unsafe { engine.realloc(key as *mut u8, size) } {
              Ok(Some(ptr)) => {
                let kept = old_size.min(size);
                prop_assert!(holds(ptr, kept, old_tag));
                live.remove(&key);
                fill(ptr, size, tag);
                live.insert(ptr.as_ptr() as usize, (size, tag));
              }
              Ok(None) => prop_assert!(false, "non-zero realloc returned no pointer"),
              Err(err) => prop_assert_eq!(err, Error::PoolExhausted { requested: size }),
            }
          }
        }

        if full_align {
          prop_assert!(live.keys().all(|address| address % 256 == 0));
        }
      }

      let mut ranges: Vec<(usize, usize)> = live.iter().map(|(address, (size, _))| (*address, *size)).collect();
      ranges.sort_unstable();
      prop_assert!(ranges.windows(2).all(|pair| pair[0].0 + pair[0].1 <= pair[1].0));

      for (address, (size, tag)) in &live {
        let ptr = NonNull::new(*address as *mut u8).unwrap();
        prop_assert!(holds(ptr, *size, *tag));
      }

      let stats = engine.stats();
      prop_assert_eq!(stats.live_blocks, live.len());
      prop_assert_eq!(stats.requested_bytes, live.values().map(|(size, _)| size).sum::<usize>());
      prop_assert!(stats.carved_bytes <= stats.pool_size);
    }
  }
}
