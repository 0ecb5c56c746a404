use std::ptr::NonNull;

use crate::{
  align,
  align_to,
  arena::Arena,
  block::{BlockHeader, BlockState, HEADER_ALIGN, HEADER_SIZE},
  config::PoolConfig,
  error::{Error, Result},
};

/// One entry of the size-class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
  /// Payload capacity of every block in the class.
  pub size: usize,
  /// Arena bytes one slot occupies: header, alignment reserve and payload.
  pub stride: usize,
}

impl SizeClass {
  /// Validates `config` and builds its ascending class table.
  pub fn table(
    config: &PoolConfig,
  ) -> Result<Vec<Self>> {
    config.validate()?;

    let overhead = config.slot_overhead();

    let classes = config
      .step_sequence()?
      .map(|size| Self {
        size,
        stride: align_to!(size + overhead, HEADER_ALIGN),
      })
      .collect();

    Ok(classes)
  }
}

/// A slot of the arena, identified by its offset and class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
  pub offset: usize,
  pub class: usize,
}

/// A validated block found behind a caller's pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
  pub slot: Slot,
  pub payload_offset: usize,
  pub payload_size: usize,
  pub state: BlockState,
}

/// Owns the arena, the size-class table and the per-class free lists.
///
/// ```text
///   arena
///   ┌────────┬────────┬──────────────┬────────┬─────────────────────────┐
///   │ 32 [U] │ 32 [F] │   128 [U]    │ 32 [U] │      never carved       │
///   └────────┴────────┴──────────────┴────────┴─────────────────────────┘
///                                             ▲
///                                        bump cursor
///
///   free lists:  class 32 -> [offset of the free 32]   class 128 -> []
/// ```
///
/// Slots of different classes interleave in carving order. A slot keeps its
/// class for the whole life of the pool.
#[derive(Debug)]
pub struct BlockStore {
  arena: Arena,
  classes: Vec<SizeClass>,
  free_lists: Vec<Vec<usize>>,
  cursor: usize,
  alignment: usize,
  full_align: bool,
}

impl BlockStore {
  /// Builds the class table, which validates `config`, then reserves the arena.
  pub fn new(
    config: &PoolConfig,
  ) -> Result<Self> {
    let classes = SizeClass::table(config)?;
    let arena = Arena::reserve(config.pool_size)?;

    Ok(Self {
      arena,
      free_lists: vec![Vec::new(); classes.len()],
      classes,
      cursor: 0,
      alignment: config.alignment,
      full_align: config.full_align,
    })
  }

  pub fn classes(&self) -> &[SizeClass] {
    &self.classes
  }

  pub fn capacity(&self) -> usize {
    self.arena.size()
  }

  /// Bytes handed out by the bump cursor so far.
  pub fn carved(&self) -> usize {
    self.cursor
  }

  pub fn free_slots(&self) -> usize {
    self.free_lists.iter().map(Vec::len).sum()
  }

  /// Index of the smallest class whose payload capacity is at least `size`.
  pub fn class_for(
    &self,
    size: usize,
  ) -> Option<usize> {
    let index = self.classes.partition_point(|class| class.size < size);

    (index < self.classes.len()).then_some(index)
  }

  /// Cuts a fresh slot of `class` at the bump cursor.
  pub fn carve(
    &mut self,
    class: usize,
  ) -> Result<Slot> {
    let SizeClass { size, stride } = self.classes[class];

    let end = self
      .cursor
      .checked_add(stride)
      .filter(|end| *end <= self.arena.size())
      .ok_or(Error::PoolExhausted { requested: size })?;

    let slot = Slot {
      offset: self.cursor,
      class,
    };

    self.cursor = end;
    debug_assert!(self.cursor <= self.arena.size(), "carved past the end of the arena");

    Ok(slot)
  }

  /// Returns a slot to its class's free list.
  pub fn release(
    &mut self,
    slot: Slot,
  ) {
    self.free_lists[slot.class].push(slot.offset);
  }

  /// Reuses the most recently released slot of `class`, or carves a new one.
  pub fn acquire(
    &mut self,
    class: usize,
  ) -> Result<Slot> {
    match self.free_lists[class].pop() {
      Some(offset) => Ok(Slot { offset, class }),
      None => self.carve(class),
    }
  }

  /// Writes a used header into `slot` and returns its payload pointer.
  pub fn claim(
    &mut self,
    slot: Slot,
    payload_size: usize,
  ) -> NonNull<u8> {
    let start = unsafe { self.arena.at(slot.offset) };
    let padding = self.padding_at(start.as_ptr() as usize);

    let header = BlockHeader::new(slot.offset, slot.class as u32, payload_size, padding);

    unsafe {
      let payload = self.arena.at(slot.offset + padding);
      self.header_ptr(slot.offset + padding).write(header);
      payload
    }
  }

  /// Finds and validates the block whose payload starts at `ptr`.
  ///
  /// The pointer must sit inside the carved region, at header alignment, in
  /// front of a header whose tag, class, padding and state are consistent.
  /// Free blocks are reported, not rejected, so callers can tell a double
  /// free apart from a foreign pointer.
  pub fn locate(
    &self,
    ptr: *const u8,
  ) -> Result<Located> {
    let invalid = || Error::invalid_pointer(ptr);

    let payload_offset = self.arena.offset_of(ptr).ok_or_else(invalid)?;

    if payload_offset < HEADER_SIZE || payload_offset >= self.cursor || payload_offset % HEADER_ALIGN != 0 {
      return Err(invalid());
    }

    let header = unsafe { self.header_ptr(payload_offset).read() };

    let slot_offset = payload_offset.checked_sub(header.padding).ok_or_else(invalid)?;
    let class = header.class as usize;
    let size_class = self.classes.get(class).ok_or_else(invalid)?;

    if header.tag != BlockHeader::tag_for(slot_offset) {
      return Err(invalid());
    }

    let slot_end = slot_offset.checked_add(size_class.stride);
    if slot_end.is_none_or(|end| end > self.cursor) || header.payload_size > size_class.size {
      return Err(invalid());
    }

    let start = unsafe { self.arena.at(slot_offset) };
    if self.padding_at(start.as_ptr() as usize) != header.padding {
      return Err(invalid());
    }

    let state = header.state().ok_or_else(invalid)?;

    Ok(Located {
      slot: Slot {
        offset: slot_offset,
        class,
      },
      payload_offset,
      payload_size: header.payload_size,
      state,
    })
  }

  /// Payload pointer of a located block.
  pub fn payload(
    &self,
    block: &Located,
  ) -> NonNull<u8> {
    unsafe { self.arena.at(block.payload_offset) }
  }

  /// Records a new payload size for a block that stays in place.
  pub fn resize_in_place(
    &mut self,
    block: &mut Located,
    payload_size: usize,
  ) {
    debug_assert!(payload_size <= self.classes[block.slot.class].size);

    unsafe {
      (*self.header_ptr(block.payload_offset)).payload_size = payload_size;
    }
    block.payload_size = payload_size;
  }

  /// Marks a used block free and releases its slot.
  pub fn retire(
    &mut self,
    block: Located,
  ) {
    debug_assert_eq!(block.state, BlockState::Used);

    unsafe {
      (*self.header_ptr(block.payload_offset)).set_state(BlockState::Free);
    }
    self.release(block.slot);
  }

  fn padding_at(
    &self,
    slot_start: usize,
  ) -> usize {
    align::payload_offset(slot_start, HEADER_SIZE, self.alignment, self.full_align)
  }

  /// Header of the block whose payload sits at `payload_offset`.
  ///
  /// # Safety
  ///
  /// `payload_offset` must be a multiple of [`HEADER_ALIGN`], at least
  /// [`HEADER_SIZE`] and inside the arena.
  unsafe fn header_ptr(
    &self,
    payload_offset: usize,
  ) -> *mut BlockHeader {
    unsafe {
      self
        .arena
        .at(payload_offset - HEADER_SIZE)
        .cast::<BlockHeader>()
        .as_ptr()
    }
  }
}
