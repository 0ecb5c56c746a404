use std::mem;

use crate::align_to;

/// Validity tag base. The stored tag is this value mixed with the slot
/// offset, so a header copied to another slot does not validate.
const TAG_MAGIC: u64 = 0x5155_4943_4B41_4C43; // "QUICKALC"

/// Bytes reserved in front of every payload for its header.
pub const HEADER_SIZE: usize = align_to!(mem::size_of::<BlockHeader>(), HEADER_ALIGN);

/// Alignment every header (and therefore every slot start) must satisfy.
pub const HEADER_ALIGN: usize = mem::align_of::<BlockHeader>();

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
  Free = 0x0F0F_0F0F,
  Used = 0x5A5A_5A5A,
}

/// Metadata written immediately before the payload of a block.
///
/// ```text
///   slot start                         payload (returned pointer)
///   ▼                                  ▼
///   ┌──────────────┬───────────────────┬──────────────────────────┐
///   │   padding    │   BlockHeader     │   class_size bytes       │
///   └──────────────┴───────────────────┴──────────────────────────┘
///   ◄──────────── header.padding ─────►
/// ```
///
/// Headers are read back from caller-supplied pointers before they are
/// trusted, so every field is a plain integer: arbitrary bytes never
/// materialize an invalid [`BlockState`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
  pub tag: u64,
  pub class: u32,
  state: u32,
  /// Bytes the caller asked for, at most the class size.
  pub payload_size: usize,
  /// Distance from the slot start to the payload.
  pub padding: usize,
}

impl BlockHeader {
  pub fn new(
    slot_offset: usize,
    class: u32,
    payload_size: usize,
    padding: usize,
  ) -> Self {
    Self {
      tag: Self::tag_for(slot_offset),
      class,
      state: BlockState::Used as u32,
      payload_size,
      padding,
    }
  }

  pub fn tag_for(
    slot_offset: usize,
  ) -> u64 {
    TAG_MAGIC ^ (slot_offset as u64).rotate_left(17)
  }

  pub fn state(&self) -> Option<BlockState> {
    match self.state {
      s if s == BlockState::Free as u32 => Some(BlockState::Free),
      s if s == BlockState::Used as u32 => Some(BlockState::Used),
      _ => None,
    }
  }

  pub fn set_state(
    &mut self,
    state: BlockState,
  ) {
    self.state = state as u32;
  }
}

const _: () = assert!(HEADER_SIZE % HEADER_ALIGN == 0);
