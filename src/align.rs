/// Rounds `value` up to the next multiple of `alignment`, which must be a
/// power of two.
///
/// # Examples
///
/// ```rust
/// use quickalloc::align_to;
///
/// assert_eq!(align_to!(100, 256), 256);
/// assert_eq!(align_to!(512, 256), 512);
/// assert_eq!(align_to!(0, 64), 0);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    ($value + $alignment - 1) & !($alignment - 1)
  };
}

/// An address moved forward to an alignment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aligned {
  /// The aligned address, never below the input address.
  pub address: usize,
  /// Bytes skipped to reach `address`.
  pub padding: usize,
}

/// Moves `address` up to the next multiple of `alignment` (a power of two).
pub fn align_up(
  address: usize,
  alignment: usize,
) -> Aligned {
  debug_assert!(alignment.is_power_of_two());

  let aligned = align_to!(address, alignment);

  Aligned {
    address: aligned,
    padding: aligned - address,
  }
}

/// Distance from the start of a slot to the payload handed to the caller.
///
/// The payload always follows a `header_size` byte header. With
/// `full_align` it is additionally pushed to the next `alignment` boundary;
/// [`slot_reserve`] guarantees the slot has room for that shift.
pub fn payload_offset(
  slot_start: usize,
  header_size: usize,
  alignment: usize,
  full_align: bool,
) -> usize {
  if full_align {
    align_up(slot_start + header_size, alignment).address - slot_start
  } else {
    header_size
  }
}

/// Extra bytes every slot must carry beyond its header and payload so that
/// [`payload_offset`] never spills into the next slot.
pub fn slot_reserve(
  alignment: usize,
  full_align: bool,
) -> usize {
  if full_align { alignment - 1 } else { 0 }
}
