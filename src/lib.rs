//! # quickalloc - A Size-Class Pool Allocator
//!
//! This crate provides a **pool allocator** that serves `malloc`, `free` and
//! `realloc` requests from one fixed memory region reserved up front with
//! `mmap`.
//!
//! ## Overview
//!
//! The pool is carved on demand into blocks of a fixed set of sizes, the
//! **size classes**. Each request is rounded up to the smallest class that can
//! hold it:
//!
//! ```text
//!   Size classes (doubling, 16..=4096):
//!
//!   ┌────┬────┬────┬─────┬─────┬─────┬──────┬──────┬──────┐
//!   │ 16 │ 32 │ 64 │ 128 │ 256 │ 512 │ 1024 │ 2048 │ 4096 │
//!   └────┴────┴────┴─────┴─────┴─────┴──────┴──────┴──────┘
//!                     ▲
//!                     └── malloc(100) is served from here
//! ```
//!
//! Released blocks go to a per-class free list and are handed out again,
//! most recently freed first, before any new arena space is carved:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              ARENA                                   │
//!   │                                                                      │
//!   │   ┌─────┬─────┬──────────┬─────┬──────────────────────────────────┐  │
//!   │   │ B1  │ B2  │    B3    │ B4  │          Never carved            │  │
//!   │   └─────┴─────┴──────────┴─────┴──────────────────────────────────┘  │
//!   │                                ▲                                  ▲  │
//!   │                                │                                  │  │
//!   │                           Bump Cursor                        Pool end│
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Freed blocks keep their class and wait on that class's free list.
//!   The cursor only moves forward; the pool never grows.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   quickalloc
//!   ├── align      - Alignment macro (align_to!) and padding math
//!   ├── arena      - The mmap-backed region (internal)
//!   ├── block      - Block header layout (internal)
//!   ├── config     - PoolConfig and its defaults
//!   ├── engine     - malloc / free / realloc (internal)
//!   ├── error      - Error taxonomy
//!   ├── global     - Process-wide default pool
//!   ├── manager    - QuickAlloc, the pool handle
//!   ├── stats      - PoolStats snapshots
//!   ├── step       - Size-class stepping policies
//!   └── store      - Size-class table, free lists, bump cursor (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quickalloc::{QuickAlloc, SteppingMethod};
//!
//! fn main() -> Result<(), quickalloc::Error> {
//!     let pool = QuickAlloc::create(64 * 1024, 16, 4096, SteppingMethod::Doubling, true)?;
//!
//!     let ptr = pool.malloc(100)?;
//!     assert_eq!(ptr.as_ptr() as usize % 256, 0);
//!
//!     unsafe {
//!         ptr.as_ptr().write_bytes(0xAB, 100);
//!
//!         // Grows past the 128 byte class: moves to the 256 byte class.
//!         let ptr = pool.realloc(ptr.as_ptr(), 200)?.expect("non-zero size");
//!         pool.free(ptr.as_ptr())?;
//!     }
//!
//!     pool.discard();
//!     Ok(())
//! }
//! ```
//!
//! The same operations are available on a process-wide default pool:
//!
//! ```rust,no_run
//! fn main() -> Result<(), quickalloc::Error> {
//!     quickalloc::init()?;
//!
//!     let ptr = quickalloc::malloc(100)?;
//!     unsafe { quickalloc::free(ptr.as_ptr())? };
//!
//!     quickalloc::destroy()
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header that records its class, the size the
//! caller asked for, how far the payload sits from the slot start, and a tag
//! tied to the slot's position:
//!
//! ```text
//!   Single Block (full alignment to 256 bytes):
//!   ┌──────────┬───────────────────────┬────────────────────────────────┐
//!   │ padding  │    Block Header       │         User Data              │
//!   │          │  ┌─────────────────┐  │                                │
//!   │          │  │ tag             │  │  ┌──────────────────────────┐  │
//!   │          │  │ class, state    │  │  │                          │  │
//!   │          │  │ payload_size    │  │  │   class_size bytes       │  │
//!   │          │  │ padding         │  │  │                          │  │
//!   │          │  └─────────────────┘  │  └──────────────────────────┘  │
//!   │          │      32 bytes         │                                │
//!   └──────────┴───────────────────────┴────────────────────────────────┘
//!                                      ▲
//!                                      └── Pointer returned to user
//!                                          (address % 256 == 0)
//! ```
//!
//! With full alignment every slot reserves `alignment - 1` spare bytes so the
//! payload can always be pushed to the next boundary. Without it the payload
//! directly follows the header and alignment is whatever the arena layout
//! happens to give.
//!
//! `free` and `realloc` check the header before trusting it: pointers from
//! elsewhere and blocks that are already free are rejected with
//! [`Error::InvalidPointer`] instead of corrupting the pool.
//!
//! ## Features
//!
//! - **Fixed footprint**: one reservation at creation, one release at discard
//! - **O(1) reuse**: per-class LIFO free lists, no searching
//! - **Alignment guarantee**: optional per-slot padding reserve
//! - **In-place resize**: `realloc` within a class never copies
//! - **Checked frees**: double frees and foreign pointers are reported
//! - **Thread safe**: one short critical section per call and pool
//!
//! ## Limitations
//!
//! - **Fixed capacity**: an exhausted pool stays exhausted until blocks are freed
//! - **No coalescing**: a slot keeps its size class for the life of the pool
//! - **Unix-only**: the arena is reserved with `libc::mmap`
//!
//! ## Safety
//!
//! Payload memory is handed out as raw pointers. Writing to it, and passing
//! pointers back to `free`/`realloc`, requires `unsafe` blocks; the pool
//! validates what it can, but a pointer must not be used after its block was
//! freed or after the pool was discarded.

pub mod align;
mod arena;
mod block;
mod config;
mod engine;
mod error;
mod global;
mod manager;
mod stats;
mod step;
mod store;

pub use config::{
  DEFAULT_ALIGNMENT,
  DEFAULT_MAX_BLOCK_SIZE,
  DEFAULT_MIN_BLOCK_SIZE,
  DEFAULT_POOL_SIZE,
  MAX_SIZE_CLASSES,
  PoolConfig,
  ZeroSizePolicy,
};
pub use error::{Error, Result};
pub use global::{destroy, free, granted_size, init, init_with, is_initialized, malloc, realloc, stats};
pub use manager::QuickAlloc;
pub use stats::PoolStats;
pub use step::{DEFAULT_CUSTOM_STEP, LINEAR_CLASS_TARGET, StepSequence, SteppingMethod};
pub use store::SizeClass;
