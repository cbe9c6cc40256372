//! # hdralloc - A Header-per-Block Heap Allocator
//!
//! This crate manages one fixed-size memory region with a **first-fit** allocator that
//! keeps all of its metadata inside the region itself, one header in front of every block.
//!
//! ## Overview
//!
//! ```text
//!   Heap Region (HEAP_SIZE bytes):
//!
//!   ┌─────┬──────────┬─────┬──────────────┬─────┬───────────────────────────┐
//!   │ Hdr │ payload  │ Hdr │   payload    │ Hdr │        payload            │
//!   │  R  │  (size)  │  F  │  (capacity)  │  F  │                           │
//!   └─────┴──────────┴─────┴──────────────┴─────┴───────────────────────────┘
//!   0                                                                HEAP_SIZE
//!
//!   Stepping by HEADER_SIZE + capacity from offset 0 lands exactly on HEAP_SIZE.
//! ```
//!
//! Every header is 9 bytes:
//!
//! ```text
//!   ┌──────────────┬──────────────┬──────────┐
//!   │ size (u32)   │ capacity(u32)│ reserved │
//!   │ little end.  │ little end.  │ 0xFF/0x00│
//!   └──────────────┴──────────────┴──────────┘
//! ```
//!
//! `size` is what the holder asked for, `capacity` is what the block physically owns.
//! They differ when the leftover after a split is too small to carry its own header:
//! instead of losing those bytes, the reserved block keeps them as slack.
//!
//! ## Crate Structure
//!
//! ```text
//!   hdralloc
//!   ├── header     - Header codec (encode/decode)
//!   ├── store      - HeapStore, owner of the backing region
//!   ├── block      - Decoded block view
//!   ├── allocator  - allocate/release (first-fit, split, lazy merge)
//!   ├── inspector  - Report, statistics and layout verification
//!   ├── heap       - HeapAllocator, the public entry point
//!   ├── config     - HeapConfig
//!   └── error      - HeapError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use hdralloc::HeapAllocator;
//!
//! let mut heap = HeapAllocator::new();
//!
//! let handle = heap.allocate(30).unwrap();
//! heap.payload_mut(handle).unwrap()[..5].copy_from_slice(b"hello");
//! assert_eq!(&heap.payload(handle).unwrap()[..5], b"hello");
//!
//! heap.release(handle).unwrap();
//! println!("{}", heap.report());
//! ```
//!
//! ## How It Works
//!
//! `allocate` scans blocks from offset 0. Two adjacent free blocks met during the scan
//! are merged on the spot, the second header becoming payload. The first free block that
//! is large enough is reserved; if more than a header's worth of bytes is left over it is
//! split off as a new free block.
//!
//! `release` only clears the reserved flag. Merging is left to the next scan.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Fixed capacity**: The region never grows
//! - **No alignment**: Payloads start wherever the previous block ends

#[macro_use]
mod alog;

mod allocator;
mod block;
pub mod config;
pub mod error;
pub mod header;
mod heap;
mod inspector;
mod store;

use std::sync::atomic::{AtomicBool, Ordering};

pub use allocator::Handle;
pub use block::Block;
pub use config::{DEFAULT_HEAP_SIZE, HeapConfig};
pub use error::{HeapError, Result};
pub use header::{HEADER_SIZE, Header};
pub use heap::HeapAllocator;
pub use inspector::{HeapStats, Report};

pub(crate) static ALLOC_LOG: AtomicBool = AtomicBool::new(false);

/// Enables logging for the allocator.
pub fn enable_logging() {
  ALLOC_LOG.store(true, Ordering::Relaxed);
}

/// Disables logging for the allocator.
pub fn disable_logging() {
  ALLOC_LOG.store(false, Ordering::Relaxed);
}

pub(crate) fn should_log() -> bool {
  ALLOC_LOG.load(Ordering::Relaxed)
}
