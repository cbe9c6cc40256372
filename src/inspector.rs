//! Read-only walks over the heap region.

use std::fmt;

use crate::{
  block::Block,
  error::{HeapError, Result},
  header::HEADER_SIZE,
  store::HeapStore,
};

/// Every block in address order, as found by walking the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
  heap_size: usize,
  blocks: Vec<Block>,
}

/// Aggregate numbers for a [`Report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub reserved_blocks: usize,
  pub free_blocks: usize,
  /// Sum of `size` over reserved blocks.
  pub reserved_bytes: usize,
  /// Padding folded into reserved blocks.
  pub slack_bytes: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
  /// Largest request the next scan could satisfy once adjacent free blocks are merged.
  pub largest_free_run: usize,
  pub header_bytes: usize,
}

impl HeapStats {
  /// External fragmentation: `1 - largest_free / free_bytes`, zero when nothing is free.
  pub fn fragmentation(&self) -> f64 {
    if self.free_bytes == 0 {
      return 0.0;
    }
    1.0 - self.largest_free as f64 / self.free_bytes as f64
  }
}

impl Report {
  pub fn heap_size(&self) -> usize {
    self.heap_size
  }

  pub fn blocks(&self) -> &[Block] {
    &self.blocks
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      header_bytes: self.blocks.len() * HEADER_SIZE,
      ..HeapStats::default()
    };
    let mut run: Option<usize> = None;

    for block in &self.blocks {
      if block.reserved {
        stats.reserved_blocks += 1;
        stats.reserved_bytes += block.size;
        stats.slack_bytes += block.slack();
        run = None;
        continue;
      }

      stats.free_blocks += 1;
      stats.free_bytes += block.capacity;
      stats.largest_free = stats.largest_free.max(block.capacity);

      // A merge reclaims the following block's header as payload.
      let length = match run {
        Some(length) => length + HEADER_SIZE + block.capacity,
        None => block.capacity,
      };
      stats.largest_free_run = stats.largest_free_run.max(length);
      run = Some(length);
    }

    stats
  }
}

impl fmt::Display for Report {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    writeln!(
      f,
      "heap of {} bytes, {} blocks",
      self.heap_size,
      self.blocks.len()
    )?;

    for block in &self.blocks {
      writeln!(f, "  {}", block)?;
    }

    let stats = self.stats();
    write!(
      f,
      "  reserved={} slack={} free={} largest_free={} fragmentation={:.2}",
      stats.reserved_bytes,
      stats.slack_bytes,
      stats.free_bytes,
      stats.largest_free,
      stats.fragmentation()
    )
  }
}

/// Lists every block, stepping from offset 0 by `HEADER_SIZE + capacity`.
///
/// The last block is emitted unconditionally: its end is the end of the heap, so the
/// loop condition never admits it.
pub fn report(store: &HeapStore) -> Report {
  let heap_size = store.heap_size();
  let mut blocks = Vec::new();

  if !store.is_initialized() {
    return Report { heap_size, blocks };
  }

  let mut block = Block::new(0, store.read_header(0));

  while block.end() + HEADER_SIZE <= heap_size {
    blocks.push(block);
    let cursor = block.end();
    block = Block::new(cursor, store.read_header(cursor));
  }
  blocks.push(block);

  Report { heap_size, blocks }
}

/// Prints the report to stdout.
pub fn print_report(store: &HeapStore) {
  println!("{}", report(store));
}

/// Checks that the headers tile the region exactly.
pub fn verify(store: &HeapStore) -> Result<()> {
  if !store.is_initialized() {
    return Ok(());
  }

  let heap_size = store.heap_size();
  let mut cursor = 0;

  while cursor < heap_size {
    if cursor + HEADER_SIZE > heap_size {
      return Err(HeapError::Corrupted {
        offset: cursor,
        reason: "header crosses the end of the heap",
      });
    }

    let block = Block::new(cursor, store.read_header(cursor));

    if block.size > block.capacity {
      return Err(HeapError::Corrupted {
        offset: cursor,
        reason: "size exceeds capacity",
      });
    }

    cursor = block.end();
  }

  if cursor != heap_size {
    return Err(HeapError::Corrupted {
      offset: cursor,
      reason: "block extends past the end of the heap",
    });
  }

  Ok(())
}
