//! First-fit allocation with lazy coalescing.
//!
//! Release only flips the reserved flag. Adjacent free blocks are merged while
//! `allocate` scans for a fit, so freeing is O(1) and the merge cost is paid by the
//! next search that walks over the freed blocks.

use crate::{
  block::Block,
  error::{HeapError, Result},
  header::{HEADER_SIZE, Header},
  store::HeapStore,
};

/// Opaque reference to a reserved payload.
///
/// Holds the payload offset and the epoch of the region it was issued in, never a raw
/// address. A handle is only honoured by the region that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  offset: usize,
  epoch: u64,
}

impl Handle {
  pub(crate) fn new(
    offset: usize,
    epoch: u64,
  ) -> Self {
    Self { offset, epoch }
  }

  /// Offset of the first payload byte inside the heap region.
  pub fn offset(&self) -> usize {
    self.offset
  }
}

/// Reserves `requested` bytes in the first block that can hold them.
pub fn allocate(
  store: &mut HeapStore,
  requested: usize,
) -> Result<Handle> {
  if requested == 0 {
    return Err(HeapError::ZeroSizedRequest);
  }

  store.ensure_initialized()?;
  let heap_size = store.heap_size();

  let mut current = Block::new(0, store.read_header(0));

  while current.capacity < requested || current.reserved {
    let next = current.end();

    if next + HEADER_SIZE > heap_size {
      adebug!("No block fits {} bytes, scan stopped at {}", requested, next);
      return Err(HeapError::OutOfCapacity { requested });
    }

    let following = Block::new(next, store.read_header(next));

    if current.is_free() && following.is_free() {
      let merged = current.capacity + following.capacity + HEADER_SIZE;
      atrace!(
        "Merging free blocks at {} and {} into {} bytes",
        current.offset,
        following.offset,
        merged
      );
      store.write_header(current.offset, &Header::free(merged));
      current = Block::new(current.offset, store.read_header(current.offset));
    } else {
      current = following;
    }
  }

  Ok(place(store, current, requested))
}

/// Reserves a free block, splitting off the remainder when it can carry its own header.
fn place(
  store: &mut HeapStore,
  block: Block,
  requested: usize,
) -> Handle {
  if block.capacity <= requested + HEADER_SIZE {
    // Leftover is too small for a header, the holder keeps it as slack.
    store.write_header(block.offset, &Header::new(requested, block.capacity, true));
    atrace!(
      "Reserved whole block at {} ({} of {} bytes)",
      block.offset,
      requested,
      block.capacity
    );
  } else {
    let remainder = block.capacity - requested - HEADER_SIZE;
    store.write_header(block.offset, &Header::new(requested, requested, true));
    store.write_header(block.payload_start() + requested, &Header::free(remainder));
    atrace!(
      "Split block at {}: {} reserved, {} free at {}",
      block.offset,
      requested,
      remainder,
      block.payload_start() + requested
    );
  }

  Handle::new(block.payload_start(), store.epoch())
}

/// Marks the block behind `handle` free. Neighbours are left alone.
pub fn release(
  store: &mut HeapStore,
  handle: Handle,
) -> Result<()> {
  let block = resolve(store, handle).map_err(|reason| {
    awarn!("Rejected release at {}: {}", handle.offset, reason);
    HeapError::InvalidRelease {
      offset: handle.offset,
      reason,
    }
  })?;

  store.write_header(block.offset, &Header::new(block.size, block.capacity, false));
  atrace!("Released block at {} ({} bytes)", block.offset, block.capacity);
  Ok(())
}

/// Finds the reserved block a handle points at.
pub(crate) fn resolve(
  store: &HeapStore,
  handle: Handle,
) -> std::result::Result<Block, &'static str> {
  if !store.is_initialized() || handle.epoch != store.epoch() {
    return Err("handle was not issued by this region");
  }

  if handle.offset < HEADER_SIZE || handle.offset > store.heap_size() {
    return Err("offset lies outside the heap");
  }

  let offset = handle.offset - HEADER_SIZE;
  let block = Block::new(offset, store.read_header(offset));

  if block.is_free() {
    return Err("block is not reserved");
  }

  if block.size > block.capacity || block.end() > store.heap_size() {
    return Err("no block header at this offset");
  }

  Ok(block)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::HeapConfig, inspector};

  fn new_store(heap_size: usize) -> HeapStore {
    HeapStore::new(HeapConfig::new().heap_size(heap_size))
  }

  fn layout(store: &HeapStore) -> Vec<(usize, usize, bool)> {
    inspector::report(store)
      .blocks()
      .iter()
      .map(|b| (b.size, b.capacity, b.reserved))
      .collect()
  }

  fn reserved_ranges(store: &HeapStore) -> Vec<std::ops::Range<usize>> {
    let mut ranges: Vec<_> = inspector::report(store)
      .blocks()
      .iter()
      .filter(|b| b.reserved)
      .map(|b| b.payload())
      .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
  }

  #[track_caller]
  fn assert_disjoint(ranges: &[std::ops::Range<usize>]) {
    for pair in ranges.windows(2) {
      assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
  }

  #[test]
  fn test_first_allocation_splits() {
    let mut store = new_store(8000);

    let handle = allocate(&mut store, 30).unwrap();

    assert_eq!(handle.offset(), HEADER_SIZE);
    assert_eq!(layout(&store), vec![(30, 30, true), (7952, 7952, false)]);
    assert!(inspector::verify(&store).is_ok());
  }

  #[test]
  fn test_split_threshold() {
    // One free block of capacity 100.
    let mut store = new_store(109);
    allocate(&mut store, 91).unwrap();
    assert_eq!(layout(&store), vec![(91, 100, true)]);

    let mut store = new_store(109);
    allocate(&mut store, 90).unwrap();
    assert_eq!(layout(&store), vec![(90, 90, true), (1, 1, false)]);
  }

  #[test]
  fn test_release_does_not_merge() {
    let mut store = new_store(8000);
    let a = allocate(&mut store, 30).unwrap();
    let b = allocate(&mut store, 40).unwrap();

    release(&mut store, a).unwrap();
    release(&mut store, b).unwrap();

    assert_eq!(
      layout(&store),
      vec![(30, 30, false), (40, 40, false), (7903, 7903, false)]
    );
  }

  #[test]
  fn test_lazy_coalescing() {
    // Three 100 byte blocks fill the heap exactly.
    let mut store = new_store(3 * (HEADER_SIZE + 100));
    let a = allocate(&mut store, 100).unwrap();
    let b = allocate(&mut store, 100).unwrap();
    let _c = allocate(&mut store, 100).unwrap();
    assert_eq!(
      layout(&store),
      vec![(100, 100, true), (100, 100, true), (100, 100, true)]
    );

    release(&mut store, a).unwrap();
    release(&mut store, b).unwrap();

    let merged = allocate(&mut store, 150).unwrap();

    assert_eq!(merged.offset(), a.offset());
    assert_eq!(
      layout(&store),
      vec![(150, 150, true), (50, 50, false), (100, 100, true)]
    );
  }

  #[test]
  fn test_reserved_neighbour_stops_merge() {
    let mut store = new_store(3 * (HEADER_SIZE + 100));
    let a = allocate(&mut store, 100).unwrap();
    let _b = allocate(&mut store, 100).unwrap();
    let c = allocate(&mut store, 100).unwrap();

    release(&mut store, a).unwrap();
    release(&mut store, c).unwrap();

    assert_eq!(
      allocate(&mut store, 150),
      Err(HeapError::OutOfCapacity { requested: 150 })
    );
    assert_eq!(allocate(&mut store, 100).unwrap(), a);
  }

  #[test]
  fn test_exhaustion() {
    let mut store = new_store(8000);
    let mut handles = Vec::new();

    let err = loop {
      match allocate(&mut store, 100) {
        Ok(handle) => handles.push(handle),
        Err(err) => break err,
      }
    };

    assert_eq!(err, HeapError::OutOfCapacity { requested: 100 });
    // 73 blocks of 109 bytes leave a 34 byte tail.
    assert_eq!(handles.len(), 73);
    assert_eq!(layout(&store).last(), Some(&(34, 34, false)));
    assert!(inspector::verify(&store).is_ok());

    release(&mut store, handles[10]).unwrap();
    assert_eq!(allocate(&mut store, 100).unwrap(), handles[10]);
  }

  #[test]
  fn test_whole_heap_after_release() {
    let mut store = new_store(8000);
    let handles: Vec<_> = (0..20).map(|_| allocate(&mut store, 64).unwrap()).collect();

    for handle in handles {
      release(&mut store, handle).unwrap();
    }

    assert_eq!(
      allocate(&mut store, 7992),
      Err(HeapError::OutOfCapacity { requested: 7992 })
    );

    let handle = allocate(&mut store, 7991).unwrap();
    assert_eq!(handle.offset(), HEADER_SIZE);
    assert_eq!(layout(&store), vec![(7991, 7991, true)]);
  }

  #[test]
  fn test_payloads_disjoint() {
    let mut store = new_store(8000);
    let sizes = [17, 1, 250, 33, 9, 10, 512, 2];
    let mut handles: Vec<_> = sizes
      .iter()
      .map(|&s| allocate(&mut store, s).unwrap())
      .collect();

    release(&mut store, handles.remove(2)).unwrap();
    release(&mut store, handles.remove(4)).unwrap();
    handles.push(allocate(&mut store, 100).unwrap());
    handles.push(allocate(&mut store, 12).unwrap());

    let ranges = reserved_ranges(&store);

    assert_eq!(ranges.len(), handles.len());
    assert_disjoint(&ranges);
    assert!(ranges.iter().all(|r| r.end <= 8000));
    assert!(inspector::verify(&store).is_ok());
  }

  #[test]
  fn test_zero_size() {
    let mut store = new_store(8000);

    assert_eq!(allocate(&mut store, 0), Err(HeapError::ZeroSizedRequest));
    assert!(!store.is_initialized());
  }

  #[test]
  fn test_double_release() {
    let mut store = new_store(8000);
    let handle = allocate(&mut store, 30).unwrap();

    release(&mut store, handle).unwrap();

    assert!(matches!(
      release(&mut store, handle),
      Err(HeapError::InvalidRelease { offset: 9, .. })
    ));
  }

  #[test]
  fn test_forged_handles() {
    let mut store = new_store(8000);
    let handle = allocate(&mut store, 30).unwrap();
    let before = layout(&store);

    for offset in [0, 3, 20, 8001, usize::MAX] {
      assert!(matches!(
        release(&mut store, Handle::new(offset, handle.epoch)),
        Err(HeapError::InvalidRelease { .. })
      ));
    }

    assert_eq!(layout(&store), before);
  }

  #[test]
  fn test_stale_handle() {
    let mut store = new_store(8000);
    let handle = allocate(&mut store, 30).unwrap();

    store.teardown();
    assert!(release(&mut store, handle).is_err());

    let fresh = allocate(&mut store, 30).unwrap();
    assert_eq!(fresh.offset(), handle.offset());
    assert!(matches!(
      release(&mut store, handle),
      Err(HeapError::InvalidRelease {
        reason: "handle was not issued by this region",
        ..
      })
    ));
    assert!(release(&mut store, fresh).is_ok());
  }

  #[test]
  fn test_random_sequence_keeps_layout() {
    let mut store = new_store(8000);
    let mut live: Vec<Handle> = Vec::new();

    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
      seed = seed
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
      (seed >> 33) as usize
    };

    for step in 0..2000 {
      if live.is_empty() || next() % 3 != 0 {
        let size = next() % 300 + 1;
        match allocate(&mut store, size) {
          Ok(handle) => live.push(handle),
          Err(HeapError::OutOfCapacity { .. }) => {
            let handle = live.swap_remove(next() % live.len());
            release(&mut store, handle).unwrap();
          }
          Err(err) => panic!("step {step}: unexpected {err}"),
        }
      } else {
        let handle = live.swap_remove(next() % live.len());
        release(&mut store, handle).unwrap();
      }

      assert!(inspector::verify(&store).is_ok(), "step {step}");

      let ranges = reserved_ranges(&store);
      assert_eq!(ranges.len(), live.len(), "step {step}");
      assert_disjoint(&ranges);

      for handle in &live {
        let block = resolve(&store, *handle).unwrap();
        assert_eq!(block.payload_start(), handle.offset());
      }
    }
  }

  #[test]
  fn test_release_from_other_heap() {
    let mut a = new_store(8000);
    let mut b = new_store(8000);

    let a1 = allocate(&mut a, 30).unwrap();
    let a2 = allocate(&mut a, 30).unwrap();
    let b1 = allocate(&mut b, 100).unwrap();
    assert_eq!(a1.offset(), b1.offset());

    // Payload bytes in `b` that decode as a reserved header right where `a2` points.
    let header_at = a2.offset() - HEADER_SIZE;
    let mut bytes = [0u8; HEADER_SIZE];
    Header::new(1, 1, true).encode(&mut bytes);
    b.bytes_mut()[header_at..header_at + HEADER_SIZE].copy_from_slice(&bytes);
    let before = b.bytes().to_vec();

    assert!(matches!(
      release(&mut b, a2),
      Err(HeapError::InvalidRelease { .. })
    ));
    assert!(matches!(
      release(&mut b, a1),
      Err(HeapError::InvalidRelease { .. })
    ));

    assert_eq!(b.bytes(), &before[..]);
    assert!(resolve(&b, b1).is_ok());
    assert!(release(&mut a, a1).is_ok());
  }
}
