use hdralloc::{HeapAllocator, HeapError};

/// Frees three neighbours, then asks for more than any one of them holds.
fn coalesce_then_split(heap: &mut HeapAllocator) -> Result<(), HeapError> {
  // --------------------------------------------------------------------
  // 1) Three small allocations carved off the front of the heap.
  // --------------------------------------------------------------------
  let a = heap.allocate(30)?;
  let b = heap.allocate(40)?;
  let c = heap.allocate(50)?;
  println!(
    "[1] Allocated 30, 40, 50 bytes at offsets {}, {}, {}",
    a.offset(),
    b.offset(),
    c.offset()
  );

  // --------------------------------------------------------------------
  // 2) Release all three. Nothing is merged yet.
  // --------------------------------------------------------------------
  heap.release(a)?;
  heap.release(b)?;
  heap.release(c)?;
  println!("\n[2] Released all three");
  heap.print_report();

  // --------------------------------------------------------------------
  // 3) 130 bytes only fit once the freed blocks are merged. The two
  //    leftover bytes cannot carry a header and stay with the block.
  // --------------------------------------------------------------------
  let d = heap.allocate(130)?;
  println!("\n[3] Allocated 130 bytes at offset {}", d.offset());
  heap.print_report();

  heap.release(d)
}

/// Reuses the first freed block for a slightly smaller request.
fn reuse_first_region(heap: &mut HeapAllocator) -> Result<(), HeapError> {
  let a = heap.allocate(30)?;

  let payload = heap.payload_mut(a)?;
  for (i, byte) in payload.iter_mut().take(10).enumerate() {
    *byte = b'a' + i as u8;
  }
  println!(
    "[1] Wrote {:?} into the first block",
    String::from_utf8_lossy(&heap.payload(a)?[..10])
  );

  let b = heap.allocate(30)?;
  heap.release(a)?;
  heap.release(b)?;
  println!("\n[2] Released both 30 byte blocks");
  heap.print_report();

  // --------------------------------------------------------------------
  // 3) First fit takes the first block; 30 - 29 is no room for a header.
  // --------------------------------------------------------------------
  let d = heap.allocate(29)?;
  println!("\n[3] Allocated 29 bytes at offset {}", d.offset());
  heap.print_report();

  heap.release(d)
}

/// Keeps allocating until the heap refuses.
fn exhaust(heap: &mut HeapAllocator) -> Result<(), HeapError> {
  let mut count = 0;

  let err = loop {
    match heap.allocate(100) {
      Ok(_) => count += 1,
      Err(err) => break err,
    }
  };

  println!("[1] {} allocations of 100 bytes, then: {}", count, err);
  let stats = heap.report().stats();
  println!(
    "[2] reserved={} free={} headers={}",
    stats.reserved_bytes, stats.free_bytes, stats.header_bytes
  );
  heap.verify()
}

fn main() -> Result<(), HeapError> {
  env_logger::init();
  hdralloc::enable_logging();

  let mut heap = HeapAllocator::new();

  println!("=== coalesce then split ===");
  coalesce_then_split(&mut heap)?;

  // The scenarios are independent: start each from a fresh region.
  heap.teardown();

  println!("\n=== reuse first region ===");
  reuse_first_region(&mut heap)?;
  heap.teardown();

  println!("\n=== exhaustion ===");
  exhaust(&mut heap)
}
