use std::{
  fmt,
  ptr::NonNull,
  slice,
  sync::atomic::{AtomicU64, Ordering},
};

use crate::{
  config::HeapConfig,
  error::{HeapError, Result},
  header::{HEADER_SIZE, Header},
};

/// Epochs are drawn from one counter, so no two regions in the process share one.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Owner of the backing region.
///
/// The buffer comes straight from the C allocator, so the heap never goes through Rust's
/// global allocator. Until the first allocation request the store holds nothing.
pub struct HeapStore {
  config: HeapConfig,
  base: Option<NonNull<u8>>,
  epoch: u64,
}

impl HeapStore {
  pub fn new(config: HeapConfig) -> Self {
    Self {
      config,
      base: None,
      epoch: 0,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn heap_size(&self) -> usize {
    self.config.size()
  }

  pub fn is_initialized(&self) -> bool {
    self.base.is_some()
  }

  /// Identifies the current region. Zero until the first initialization; every
  /// initialization of any store takes a fresh value. Handles carry the epoch they were
  /// issued in.
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  /// Obtains the region on first use and lays a single free block over it.
  pub fn ensure_initialized(&mut self) -> Result<()> {
    if self.base.is_some() {
      return Ok(());
    }

    self.config.validate()?;
    let heap_size = self.heap_size();

    // Zeroed by calloc, so the whole region is initialized memory.
    let raw = unsafe { libc::calloc(1, heap_size) } as *mut u8;
    let base = NonNull::new(raw).ok_or_else(|| {
      aerror!("calloc refused {} bytes", heap_size);
      HeapError::BackingAllocationFailure { size: heap_size }
    })?;

    self.base = Some(base);
    self.epoch = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
    self.write_header(0, &Header::free(heap_size - HEADER_SIZE));

    ainfo!(
      "Initialized {} byte heap at {:p} (epoch {})",
      heap_size,
      base,
      self.epoch
    );
    Ok(())
  }

  /// Hands the region back to the host. Every outstanding handle becomes stale.
  pub fn teardown(&mut self) {
    if let Some(base) = self.base.take() {
      unsafe { libc::free(base.as_ptr() as *mut libc::c_void) };
      ainfo!("Released heap at {:p} (epoch {})", base, self.epoch);
    }
  }

  /// The whole region, or an empty slice before initialization.
  pub fn bytes(&self) -> &[u8] {
    match self.base {
      // The pointer owns `heap_size` zero-initialized bytes until teardown.
      Some(base) => unsafe { slice::from_raw_parts(base.as_ptr(), self.heap_size()) },
      None => &[],
    }
  }

  pub fn bytes_mut(&mut self) -> &mut [u8] {
    let heap_size = self.heap_size();
    match self.base {
      Some(base) => unsafe { slice::from_raw_parts_mut(base.as_ptr(), heap_size) },
      None => &mut [],
    }
  }

  /// Decodes the header at `offset`.
  ///
  /// # Panics
  ///
  /// If the header would extend past the region. Callers check bounds first.
  pub fn read_header(
    &self,
    offset: usize,
  ) -> Header {
    let bytes: &[u8; HEADER_SIZE] = (&self.bytes()[offset..offset + HEADER_SIZE])
      .try_into()
      .expect("header slice has HEADER_SIZE bytes");
    Header::decode(bytes)
  }

  pub fn write_header(
    &mut self,
    offset: usize,
    header: &Header,
  ) {
    let bytes: &mut [u8; HEADER_SIZE] = (&mut self.bytes_mut()[offset..offset + HEADER_SIZE])
      .try_into()
      .expect("header slice has HEADER_SIZE bytes");
    header.encode(bytes);
  }
}

impl Drop for HeapStore {
  fn drop(&mut self) {
    self.teardown();
  }
}

impl fmt::Debug for HeapStore {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("HeapStore")
      .field("heap_size", &self.heap_size())
      .field("base", &self.base.map(|b| b.as_ptr() as *const u8))
      .field("epoch", &self.epoch)
      .finish()
  }
}
