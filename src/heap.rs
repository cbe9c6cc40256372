use crate::{
  allocator::{self, Handle},
  config::HeapConfig,
  error::{HeapError, Result},
  inspector::{self, Report},
  store::HeapStore,
};

/// A fixed-size heap with first-fit allocation.
///
/// Owns its region; dropping the allocator returns the region to the host.
#[derive(Debug)]
pub struct HeapAllocator {
  store: HeapStore,
}

impl HeapAllocator {
  pub fn new() -> Self {
    Self::with_config(HeapConfig::default())
  }

  pub fn with_config(config: HeapConfig) -> Self {
    Self {
      store: HeapStore::new(config),
    }
  }

  pub fn config(&self) -> &HeapConfig {
    self.store.config()
  }

  pub fn is_initialized(&self) -> bool {
    self.store.is_initialized()
  }

  /// Reserves exactly `size` bytes. The region is created on the first call.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Handle> {
    let handle = allocator::allocate(&mut self.store, size)?;
    adebug!("Allocated {} bytes at offset {}", size, handle.offset());
    self.debug_verify();
    Ok(handle)
  }

  /// Frees the block behind `handle`. Merging waits for the next `allocate`.
  pub fn release(
    &mut self,
    handle: Handle,
  ) -> Result<()> {
    allocator::release(&mut self.store, handle)?;
    adebug!("Released offset {}", handle.offset());
    self.debug_verify();
    Ok(())
  }

  pub fn report(&self) -> Report {
    inspector::report(&self.store)
  }

  pub fn print_report(&self) {
    inspector::print_report(&self.store);
  }

  pub fn verify(&self) -> Result<()> {
    inspector::verify(&self.store)
  }

  /// The `size` bytes reserved for `handle`.
  pub fn payload(
    &self,
    handle: Handle,
  ) -> Result<&[u8]> {
    let range = self.payload_range(handle)?;
    Ok(&self.store.bytes()[range])
  }

  pub fn payload_mut(
    &mut self,
    handle: Handle,
  ) -> Result<&mut [u8]> {
    let range = self.payload_range(handle)?;
    Ok(&mut self.store.bytes_mut()[range])
  }

  /// Returns the region to the host. Outstanding handles become stale and the next
  /// `allocate` starts over with a single free block.
  pub fn teardown(&mut self) {
    self.store.teardown();
  }

  fn payload_range(
    &self,
    handle: Handle,
  ) -> Result<std::ops::Range<usize>> {
    allocator::resolve(&self.store, handle)
      .map(|block| block.payload())
      .map_err(|reason| HeapError::InvalidHandle {
        offset: handle.offset(),
        reason,
      })
  }

  fn debug_verify(&self) {
    if !cfg!(debug_assertions) {
      return;
    }

    if let Err(err) = self.verify() {
      aerror!("Heap layout check failed: {}", err);
      panic!("{err}");
    }
  }
}

impl Default for HeapAllocator {
  fn default() -> Self {
    Self::new()
  }
}
