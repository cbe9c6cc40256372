use crate::{
  error::{HeapError, Result},
  header::HEADER_SIZE,
};

/// Heap size used when nothing else is configured.
pub const DEFAULT_HEAP_SIZE: usize = 8000;

/// Settings for a single heap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  heap_size: usize,
}

impl HeapConfig {
  pub fn new() -> Self {
    Self {
      heap_size: DEFAULT_HEAP_SIZE,
    }
  }

  /// Sets the total region size in bytes, headers included.
  pub fn heap_size(
    mut self,
    heap_size: usize,
  ) -> Self {
    self.heap_size = heap_size;
    self
  }

  pub fn size(&self) -> usize {
    self.heap_size
  }

  /// Checks that the region can hold one header plus at least one payload byte and that
  /// every capacity fits the header's 32 bit fields.
  pub fn validate(&self) -> Result<()> {
    if self.heap_size <= HEADER_SIZE {
      return Err(HeapError::InvalidConfig(format!(
        "heap size {} must exceed the {} byte header",
        self.heap_size, HEADER_SIZE
      )));
    }

    if self.heap_size - HEADER_SIZE > u32::MAX as usize {
      return Err(HeapError::InvalidConfig(format!(
        "heap size {} does not fit the header's 32 bit capacity field",
        self.heap_size
      )));
    }

    Ok(())
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::new()
  }
}
