use std::{fmt, ops::Range};

use crate::header::{HEADER_SIZE, Header};

/// A decoded block together with the offset of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
  pub offset: usize,
  pub size: usize,
  pub capacity: usize,
  pub reserved: bool,
}

impl Block {
  pub fn new(
    offset: usize,
    header: Header,
  ) -> Self {
    Self {
      offset,
      size: header.size(),
      capacity: header.capacity(),
      reserved: header.reserved,
    }
  }

  pub fn is_free(&self) -> bool {
    !self.reserved
  }

  /// Offset of the first payload byte.
  pub fn payload_start(&self) -> usize {
    self.offset + HEADER_SIZE
  }

  /// Bytes handed to the holder.
  pub fn payload(&self) -> Range<usize> {
    self.payload_start()..self.payload_start() + self.size
  }

  /// Offset of the following block's header.
  pub fn end(&self) -> usize {
    self.payload_start() + self.capacity
  }

  /// Unusable padding owned by a reserved block.
  pub fn slack(&self) -> usize {
    self.capacity.saturating_sub(self.size)
  }
}

impl fmt::Display for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "block at {:>5}: size={}, cap={}, {}",
      self.offset,
      self.size,
      self.capacity,
      if self.reserved { "reserved" } else { "free" }
    )
  }
}
