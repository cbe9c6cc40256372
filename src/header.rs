//! Fixed-width block header codec.
//!
//! ```text
//!   offset  0        4        8   9
//!           ┌────────┬────────┬───┐
//!           │  size  │capacity│ R │   u32 LE, u32 LE, flag byte
//!           └────────┴────────┴───┘
//! ```

/// Bytes taken by every header.
pub const HEADER_SIZE: usize = 9;

const SIZE_OFFSET: usize = 0;
const CAPACITY_OFFSET: usize = 4;
const RESERVED_OFFSET: usize = 8;

const RESERVED_MARK: u8 = 0xFF;
const FREE_MARK: u8 = 0x00;

/// Metadata stored in front of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  /// Bytes guaranteed to the holder.
  pub size: u32,
  /// Physical payload bytes, never below `size`.
  pub capacity: u32,
  pub reserved: bool,
}

impl Header {
  /// # Panics
  ///
  /// If `size` or `capacity` does not fit the 32 bit header fields.
  pub fn new(
    size: usize,
    capacity: usize,
    reserved: bool,
  ) -> Self {
    debug_assert!(size <= capacity, "size {size} exceeds capacity {capacity}");

    Self {
      size: u32::try_from(size).expect("size fits the header's u32 field"),
      capacity: u32::try_from(capacity).expect("capacity fits the header's u32 field"),
      reserved,
    }
  }

  /// A free block whose whole capacity is usable.
  pub fn free(capacity: usize) -> Self {
    Self::new(capacity, capacity, false)
  }

  pub fn size(&self) -> usize {
    self.size as usize
  }

  pub fn capacity(&self) -> usize {
    self.capacity as usize
  }

  pub fn is_free(&self) -> bool {
    !self.reserved
  }

  /// Writes the header into exactly `HEADER_SIZE` bytes.
  pub fn encode(
    &self,
    bytes: &mut [u8; HEADER_SIZE],
  ) {
    bytes[SIZE_OFFSET..CAPACITY_OFFSET].copy_from_slice(&self.size.to_le_bytes());
    bytes[CAPACITY_OFFSET..RESERVED_OFFSET].copy_from_slice(&self.capacity.to_le_bytes());
    bytes[RESERVED_OFFSET] = if self.reserved { RESERVED_MARK } else { FREE_MARK };
  }

  /// Reads whatever occupies the header bytes. Any non-zero flag byte counts as reserved.
  pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
    let mut size = [0u8; 4];
    let mut capacity = [0u8; 4];
    size.copy_from_slice(&bytes[SIZE_OFFSET..CAPACITY_OFFSET]);
    capacity.copy_from_slice(&bytes[CAPACITY_OFFSET..RESERVED_OFFSET]);

    Self {
      size: u32::from_le_bytes(size),
      capacity: u32::from_le_bytes(capacity),
      reserved: bytes[RESERVED_OFFSET] != FREE_MARK,
    }
  }
}
