/// Errors reported by the heap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
  /// The host refused to hand out the backing buffer.
  #[error("failed to obtain a {size} byte backing buffer from the host")]
  BackingAllocationFailure { size: usize },
  /// No block can hold the request, even after merging every reachable free neighbour.
  #[error("out of capacity: no block can hold {requested} bytes")]
  OutOfCapacity { requested: usize },
  /// The handle was not issued by this heap, is stale, or was already released.
  #[error("invalid release of handle at offset {offset}: {reason}")]
  InvalidRelease { offset: usize, reason: &'static str },
  /// The handle does not address a live reserved block.
  #[error("invalid handle at offset {offset}: {reason}")]
  InvalidHandle { offset: usize, reason: &'static str },
  /// Zero byte allocations are rejected.
  #[error("allocation size must be greater than zero")]
  ZeroSizedRequest,
  #[error("invalid heap configuration: {0}")]
  InvalidConfig(String),
  /// The header walk does not tile the region.
  #[error("heap corrupted at offset {offset}: {reason}")]
  Corrupted { offset: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, HeapError>;
