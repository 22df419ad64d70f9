//! Error types reported by the allocator.
//!
//! None of these are fatal to the allocator itself: after any error the
//! region tree is untouched and later calls proceed normally. Retrying
//! (for example after freeing other regions) is the caller's business.

use thiserror::Error;

use crate::addr::VirtAddr;

/// Why an allocation request was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The requested size was zero, or rounding it up to the page size
  /// overflowed.
  #[error("invalid allocation size: {0:#x}")]
  InvalidSize(usize),

  /// No gap of the rounded size exists anywhere in the address space.
  #[error("no free range of {0:#x} bytes in the address space")]
  OutOfAddressSpace(usize),

  /// The backing buffer could not be obtained from the system allocator.
  #[error("backing buffer of {0:#x} bytes could not be allocated")]
  OutOfMemory(usize),
}

/// Why a free request was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
  /// The address is not inside any live region. Covers double frees and
  /// addresses that were never handed out.
  #[error("address {0} does not belong to any live region")]
  InvalidFree(VirtAddr),
}

/// Why an address-space description was rejected at construction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
  #[error("page size {0:#x} is not a power of two")]
  PageSizeNotPowerOfTwo(usize),

  #[error("bound {bound:#x} is not aligned to the page size {page_size:#x}")]
  UnalignedBound { bound: usize, page_size: usize },

  /// The null address marks "nothing to free", so no space may contain it.
  #[error("address space may not start at the null address")]
  NullStart,

  #[error("address space [{start:#x}, {end:#x}) is empty or inverted")]
  EmptySpace { start: usize, end: usize },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages() {
    assert_eq!(
      AllocError::OutOfAddressSpace(0x2000).to_string(),
      "no free range of 0x2000 bytes in the address space"
    );
    assert_eq!(
      FreeError::InvalidFree(VirtAddr::new(0x4000)).to_string(),
      "address 0x4000 does not belong to any live region"
    );
    assert_eq!(
      ConfigError::PageSizeNotPowerOfTwo(0x3000).to_string(),
      "page size 0x3000 is not a power of two"
    );
  }
}
