use std::fmt;

/// An address in the managed virtual space, a [`usize`] under the hood.
///
/// Addresses handed out by the allocator and addresses accepted back by it
/// are always of this type; raw pointers into backing buffers never mix
/// with it. Ordering and equality follow the numeric value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
  /// The zero address. Never inside a configured address space; freeing it
  /// is a no-op.
  pub const NULL: VirtAddr = VirtAddr(0);

  pub const fn new(value: usize) -> Self {
    Self(value)
  }

  /// Returns the underlying numeric value.
  pub const fn value(&self) -> usize {
    self.0
  }

  pub const fn is_null(&self) -> bool {
    self.0 == 0
  }

  /// Offsets the address forward, or `None` on numeric overflow.
  pub fn checked_add(
    &self,
    offset: usize,
  ) -> Option<VirtAddr> {
    self.0.checked_add(offset).map(VirtAddr)
  }

  /// Distance in bytes from `other` up to `self`.
  ///
  /// `other` must not exceed `self`.
  pub fn offset_from(
    &self,
    other: VirtAddr,
  ) -> usize {
    debug_assert!(other.0 <= self.0);
    self.0 - other.0
  }
}

impl fmt::Debug for VirtAddr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter,
  ) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}

impl fmt::Display for VirtAddr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter,
  ) -> fmt::Result {
    write!(f, "{:#x}", self.0)
  }
}

impl fmt::LowerHex for VirtAddr {
  fn fmt(
    &self,
    f: &mut fmt::Formatter,
  ) -> fmt::Result {
    fmt::LowerHex::fmt(&self.0, f)
  }
}
