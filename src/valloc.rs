use std::ptr::NonNull;

use log::{debug, trace};

use crate::addr::VirtAddr;
use crate::error::{AllocError, ConfigError, FreeError};
use crate::region::{Payload, Region};
use crate::tree::IntervalTree;
use crate::{is_page_aligned, page_align_up};

/// The fixed half-open interval `[start, end)` an allocator hands ranges
/// out of, together with its page size. Validated once at construction and
/// immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace {
  start: VirtAddr,
  end: VirtAddr,
  page_size: usize,
}

impl AddressSpace {
  /// Describes `[start, end)` with the given page size.
  ///
  /// `page_size` must be a power of two and both bounds must be multiples
  /// of it, with `start < end`.
  pub fn new(
    start: usize,
    end: usize,
    page_size: usize,
  ) -> Result<Self, ConfigError> {
    if !page_size.is_power_of_two() {
      return Err(ConfigError::PageSizeNotPowerOfTwo(page_size));
    }

    for bound in [start, end] {
      if !is_page_aligned!(bound, page_size) {
        return Err(ConfigError::UnalignedBound { bound, page_size });
      }
    }

    if start == 0 {
      return Err(ConfigError::NullStart);
    }

    if start >= end {
      return Err(ConfigError::EmptySpace { start, end });
    }

    Ok(Self {
      start: VirtAddr::new(start),
      end: VirtAddr::new(end),
      page_size,
    })
  }

  pub fn start(&self) -> VirtAddr {
    self.start
  }

  pub fn end(&self) -> VirtAddr {
    self.end
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn total_bytes(&self) -> usize {
    self.end.offset_from(self.start)
  }
}

/// Point-in-time usage counters for an allocator, computed by walking the
/// live regions in address order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpaceStats {
  pub live_regions: usize,
  pub bytes_allocated: usize,
  pub bytes_free: usize,
}

/// First-fit allocator over a bounded virtual address space.
///
/// Live regions are kept in a balanced tree ordered by start address; a
/// request walks the gaps between them in ascending order and claims the
/// first one large enough. Each region carries a backing buffer of the
/// same size, reachable through [`payload_ptr`](Self::payload_ptr).
///
/// Every instance owns its own tree, so independent address spaces can
/// coexist in one process.
pub struct RegionAllocator {
  space: AddressSpace,
  tree: IntervalTree,
}

impl RegionAllocator {
  pub fn new(space: AddressSpace) -> Self {
    Self {
      space,
      tree: IntervalTree::new(),
    }
  }

  pub fn space(&self) -> &AddressSpace {
    &self.space
  }

  /// Claims the first gap that can hold `size` bytes rounded up to the
  /// page size, and returns the start address of the new region.
  ///
  /// On any error the region tree is left untouched.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<VirtAddr, AllocError> {
    if size == 0 {
      return Err(AllocError::InvalidSize(0));
    }

    let rounded = page_align_up!(size, self.space.page_size)
      .ok_or(AllocError::InvalidSize(size))?;

    // Walk regions in address order; the candidate trails the previous
    // region's end, starting at the bottom of the space.
    let mut candidate = self.space.start;

    for (region_start, region_end) in self.tree.iter() {
      let fits = candidate
        .checked_add(rounded)
        .is_some_and(|gap_end| gap_end <= region_start);

      if fits {
        break;
      }

      candidate = region_end;
    }

    let end = candidate
      .checked_add(rounded)
      .filter(|end| *end <= self.space.end)
      .ok_or_else(|| {
        debug!("allocate: no gap of {rounded:#x} bytes below {}", self.space.end);
        AllocError::OutOfAddressSpace(rounded)
      })?;

    let payload = Payload::acquire(rounded).ok_or_else(|| {
      debug!("allocate: backing buffer of {rounded:#x} bytes unavailable");
      AllocError::OutOfMemory(rounded)
    })?;

    self.tree.insert(Region::new(candidate, end, payload));

    trace!("allocate: {rounded:#x} bytes at {candidate}");

    Ok(candidate)
  }

  /// Releases the region containing `addr` and its backing buffer.
  ///
  /// The null address is accepted and ignored. Any other address that is
  /// not inside a live region is an [`InvalidFree`](FreeError::InvalidFree),
  /// including a second free of an already released region.
  pub fn free(
    &mut self,
    addr: VirtAddr,
  ) -> Result<(), FreeError> {
    if addr.is_null() {
      return Ok(());
    }

    let Some(node) = self.tree.find_containing(addr) else {
      debug!("free: {addr} is not inside any live region");
      return Err(FreeError::InvalidFree(addr));
    };

    let region = self.tree.remove(node);
    debug_assert!(region.contains(addr));

    trace!(
      "free: region {}..{} released ({:#x} bytes)",
      region.start,
      region.end,
      region.len()
    );

    // Dropping the region releases the backing buffer.
    Ok(())
  }

  /// Pointer into the backing buffer of the live region containing `addr`,
  /// offset to mirror `addr`'s position in the region. Dereferencing it is
  /// up to the caller.
  pub fn payload_ptr(
    &self,
    addr: VirtAddr,
  ) -> Option<NonNull<u8>> {
    let node = self.tree.find_containing(addr)?;
    let (start, _) = self.tree.range_of(node);

    Some(self.tree.payload_of(node).at(addr.offset_from(start)))
  }

  /// The `[start, end)` range of the live region containing `addr`.
  pub fn region_of(
    &self,
    addr: VirtAddr,
  ) -> Option<(VirtAddr, VirtAddr)> {
    let node = self.tree.find_containing(addr)?;

    Some(self.tree.range_of(node))
  }

  /// Live regions in ascending address order.
  pub fn regions(&self) -> impl Iterator<Item = (VirtAddr, VirtAddr)> + '_ {
    self.tree.iter()
  }

  pub fn stats(&self) -> SpaceStats {
    let bytes_allocated = self
      .tree
      .iter()
      .map(|(start, end)| end.offset_from(start))
      .sum();

    SpaceStats {
      live_regions: self.tree.len(),
      bytes_allocated,
      bytes_free: self.space.total_bytes() - bytes_allocated,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn allocator() -> RegionAllocator {
    RegionAllocator::new(AddressSpace::new(0x1000, 0x5000, 0x1000).unwrap())
  }

  #[test]
  fn test_space_validation() {
    assert_eq!(
      AddressSpace::new(0x1000, 0x5000, 0x3000),
      Err(ConfigError::PageSizeNotPowerOfTwo(0x3000))
    );
    assert_eq!(
      AddressSpace::new(0x1800, 0x5000, 0x1000),
      Err(ConfigError::UnalignedBound { bound: 0x1800, page_size: 0x1000 })
    );
    assert_eq!(
      AddressSpace::new(0x5000, 0x5000, 0x1000),
      Err(ConfigError::EmptySpace { start: 0x5000, end: 0x5000 })
    );
    assert_eq!(
      AddressSpace::new(0, 0x5000, 0x1000),
      Err(ConfigError::NullStart)
    );

    let space = AddressSpace::new(0x1000, 0x5000, 0x1000).unwrap();
    assert_eq!(space.total_bytes(), 0x4000);
  }

  #[test]
  fn test_first_fit_scenario() {
    let mut a = allocator();

    assert_eq!(a.allocate(0x1000), Ok(VirtAddr::new(0x1000)));
    assert_eq!(a.allocate(0x1000), Ok(VirtAddr::new(0x2000)));

    a.free(VirtAddr::new(0x1000)).unwrap();

    // 0x800 rounds up to one page and must land in the reclaimed gap at
    // the bottom of the space, not after the last region.
    assert_eq!(a.allocate(0x800), Ok(VirtAddr::new(0x1000)));

    a.tree.assert_invariants();
  }

  #[test]
  fn test_fragmentation_reuse() {
    let mut a = allocator();

    let first = a.allocate(100).unwrap();
    let second = a.allocate(100).unwrap();
    assert_ne!(first, second);

    a.free(first).unwrap();

    let third = a.allocate(100).unwrap();
    assert_eq!(third, first);
  }

  #[test]
  fn test_exhaustion() {
    let mut a = allocator();
    let pages = a.space().total_bytes() / a.space().page_size();

    for i in 0..pages {
      let addr = a.allocate(1).unwrap();
      assert_eq!(addr.value(), 0x1000 + i * 0x1000);
    }

    assert_eq!(a.allocate(1), Err(AllocError::OutOfAddressSpace(0x1000)));

    // Failure leaves the allocator usable: free one page, get it back.
    a.free(VirtAddr::new(0x3000)).unwrap();
    assert_eq!(a.allocate(1), Ok(VirtAddr::new(0x3000)));
  }

  #[test]
  fn test_invalid_size() {
    let mut a = allocator();

    assert_eq!(a.allocate(0), Err(AllocError::InvalidSize(0)));
    assert_eq!(
      a.allocate(usize::MAX - 5),
      Err(AllocError::InvalidSize(usize::MAX - 5))
    );
    assert_eq!(a.stats().live_regions, 0);
  }

  #[test]
  fn test_oversized_request() {
    let mut a = allocator();

    assert_eq!(a.allocate(0x5000), Err(AllocError::OutOfAddressSpace(0x5000)));

    // A request larger than the whole space must not disturb later ones.
    assert_eq!(a.allocate(0x4000), Ok(VirtAddr::new(0x1000)));
  }

  #[test]
  fn test_double_free_detected() {
    let mut a = allocator();

    let addr = a.allocate(0x1000).unwrap();
    a.free(addr).unwrap();

    assert_eq!(a.free(addr), Err(FreeError::InvalidFree(addr)));

    a.tree.assert_invariants();
    assert_eq!(a.allocate(0x1000), Ok(addr));
  }

  #[test]
  fn test_free_rejects_foreign_addresses() {
    let mut a = allocator();

    a.allocate(0x1000).unwrap();

    for foreign in [0x0800, 0x2000, 0x9000] {
      let addr = VirtAddr::new(foreign);
      assert_eq!(a.free(addr), Err(FreeError::InvalidFree(addr)));
    }

    assert_eq!(a.stats().live_regions, 1);
  }

  #[test]
  fn test_free_null_is_noop() {
    let mut a = allocator();

    assert_eq!(a.free(VirtAddr::NULL), Ok(()));
    assert_eq!(a.stats().live_regions, 0);
  }

  #[test]
  fn test_free_by_interior_address() {
    let mut a = allocator();

    let addr = a.allocate(0x2000).unwrap();

    // Any address inside the region resolves to it.
    a.free(addr.checked_add(0x1234).unwrap()).unwrap();
    assert_eq!(a.stats().live_regions, 0);
  }

  #[test]
  fn test_round_trip_restores_gaps() {
    let mut a = allocator();

    let kept = a.allocate(0x1000).unwrap();
    let before: Vec<_> = a.regions().collect();

    let addr = a.allocate(0x2000).unwrap();
    a.free(addr).unwrap();

    let after: Vec<_> = a.regions().collect();
    assert_eq!(before, after);

    // The same request sequence lands on the same addresses again.
    assert_eq!(a.allocate(0x2000), Ok(addr));
    a.free(kept).unwrap();
  }

  #[test]
  fn test_payload_round_trip() {
    let mut a = allocator();

    let first = a.allocate(0x1000).unwrap();
    let second = a.allocate(0x1000).unwrap();

    unsafe {
      let first_ptr = a.payload_ptr(first).unwrap().as_ptr() as *mut u64;
      first_ptr.write(0xDEADBEEF);

      let second_ptr = a.payload_ptr(second).unwrap().as_ptr();
      second_ptr.write_bytes(0xAB, 0x1000);

      // The neighbouring region's bytes survive unrelated writes.
      assert_eq!(first_ptr.read(), 0xDEADBEEF);
      assert_eq!(second_ptr.read(), 0xAB);
    }

    // Interior addresses map to the matching buffer offset.
    let base = a.payload_ptr(first).unwrap().as_ptr();
    let interior = a
      .payload_ptr(first.checked_add(0x10).unwrap())
      .unwrap()
      .as_ptr();
    assert_eq!(unsafe { base.add(0x10) }, interior);

    a.free(first).unwrap();
    assert_eq!(a.payload_ptr(first), None);
  }

  #[test]
  fn test_region_of() {
    let mut a = allocator();

    let addr = a.allocate(0x1800).unwrap();

    let (start, end) = a.region_of(addr.checked_add(0x1fff).unwrap()).unwrap();
    assert_eq!(start, addr);
    assert_eq!(end, addr.checked_add(0x2000).unwrap());

    assert_eq!(a.region_of(VirtAddr::new(0x4000)), None);
  }

  #[test]
  fn test_stats() {
    let mut a = allocator();

    assert_eq!(
      a.stats(),
      SpaceStats { live_regions: 0, bytes_allocated: 0, bytes_free: 0x4000 }
    );

    let first = a.allocate(0x1000).unwrap();
    a.allocate(0x2000).unwrap();

    assert_eq!(
      a.stats(),
      SpaceStats { live_regions: 2, bytes_allocated: 0x3000, bytes_free: 0x1000 }
    );

    a.free(first).unwrap();

    assert_eq!(
      a.stats(),
      SpaceStats { live_regions: 1, bytes_allocated: 0x2000, bytes_free: 0x2000 }
    );
  }

  #[test]
  fn test_independent_allocators() {
    let mut low = allocator();
    let mut high =
      RegionAllocator::new(AddressSpace::new(0x10000, 0x20000, 0x1000).unwrap());

    assert_eq!(low.allocate(0x1000), Ok(VirtAddr::new(0x1000)));
    assert_eq!(high.allocate(0x1000), Ok(VirtAddr::new(0x10000)));

    // One allocator never resolves the other's addresses.
    assert!(high.free(VirtAddr::new(0x1000)).is_err());
    assert!(low.free(VirtAddr::new(0x10000)).is_err());
  }

  #[test]
  fn test_invariants_across_churn() {
    let mut a = RegionAllocator::new(
      AddressSpace::new(0x1000, 0x101000, 0x1000).unwrap(),
    );
    let mut state = 0x5eed_u64;
    let mut live: Vec<VirtAddr> = Vec::new();

    let mut next = move || {
      state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
      state
    };

    for _ in 0..300 {
      if live.is_empty() || next() % 3 != 0 {
        let pages = (next() % 4 + 1) as usize;
        if let Ok(addr) = a.allocate(pages * 0x1000) {
          live.push(addr);
        }
      } else {
        let victim = live.remove((next() as usize) % live.len());
        a.free(victim).unwrap();
      }

      a.tree.assert_invariants();
    }

    // Live addresses all resolve; no region overlaps another.
    for addr in &live {
      assert!(a.region_of(*addr).is_some());
    }
    let regions: Vec<_> = a.regions().collect();
    for pair in regions.windows(2) {
      assert!(pair[0].1 <= pair[1].0);
    }
  }
}
