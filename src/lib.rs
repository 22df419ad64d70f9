//! # vallocator - A Virtual Address Space Allocator Library
//!
//! This crate provides a **first-fit region allocator** over a bounded
//! virtual address space, backed by a self-balancing (red-black) interval
//! tree of live regions.
//!
//! ## Overview
//!
//! The allocator hands out non-overlapping, page-aligned address ranges and
//! reclaims them on free; freed ranges become gaps that later requests
//! reuse:
//!
//! ```text
//!   Address Space Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                  VIRTUAL ADDRESS SPACE  [start, end)                 │
//!   │                                                                      │
//!   │   ┌───────┬────────────┬───────┬──────────┬────────────────────────┐ │
//!   │   │  R1   │    gap     │  R2   │    R3    │         gap            │ │
//!   │   └───────┴────────────┴───────┴──────────┴────────────────────────┘ │
//!   │   ▲       ▲                                                         │
//!   │   │       │                                                         │
//!   │  start   first-fit search claims the first gap                      │
//!   │          large enough for the (page-rounded) request                │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation and lookup stay logarithmic in the number of live regions:
//!
//!                         ┌────────────┐
//!                         │ R2 (black) │        regions ordered by their
//!                         └─────┬──────┘        start address; the tree
//!                    ┌──────────┴─────────┐     rebalances on every
//!              ┌─────┴──────┐      ┌──────┴───┐ insert and delete
//!              │ R1 (red)   │      │ R3 (red) │
//!              └────────────┘      └──────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   vallocator
//!   ├── align      - Page alignment macros (page_align_up!, is_page_aligned!)
//!   ├── addr       - VirtAddr, the typed address of the managed space
//!   ├── error      - AllocError, FreeError, ConfigError
//!   ├── region     - Region record and its backing Payload buffer (internal)
//!   ├── tree       - Red-black interval tree over live regions (internal)
//!   └── valloc     - AddressSpace configuration and RegionAllocator
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use vallocator::{AddressSpace, RegionAllocator, VirtAddr};
//!
//! fn main() {
//!     let space = AddressSpace::new(0x1000, 0x5000, 0x1000).unwrap();
//!     let mut allocator = RegionAllocator::new(space);
//!
//!     // Sizes round up to the page size; the first gap wins.
//!     let first = allocator.allocate(0x800).unwrap();
//!     assert_eq!(first, VirtAddr::new(0x1000));
//!
//!     let second = allocator.allocate(0x1000).unwrap();
//!     assert_eq!(second, VirtAddr::new(0x2000));
//!
//!     // Freed ranges are reused by later allocations.
//!     allocator.free(first).unwrap();
//!     assert_eq!(allocator.allocate(0x1000), Ok(first));
//! }
//! ```
//!
//! ## How It Works
//!
//! Each live region is a node of a red-black tree keyed by its start
//! address. `allocate` walks the regions in address order, tracking the end
//! of the previous one; the first gap that can hold the rounded request is
//! claimed, a backing buffer of the same size is obtained from the system
//! allocator, and the new region is inserted (triggering a rebalance).
//! `free` resolves the caller's address back to its owning region by
//! containment search, deletes the node (rebalancing again), and releases
//! the backing buffer.
//!
//! ```text
//!   Single Region:
//!   ┌──────────────────────────────┬────────────────────────────────┐
//!   │       Tree Node              │        Backing Buffer          │
//!   │  ┌────────────────────────┐  │  ┌──────────────────────────┐  │
//!   │  │ start, end  (VirtAddr) │  │  │                          │  │
//!   │  │ color: red | black     │──┼─▶│   end - start bytes      │  │
//!   │  │ parent / left / right  │  │  │                          │  │
//!   │  └────────────────────────┘  │  └──────────────────────────┘  │
//!   └──────────────────────────────┴────────────────────────────────┘
//!                                  ▲
//!                                  └── reachable via payload_ptr()
//! ```
//!
//! ## Features
//!
//! - **First-fit policy**: the lowest sufficient gap is claimed, keeping
//!   allocations packed toward the bottom of the space
//! - **Balanced bookkeeping**: O(log n) allocate and free in the number of
//!   live regions
//! - **Strict free checking**: double frees and foreign addresses are
//!   reported as errors, never silently ignored
//! - **Instance-scoped state**: every allocator owns its tree, so multiple
//!   independent address spaces can coexist
//!
//! ## Limitations
//!
//! - **Single-threaded only**: callers needing concurrency must wrap the
//!   allocator in their own lock so search and insert stay atomic
//! - **No merging or compaction**: adjacent freed gaps are left as holes
//!   for first-fit to reuse
//! - **No real paging**: addresses are bookkeeping values; memory is
//!   reached through the per-region backing buffers
//!
//! ## Safety
//!
//! The allocator API itself is safe. Writing through the pointers returned
//! by [`RegionAllocator::payload_ptr`] requires `unsafe` blocks, as with
//! any raw buffer access.

pub mod align;
mod addr;
mod error;
mod region;
mod tree;
mod valloc;

pub use addr::VirtAddr;
pub use error::{AllocError, ConfigError, FreeError};
pub use valloc::{AddressSpace, RegionAllocator, SpaceStats};
