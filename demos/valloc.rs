use std::io::Read;

use vallocator::{AddressSpace, RegionAllocator, VirtAddr};

/// Waits until the user presses ENTER.
/// Useful when you want to follow the region layout step by step, with
/// `RUST_LOG=trace` showing the allocator's own view of each operation.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints every live region in address order plus the usage counters.
fn print_regions(
  label: &str,
  allocator: &RegionAllocator,
) {
  let stats = allocator.stats();

  println!(
    "[{}] {} live regions, {:#x} bytes allocated, {:#x} bytes free",
    label, stats.live_regions, stats.bytes_allocated, stats.bytes_free
  );

  for (start, end) in allocator.regions() {
    println!("      region {start}..{end} ({:#x} bytes)", end.value() - start.value());
  }
}

fn main() {
  env_logger::init();

  // A small 16-page space makes every move easy to follow.
  let space = AddressSpace::new(0x1000, 0x11000, 0x1000).unwrap();
  let mut allocator = RegionAllocator::new(space);

  println!(
    "Managing [{}, {}) with {:#x}-byte pages",
    space.start(),
    space.end(),
    space.page_size()
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate a single page.
  // --------------------------------------------------------------------
  let first = allocator.allocate(0x1000).unwrap();
  println!("\n[1] Allocate 0x1000 bytes -> {first}");
  print_regions("1", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate an odd size; it rounds up to the page size.
  // --------------------------------------------------------------------
  let second = allocator.allocate(0x800).unwrap();
  println!("\n[2] Allocate 0x800 bytes (rounds to one page) -> {second}");
  print_regions("2", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Write through the region's backing buffer to show it's usable.
  // --------------------------------------------------------------------
  let first_ptr = allocator.payload_ptr(first).unwrap().as_ptr() as *mut u64;
  unsafe {
    first_ptr.write(0xDEADBEEF);
    println!("\n[3] Value written into {first} = 0x{:X}", first_ptr.read());
  }
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Allocate a larger region, then free the first one. The hole at the
  //    bottom of the space stays behind.
  // --------------------------------------------------------------------
  let third = allocator.allocate(0x3000).unwrap();
  println!("\n[4] Allocate 0x3000 bytes -> {third}");

  allocator.free(first).unwrap();
  println!("[4] Freed {first}");
  print_regions("4", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Allocate one page again: first-fit reuses the reclaimed gap
  //    instead of appending after the last region.
  // --------------------------------------------------------------------
  let fourth = allocator.allocate(0x1000).unwrap();
  println!("\n[5] Allocate 0x1000 bytes -> {fourth}");
  println!(
    "[5] fourth == first? {}",
    if fourth == first {
      "Yes, the freed gap was reused"
    } else {
      "No, it landed somewhere else"
    }
  );
  print_regions("5", &allocator);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Freeing an address nobody owns is reported, not ignored.
  // --------------------------------------------------------------------
  let bogus = VirtAddr::new(0xF0000);
  println!("\n[6] free({bogus}) -> {:?}", allocator.free(bogus));

  let double = allocator.free(second).and_then(|_| allocator.free(second));
  println!("[6] double free of {second} -> {:?}", double);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 7) Drive the space to exhaustion; the allocator stays usable after
  //    reporting the failure.
  // --------------------------------------------------------------------
  let mut claimed = 0;
  loop {
    match allocator.allocate(0x1000) {
      Ok(_) => claimed += 1,
      Err(err) => {
        println!("\n[7] After {claimed} more pages: {err}");
        break;
      }
    }
  }
  print_regions("7", &allocator);

  println!("\n[8] End of demo. Dropping the allocator releases every backing buffer.");
}
