use std::ptr::NonNull;

use quickalloc::PoolStats;

/// Alignment of the default pool.
const ALIGNMENT: usize = quickalloc::DEFAULT_ALIGNMENT;

/// Prints the address of a block and the modulus proving its alignment.
fn print_alignment(
  label: &str,
  ptr: NonNull<u8>,
) {
  let addr = ptr.as_ptr() as usize;

  println!(
    "[{}] address = {:?}, {} % {} = {} -> {}-byte aligned? {}",
    label,
    ptr,
    addr,
    ALIGNMENT,
    addr % ALIGNMENT,
    ALIGNMENT,
    if addr % ALIGNMENT == 0 { "YES" } else { "NO" }
  );
}

fn print_stats(
  stats: &PoolStats,
) {
  println!(
    "    live blocks = {}, granted = {} bytes, carved = {}/{} bytes, free slots = {}",
    stats.live_blocks, stats.granted_bytes, stats.carved_bytes, stats.pool_size, stats.free_slots
  );
}

fn main() -> Result<(), quickalloc::Error> {
  // RUST_LOG=quickalloc=trace shows every allocator decision.
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
    )
    .init();

  // --------------------------------------------------------------------
  // 1) Bring up the process-wide default pool.
  // --------------------------------------------------------------------
  quickalloc::init()?;
  println!("[1] Default pool initialized");
  print_stats(&quickalloc::stats()?);

  // --------------------------------------------------------------------
  // 2) Allocate 100 bytes. Served from the 128 byte class.
  // --------------------------------------------------------------------
  let ptr = quickalloc::malloc(100)?;
  print_alignment("2", ptr);
  println!("[2] Granted {} bytes", unsafe { quickalloc::granted_size(ptr.as_ptr())? });

  unsafe { ptr.as_ptr().write_bytes(0xAB, 100) };

  // --------------------------------------------------------------------
  // 3) Grow to 200 bytes. The 128 byte class is too small, so the block
  //    moves to the 256 byte class and the first 100 bytes come along.
  //    On failure the original block would still be ours to free.
  // --------------------------------------------------------------------
  let ptr = match unsafe { quickalloc::realloc(ptr.as_ptr(), 200) } {
    Ok(Some(moved)) => moved,
    Ok(None) => unreachable!("realloc to a non-zero size always yields a block"),
    Err(err) => {
      println!("[3] Failed to reallocate: {err}");
      unsafe { quickalloc::free(ptr.as_ptr())? };
      return quickalloc::destroy();
    }
  };
  print_alignment("3", ptr);
  println!("[3] First byte after the move = {:#X}", unsafe { ptr.as_ptr().read() });
  print_stats(&quickalloc::stats()?);

  // --------------------------------------------------------------------
  // 4) Free the block, then show that a second free is caught.
  // --------------------------------------------------------------------
  unsafe { quickalloc::free(ptr.as_ptr())? };
  println!("[4] Memory freed");

  if let Err(err) = unsafe { quickalloc::free(ptr.as_ptr()) } {
    println!("[4] Second free rejected: {err}");
  }
  print_stats(&quickalloc::stats()?);

  // --------------------------------------------------------------------
  // 5) Tear the pool down. Its arena goes back to the OS.
  // --------------------------------------------------------------------
  quickalloc::destroy()?;
  println!("[5] Default pool destroyed");

  Ok(())
}
