use std::ptr::NonNull;

use segalloc::{Config, Heap};

fn print_alloc(heap: &Heap<3>, name: &str, addr: NonNull<u8>, size: usize) {
    let offset = addr.as_ptr() as usize - heap.low().as_ptr() as usize;
    println!("{name}: {size} bytes at {addr:?} (arena offset {offset})");
}

fn print_blocks(heap: &Heap<3>) {
    for block in heap.blocks() {
        let status = if block.allocated { "allocated" } else { "free" };
        println!("    [{:>6}] {:>6} bytes {status}", block.offset, block.size);
    }
}

fn main() {
    let config = Config::with_size_classes([64, 256, 1024]).arena_limit(1 << 20);
    let mut heap = Heap::with_config(config).unwrap();

    println!("Heap configured with size classes 64, 256 and 1024.");
    println!("Arena starts at {:?}, {} bytes in use.", heap.low(), heap.arena_size());

    let a = heap.allocate(40).unwrap();
    print_alloc(&heap, "A", a, 40);
    let b = heap.allocate(40).unwrap();
    print_alloc(&heap, "B", b, 40);

    println!("\nFree A and allocate 16 bytes, C should reuse A's block:");
    unsafe { heap.deallocate(Some(a)) };
    let c = heap.allocate(16).unwrap();
    print_alloc(&heap, "C", c, 16);
    print_blocks(&heap);

    println!("\nFree everything, all blocks merge back into one:");
    unsafe {
        heap.deallocate(Some(b));
        heap.deallocate(Some(c));
    }
    print_blocks(&heap);

    println!("\nLarge request grows the arena:");
    let big = heap.allocate(10_000).unwrap();
    print_alloc(&heap, "D", big, 10_000);
    println!("Arena now holds {} bytes.", heap.arena_size());

    unsafe { heap.deallocate(Some(big)) };
    assert!(heap.check_consistency(0));
}
