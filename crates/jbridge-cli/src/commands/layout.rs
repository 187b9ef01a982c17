//! `jbridge layout`: print the runtime offset table.

use jbridge_runtime::RuntimeLayout;

pub fn execute() -> anyhow::Result<()> {
    let layout = RuntimeLayout::HOST;
    println!("Runtime layout ({}-bit)", usize::BITS);
    for (field, offset) in layout.entries() {
        println!("  {:<32} {:>4}", field, offset);
    }
    println!("  {:<32} {:>4}", "frame size (1 slot)", layout.frame_size(1));
    Ok(())
}
