mod bitfield;

use crate::interp::{self, ExecCtx};
use crate::ir::{Block, NodeId};
use crate::scratch::ScratchBuf;

/// Interpret every node of `block` in order with entry address 0 and hand
/// back the scratch buffer for inspection.
pub fn run_block(block: &Block) -> ScratchBuf {
    run_seeded(block, 0, &[])
}

pub fn run_block_at(block: &Block, entry: u64) -> ScratchBuf {
    run_seeded(block, entry, &[])
}

/// Run `block`, first seeding the given node slots. Seeded nodes are not
/// executed; they stand in for values this core does not produce itself,
/// like vector loads.
pub fn run_seeded(block: &Block, entry: u64, seed: &[(NodeId, u128)]) -> ScratchBuf {
    interp::register_handlers();
    if let Err(error) = block.validate() {
        panic!("{error}");
    }

    let mut scratch = ScratchBuf::new(block.len());
    for &(node, val) in seed {
        scratch.write(node, val);
    }

    let mut ctx = ExecCtx::new(&mut scratch, block, entry);
    for (at, op) in block.ops().iter().enumerate() {
        let node = NodeId(at as u32);
        if seed.iter().any(|&(seeded, _)| seeded == node) {
            continue;
        }
        interp::execute(op, &mut ctx, node);
    }
    scratch
}
