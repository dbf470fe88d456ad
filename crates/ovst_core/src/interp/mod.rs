//! Dispatch from opcode to handler.
//!
//! Every opcode this core owns maps to one handler function through a
//! dense table indexed by the opcode tag. The table is built once by
//! [`register_handlers`] and immutable afterwards, so the execution loop
//! can call [`execute`] from any number of threads as long as each thread
//! brings its own context and scratch buffer.

mod alu;

use crate::ir::{Block, NodeId, Op, Opcode};
use crate::scratch::ScratchBuf;

use bytemuck::Pod;

use std::sync::OnceLock;

/// An opcode handler. Reads operand slots through the context and writes
/// the node's result to the destination slot. Handlers do not return a
/// value; malformed input aborts through `fatal!`.
pub type Handler = fn(&Op, &mut ExecCtx, NodeId);

/// Everything a handler may touch while executing one operation.
pub struct ExecCtx<'a> {
    /// Scratch slots of the block being executed. Owned by the execution
    /// loop; handlers never keep the borrow past their call.
    pub scratch: &'a mut ScratchBuf,
    /// The block, for operand width lookups.
    pub block: &'a Block,
    /// Guest address of the block's first instruction.
    pub entry: u64,
}

impl<'a> ExecCtx<'a> {
    pub fn new(scratch: &'a mut ScratchBuf, block: &'a Block, entry: u64) -> Self {
        Self {
            scratch,
            block,
            entry,
        }
    }

    /// Read operand `index` of `op` reinterpreted as `T`.
    fn value<T: Pod>(&self, op: &Op, index: usize) -> T {
        self.scratch.read(op.arg(index))
    }

    /// Store a scalar result, zero extended to the full slot.
    fn set(&mut self, node: NodeId, val: u64) {
        self.scratch.write(node, val);
    }

    /// Store a 16 byte result.
    fn set_wide(&mut self, node: NodeId, val: u128) {
        self.scratch.write(node, val);
    }
}

static HANDLERS: OnceLock<[Handler; Opcode::COUNT]> = OnceLock::new();

/// Build the handler table. Must run once before the first [`execute`];
/// repeated calls are no-ops. After this the table is read-only and safe
/// to share between threads.
pub fn register_handlers() {
    HANDLERS.get_or_init(|| {
        debug!("populating the alu dispatch table");
        handler_table()
    });
}

/// Execute a single operation, writing its result into `node`'s slot.
pub fn execute(op: &Op, ctx: &mut ExecCtx, node: NodeId) {
    let Some(table) = HANDLERS.get() else {
        fatal!("execute called before register_handlers");
    };
    table[op.opcode as usize](op, ctx, node);
}

/// Filler for table slots nothing registered. Reaching it means the
/// execution loop routed a record here that belongs to another backend.
fn op_unhandled(op: &Op, _: &mut ExecCtx, _: NodeId) {
    fatal!("unhandled opcode {} (size {})", op.opcode, op.size);
}

fn handler_table() -> [Handler; Opcode::COUNT] {
    let mut table: [Handler; Opcode::COUNT] = [op_unhandled; Opcode::COUNT];
    table[Opcode::TruncElementPair as usize] = alu::op_trunc_element_pair;
    table[Opcode::Constant as usize] = alu::op_constant;
    table[Opcode::EntrypointOffset as usize] = alu::op_entrypoint_offset;
    table[Opcode::InlineConstant as usize] = alu::op_inline;
    table[Opcode::InlineEntrypointOffset as usize] = alu::op_inline;
    table[Opcode::CycleCounter as usize] = alu::op_cycle_counter;
    table[Opcode::Add as usize] = alu::op_add;
    table[Opcode::Sub as usize] = alu::op_sub;
    table[Opcode::Neg as usize] = alu::op_neg;
    table[Opcode::Mul as usize] = alu::op_mul;
    table[Opcode::UMul as usize] = alu::op_umul;
    table[Opcode::Div as usize] = alu::op_div;
    table[Opcode::UDiv as usize] = alu::op_udiv;
    table[Opcode::Rem as usize] = alu::op_rem;
    table[Opcode::URem as usize] = alu::op_urem;
    table[Opcode::MulH as usize] = alu::op_mulh;
    table[Opcode::UMulH as usize] = alu::op_umulh;
    table[Opcode::Or as usize] = alu::op_or;
    table[Opcode::And as usize] = alu::op_and;
    table[Opcode::Andn as usize] = alu::op_andn;
    table[Opcode::Xor as usize] = alu::op_xor;
    table[Opcode::Lshl as usize] = alu::op_lshl;
    table[Opcode::Lshr as usize] = alu::op_lshr;
    table[Opcode::Ashr as usize] = alu::op_ashr;
    table[Opcode::Ror as usize] = alu::op_ror;
    table[Opcode::Extr as usize] = alu::op_extr;
    table[Opcode::LDiv as usize] = alu::op_ldiv;
    table[Opcode::LUDiv as usize] = alu::op_ludiv;
    table[Opcode::LRem as usize] = alu::op_lrem;
    table[Opcode::LURem as usize] = alu::op_lurem;
    table[Opcode::Not as usize] = alu::op_not;
    table[Opcode::Popcount as usize] = alu::op_popcount;
    table[Opcode::FindLsb as usize] = alu::op_find_lsb;
    table[Opcode::FindMsb as usize] = alu::op_find_msb;
    table[Opcode::FindTrailingZeros as usize] = alu::op_find_trailing_zeros;
    table[Opcode::CountLeadingZeroes as usize] = alu::op_count_leading_zeroes;
    table[Opcode::Rev as usize] = alu::op_rev;
    table[Opcode::Bfi as usize] = alu::op_bfi;
    table[Opcode::Bfe as usize] = alu::op_bfe;
    table[Opcode::Sbfe as usize] = alu::op_sbfe;
    table[Opcode::Select as usize] = alu::op_select;
    table[Opcode::VExtractToGpr as usize] = alu::op_vextract_to_gpr;
    table[Opcode::FloatToGprZs as usize] = alu::op_float_to_gpr_zs;
    table[Opcode::FloatToGprS as usize] = alu::op_float_to_gpr_s;
    table[Opcode::FCmp as usize] = alu::op_fcmp;
    table
}
