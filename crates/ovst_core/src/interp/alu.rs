//! Handlers for the ALU operation set.
//!
//! Each handler implements one opcode for every operation size the
//! lowering emits. Operands are read at their declared width and every
//! scalar result is stored zero extended; only 16 byte results take the
//! wide store path. Sizes outside an opcode's set abort through `fatal!`.

use crate::ir::{self, Cond, NodeId, Op};
use crate::interp::ExecCtx;

use ovst_util::BitField;

#[cfg(not(feature = "debug-cycles"))]
use std::time::{SystemTime, UNIX_EPOCH};

/// Mask of the live bits for each operation size in bytes. The entries
/// for 3, 5, 6 and 7 are 0: `Not` yields zero for those sizes, and the
/// lowering is not believed to emit them.
const SIZE_MASKS: [u64; 9] = [0, 0xff, 0xffff, 0, 0xffff_ffff, 0, 0, 0, u64::MAX];

fn bad_size(op: &Op) -> ! {
    fatal!("unhandled operation size {} for {}", op.size, op.opcode)
}

/// Store a literal.
pub(super) fn op_constant(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    ctx.set(dest, op.imm());
}

/// Materialize the guest address `offset` bytes past the block entry.
pub(super) fn op_entrypoint_offset(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    ctx.set(dest, ctx.entry.wrapping_add(op.imm()));
}

/// Fused into the consumer at lowering time; the slot is never read.
pub(super) fn op_inline(_: &Op, _: &mut ExecCtx, _: NodeId) {}

/// Wall clock timestamp in nanoseconds. The realtime clock can step
/// backwards under adjustment; kept anyway because generated guest code
/// already depends on it.
#[cfg(not(feature = "debug-cycles"))]
pub(super) fn op_cycle_counter(_: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    ctx.set(dest, now.as_nanos() as u64);
}

/// Deterministic stand-in so block runs are reproducible.
#[cfg(feature = "debug-cycles")]
pub(super) fn op_cycle_counter(_: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    ctx.set(dest, 0);
}

/// Truncate both lanes of a 64-bit pair and repack them as a 32-bit pair.
pub(super) fn op_trunc_element_pair(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let pair: u128 = ctx.value(op, 0);
            let lo = pair as u64;
            let hi = (pair >> 64) as u64;
            ctx.set(dest, (lo & 0xffff_ffff) | (hi << 32));
        }
        _ => bad_size(op),
    }
}

/// Wrapping addition.
pub(super) fn op_add(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs.wrapping_add(rhs)));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs.wrapping_add(rhs));
        }
        _ => bad_size(op),
    }
}

/// Wrapping subtraction.
pub(super) fn op_sub(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs.wrapping_sub(rhs)));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs.wrapping_sub(rhs));
        }
        _ => bad_size(op),
    }
}

/// Two's complement negation.
pub(super) fn op_neg(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let src = ctx.value::<u32>(op, 0) as i32;
            ctx.set(dest, u64::from(src.wrapping_neg() as u32));
        }
        8 => {
            let src = ctx.value::<u64>(op, 0) as i64;
            ctx.set(dest, src.wrapping_neg() as u64);
        }
        _ => bad_size(op),
    }
}

/// Signed multiplication. Size 4 keeps the whole widened product, size 8
/// the low half, size 16 the full 128-bit product.
pub(super) fn op_mul(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs = ctx.value::<u32>(op, 0) as i32;
            let rhs = ctx.value::<u32>(op, 1) as i32;
            ctx.set(dest, (i64::from(lhs) * i64::from(rhs)) as u64);
        }
        8 => {
            let lhs = ctx.value::<u64>(op, 0) as i64;
            let rhs = ctx.value::<u64>(op, 1) as i64;
            ctx.set(dest, lhs.wrapping_mul(rhs) as u64);
        }
        16 => {
            let lhs = ctx.value::<u64>(op, 0) as i64;
            let rhs = ctx.value::<u64>(op, 1) as i64;
            ctx.set_wide(dest, (i128::from(lhs) * i128::from(rhs)) as u128);
        }
        _ => bad_size(op),
    }
}

/// Unsigned multiplication, widths as in `op_mul`.
pub(super) fn op_umul(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs) * u64::from(rhs));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs.wrapping_mul(rhs));
        }
        16 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set_wide(dest, u128::from(lhs) * u128::from(rhs));
        }
        _ => bad_size(op),
    }
}

/// High half of the signed widened product.
pub(super) fn op_mulh(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs = ctx.value::<u32>(op, 0) as i32;
            let rhs = ctx.value::<u32>(op, 1) as i32;
            let prod = i64::from(lhs) * i64::from(rhs);
            ctx.set(dest, u64::from((prod >> 32) as u32));
        }
        8 => {
            let lhs = ctx.value::<u64>(op, 0) as i64;
            let rhs = ctx.value::<u64>(op, 1) as i64;
            let prod = i128::from(lhs) * i128::from(rhs);
            ctx.set(dest, (prod >> 64) as u64);
        }
        _ => bad_size(op),
    }
}

/// High half of the unsigned widened product.
pub(super) fn op_umulh(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, (u64::from(lhs) * u64::from(rhs)) >> 32);
        }
        // TODO: size 16 reuses the 64-bit kernel, so only the operands'
        // low halves contribute. A true 256-bit product changes
        // guest-visible results; audit the frontend consumers first.
        8 | 16 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            let prod = u128::from(lhs) * u128::from(rhs);
            ctx.set(dest, (prod >> 64) as u64);
        }
        _ => bad_size(op),
    }
}

/// Signed division. Divide by zero is the execution loop's problem; the
/// lowering emits explicit guards before every division that can trap.
pub(super) fn op_div(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        1 => {
            let lhs = ctx.value::<u8>(op, 0) as i8;
            let rhs = ctx.value::<u8>(op, 1) as i8;
            ctx.set(dest, u64::from(lhs.wrapping_div(rhs) as u8));
        }
        2 => {
            let lhs = ctx.value::<u16>(op, 0) as i16;
            let rhs = ctx.value::<u16>(op, 1) as i16;
            ctx.set(dest, u64::from(lhs.wrapping_div(rhs) as u16));
        }
        4 => {
            let lhs = ctx.value::<u32>(op, 0) as i32;
            let rhs = ctx.value::<u32>(op, 1) as i32;
            ctx.set(dest, u64::from(lhs.wrapping_div(rhs) as u32));
        }
        8 => {
            let lhs = ctx.value::<u64>(op, 0) as i64;
            let rhs = ctx.value::<u64>(op, 1) as i64;
            ctx.set(dest, lhs.wrapping_div(rhs) as u64);
        }
        16 => {
            let lhs = ctx.value::<u128>(op, 0) as i128;
            let rhs = ctx.value::<u128>(op, 1) as i128;
            ctx.set_wide(dest, lhs.wrapping_div(rhs) as u128);
        }
        _ => bad_size(op),
    }
}

/// Unsigned division.
pub(super) fn op_udiv(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        1 => {
            let lhs: u8 = ctx.value(op, 0);
            let rhs: u8 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs / rhs));
        }
        2 => {
            let lhs: u16 = ctx.value(op, 0);
            let rhs: u16 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs / rhs));
        }
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs / rhs));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs / rhs);
        }
        16 => {
            let lhs: u128 = ctx.value(op, 0);
            let rhs: u128 = ctx.value(op, 1);
            ctx.set_wide(dest, lhs / rhs);
        }
        _ => bad_size(op),
    }
}

/// Signed remainder.
pub(super) fn op_rem(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        1 => {
            let lhs = ctx.value::<u8>(op, 0) as i8;
            let rhs = ctx.value::<u8>(op, 1) as i8;
            ctx.set(dest, u64::from(lhs.wrapping_rem(rhs) as u8));
        }
        2 => {
            let lhs = ctx.value::<u16>(op, 0) as i16;
            let rhs = ctx.value::<u16>(op, 1) as i16;
            ctx.set(dest, u64::from(lhs.wrapping_rem(rhs) as u16));
        }
        4 => {
            let lhs = ctx.value::<u32>(op, 0) as i32;
            let rhs = ctx.value::<u32>(op, 1) as i32;
            ctx.set(dest, u64::from(lhs.wrapping_rem(rhs) as u32));
        }
        8 => {
            let lhs = ctx.value::<u64>(op, 0) as i64;
            let rhs = ctx.value::<u64>(op, 1) as i64;
            ctx.set(dest, lhs.wrapping_rem(rhs) as u64);
        }
        16 => {
            let lhs = ctx.value::<u128>(op, 0) as i128;
            let rhs = ctx.value::<u128>(op, 1) as i128;
            ctx.set_wide(dest, lhs.wrapping_rem(rhs) as u128);
        }
        _ => bad_size(op),
    }
}

/// Unsigned remainder.
pub(super) fn op_urem(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        1 => {
            let lhs: u8 = ctx.value(op, 0);
            let rhs: u8 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs % rhs));
        }
        2 => {
            let lhs: u16 = ctx.value(op, 0);
            let rhs: u16 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs % rhs));
        }
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs % rhs));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs % rhs);
        }
        16 => {
            let lhs: u128 = ctx.value(op, 0);
            let rhs: u128 = ctx.value(op, 1);
            ctx.set_wide(dest, lhs % rhs);
        }
        _ => bad_size(op),
    }
}

/// Signed long divide: quotient of the double width dividend built from
/// `(low, high)`, truncated to the operation size.
pub(super) fn op_ldiv(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        2 => {
            let low: u16 = ctx.value(op, 0);
            let high: u16 = ctx.value(op, 1);
            let divisor = i32::from(ctx.value::<u16>(op, 2) as i16);
            let dividend = (i32::from(high as i16) << 16) | i32::from(low);
            ctx.set(dest, u64::from(dividend.wrapping_div(divisor) as u16));
        }
        4 => {
            let low: u32 = ctx.value(op, 0);
            let high: u32 = ctx.value(op, 1);
            let divisor = i64::from(ctx.value::<u32>(op, 2) as i32);
            let dividend = (i64::from(high as i32) << 32) | i64::from(low);
            ctx.set(dest, u64::from(dividend.wrapping_div(divisor) as u32));
        }
        8 => {
            let low: u64 = ctx.value(op, 0);
            let high: u64 = ctx.value(op, 1);
            let divisor = i128::from(ctx.value::<u64>(op, 2) as i64);
            let dividend = (i128::from(high as i64) << 64) | i128::from(low);
            ctx.set(dest, dividend.wrapping_div(divisor) as u64);
        }
        _ => bad_size(op),
    }
}

/// Unsigned long divide.
pub(super) fn op_ludiv(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        2 => {
            let low: u16 = ctx.value(op, 0);
            let high: u16 = ctx.value(op, 1);
            let divisor = u32::from(ctx.value::<u16>(op, 2));
            let dividend = (u32::from(high) << 16) | u32::from(low);
            ctx.set(dest, u64::from((dividend / divisor) as u16));
        }
        4 => {
            let low: u32 = ctx.value(op, 0);
            let high: u32 = ctx.value(op, 1);
            let divisor = u64::from(ctx.value::<u32>(op, 2));
            let dividend = (u64::from(high) << 32) | u64::from(low);
            ctx.set(dest, u64::from((dividend / divisor) as u32));
        }
        8 => {
            let low: u64 = ctx.value(op, 0);
            let high: u64 = ctx.value(op, 1);
            let divisor = u128::from(ctx.value::<u64>(op, 2));
            let dividend = (u128::from(high) << 64) | u128::from(low);
            ctx.set(dest, (dividend / divisor) as u64);
        }
        _ => bad_size(op),
    }
}

/// Signed long remainder.
pub(super) fn op_lrem(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        2 => {
            let low: u16 = ctx.value(op, 0);
            let high: u16 = ctx.value(op, 1);
            let divisor = i32::from(ctx.value::<u16>(op, 2) as i16);
            let dividend = (i32::from(high as i16) << 16) | i32::from(low);
            ctx.set(dest, u64::from(dividend.wrapping_rem(divisor) as u16));
        }
        4 => {
            let low: u32 = ctx.value(op, 0);
            let high: u32 = ctx.value(op, 1);
            let divisor = i64::from(ctx.value::<u32>(op, 2) as i32);
            let dividend = (i64::from(high as i32) << 32) | i64::from(low);
            ctx.set(dest, u64::from(dividend.wrapping_rem(divisor) as u32));
        }
        8 => {
            let low: u64 = ctx.value(op, 0);
            let high: u64 = ctx.value(op, 1);
            let divisor = i128::from(ctx.value::<u64>(op, 2) as i64);
            let dividend = (i128::from(high as i64) << 64) | i128::from(low);
            ctx.set(dest, dividend.wrapping_rem(divisor) as u64);
        }
        _ => bad_size(op),
    }
}

/// Unsigned long remainder.
pub(super) fn op_lurem(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        2 => {
            let low: u16 = ctx.value(op, 0);
            let high: u16 = ctx.value(op, 1);
            let divisor = u32::from(ctx.value::<u16>(op, 2));
            let dividend = (u32::from(high) << 16) | u32::from(low);
            ctx.set(dest, u64::from((dividend % divisor) as u16));
        }
        4 => {
            let low: u32 = ctx.value(op, 0);
            let high: u32 = ctx.value(op, 1);
            let divisor = u64::from(ctx.value::<u32>(op, 2));
            let dividend = (u64::from(high) << 32) | u64::from(low);
            ctx.set(dest, u64::from((dividend % divisor) as u32));
        }
        8 => {
            let low: u64 = ctx.value(op, 0);
            let high: u64 = ctx.value(op, 1);
            let divisor = u128::from(ctx.value::<u64>(op, 2));
            let dividend = (u128::from(high) << 64) | u128::from(low);
            ctx.set(dest, (dividend % divisor) as u64);
        }
        _ => bad_size(op),
    }
}

/// Bitwise or. The only bitwise operation the lowering also emits at 16
/// bytes, for flag pair merges.
pub(super) fn op_or(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        1 => {
            let lhs: u8 = ctx.value(op, 0);
            let rhs: u8 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs | rhs));
        }
        2 => {
            let lhs: u16 = ctx.value(op, 0);
            let rhs: u16 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs | rhs));
        }
        4 => {
            let lhs: u32 = ctx.value(op, 0);
            let rhs: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(lhs | rhs));
        }
        8 => {
            let lhs: u64 = ctx.value(op, 0);
            let rhs: u64 = ctx.value(op, 1);
            ctx.set(dest, lhs | rhs);
        }
        16 => {
            let lhs: u128 = ctx.value(op, 0);
            let rhs: u128 = ctx.value(op, 1);
            ctx.set_wide(dest, lhs | rhs);
        }
        _ => bad_size(op),
    }
}

macro_rules! bitwise_op {
    ($name:ident, $doc:literal, |$lhs:ident, $rhs:ident| $expr:expr) => {
        #[doc = $doc]
        pub(super) fn $name(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
            match op.size {
                1 => {
                    let $lhs: u8 = ctx.value(op, 0);
                    let $rhs: u8 = ctx.value(op, 1);
                    ctx.set(dest, u64::from($expr));
                }
                2 => {
                    let $lhs: u16 = ctx.value(op, 0);
                    let $rhs: u16 = ctx.value(op, 1);
                    ctx.set(dest, u64::from($expr));
                }
                4 => {
                    let $lhs: u32 = ctx.value(op, 0);
                    let $rhs: u32 = ctx.value(op, 1);
                    ctx.set(dest, u64::from($expr));
                }
                8 => {
                    let $lhs: u64 = ctx.value(op, 0);
                    let $rhs: u64 = ctx.value(op, 1);
                    ctx.set(dest, $expr);
                }
                _ => bad_size(op),
            }
        }
    };
}

bitwise_op!(op_and, "Bitwise and.", |lhs, rhs| lhs & rhs);
bitwise_op!(op_andn, "Bitwise and with inverted second operand.", |lhs, rhs| lhs & !rhs);
bitwise_op!(op_xor, "Bitwise exclusive or.", |lhs, rhs| lhs ^ rhs);

/// Bitwise not, masked to the live bits of the operation size.
pub(super) fn op_not(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    if op.size as usize >= SIZE_MASKS.len() {
        bad_size(op);
    }
    debug_assert!(
        matches!(op.size, 1 | 2 | 4 | 8),
        "not at size {} never occurs",
        op.size
    );
    let src: u64 = ctx.value(op, 0);
    ctx.set(dest, !src & SIZE_MASKS[op.size as usize]);
}

/// Logical shift left. The amount is masked to the bit width.
pub(super) fn op_lshl(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let src: u32 = ctx.value(op, 0);
            let amount: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(src << (amount & 31)));
        }
        8 => {
            let src: u64 = ctx.value(op, 0);
            let amount: u64 = ctx.value(op, 1);
            ctx.set(dest, src << (amount & 63));
        }
        _ => bad_size(op),
    }
}

/// Logical shift right.
pub(super) fn op_lshr(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let src: u32 = ctx.value(op, 0);
            let amount: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(src >> (amount & 31)));
        }
        8 => {
            let src: u64 = ctx.value(op, 0);
            let amount: u64 = ctx.value(op, 1);
            ctx.set(dest, src >> (amount & 63));
        }
        _ => bad_size(op),
    }
}

/// Arithmetic shift right.
pub(super) fn op_ashr(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let src = ctx.value::<u32>(op, 0) as i32;
            let amount: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from((src >> (amount & 31)) as u32));
        }
        8 => {
            let src = ctx.value::<u64>(op, 0) as i64;
            let amount: u64 = ctx.value(op, 1);
            ctx.set(dest, (src >> (amount & 63)) as u64);
        }
        _ => bad_size(op),
    }
}

/// Rotate right.
pub(super) fn op_ror(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        4 => {
            let src: u32 = ctx.value(op, 0);
            let amount: u32 = ctx.value(op, 1);
            ctx.set(dest, u64::from(src.rotate_right(amount & 31)));
        }
        8 => {
            let src: u64 = ctx.value(op, 0);
            let amount: u64 = ctx.value(op, 1);
            ctx.set(dest, src.rotate_right((amount & 63) as u32));
        }
        _ => bad_size(op),
    }
}

/// Bitfield at `lsb` of the concatenation of both operands, truncated to
/// the operation size.
pub(super) fn op_extr(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let lsb = u32::from(op.lsb());
    match op.size {
        4 => {
            let high: u32 = ctx.value(op, 0);
            let low: u32 = ctx.value(op, 1);
            let full = (u64::from(high) << 32) | u64::from(low);
            ctx.set(dest, u64::from((full >> lsb) as u32));
        }
        8 => {
            let high: u64 = ctx.value(op, 0);
            let low: u64 = ctx.value(op, 1);
            let full = (u128::from(high) << 64) | u128::from(low);
            ctx.set(dest, (full >> lsb) as u64);
        }
        _ => bad_size(op),
    }
}

/// Insert the low `width` bits of the second operand into the first at
/// `lsb`.
pub(super) fn op_bfi(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let (width, lsb) = op.bitfield();
    let dst: u64 = ctx.value(op, 0);
    let src: u64 = ctx.value(op, 1);
    ctx.set(dest, dst.with_field(u32::from(lsb), u32::from(width), src));
}

/// Extract `width` bits at `lsb`, zero extended.
pub(super) fn op_bfe(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    if op.size > 8 {
        bad_size(op);
    }
    let (width, lsb) = op.bitfield();
    let src: u64 = ctx.value(op, 0);
    ctx.set(dest, src.field(u32::from(lsb), u32::from(width)));
}

/// Extract `width` bits at `lsb`, sign extended to 64 bits.
pub(super) fn op_sbfe(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    if op.size > 8 {
        bad_size(op);
    }
    let (width, lsb) = op.bitfield();
    let field = ctx.value::<u64>(op, 0).field(u32::from(lsb), u32::from(width));
    let shift = 64 - u32::from(width);
    ctx.set(dest, ((field << shift) as i64 >> shift) as u64);
}

/// Count set bits.
pub(super) fn op_popcount(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let bits = match op.size {
        1 => ctx.value::<u8>(op, 0).count_ones(),
        2 => ctx.value::<u16>(op, 0).count_ones(),
        4 => ctx.value::<u32>(op, 0).count_ones(),
        8 => ctx.value::<u64>(op, 0).count_ones(),
        _ => bad_size(op),
    };
    ctx.set(dest, u64::from(bits));
}

/// Position of the lowest set bit, or -1 when the input is zero (the
/// find-first-set convention minus one).
pub(super) fn op_find_lsb(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let src = match op.size {
        1 => u64::from(ctx.value::<u8>(op, 0)),
        2 => u64::from(ctx.value::<u16>(op, 0)),
        4 => u64::from(ctx.value::<u32>(op, 0)),
        8 => ctx.value::<u64>(op, 0),
        _ => bad_size(op),
    };
    let found = if src == 0 {
        -1i64 as u64
    } else {
        u64::from(src.trailing_zeros())
    };
    ctx.set(dest, found);
}

/// Position of the highest set bit; -1 when the input is zero.
pub(super) fn op_find_msb(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let (bits, lz) = match op.size {
        1 => (8u64, ctx.value::<u8>(op, 0).leading_zeros()),
        2 => (16, ctx.value::<u16>(op, 0).leading_zeros()),
        4 => (32, ctx.value::<u32>(op, 0).leading_zeros()),
        8 => (64, ctx.value::<u64>(op, 0).leading_zeros()),
        _ => bad_size(op),
    };
    ctx.set(dest, bits.wrapping_sub(u64::from(lz)).wrapping_sub(1));
}

/// Count of trailing zero bits at the declared width.
pub(super) fn op_find_trailing_zeros(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let count = match op.size {
        1 => ctx.value::<u8>(op, 0).trailing_zeros(),
        2 => ctx.value::<u16>(op, 0).trailing_zeros(),
        4 => ctx.value::<u32>(op, 0).trailing_zeros(),
        8 => ctx.value::<u64>(op, 0).trailing_zeros(),
        _ => bad_size(op),
    };
    ctx.set(dest, u64::from(count));
}

/// Count of leading zero bits at the declared width.
pub(super) fn op_count_leading_zeroes(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let count = match op.size {
        1 => ctx.value::<u8>(op, 0).leading_zeros(),
        2 => ctx.value::<u16>(op, 0).leading_zeros(),
        4 => ctx.value::<u32>(op, 0).leading_zeros(),
        8 => ctx.value::<u64>(op, 0).leading_zeros(),
        _ => bad_size(op),
    };
    ctx.set(dest, u64::from(count));
}

/// Byte reversal.
pub(super) fn op_rev(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    match op.size {
        2 => {
            let src: u16 = ctx.value(op, 0);
            ctx.set(dest, u64::from(src.swap_bytes()));
        }
        4 => {
            let src: u32 = ctx.value(op, 0);
            ctx.set(dest, u64::from(src.swap_bytes()));
        }
        8 => {
            let src: u64 = ctx.value(op, 0);
            ctx.set(dest, src.swap_bytes());
        }
        _ => bad_size(op),
    }
}

/// Float compare outcomes for the float condition codes. NaN operands
/// make every ordered compare false.
fn float_cond<T: PartialOrd>(cond: Cond, lhs: T, rhs: T, unordered: bool) -> bool {
    match cond {
        Cond::Flu => lhs < rhs || unordered,
        Cond::Fge => lhs >= rhs,
        Cond::Fle => lhs <= rhs,
        Cond::Fgt => lhs > rhs,
        Cond::Fu => unordered,
        Cond::Fnu => !unordered,
        _ => unreachable!(),
    }
}

fn cond_holds_32(cond: Cond, lhs: u32, rhs: u32) -> bool {
    match cond {
        Cond::Eq => lhs == rhs,
        Cond::Neq => lhs != rhs,
        Cond::Sge => (lhs as i32) >= (rhs as i32),
        Cond::Slt => (lhs as i32) < (rhs as i32),
        Cond::Sgt => (lhs as i32) > (rhs as i32),
        Cond::Sle => (lhs as i32) <= (rhs as i32),
        Cond::Uge => lhs >= rhs,
        Cond::Ult => lhs < rhs,
        Cond::Ugt => lhs > rhs,
        Cond::Ule => lhs <= rhs,
        _ => {
            let lhs = f32::from_bits(lhs);
            let rhs = f32::from_bits(rhs);
            float_cond(cond, lhs, rhs, lhs.is_nan() || rhs.is_nan())
        }
    }
}

fn cond_holds_64(cond: Cond, lhs: u64, rhs: u64) -> bool {
    match cond {
        Cond::Eq => lhs == rhs,
        Cond::Neq => lhs != rhs,
        Cond::Sge => (lhs as i64) >= (rhs as i64),
        Cond::Slt => (lhs as i64) < (rhs as i64),
        Cond::Sgt => (lhs as i64) > (rhs as i64),
        Cond::Sle => (lhs as i64) <= (rhs as i64),
        Cond::Uge => lhs >= rhs,
        Cond::Ult => lhs < rhs,
        Cond::Ugt => lhs > rhs,
        Cond::Ule => lhs <= rhs,
        _ => {
            let lhs = f64::from_bits(lhs);
            let rhs = f64::from_bits(rhs);
            float_cond(cond, lhs, rhs, lhs.is_nan() || rhs.is_nan())
        }
    }
}

/// Conditional move: compare the first operand pair, pick one of the
/// second pair.
pub(super) fn op_select(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let (cond, cmp_size) = op.cond();
    let taken = match cmp_size {
        4 => cond_holds_32(cond, ctx.value(op, 0), ctx.value(op, 1)),
        8 => cond_holds_64(cond, ctx.value(op, 0), ctx.value(op, 1)),
        _ => fatal!("unhandled compare size {} for {}", cmp_size, op.opcode),
    };
    let picked = if taken { 2 } else { 3 };
    let result = match op.size {
        4 => u64::from(ctx.value::<u32>(op, picked)),
        8 => ctx.value::<u64>(op, picked),
        _ => bad_size(op),
    };
    ctx.set(dest, result);
}

/// Move one vector lane to a scalar of the element width.
pub(super) fn op_vextract_to_gpr(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let esize = u32::from(op.elem);
    let shift = u32::from(op.lane()) * esize * 8;
    let lane = match ctx.block.op_size(op.arg(0)) {
        8 => u128::from(ctx.value::<u64>(op, 0)) >> shift,
        16 => ctx.value::<u128>(op, 0) >> shift,
        width => fatal!("unhandled vector width {} for {}", width, op.opcode),
    };
    let scalar = (lane as u64).field(0, esize * 8);
    ctx.scratch
        .copy_bytes(dest, &bytemuck::bytes_of(&scalar)[..esize as usize]);
}

/// Float to integer conversion, truncating toward zero.
pub(super) fn op_float_to_gpr_zs(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let result = match (op.size, op.elem) {
        (8, 4) => ctx.value::<f32>(op, 0) as i64 as u64,
        (8, 8) => ctx.value::<f64>(op, 0) as i64 as u64,
        (4, 4) => u64::from(ctx.value::<f32>(op, 0) as i32 as u32),
        (4, 8) => u64::from(ctx.value::<f64>(op, 0) as i32 as u32),
        _ => fatal!(
            "unhandled conversion {}.{} for {}",
            op.size,
            op.elem,
            op.opcode
        ),
    };
    ctx.set(dest, result);
}

/// Float to integer conversion, rounding to nearest even first.
pub(super) fn op_float_to_gpr_s(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let result = match (op.size, op.elem) {
        (8, 4) => ctx.value::<f32>(op, 0).round_ties_even() as i64 as u64,
        (8, 8) => ctx.value::<f64>(op, 0).round_ties_even() as i64 as u64,
        (4, 4) => u64::from(ctx.value::<f32>(op, 0).round_ties_even() as i32 as u32),
        (4, 8) => u64::from(ctx.value::<f64>(op, 0).round_ties_even() as i32 as u32),
        _ => fatal!(
            "unhandled conversion {}.{} for {}",
            op.size,
            op.elem,
            op.opcode
        ),
    };
    ctx.set(dest, result);
}

/// Float compare producing the less-than / equal / unordered flag triple.
/// Unordered inputs set every requested ordering flag.
pub(super) fn op_fcmp(op: &Op, ctx: &mut ExecCtx, dest: NodeId) {
    let flags = op.cmp_flags();
    let (lt, eq, unordered) = match op.elem {
        4 => {
            let lhs: f32 = ctx.value(op, 0);
            let rhs: f32 = ctx.value(op, 1);
            (lhs < rhs, lhs == rhs, lhs.is_nan() || rhs.is_nan())
        }
        8 => {
            let lhs: f64 = ctx.value(op, 0);
            let rhs: f64 = ctx.value(op, 1);
            (lhs < rhs, lhs == rhs, lhs.is_nan() || rhs.is_nan())
        }
        elem => fatal!("unhandled element size {} for {}", elem, op.opcode),
    };

    let mut result = 0u64;
    if flags.bit(ir::FCMP_FLAG_LT) {
        result = result.with_bit(ir::FCMP_FLAG_LT, lt | unordered);
    }
    if flags.bit(ir::FCMP_FLAG_EQ) {
        result = result.with_bit(ir::FCMP_FLAG_EQ, eq | unordered);
    }
    if flags.bit(ir::FCMP_FLAG_UNORDERED) {
        result = result.with_bit(ir::FCMP_FLAG_UNORDERED, unordered);
    }
    ctx.set(dest, result);
}
