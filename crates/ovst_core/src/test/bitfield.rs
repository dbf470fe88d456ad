use super::{run_block, run_seeded};
use crate::ir::{Block, Opcode};

#[test]
fn extr_concatenates_and_shifts() {
    let mut block = Block::new();
    let high = block.constant(8, 0x0123_4567_89ab_cdef);
    let low = block.constant(8, 0xfedc_ba98_7654_3210);
    let picked = block.extract(8, high, low, 8);
    assert_eq!(run_block(&block).read::<u64>(picked), 0xeffe_dcba_9876_5432);
}

#[test]
fn extr_truncates_to_32() {
    let mut block = Block::new();
    let high = block.constant(4, 0xaabb_ccdd);
    let low = block.constant(4, 0x1122_3344);
    let picked = block.extract(4, high, low, 16);
    assert_eq!(run_block(&block).read::<u64>(picked), 0xccdd_1122);
}

#[test]
fn extr_by_zero_is_the_low_half() {
    let mut block = Block::new();
    let high = block.constant(8, 0x1111_2222_3333_4444);
    let low = block.constant(8, 0x5555_6666_7777_8888);
    let picked = block.extract(8, high, low, 0);
    assert_eq!(run_block(&block).read::<u64>(picked), 0x5555_6666_7777_8888);
}

#[test]
fn bfi_replaces_the_field() {
    let mut block = Block::new();
    let dst = block.constant(4, 0xdead_beef);
    let src = block.constant(4, 0);
    let merged = block.bitfield_insert(4, dst, src, 8, 16);
    assert_eq!(run_block(&block).read::<u64>(merged), 0xde00_beef);
}

#[test]
fn bfi_full_width_replaces_everything() {
    let mut block = Block::new();
    let dst = block.constant(8, 0xffff_ffff_ffff_ffff);
    let src = block.constant(8, 0x1234);
    let merged = block.bitfield_insert(8, dst, src, 64, 0);
    assert_eq!(run_block(&block).read::<u64>(merged), 0x1234);
}

#[test]
fn bfe_zero_extends_the_field() {
    let mut block = Block::new();
    let src = block.constant(4, 0xdead_beef);
    let field = block.bitfield_extract(Opcode::Bfe, 4, src, 8, 16);
    assert_eq!(run_block(&block).read::<u64>(field), 0xad);
}

#[test]
fn bfe_full_width_is_identity() {
    let mut block = Block::new();
    let src = block.constant(8, u64::MAX);
    let field = block.bitfield_extract(Opcode::Bfe, 8, src, 64, 0);
    assert_eq!(run_block(&block).read::<u64>(field), u64::MAX);
}

#[test]
fn bfe_then_bfi_round_trips() {
    let mut block = Block::new();
    let src = block.constant(8, 0xdead_beef_0123_4567);
    let field = block.bitfield_extract(Opcode::Bfe, 8, src, 20, 12);
    let merged = block.bitfield_insert(8, src, field, 20, 12);

    let scratch = run_block(&block);
    assert_eq!(scratch.read::<u64>(field), (0xdead_beef_0123_4567u64 >> 12) & 0xf_ffff);
    // Re-inserting the extracted field reproduces the original value.
    assert_eq!(scratch.read::<u64>(merged), 0xdead_beef_0123_4567);
}

#[test]
fn sbfe_sign_extends_negative_fields() {
    let mut block = Block::new();
    let src = block.constant(4, 0xf);
    let field = block.bitfield_extract(Opcode::Sbfe, 4, src, 4, 0);
    assert_eq!(run_block(&block).read::<u64>(field), u64::MAX);
}

#[test]
fn sbfe_keeps_positive_fields() {
    let mut block = Block::new();
    let src = block.constant(4, 0x7);
    let field = block.bitfield_extract(Opcode::Sbfe, 4, src, 4, 0);
    assert_eq!(run_block(&block).read::<u64>(field), 7);
}

#[test]
fn sbfe_of_inserted_field_sign_extends() {
    let mut block = Block::new();
    let zero = block.constant(8, 0);
    let nine = block.constant(8, 0x9);
    let packed = block.bitfield_insert(8, zero, nine, 4, 8);
    let unpacked = block.bitfield_extract(Opcode::Sbfe, 8, packed, 4, 8);

    let scratch = run_block(&block);
    assert_eq!(scratch.read::<u64>(packed), 0x900);
    assert_eq!(scratch.read::<u64>(unpacked), -7i64 as u64);
}

#[test]
fn trunc_element_pair_packs_both_lanes() {
    let mut block = Block::new();
    let pair = block.constant(16, 0);
    let packed = block.trunc_element_pair(pair);

    let lanes = (0x1111_2222_3333_4444u128 << 64) | 0xaaaa_bbbb_cccc_dddd;
    let scratch = run_seeded(&block, 0, &[(pair, lanes)]);
    assert_eq!(scratch.read::<u64>(packed), 0x3333_4444_cccc_dddd);
}
