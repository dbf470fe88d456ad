//! Structural checks for lowered blocks.
//!
//! The interpreter trusts its input and faults fatally on malformed
//! records, so debug flows run every freshly lowered block through
//! [`Block::validate`] first and get a recoverable error instead.

use super::{Block, NodeId, Op, Opcode, Payload};
use crate::bucket::BucketList;

use thiserror::Error;

/// Ways a lowered block can be malformed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    #[error("node {node} reads operand {arg} before it is defined")]
    UseBeforeDef { node: NodeId, arg: NodeId },
    #[error("node {node}: size {size} is not valid for {opcode}")]
    BadSize {
        node: NodeId,
        opcode: Opcode,
        size: u8,
    },
    #[error("node {node}: element size {elem} is not valid for {opcode}")]
    BadElemSize {
        node: NodeId,
        opcode: Opcode,
        elem: u8,
    },
    #[error("node {node}: compare size {size} is not valid for {opcode}")]
    BadCompareSize {
        node: NodeId,
        opcode: Opcode,
        size: u8,
    },
    #[error("node {node}: {opcode} carries the wrong payload kind")]
    BadPayload { node: NodeId, opcode: Opcode },
    #[error("node {node}: bitfield of width {width} at bit {lsb} does not fit in 64 bits")]
    BadField { node: NodeId, width: u8, lsb: u8 },
    #[error("node {node}: vector operand {arg} has width {size}")]
    BadVectorWidth { node: NodeId, arg: NodeId, size: u8 },
}

impl Block {
    /// Check the structural invariants the interpreter relies on. Returns
    /// the first violation found in node order.
    pub fn validate(&self) -> Result<(), BlockError> {
        for (at, op) in self.ops().iter().enumerate() {
            let node = NodeId(at as u32);
            for arg in 0..op.opcode.arg_count() {
                if op.args[arg].idx() >= at {
                    return Err(BlockError::UseBeforeDef {
                        node,
                        arg: op.args[arg],
                    });
                }
            }
            if !op.opcode.sizes().contains(&op.size) {
                return Err(BlockError::BadSize {
                    node,
                    opcode: op.opcode,
                    size: op.size,
                });
            }
            self.validate_payload(node, op)?;
        }

        if log_enabled!(log::Level::Debug) {
            self.log_dead_nodes();
        }
        Ok(())
    }

    fn validate_payload(&self, node: NodeId, op: &Op) -> Result<(), BlockError> {
        let kind_ok = match op.opcode {
            Opcode::Constant
            | Opcode::EntrypointOffset
            | Opcode::InlineConstant
            | Opcode::InlineEntrypointOffset => matches!(op.payload, Payload::Imm(_)),
            Opcode::Bfi | Opcode::Bfe | Opcode::Sbfe => {
                matches!(op.payload, Payload::Bitfield { .. })
            }
            Opcode::Extr => matches!(op.payload, Payload::Lsb(_)),
            Opcode::Select => matches!(op.payload, Payload::Cond { .. }),
            Opcode::VExtractToGpr => matches!(op.payload, Payload::Lane(_)),
            Opcode::FCmp => matches!(op.payload, Payload::CmpFlags(_)),
            _ => matches!(op.payload, Payload::None),
        };
        if !kind_ok {
            return Err(BlockError::BadPayload {
                node,
                opcode: op.opcode,
            });
        }

        match op.payload {
            Payload::Bitfield { width, lsb } => {
                if width == 0 || width > 64 || u32::from(width) + u32::from(lsb) > 64 {
                    return Err(BlockError::BadField { node, width, lsb });
                }
            }
            Payload::Cond { cmp_size, .. } => {
                if !matches!(cmp_size, 4 | 8) {
                    return Err(BlockError::BadCompareSize {
                        node,
                        opcode: op.opcode,
                        size: cmp_size,
                    });
                }
            }
            _ => {}
        }

        match op.opcode {
            Opcode::FCmp | Opcode::FloatToGprZs | Opcode::FloatToGprS => {
                if !matches!(op.elem, 4 | 8) {
                    return Err(BlockError::BadElemSize {
                        node,
                        opcode: op.opcode,
                        elem: op.elem,
                    });
                }
            }
            Opcode::VExtractToGpr => {
                if !matches!(op.elem, 1 | 2 | 4 | 8) {
                    return Err(BlockError::BadElemSize {
                        node,
                        opcode: op.opcode,
                        elem: op.elem,
                    });
                }
                let src = op.arg(0);
                let src_size = self.op_size(src);
                if !matches!(src_size, 8 | 16) {
                    return Err(BlockError::BadVectorWidth {
                        node,
                        arg: src,
                        size: src_size,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// For each node, the set of nodes that read it. Since 0 terminates a
    /// bucket, the stored ids are offset by one.
    pub fn use_sets(&self) -> Vec<BucketList> {
        let mut sets: Vec<BucketList> = (0..self.len()).map(|_| BucketList::new()).collect();
        for (at, op) in self.ops().iter().enumerate() {
            for arg in 0..op.opcode.arg_count() {
                sets[op.args[arg].idx()].append(at as u32 + 1);
            }
        }
        sets
    }

    /// Defs nothing reads usually mean the lowering missed a fold; inlined
    /// literals are fused into their consumer and are expected to be dead.
    fn log_dead_nodes(&self) {
        for (node, uses) in self.use_sets().iter().enumerate() {
            let opcode = self.ops()[node].opcode;
            let inlined = matches!(
                opcode,
                Opcode::InlineConstant | Opcode::InlineEntrypointOffset
            );
            if uses.is_empty() && !inlined {
                debug!("node %{node} ({opcode}) has no uses");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cond, MAX_ARGS};

    #[test]
    fn valid_block_passes() {
        let mut block = Block::new();
        let one = block.constant(4, 1);
        let two = block.constant(4, 2);
        let sum = block.binary(Opcode::Add, 4, one, two);
        block.select(4, Cond::Ult, 4, one, two, sum, one);
        assert_eq!(block.validate(), Ok(()));
    }

    #[test]
    fn use_before_def_is_rejected() {
        let mut block = Block::new();
        let one = block.constant(4, 1);
        block.binary(Opcode::Add, 4, one, NodeId(5));
        assert!(matches!(
            block.validate(),
            Err(BlockError::UseBeforeDef { .. })
        ));
    }

    #[test]
    fn unsupported_size_is_rejected() {
        let mut block = Block::new();
        let one = block.constant(2, 1);
        let two = block.constant(2, 2);
        block.binary(Opcode::Add, 2, one, two);
        assert!(matches!(block.validate(), Err(BlockError::BadSize { .. })));
    }

    #[test]
    fn wrong_payload_kind_is_rejected() {
        let mut block = Block::new();
        let one = block.constant(4, 1);
        block.push(Op {
            opcode: Opcode::Neg,
            size: 4,
            elem: 0,
            args: [one; MAX_ARGS],
            payload: Payload::Imm(3),
        });
        assert!(matches!(
            block.validate(),
            Err(BlockError::BadPayload { .. })
        ));
    }

    #[test]
    fn oversized_bitfield_is_rejected() {
        let mut block = Block::new();
        let src = block.constant(8, 0);
        block.bitfield_extract(Opcode::Bfe, 8, src, 32, 48);
        assert!(matches!(block.validate(), Err(BlockError::BadField { .. })));
    }

    #[test]
    fn narrow_vector_source_is_rejected() {
        let mut block = Block::new();
        let src = block.constant(4, 0);
        block.vextract_to_gpr(2, src, 0);
        assert!(matches!(
            block.validate(),
            Err(BlockError::BadVectorWidth { .. })
        ));
    }

    #[test]
    fn use_sets_are_offset_by_one() {
        let mut block = Block::new();
        let one = block.constant(4, 1);
        let two = block.constant(4, 2);
        let sum = block.binary(Opcode::Add, 4, one, two);
        block.binary(Opcode::Xor, 4, one, sum);

        let uses = block.use_sets();
        let mut of_one: Vec<u32> = uses[one.idx()].iter().collect();
        of_one.sort_unstable();
        // Nodes %2 and %3 read %0, stored as 3 and 4.
        assert_eq!(of_one, [3, 4]);
        assert!(uses[3].is_empty());
    }
}
