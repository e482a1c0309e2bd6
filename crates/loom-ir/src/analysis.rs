//! Circuit metrics.

use cranelift_entity::SecondaryMap;

use crate::program::Program;
use crate::refs::TermId;
use crate::types::{OpCode, TermKind};
use crate::walk;

/// Whether `term` multiplies two ciphertexts together.
pub fn is_cipher_cipher_mul(program: &Program, term: TermId) -> bool {
    match program.op(term) {
        OpCode::Square => program.kind(program.operands(term)[0]) == TermKind::Ciphertext,
        OpCode::Mul | OpCode::Exponentiate => {
            let operands = program.operands(term);
            program.kind(operands[0]) == TermKind::Ciphertext
                && (program.op(term) == OpCode::Exponentiate
                    || program.kind(operands[1]) == TermKind::Ciphertext)
        }
        _ => false,
    }
}

/// Per-term count of ciphertext-ciphertext multiplications on the longest path.
pub fn multiplicative_depths(program: &Program) -> SecondaryMap<TermId, u32> {
    let mut depth: SecondaryMap<TermId, u32> = SecondaryMap::new();
    for term in walk::topological_order(program) {
        let inherited = program
            .operands(term)
            .iter()
            .map(|&o| depth[o])
            .max()
            .unwrap_or(0);
        depth[term] = inherited + u32::from(is_cipher_cipher_mul(program, term));
    }
    depth
}

/// Multiplicative depth of a single term, looking only at its operand subgraph.
pub fn term_depth(program: &Program, term: TermId) -> u32 {
    let mut depth: SecondaryMap<TermId, u32> = SecondaryMap::new();
    for t in walk::post_order(program, &[term]) {
        let inherited = program
            .operands(t)
            .iter()
            .map(|&o| depth[o])
            .max()
            .unwrap_or(0);
        depth[t] = inherited + u32::from(is_cipher_cipher_mul(program, t));
    }
    depth[term]
}

/// Largest multiplicative depth over the outputs.
pub fn multiplicative_depth(program: &Program) -> u32 {
    let depths = multiplicative_depths(program);
    program
        .outputs()
        .iter()
        .map(|o| depths[o.term])
        .max()
        .unwrap_or(0)
}

/// Operation counts of the live circuit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpStats {
    pub operations: usize,
    pub cipher_cipher_muls: usize,
    pub rotations: usize,
    pub leaves: usize,
}

pub fn op_stats(program: &Program) -> OpStats {
    let mut stats = OpStats::default();
    for term in program.live_terms() {
        let data = program.term(term);
        if data.is_leaf() {
            stats.leaves += 1;
            continue;
        }
        stats.operations += 1;
        if data.op().is_rotation() {
            stats.rotations += 1;
        }
        if is_cipher_cipher_mul(program, term) {
            stats.cipher_cipher_muls += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConstantValue;

    #[test]
    fn depth_counts_cipher_cipher_products_only() {
        let mut p = Program::new("depth");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let y = p.add_input("y", TermKind::Ciphertext).unwrap();
        let c = p.add_constant(None, ConstantValue::Scalar(3.0)).unwrap();
        let xy = p.insert_op(OpCode::Mul, &[x, y]).unwrap();
        let scaled = p.insert_op(OpCode::Mul, &[xy, c]).unwrap();
        let sq = p.insert_op(OpCode::Square, &[scaled]).unwrap();
        let r = p.insert_op(OpCode::Add, &[sq, x]).unwrap();
        p.set_output("r", r).unwrap();

        assert_eq!(multiplicative_depth(&p), 2);
        assert_eq!(term_depth(&p, scaled), 1);
        let stats = op_stats(&p);
        assert_eq!(stats.operations, 4);
        assert_eq!(stats.cipher_cipher_muls, 2);
        assert_eq!(stats.leaves, 3);
    }
}
