//! Program: arena-based mutable circuit storage.
//!
//! All terms are stored in a `PrimaryMap` owned by [`Program`], together with
//! the constants table and the declared inputs and outputs. Operand lists
//! hold [`TermId`]s, and every operand slot is mirrored by a [`Use`] in the
//! operand's use-chain, so parents can be found without scanning the graph.
//! Use-chains are maintained automatically by every mutation primitive.

use std::collections::{BTreeMap, HashMap};

use cranelift_entity::{EntityRef, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::error::{IrError, IrResult};
use crate::refs::{TermId, Use};
use crate::types::{ConstantValue, OpCode, TermKind, deduce_kind};

// ============================================================================
// Entity data
// ============================================================================

/// Data for a single term in the arena.
#[derive(Clone, Debug)]
pub struct TermData {
    label: String,
    op: OpCode,
    kind: TermKind,
    operands: SmallVec<[TermId; 2]>,
    erased: bool,
}

impl TermData {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn op(&self) -> OpCode {
        self.op
    }

    pub fn kind(&self) -> TermKind {
        self.kind
    }

    pub fn operands(&self) -> &[TermId] {
        &self.operands
    }

    pub fn is_leaf(&self) -> bool {
        self.op == OpCode::Undefined
    }

    pub fn is_operation(&self) -> bool {
        !self.is_leaf()
    }

    pub fn is_erased(&self) -> bool {
        self.erased
    }
}

/// A named circuit result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub name: String,
    pub term: TermId,
}

// ============================================================================
// Program
// ============================================================================

/// Owner of a circuit's terms, constants table, inputs and outputs.
///
/// This is the only place graph structure is mutated. Other components
/// borrow it for the duration of one call.
#[derive(Clone, Debug)]
pub struct Program {
    name: String,
    terms: PrimaryMap<TermId, TermData>,
    /// Use-chain: for each term, the operand slots that refer to it.
    uses: SecondaryMap<TermId, SmallVec<[Use; 2]>>,
    labels: HashMap<String, TermId>,
    constants: BTreeMap<TermId, ConstantValue>,
    inputs: Vec<TermId>,
    outputs: Vec<Output>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            labels: HashMap::new(),
            constants: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get immutable reference to term data.
    pub fn term(&self, id: TermId) -> &TermData {
        &self.terms[id]
    }

    pub fn label(&self, id: TermId) -> &str {
        &self.terms[id].label
    }

    pub fn op(&self, id: TermId) -> OpCode {
        self.terms[id].op
    }

    pub fn kind(&self, id: TermId) -> TermKind {
        self.terms[id].kind
    }

    pub fn operands(&self, id: TermId) -> &[TermId] {
        &self.terms[id].operands
    }

    pub fn is_live(&self, id: TermId) -> bool {
        self.terms.get(id).is_some_and(|t| !t.erased)
    }

    pub fn find_by_label(&self, label: &str) -> Option<TermId> {
        self.labels.get(label).copied()
    }

    /// Every operand slot that refers to `id`.
    pub fn uses(&self, id: TermId) -> &[Use] {
        &self.uses[id]
    }

    /// Distinct terms using `id` as an operand, in first-use order.
    pub fn parents(&self, id: TermId) -> SmallVec<[TermId; 4]> {
        let mut parents = SmallVec::new();
        for u in &self.uses[id] {
            if !parents.contains(&u.user) {
                parents.push(u.user);
            }
        }
        parents
    }

    pub fn constant(&self, id: TermId) -> Option<&ConstantValue> {
        self.constants.get(&id)
    }

    pub fn constants(&self) -> impl Iterator<Item = (TermId, &ConstantValue)> + '_ {
        self.constants.iter().map(|(id, value)| (*id, value))
    }

    /// Numeric value of a raw-data leaf, parsed from its label.
    pub fn raw_value(&self, id: TermId) -> Option<i64> {
        let term = &self.terms[id];
        if term.kind != TermKind::RawData || !term.is_leaf() {
            return None;
        }
        term.label.parse().ok()
    }

    pub fn inputs(&self) -> &[TermId] {
        &self.inputs
    }

    pub fn is_input(&self, id: TermId) -> bool {
        self.inputs.contains(&id)
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn is_output(&self, id: TermId) -> bool {
        self.outputs.iter().any(|o| o.term == id)
    }

    /// Iterate over all live terms in allocation order.
    pub fn live_terms(&self) -> impl Iterator<Item = TermId> + '_ {
        self.terms
            .iter()
            .filter(|(_, t)| !t.erased)
            .map(|(id, _)| id)
    }

    /// Number of live terms.
    pub fn len(&self) -> usize {
        self.live_terms().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocated arena slots, including erased terms.
    pub fn capacity(&self) -> usize {
        self.terms.len()
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Declare a circuit input.
    pub fn add_input(&mut self, name: &str, kind: TermKind) -> IrResult<TermId> {
        if matches!(kind, TermKind::RawData | TermKind::Boolean) {
            return Err(IrError::InvalidInputKind { kind });
        }
        let id = self.push_term(Some(name), OpCode::Undefined, kind, SmallVec::new())?;
        self.inputs.push(id);
        Ok(id)
    }

    /// Create a constant leaf and register its constants-table entry.
    ///
    /// Without a label, one is generated from the arena index.
    pub fn add_constant(&mut self, label: Option<&str>, value: ConstantValue) -> IrResult<TermId> {
        let id = self.push_term(label, OpCode::Undefined, value.kind(), SmallVec::new())?;
        self.constants.insert(id, value);
        Ok(id)
    }

    /// Get or create the raw-data leaf for `value`.
    ///
    /// Raw leaves are labeled with their literal, so each literal exists once.
    /// Integer labels are reserved for them.
    pub fn raw(&mut self, value: i64) -> IrResult<TermId> {
        let label = value.to_string();
        if let Some(id) = self.find_by_label(&label) {
            if self.terms[id].kind == TermKind::RawData && self.terms[id].is_leaf() {
                return Ok(id);
            }
            return Err(IrError::DuplicateLabel { label });
        }
        self.push_term(
            Some(&label),
            OpCode::Undefined,
            TermKind::RawData,
            SmallVec::new(),
        )
    }

    /// Create an operation term; its kind is deduced from the operands.
    pub fn insert_op(&mut self, op: OpCode, operands: &[TermId]) -> IrResult<TermId> {
        self.insert_op_inner(None, op, operands)
    }

    /// Create an operation term with an explicit label.
    pub fn insert_labeled_op(
        &mut self,
        label: &str,
        op: OpCode,
        operands: &[TermId],
    ) -> IrResult<TermId> {
        self.insert_op_inner(Some(label), op, operands)
    }

    fn insert_op_inner(
        &mut self,
        label: Option<&str>,
        op: OpCode,
        operands: &[TermId],
    ) -> IrResult<TermId> {
        if op.arity() != operands.len() || op == OpCode::Undefined {
            return Err(IrError::ArityMismatch {
                op,
                expected: op.arity(),
                found: operands.len(),
            });
        }
        for &operand in operands {
            self.check_live(operand)?;
        }
        let kinds: SmallVec<[TermKind; 2]> =
            operands.iter().map(|&o| self.terms[o].kind).collect();
        let kind = deduce_kind(op, &kinds)?;

        let id = self.push_term(label, op, kind, operands.into())?;
        for (idx, &operand) in operands.iter().enumerate() {
            self.uses[operand].push(Use {
                user: id,
                operand_index: idx as u32,
            });
        }
        Ok(id)
    }

    fn push_term(
        &mut self,
        label: Option<&str>,
        op: OpCode,
        kind: TermKind,
        operands: SmallVec<[TermId; 2]>,
    ) -> IrResult<TermId> {
        let label = match label {
            Some(label) => {
                let raw_leaf = op == OpCode::Undefined && kind == TermKind::RawData;
                if !raw_leaf && label.parse::<i64>().is_ok() {
                    return Err(IrError::ReservedLabel {
                        label: label.to_owned(),
                    });
                }
                if self.labels.contains_key(label) {
                    return Err(IrError::DuplicateLabel {
                        label: label.to_owned(),
                    });
                }
                label.to_owned()
            }
            None => self.fresh_label(),
        };
        let id = self.terms.push(TermData {
            label: label.clone(),
            op,
            kind,
            operands,
            erased: false,
        });
        self.labels.insert(label, id);
        Ok(id)
    }

    fn fresh_label(&self) -> String {
        let mut label = format!("_{}", self.terms.next_key().index());
        while self.labels.contains_key(&label) {
            label.push('_');
        }
        label
    }

    /// Declare `term` as the circuit result named `name`.
    pub fn set_output(&mut self, name: &str, term: TermId) -> IrResult<()> {
        self.check_live(term)?;
        match self.outputs.iter_mut().find(|o| o.name == name) {
            Some(output) => output.term = term,
            None => self.outputs.push(Output {
                name: name.to_owned(),
                term,
            }),
        }
        Ok(())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    fn check_live(&self, id: TermId) -> IrResult<()> {
        if self.is_live(id) {
            Ok(())
        } else {
            Err(IrError::ErasedTerm { term: id })
        }
    }

    /// Point operand slot `index` of `user` at `new`, keeping use-chains in sync.
    fn set_operand(&mut self, user: TermId, index: usize, new: TermId) {
        let old = self.terms[user].operands[index];
        self.uses[old].retain(|u| !(u.user == user && u.operand_index == index as u32));
        self.terms[user].operands[index] = new;
        self.uses[new].push(Use {
            user,
            operand_index: index as u32,
        });
    }

    /// Replace the first operand slot of `user` that refers to `old` with `new`.
    ///
    /// Returns the slot index.
    pub fn replace_operand(&mut self, user: TermId, old: TermId, new: TermId) -> IrResult<usize> {
        self.check_live(user)?;
        self.check_live(new)?;
        let slot = self.terms[user]
            .operands
            .iter()
            .position(|&o| o == old)
            .ok_or_else(|| IrError::MissingOperandSlot {
                parent: self.terms[user].label.clone(),
                child: self.terms[old].label.clone(),
            })?;
        self.set_operand(user, slot, new);
        Ok(slot)
    }

    /// Redirect every use of `old`, including outputs, to `new`.
    ///
    /// Uses held by `new` itself are left in place. Returns the number of
    /// redirected uses.
    pub fn replace_all_uses(&mut self, old: TermId, new: TermId) -> IrResult<usize> {
        self.check_live(old)?;
        self.check_live(new)?;
        if old == new {
            return Ok(0);
        }

        let uses: SmallVec<[Use; 4]> = self.uses[old].iter().copied().collect();
        let mut count = 0;
        for u in uses {
            if u.user == new {
                continue;
            }
            let slot = u.operand_index as usize;
            if self.terms[u.user].operands.get(slot) != Some(&old) {
                return Err(IrError::MissingOperandSlot {
                    parent: self.terms[u.user].label.clone(),
                    child: self.terms[old].label.clone(),
                });
            }
            self.set_operand(u.user, slot, new);
            count += 1;
        }
        for output in &mut self.outputs {
            if output.term == old {
                output.term = new;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Make `target` mirror the opcode, kind and operands of `source`.
    ///
    /// `target` keeps its identity and label, so its parents stay valid
    /// without being patched. `source` is left untouched.
    pub fn rewrite_with_operation(&mut self, target: TermId, source: TermId) -> IrResult<()> {
        self.check_live(target)?;
        self.check_live(source)?;
        let source_data = &self.terms[source];
        if source_data.is_leaf() {
            return Err(IrError::NotAnOperation {
                label: source_data.label.clone(),
            });
        }
        if source_data.operands.contains(&target) {
            return Err(IrError::CyclicRewrite {
                label: self.terms[target].label.clone(),
            });
        }
        let op = source_data.op;
        let kind = source_data.kind;
        let new_operands = source_data.operands.clone();

        self.detach_operands(target);
        let data = &mut self.terms[target];
        data.op = op;
        data.kind = kind;
        data.operands = new_operands.clone();
        for (idx, operand) in new_operands.into_iter().enumerate() {
            self.uses[operand].push(Use {
                user: target,
                operand_index: idx as u32,
            });
        }
        self.constants.remove(&target);
        self.inputs.retain(|&i| i != target);
        Ok(())
    }

    /// Replace the operand list of `id` with a permutation or equivalent list.
    pub fn set_operands(&mut self, id: TermId, operands: &[TermId]) -> IrResult<()> {
        self.check_live(id)?;
        let op = self.terms[id].op;
        if operands.len() != op.arity() {
            return Err(IrError::ArityMismatch {
                op,
                expected: op.arity(),
                found: operands.len(),
            });
        }
        for &operand in operands {
            self.check_live(operand)?;
        }
        self.detach_operands(id);
        self.terms[id].operands = operands.into();
        for (idx, &operand) in operands.iter().enumerate() {
            self.uses[operand].push(Use {
                user: id,
                operand_index: idx as u32,
            });
        }
        Ok(())
    }

    /// Remove the use-chain entries held by the operand slots of `id`.
    fn detach_operands(&mut self, id: TermId) {
        let operands = self.terms[id].operands.clone();
        for (idx, operand) in operands.into_iter().enumerate() {
            self.uses[operand].retain(|u| !(u.user == id && u.operand_index == idx as u32));
        }
    }

    /// Erase a term that nothing uses anymore.
    ///
    /// The term is detached from its operands' use-chains and loses its
    /// label and constants-table entry. Its arena slot is never reused.
    pub fn erase(&mut self, id: TermId) -> IrResult<()> {
        self.check_live(id)?;
        let uses = self.uses[id].len();
        let outputs = self.outputs.iter().filter(|o| o.term == id).count();
        if uses + outputs > 0 {
            return Err(IrError::StillUsed {
                label: self.terms[id].label.clone(),
                uses: uses + outputs,
            });
        }
        self.detach_operands(id);
        let data = &mut self.terms[id];
        data.operands.clear();
        data.erased = true;
        let label = data.label.clone();
        self.labels.remove(&label);
        self.constants.remove(&id);
        self.inputs.retain(|&i| i != id);
        Ok(())
    }

    /// Erase `id` if it is an unused, non-output, non-input term.
    ///
    /// Returns whether the term was erased.
    pub fn erase_if_dead(&mut self, id: TermId) -> bool {
        if !self.is_live(id)
            || !self.uses[id].is_empty()
            || self.is_output(id)
            || self.is_input(id)
        {
            return false;
        }
        self.erase(id).is_ok()
    }

    /// Erase `id` if dead, then every operand that becomes dead as a result.
    ///
    /// Returns the number of erased terms.
    pub fn erase_unused(&mut self, id: TermId) -> usize {
        let mut erased = 0;
        let mut worklist = vec![id];
        while let Some(term) = worklist.pop() {
            if !self.is_live(term) {
                continue;
            }
            let operands = self.terms[term].operands.clone();
            if self.erase_if_dead(term) {
                erased += 1;
                worklist.extend(operands);
            }
        }
        erased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Program, TermId, TermId, TermId) {
        let mut p = Program::new("sample");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let y = p.add_input("y", TermKind::Ciphertext).unwrap();
        let sum = p.insert_op(OpCode::Add, &[x, y]).unwrap();
        (p, x, y, sum)
    }

    #[test]
    fn insert_op_registers_uses() {
        let (p, x, y, sum) = sample();
        assert_eq!(
            p.uses(x),
            &[Use {
                user: sum,
                operand_index: 0
            }]
        );
        assert_eq!(
            p.uses(y),
            &[Use {
                user: sum,
                operand_index: 1
            }]
        );
        assert_eq!(p.kind(sum), TermKind::Ciphertext);
    }

    #[test]
    fn shared_operand_has_one_parent_two_uses() {
        let mut p = Program::new("square");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let m = p.insert_op(OpCode::Mul, &[x, x]).unwrap();
        assert_eq!(p.uses(x).len(), 2);
        assert_eq!(p.parents(x).as_slice(), &[m]);
    }

    #[test]
    fn arity_is_checked() {
        let mut p = Program::new("arity");
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        let err = p.insert_op(OpCode::Add, &[x]).unwrap_err();
        assert_eq!(
            err,
            IrError::ArityMismatch {
                op: OpCode::Add,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn labels_are_unique() {
        let mut p = Program::new("labels");
        p.add_input("x", TermKind::Ciphertext).unwrap();
        let err = p.add_input("x", TermKind::Plaintext).unwrap_err();
        assert_eq!(
            err,
            IrError::DuplicateLabel {
                label: "x".to_owned()
            }
        );
    }

    #[test]
    fn generated_labels_skip_taken_names() {
        let mut p = Program::new("labels");
        p.add_input("_1", TermKind::Ciphertext).unwrap();
        let c = p.add_constant(None, ConstantValue::Scalar(2.0)).unwrap();
        assert_eq!(p.label(c), "_1_");
    }

    #[test]
    fn raw_leaves_are_shared_by_literal() {
        let mut p = Program::new("raw");
        let a = p.raw(3).unwrap();
        let b = p.raw(3).unwrap();
        assert_eq!(a, b);
        assert_eq!(p.label(a), "3");
        assert_eq!(p.raw_value(a), Some(3));
        assert_eq!(p.kind(a), TermKind::RawData);
    }

    #[test]
    fn integer_labels_are_reserved_for_raw_leaves() {
        let mut p = Program::new("reserved");
        let err = p.add_input("5", TermKind::Ciphertext).unwrap_err();
        assert_eq!(
            err,
            IrError::ReservedLabel {
                label: "5".to_owned()
            }
        );
        let x = p.add_input("x", TermKind::Ciphertext).unwrap();
        assert!(matches!(
            p.insert_labeled_op("-1", OpCode::Negate, &[x]),
            Err(IrError::ReservedLabel { .. })
        ));
        let five = p.raw(5).unwrap();
        assert_eq!(p.find_by_label("5"), Some(five));
    }

    #[test]
    fn raw_values_keep_full_integer_precision() {
        let mut p = Program::new("big");
        let big = (1_i64 << 53) + 1;
        let term = p.raw(big).unwrap();
        assert_eq!(p.raw_value(term), Some(big));
    }

    #[test]
    fn replace_all_uses_rewires_parents_and_outputs() {
        let (mut p, x, y, sum) = sample();
        let neg = p.insert_op(OpCode::Negate, &[sum]).unwrap();
        p.set_output("out", sum).unwrap();

        let count = p.replace_all_uses(sum, x).unwrap();
        assert_eq!(count, 2);
        assert_eq!(p.operands(neg), &[x]);
        assert_eq!(p.outputs()[0].term, x);
        assert!(p.uses(sum).is_empty());
        assert!(p.erase_if_dead(sum));
        assert_eq!(p.uses(y).len(), 0);
        assert!(!p.is_live(sum));
    }

    #[test]
    fn replace_all_uses_skips_the_replacement_itself() {
        let (mut p, _x, _y, sum) = sample();
        let relin = p.insert_op(OpCode::Relinearize, &[sum]).unwrap();
        let outer = p.insert_op(OpCode::Negate, &[sum]).unwrap();

        p.replace_all_uses(sum, relin).unwrap();
        assert_eq!(p.operands(relin), &[sum]);
        assert_eq!(p.operands(outer), &[relin]);
    }

    #[test]
    fn replace_operand_reports_missing_slot() {
        let (mut p, x, _y, sum) = sample();
        let other = p.add_input("z", TermKind::Ciphertext).unwrap();
        let err = p.replace_operand(sum, other, x).unwrap_err();
        assert_eq!(
            err,
            IrError::MissingOperandSlot {
                parent: "_2".to_owned(),
                child: "z".to_owned()
            }
        );
    }

    #[test]
    fn rewrite_with_operation_keeps_identity() {
        let (mut p, x, y, sum) = sample();
        let parent = p.insert_op(OpCode::Negate, &[sum]).unwrap();
        let product = p.insert_op(OpCode::Mul, &[x, y]).unwrap();

        p.rewrite_with_operation(sum, product).unwrap();
        assert_eq!(p.op(sum), OpCode::Mul);
        assert_eq!(p.operands(parent), &[sum]);
        assert_eq!(p.uses(x).len(), 2);

        assert!(p.erase_if_dead(product));
        assert_eq!(
            p.uses(x),
            &[Use {
                user: sum,
                operand_index: 0
            }]
        );
    }

    #[test]
    fn rewrite_with_operation_rejects_cycles() {
        let (mut p, _x, _y, sum) = sample();
        let relin = p.insert_op(OpCode::Relinearize, &[sum]).unwrap();
        assert!(matches!(
            p.rewrite_with_operation(sum, relin),
            Err(IrError::CyclicRewrite { .. })
        ));
    }

    #[test]
    fn erase_refuses_used_terms() {
        let (mut p, x, _y, _sum) = sample();
        assert!(matches!(p.erase(x), Err(IrError::StillUsed { uses: 1, .. })));
    }

    #[test]
    fn erase_drops_constant_entry_and_label() {
        let mut p = Program::new("consts");
        let c = p
            .add_constant(Some("c"), ConstantValue::Vector(vec![1.0, 2.0]))
            .unwrap();
        assert_eq!(p.kind(c), TermKind::Plaintext);
        p.erase(c).unwrap();
        assert!(p.constant(c).is_none());
        assert!(p.find_by_label("c").is_none());
        assert!(matches!(p.erase(c), Err(IrError::ErasedTerm { .. })));
    }

    #[test]
    fn erase_unused_cascades_to_dead_operands() {
        let (mut p, x, _y, sum) = sample();
        let c = p.add_constant(None, ConstantValue::Scalar(0.0)).unwrap();
        let shifted = p.insert_op(OpCode::Add, &[sum, c]).unwrap();
        let kept = p.insert_op(OpCode::Negate, &[x]).unwrap();
        p.set_output("kept", kept).unwrap();

        assert_eq!(p.erase_unused(shifted), 3);
        assert!(!p.is_live(sum));
        assert!(p.constant(c).is_none());
        assert!(p.is_live(x));
    }

    #[test]
    fn set_operands_swaps_use_slots() {
        let (mut p, x, y, sum) = sample();
        p.set_operands(sum, &[y, x]).unwrap();
        assert_eq!(p.operands(sum), &[y, x]);
        assert_eq!(
            p.uses(x),
            &[Use {
                user: sum,
                operand_index: 1
            }]
        );
    }
}
