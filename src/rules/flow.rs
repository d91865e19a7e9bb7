//! Copies, dataflow markers, segments and early dead-code removal.

use crate::{
    engine::{EngineContext, Rule},
    ir::{Funcdata, OpCode, OpId, Storage},
    rules::{become_constant, become_copy, const_input, set_inputs},
    Result,
};

define_rule!(
    /// Makes readers of a `COPY` read the copy's source directly.
    ///
    /// Dataflow markers keep reading copies of constants and of address-forced values, and a
    /// marker output tied to an address only absorbs a source tied to the same address.
    RulePropagateCopy,
    "propagatecopy"
);

impl Rule for RulePropagateCopy {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        Vec::new()
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let marker = data.op(op).is_marker();
        let out_tied = data
            .op(op)
            .output()
            .filter(|&out| data.vn(out).is_addr_tied())
            .and_then(|out| data.vn(out).address());

        for slot in 0..data.op(op).num_inputs() {
            let Some(vn) = data.op(op).input(slot) else {
                continue;
            };
            let Some(copy) = data.vn(vn).def() else {
                continue;
            };
            if data.op(copy).opcode() != OpCode::Copy {
                continue;
            }
            let Some(src) = data.op(copy).input(0) else {
                continue;
            };
            if src == vn {
                return Err(lowlevel_error!("Self-defined varnode {}", data.fmt_vn(vn)));
            }
            let s = data.vn(src);
            if !s.is_heritage_known() {
                continue;
            }
            if marker {
                if s.is_constant() || s.is_addr_force() {
                    continue;
                }
                if s.is_addr_tied() && out_tied.is_some_and(|addr| s.address() != Some(addr)) {
                    continue;
                }
            }
            data.op_set_input(op, src, slot)?;
            return Ok(true);
        }
        Ok(false)
    }
}

define_rule!(
    /// Destroys ops whose result is never observed.
    ///
    /// Only ops without side effects qualify, and only when the output has no reader and is
    /// not kept alive by its storage. Skipped during a pool's first pass, so that rules see
    /// the original structure before it is pruned.
    RuleEarlyRemoval,
    "earlyremoval"
);

impl Rule for RuleEarlyRemoval {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        Vec::new()
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, ctx: &EngineContext) -> Result<bool> {
        if ctx.pass() == 0 {
            return Ok(false);
        }
        let o = data.op(op);
        if o.is_call() || o.has_side_effect() {
            return Ok(false);
        }
        let Some(out) = o.output() else {
            return Ok(false);
        };
        let v = data.vn(out);
        if !v.has_no_descend() || v.is_persist() || v.is_addr_tied() || v.is_auto_live() {
            return Ok(false);
        }
        data.op_destroy(op)?;
        Ok(true)
    }
}

define_rule!(
    /// Collapses a `MULTIEQUAL` whose inputs all carry the same value into a `COPY`.
    /// Inputs that are the `MULTIEQUAL`'s own output, as on a loop back edge, are ignored.
    RuleMultiCollapse,
    "multicollapse"
);

impl Rule for RuleMultiCollapse {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Multiequal]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let out = data.op(op).output();
        let mut others = data
            .op(op)
            .inputs()
            .iter()
            .copied()
            .filter(|&vn| Some(vn) != out);
        let Some(first) = others.next() else {
            return Ok(false);
        };
        if !others.all(|vn| data.same_value(first, vn)) || !data.vn(first).is_heritage_known() {
            return Ok(false);
        }
        become_copy(data, op, first)?;
        Ok(true)
    }
}

define_rule!(
    /// Removes `INDIRECT`s whose blocking op no longer exists, or whose blocking op is a
    /// `COPY` to the same storage.
    RuleIndirectCollapse,
    "indirectcollapse"
);

impl Rule for RuleIndirectCollapse {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Indirect]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        let Some(iop) = data.op(op).input(1) else {
            return Ok(false);
        };
        let Storage::OpRef(target) = data.vn(iop).loc() else {
            return Ok(false);
        };
        let t = data.op(target);
        if t.is_destroyed() || t.is_dead() {
            data.op_remove_input(op, 1)?;
            data.op_set_opcode(op, OpCode::Copy);
            return Ok(true);
        }
        if t.opcode() != OpCode::Copy {
            return Ok(false);
        }
        let (Some(copy_out), Some(out)) = (t.output(), data.op(op).output()) else {
            return Ok(false);
        };
        if !data.vn(copy_out).same_storage(data.vn(out)) {
            return Ok(false);
        }
        data.op_uninsert(op);
        set_inputs(data, op, &[copy_out])?;
        data.op_set_opcode(op, OpCode::Copy);
        data.op_insert_after(op, target)?;
        Ok(true)
    }
}

define_rule!(
    /// Folds `SEGMENTOP(id, base, offset)` with constant base and offset through the
    /// architecture's segment definition.
    RuleSegment,
    "segment"
);

impl Rule for RuleSegment {
    rule_identity!();

    fn op_list(&self) -> Vec<OpCode> {
        vec![OpCode::Segmentop]
    }

    fn apply_op(&self, op: OpId, data: &mut Funcdata, _ctx: &EngineContext) -> Result<bool> {
        if data.op(op).num_inputs() < 3 {
            return Err(lowlevel_error!("Segment op {} needs three inputs", op));
        }
        let id = const_input(data, op, 0)
            .ok_or_else(|| lowlevel_error!("Segment op {} has no constant segment id", op))?;
        let def = data
            .arch()
            .segment(id)
            .ok_or_else(|| lowlevel_error!("Segment op {} uses undefined segment {}", op, id))?;
        let (Some(base), Some(offset)) = (const_input(data, op, 1), const_input(data, op, 2)) else {
            return Ok(false);
        };
        let flat = def.execute(base, offset);
        become_constant(data, op, flat)?;
        Ok(true)
    }
}
