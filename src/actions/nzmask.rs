//! Non-zero mask analysis.
//!
//! Computes, for every written varnode, a conservative mask of the bits that may be
//! non-zero. Masks start empty for written varnodes and grow monotonically while being
//! propagated forward from constants (their value) and unwritten varnodes (all bits), so
//! loops through `MULTIEQUAL` converge on the least fixpoint.
//!
//! The analysis only annotates varnodes; it never counts as a change to the function.
//! [`Action::apply`] reports how many output masks differ from the previous pass. Rules
//! such as `andmask` and `orcollapse` consume the masks.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, EventKind, Outcome},
    ir::{Funcdata, OpCode, OpId, VarnodeId},
    utils::{calc_mask, coveringmask, mostsigbit_set, signbit_negative},
    Result,
};

/// Computes the non-zero mask of `op`'s output from the current masks of its inputs.
#[must_use]
pub fn op_nz_mask(data: &Funcdata, op: OpId) -> u64 {
    let o = data.op(op);
    let Some(out) = o.output() else {
        return 0;
    };
    let size = data.vn(out).size();
    let full = calc_mask(size);
    let input = |slot: usize| o.input(slot).map(|vn| data.vn(vn));
    let mask = |slot: usize| input(slot).map_or(full, |v| v.nz_mask());
    let constant = |slot: usize| input(slot).and_then(|v| v.constant_value());

    if o.is_boolean_output() {
        return 1;
    }
    let res = match o.opcode() {
        OpCode::Copy | OpCode::IntZext => mask(0),
        OpCode::IntSext => match input(0) {
            Some(v) if !signbit_negative(v.nz_mask(), v.size()) => v.nz_mask(),
            _ => full,
        },
        OpCode::IntAnd => mask(0) & mask(1),
        OpCode::IntOr | OpCode::IntXor => mask(0) | mask(1),
        OpCode::Multiequal => (0..o.num_inputs()).fold(0, |acc, slot| acc | mask(slot)),
        OpCode::IntAdd => {
            let m = mask(0) | mask(1);
            if m == full {
                full
            } else {
                coveringmask(m | (m << 1))
            }
        }
        OpCode::IntMult => {
            let (a, b) = (mask(0), mask(1));
            match (mostsigbit_set(a), mostsigbit_set(b)) {
                (Some(x), Some(y)) => {
                    let bits = x + y + 2;
                    if bits >= 64 {
                        full
                    } else {
                        (1u64 << bits) - 1
                    }
                }
                _ => 0,
            }
        }
        OpCode::IntLeft => match constant(1) {
            Some(sa) if sa < 64 => mask(0) << sa,
            Some(_) => 0,
            None => full,
        },
        OpCode::IntRight => match constant(1) {
            Some(sa) if sa < 64 => mask(0) >> sa,
            Some(_) => 0,
            None => coveringmask(mask(0)),
        },
        OpCode::IntSright => match (input(0), constant(1)) {
            (Some(v), Some(sa)) if sa < 64 && !signbit_negative(v.nz_mask(), v.size()) => {
                v.nz_mask() >> sa
            }
            _ => full,
        },
        OpCode::IntDiv => coveringmask(mask(0)),
        OpCode::IntRem => match mask(1) {
            0 => full,
            m => coveringmask(m),
        },
        OpCode::Piece => {
            let low_size = input(1).map_or(0, |v| v.size());
            if low_size >= 8 {
                mask(1)
            } else {
                (mask(0) << (low_size * 8)) | mask(1)
            }
        }
        OpCode::Subpiece => match constant(1) {
            Some(c) if c < 8 => mask(0) >> (c * 8),
            Some(_) => 0,
            None => full,
        },
        OpCode::Popcount | OpCode::Lzcount => {
            let bits = input(0).map_or(64, |v| (v.size().min(8) * 8) as u64);
            coveringmask(bits)
        }
        _ => full,
    };
    res & full
}

/// Computes non-zero masks for the whole function.
#[derive(Debug, Clone)]
pub struct ActionNonzeroMask {
    base: ActionBase,
}

impl ActionNonzeroMask {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "nonzeromask", group),
        }
    }
}

impl Action for ActionNonzeroMask {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let alive = data.ops_alive();
        let previous: Vec<(VarnodeId, u64)> = alive
            .iter()
            .filter_map(|&op| data.op(op).output())
            .map(|vn| (vn, data.vn(vn).nz_mask()))
            .collect();
        for &op in &alive {
            if let Some(out) = data.op(op).output() {
                data.vn_set_nz_mask(out, 0);
            }
            for slot in 0..data.op(op).num_inputs() {
                let Some(vn) = data.op(op).input(slot) else {
                    continue;
                };
                let v = data.vn(vn);
                if v.is_written() {
                    continue;
                }
                let mask = v.constant_value().unwrap_or(u64::MAX);
                data.vn_set_nz_mask(vn, mask);
            }
        }

        let mut worklist: Vec<OpId> = alive.iter().rev().copied().collect();
        while let Some(op) = worklist.pop() {
            let Some(out) = data.op(op).output() else {
                continue;
            };
            let mask = op_nz_mask(data, op);
            if mask != data.vn(out).nz_mask() {
                data.vn_set_nz_mask(out, mask);
                worklist.extend(data.vn(out).descend().iter().copied());
            }
        }

        let changed = previous
            .iter()
            .filter(|&&(vn, mask)| data.vn(vn).nz_mask() != mask)
            .count();
        let narrowed = alive
            .iter()
            .filter_map(|&op| data.op(op).output())
            .filter(|&vn| {
                let v = data.vn(vn);
                v.nz_mask() != calc_mask(v.size())
            })
            .count();
        if narrowed > 0 {
            ctx.events
                .record(EventKind::MaskRefined)
                .function(data.name())
                .source(self.base.name.as_str())
                .message(format!("{} narrowed masks, {} changed", narrowed, changed));
        }
        Ok(Outcome::Done(changed))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}
