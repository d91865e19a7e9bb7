//! Resolution of indirect calls to known functions.
//!
//! An indirect call whose target can be traced, through copies, to a constant or to a
//! global holding a known function entry is turned into a direct call. The target is also
//! recorded as a call override on the function and a restart is requested, so that the whole
//! analysis is redone with the call resolved from the start.

use crate::{
    engine::{Action, ActionBase, ActionFlags, ActionGroupList, EngineContext, EventKind, Outcome},
    ir::{Address, AddrSpace, CallSpecId, Funcdata, OpCode, VarnodeId},
    Error, Result,
};

/// Maximum number of copies followed when tracing a call target.
const MAX_TRACE_DEPTH: usize = 64;

/// Turns `CALLIND`s with a known target into `CALL`s.
#[derive(Debug, Clone)]
pub struct ActionDeindirect {
    base: ActionBase,
}

impl ActionDeindirect {
    /// Creates the action, tagged with `group`.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            base: ActionBase::new(ActionFlags::empty(), "deindirect", group),
        }
    }

    /// Follows `vn` back through `COPY`s to an address it must hold.
    fn trace_target(data: &Funcdata, mut vn: VarnodeId) -> Result<Option<Address>> {
        for _ in 0..MAX_TRACE_DEPTH {
            let v = data.vn(vn);
            if let Some(val) = v.constant_value() {
                return Ok(Some(Address::ram(val)));
            }
            match v.def() {
                Some(def) if data.op(def).opcode() == OpCode::Copy => {
                    vn = data
                        .op(def)
                        .input(0)
                        .ok_or_else(|| lowlevel_error!("COPY {} without input", def))?;
                }
                Some(_) => return Ok(None),
                None => {
                    return Ok(v
                        .address()
                        .filter(|a| v.is_persist() && a.space == AddrSpace::Ram));
                }
            }
        }
        Err(Error::RecursionLimit(MAX_TRACE_DEPTH))
    }
}

impl Action for ActionDeindirect {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn apply(&mut self, data: &mut Funcdata, ctx: &mut EngineContext) -> Result<Outcome> {
        let mut resolved = 0;
        for i in 0..data.num_calls() {
            let Some(spec) = data.call_specs(i).cloned() else {
                continue;
            };
            let op = spec.op;
            let o = data.op(op);
            if o.is_dead() || o.opcode() != OpCode::Callind {
                continue;
            }
            let site = o.address();
            let Some(target_vn) = o.input(0) else {
                continue;
            };
            let target = Self::trace_target(data, target_vn)
                .map_err(|e| e.context(format!("call {} at {}", spec.display_name(), site)))?;
            let Some(target) = target else {
                continue;
            };
            let Some(name) = data.arch().function_name(&target).map(str::to_string) else {
                continue;
            };

            let fspec = data.new_varnode_call_spec(CallSpecId::new(spec.index));
            data.op_set_input(op, fspec, 0)?;
            data.op_set_opcode(op, OpCode::Call);
            data.set_call_override(site, target);
            data.set_restart_pending(true);
            tracing::debug!(function = %data.name(), site = %site, callee = %name, "indirect call resolved");
            ctx.events
                .record(EventKind::CallResolved)
                .at(data.name(), site)
                .source(self.base.name.as_str())
                .message(format!("call to {} at {}", name, target));
            resolved += 1;
        }
        ctx.add_changes(resolved);
        Ok(Outcome::Done(resolved))
    }

    fn clone_action(&self, groups: &ActionGroupList) -> Option<Box<dyn Action>> {
        groups.contains(self.group()).then(|| {
            Box::new(Self {
                base: self.base.fresh(),
            }) as Box<dyn Action>
        })
    }
}
