//! End-to-end rewriting tests.
//!
//! Each test builds a small raw function with the public builder, runs the default profile
//! over it with invariant checking switched on, and inspects the simplified result.

use pcodeopt::{
    engine::{Action, ActionFlags, ActionPool, Engine, EngineConfig, EngineContext, Outcome, Rule},
    ir::{Address, Funcdata, FunctionBuilder, OpCode, OpId, VarnodeId},
    rules, Result,
};

fn run(data: &mut Funcdata) -> Result<usize> {
    let engine = Engine::new(EngineConfig::checked())?;
    let summary = engine.decompile(data)?;
    assert!(!summary.halted);
    Ok(summary.changes)
}

fn returned(data: &Funcdata, ret: OpId) -> VarnodeId {
    data.op(ret).input(0).expect("return has an input")
}

fn def_opcode(data: &Funcdata, vn: VarnodeId) -> Option<OpCode> {
    data.vn(vn).def().map(|op| data.op(op).opcode())
}

/// `RETURN v ^ v`
fn xor_self() -> Result<(Funcdata, OpId)> {
    let mut b = FunctionBuilder::new("xor_self", Address::ram(0x1000));
    let v = b.input(4, Address::register(0));
    let x = b.op(OpCode::IntXor, &[v, v], 4)?;
    let ret = b.op_void(OpCode::Return, &[x])?;
    Ok((b.finish(), ret))
}

#[test]
fn test_xor_of_itself_is_zero() -> Result<()> {
    let (mut data, ret) = xor_self()?;
    assert!(run(&mut data)? > 0);

    assert_eq!(data.vn(returned(&data, ret)).constant_value(), Some(0));
    assert!(data.ops_by_opcode(OpCode::IntXor).is_empty());
    assert!(data.ops_by_opcode(OpCode::Copy).is_empty());
    data.verify()?;
    Ok(())
}

#[test]
fn test_double_shift_merges() -> Result<()> {
    let mut b = FunctionBuilder::new("shifts", Address::ram(0x1000));
    let v = b.input(4, Address::register(0));
    let three = b.constant(4, 3);
    let inner = b.op(OpCode::IntLeft, &[v, three], 4)?;
    let five = b.constant(4, 5);
    let outer = b.op(OpCode::IntLeft, &[inner, five], 4)?;
    let ret = b.op_void(OpCode::Return, &[outer])?;
    let mut data = b.finish();

    run(&mut data)?;
    let r = returned(&data, ret);
    let shift = data.vn(r).def().expect("result is written");
    assert_eq!(data.op(shift).opcode(), OpCode::IntLeft);
    assert_eq!(data.op(shift).input(0), Some(v));
    let amount = data.op(shift).input(1).expect("shift amount");
    assert_eq!(data.vn(amount).constant_value(), Some(8));
    assert_eq!(data.ops_by_opcode(OpCode::IntLeft).len(), 1);
    Ok(())
}

#[test]
fn test_double_shift_merges_on_eight_bytes() -> Result<()> {
    let mut b = FunctionBuilder::new("shifts8", Address::ram(0x1000));
    let v = b.input(8, Address::register(0));
    let three = b.constant(8, 3);
    let inner = b.op(OpCode::IntLeft, &[v, three], 8)?;
    let five = b.constant(8, 5);
    let outer = b.op(OpCode::IntLeft, &[inner, five], 8)?;
    let ret = b.op_void(OpCode::Return, &[outer])?;
    let mut data = b.finish();

    run(&mut data)?;
    let r = returned(&data, ret);
    assert_eq!(data.vn(r).size(), 8);
    let shift = data.vn(r).def().expect("result is written");
    assert_eq!(data.op(shift).opcode(), OpCode::IntLeft);
    assert_eq!(data.op(shift).input(0), Some(v));
    let amount = data.op(shift).input(1).expect("shift amount");
    assert_eq!(data.vn(amount).constant_value(), Some(8));
    assert_eq!(data.ops_by_opcode(OpCode::IntLeft).len(), 1);
    data.verify()?;
    Ok(())
}

#[test]
fn test_double_shift_past_width_is_zero() -> Result<()> {
    let mut b = FunctionBuilder::new("shifts1", Address::ram(0x1000));
    let v = b.input(1, Address::register(0));
    let five = b.constant(1, 5);
    let inner = b.op(OpCode::IntLeft, &[v, five], 1)?;
    let five2 = b.constant(1, 5);
    let outer = b.op(OpCode::IntLeft, &[inner, five2], 1)?;
    let ret = b.op_void(OpCode::Return, &[outer])?;
    let mut data = b.finish();

    run(&mut data)?;
    assert_eq!(data.vn(returned(&data, ret)).constant_value(), Some(0));
    assert!(data.ops_by_opcode(OpCode::IntLeft).is_empty());
    data.verify()?;
    Ok(())
}

#[test]
fn test_zext_comparison_narrows() -> Result<()> {
    let mut b = FunctionBuilder::new("zext_cmp", Address::ram(0x1000));
    let x = b.input(1, Address::register(0));
    let wide = b.op(OpCode::IntZext, &[x], 4)?;
    let c = b.constant(4, 0x41);
    let eq = b.op(OpCode::IntEqual, &[wide, c], 1)?;
    let ret = b.op_void(OpCode::Return, &[eq])?;
    let mut data = b.finish();

    run(&mut data)?;
    let cmp = data.vn(returned(&data, ret)).def().expect("comparison");
    assert_eq!(data.op(cmp).opcode(), OpCode::IntEqual);
    assert_eq!(data.op(cmp).input(0), Some(x));
    let narrowed = data.op(cmp).input(1).expect("constant");
    assert_eq!(data.vn(narrowed).constant_value(), Some(0x41));
    assert_eq!(data.vn(narrowed).size(), 1);
    assert!(data.ops_by_opcode(OpCode::IntZext).is_empty());
    Ok(())
}

#[test]
fn test_subtraction_survives_as_subtraction() -> Result<()> {
    // a - b is canonicalized to a + b * -1 during analysis and restored during clean-up.
    let mut b = FunctionBuilder::new("sub", Address::ram(0x1000));
    let a = b.input(4, Address::register(0));
    let c = b.input(4, Address::register(8));
    let diff = b.op(OpCode::IntSub, &[a, c], 4)?;
    let ret = b.op_void(OpCode::Return, &[diff])?;
    let mut data = b.finish();

    run(&mut data)?;
    let r = returned(&data, ret);
    assert_eq!(def_opcode(&data, r), Some(OpCode::IntSub));
    assert!(data.ops_by_opcode(OpCode::IntMult).is_empty());
    data.verify()?;
    Ok(())
}

#[test]
fn test_mixed_function_stays_well_formed() -> Result<()> {
    let mut b = FunctionBuilder::new("mixed", Address::ram(0x1000));
    let x = b.input(4, Address::register(0));
    let y = b.input(4, Address::register(8));
    let flag = b.input(1, Address::register(16));

    // ((x + 3) + 4) == 10
    let three = b.constant(4, 3);
    let s1 = b.op(OpCode::IntAdd, &[x, three], 4)?;
    let four = b.constant(4, 4);
    let s2 = b.op(OpCode::IntAdd, &[s1, four], 4)?;
    let ten = b.constant(4, 10);
    let eq = b.op(OpCode::IntEqual, &[s2, ten], 1)?;

    // !(x < y) && flag
    let lt = b.op(OpCode::IntLess, &[x, y], 1)?;
    let not = b.op(OpCode::BoolNegate, &[lt], 1)?;
    let both = b.op(OpCode::BoolAnd, &[not, flag], 1)?;

    // (y | 0) & 0xffffffff
    let zero = b.constant(4, 0);
    let or = b.op(OpCode::IntOr, &[y, zero], 4)?;
    let ones = b.constant(4, 0xffff_ffff);
    let and = b.op(OpCode::IntAnd, &[or, ones], 4)?;

    // 2 * 3 + unused
    let two = b.constant(4, 2);
    let three2 = b.constant(4, 3);
    let folded = b.op(OpCode::IntMult, &[two, three2], 4)?;
    let dead = b.op(OpCode::IntAdd, &[folded, x], 4)?;
    let _ = dead;

    let ret = b.op_void(OpCode::Return, &[eq, both, and])?;
    let mut data = b.finish();

    run(&mut data)?;
    data.verify()?;

    let cmp = data.vn(returned(&data, ret)).def().expect("comparison");
    assert_eq!(data.op(cmp).input(0), Some(x));
    let solved = data.op(cmp).input(1).expect("constant");
    assert_eq!(data.vn(solved).constant_value(), Some(3));

    let masked = data.op(ret).input(2).expect("third output");
    assert_eq!(masked, y);
    assert!(data.ops_by_opcode(OpCode::IntMult).is_empty());
    Ok(())
}

#[test]
fn test_settled_function_is_a_fixpoint() -> Result<()> {
    let (mut data, _) = xor_self()?;
    run(&mut data)?;
    let settled = data.clone();

    let mut pool = ActionPool::with_rules(
        ActionFlags::REPEAT_APPLY,
        "resweep",
        rules::analysis_rules(),
    );
    let mut ctx = EngineContext::new().with_invariant_checks(true);
    assert_eq!(pool.perform(&mut data, &mut ctx)?, Outcome::Done(0));
    assert!(data.graph_eq(&settled));
    Ok(())
}

#[test]
fn test_failed_match_leaves_graph_untouched() -> Result<()> {
    let mut b = FunctionBuilder::new("nomatch", Address::ram(0x1000));
    let x = b.input(4, Address::register(0));
    let y = b.input(4, Address::register(8));
    let sum = b.op(OpCode::IntAdd, &[x, y], 4)?;
    b.op_void(OpCode::Return, &[sum])?;
    let mut data = b.finish();
    let before = data.clone();
    let add = data.vn(sum).def().expect("sum is written");

    let ctx = EngineContext::new();
    for rule in rules::analysis_rules()
        .into_iter()
        .chain(rules::cleanup_rules())
        .filter(|rule| rule.op_list().is_empty() || rule.op_list().contains(&OpCode::IntAdd))
    {
        let applied = rule.apply_op(add, &mut data, &ctx)?;
        assert!(!applied, "{} claims to match a + b", rule.name());
        assert!(data.graph_eq(&before), "{} changed the graph", rule.name());
    }
    Ok(())
}
