extern crate pcodeopt;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use pcodeopt::prelude::*;
use std::hint::black_box;

/// A straight-line function of `n` independent expressions, each collapsing under the
/// default rules: `((x + i) + 1) == 10`, `(v << 3) << 5` and `v ^ v`.
fn build(n: usize) -> Funcdata {
    let mut b = FunctionBuilder::new("bench", Address::ram(0x1000));
    let x = b.input(4, Address::register(0));
    let v = b.input(4, Address::register(8));
    let mut outputs = Vec::with_capacity(n * 3);
    for i in 0..n {
        let ci = b.constant(4, i as u64);
        let one = b.constant(4, 1);
        let ten = b.constant(4, 10);
        let s1 = b.op(OpCode::IntAdd, &[x, ci], 4).unwrap();
        let s2 = b.op(OpCode::IntAdd, &[s1, one], 4).unwrap();
        outputs.push(b.op(OpCode::IntEqual, &[s2, ten], 1).unwrap());

        let three = b.constant(4, 3);
        let five = b.constant(4, 5);
        let l1 = b.op(OpCode::IntLeft, &[v, three], 4).unwrap();
        outputs.push(b.op(OpCode::IntLeft, &[l1, five], 4).unwrap());

        outputs.push(b.op(OpCode::IntXor, &[v, v], 4).unwrap());
    }
    b.op_void(OpCode::Return, &outputs).unwrap();
    b.finish()
}

/// Benchmark a full default-profile run over functions of growing size.
fn bench_decompile(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::default()).unwrap();

    let mut group = c.benchmark_group("decompile");
    for n in [8usize, 64, 256] {
        let template = build(n);
        group.throughput(Throughput::Elements(template.num_ops() as u64));
        group.bench_function(format!("exprs_{}", n), |b| {
            b.iter_batched(
                || template.clone(),
                |mut data| {
                    let summary = engine.decompile(black_box(&mut data)).unwrap();
                    black_box(summary.changes)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark the parallel batch driver.
fn bench_decompile_all(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let template: Vec<Funcdata> = (0..32).map(|_| build(32)).collect();

    let mut group = c.benchmark_group("decompile_all");
    group.throughput(Throughput::Elements(template.len() as u64));
    group.bench_function("32x32", |b| {
        b.iter_batched(
            || template.clone(),
            |mut functions| black_box(engine.decompile_all(&mut functions)),
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_decompile, bench_decompile_all);
criterion_main!(benches);
