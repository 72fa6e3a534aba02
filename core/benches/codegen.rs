//! Benchmarks for code generation and decompilation.
//!
//! Run with: `cargo bench` in the core/ directory.
//!
//! Benchmark groups:
//! 1. generate: AST to bytecode, with and without the reduce-ref pass
//! 2. decompile: bytecode back to AST
//! 3. find_line_number: one uncached line lookup per iteration

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use moocode_core::{
    api::CompilationOptions,
    ast::{BinaryOp, CondArm, Expr, Names, ParsedVerb, Stmt},
    compiler::generate,
    decompiler::{decompile_program, find_line_number},
    program::VectorId,
};

/// A verb of `n` statements shaped like `if (x > i) x = x + i; endif`.
fn generate_verb(n: usize) -> ParsedVerb {
    let mut names = Names::new();
    let x = names.find_or_add("x");
    let body = (0..n as i64)
        .map(|i| Stmt::Cond {
            arms: vec![CondArm {
                condition: Expr::binary(BinaryOp::Gt, Expr::var(x), Expr::int(i)),
                body: vec![Stmt::Expr(Expr::assign(
                    Expr::var(x),
                    Expr::binary(BinaryOp::Add, Expr::var(x), Expr::int(i)),
                ))],
            }],
            otherwise: None,
        })
        .collect();
    ParsedVerb::new(names, body)
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        let verb = generate_verb(size);

        group.bench_with_input(BenchmarkId::new("plain", size), &verb, |b, verb| {
            let options = CompilationOptions::default();
            b.iter(|| black_box(generate(black_box(verb), &options)));
        });

        group.bench_with_input(BenchmarkId::new("reduce_ref", size), &verb, |b, verb| {
            let options = CompilationOptions {
                reduce_ref: true,
                ..CompilationOptions::default()
            };
            b.iter(|| black_box(generate(black_box(verb), &options)));
        });
    }

    group.finish();
}

fn bench_decompile(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompile");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        let program = generate(&generate_verb(size), &CompilationOptions::default());

        group.bench_with_input(BenchmarkId::from_parameter(size), &program, |b, program| {
            b.iter(|| black_box(decompile_program(black_box(program), None)));
        });
    }

    group.finish();
}

fn bench_find_line_number(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_line_number");

    for size in [10, 100, 1000] {
        let program = generate(&generate_verb(size), &CompilationOptions::default());
        // The final DONE forces a walk over the whole vector.
        let last = program.main_vector().len() - 1;

        group.bench_with_input(BenchmarkId::from_parameter(size), &program, |b, program| {
            b.iter(|| black_box(find_line_number(program, VectorId::Main, black_box(last))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_decompile, bench_find_line_number);
criterion_main!(benches);
