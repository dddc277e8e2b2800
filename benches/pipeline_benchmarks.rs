//! Benchmarks for each stage of the Abra pipeline.
//!
//! - Parsing: source text to AST
//! - Checking and compiling: AST to linked bytecode
//! - Execution: running linked programs on the VM

use std::hint::black_box;

use abra::{Toolchain, VmConfig};
use abra_compiler::{Prelude, check_program, compile_program};
use abra_parser::Parser;
use abra_vm::Vm;
use bumpalo::Bump;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

const FIBONACCI: &str = include_str!("../test_scripts/fibonacci.abra");
const FIZZBUZZ: &str = include_str!("../test_scripts/fizzbuzz.abra");
const GREETING: &str = include_str!("../test_scripts/greeting.abra");

fn parse_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/parse");
    for (name, source) in [("fibonacci", FIBONACCI), ("fizzbuzz", FIZZBUZZ), ("greeting", GREETING)] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let arena = Bump::new();
                let script = Parser::parse(black_box(source), &arena).expect("script parses");
                black_box(script.items().len())
            });
        });
    }
    group.finish();
}

fn compile_benchmarks(c: &mut Criterion) {
    let prelude = Prelude::standard();
    let mut group = c.benchmark_group("pipeline/compile");
    for (name, source) in [("fibonacci", FIBONACCI), ("greeting", GREETING)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let checked = check_program(black_box(source), None, &prelude).expect("checks");
                black_box(compile_program(&checked).expect("compiles").modules.len())
            });
        });
    }
    group.finish();
}

fn execution_benchmarks(c: &mut Criterion) {
    let prelude = Prelude::standard();
    let mut group = c.benchmark_group("pipeline/execute");

    // Compiled once so only the VM is measured.
    let source = "func fib(n: Int): Int {\n  if (n == 0) 0 else if (n == 1) 1 else fib(n - 2) + fib(n - 1)\n}\nfib(20)";
    let checked = check_program(source, None, &prelude).expect("checks");
    let program = compile_program(&checked).expect("compiles");
    group.bench_function("fib_20", |b| {
        b.iter(|| {
            let mut output = |_: &str| {};
            let mut vm = Vm::new(&program, VmConfig::default(), &mut output);
            black_box(vm.run().expect("runs"))
        });
    });

    let toolchain = Toolchain::global();
    group.bench_function("fizzbuzz_end_to_end", |b| {
        b.iter(|| black_box(toolchain.run_with_output(black_box(FIZZBUZZ), None, &mut |_| {})));
    });
    group.finish();
}

criterion_group!(benches, parse_benchmarks, compile_benchmarks, execution_benchmarks);
criterion_main!(benches);
