use ccheck::column::{ColumnSpec, Datatype};
use ccheck::contract::{check_contracts, RequiredFunctionContract};
use ccheck::normalize::normalize;
use ccheck::output::check_columns;
use ccheck::signature::FunctionTable;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// Analyzer throughput on synthetic inputs. No child processes are involved;
// compiler and program runs are dominated by the external tools.

/// Compiler output with the usual mix: banners, diagnostics, source excerpts.
fn generate_compiler_output(n_diagnostics: usize) -> String {
    let mut out = String::from("prog.c: In function 'main':\n");
    for i in 0..n_diagnostics {
        let class = if i % 4 == 0 { "error" } else { "warning" };
        out.push_str(&format!(
            "prog.c:{}:{}: {}: something about 'x{}' [-Wall]\n",
            i + 1,
            i % 80 + 1,
            class,
            i
        ));
        out.push_str(&format!("  {} |     int x{} = 0;\n", i + 1, i));
        out.push_str("      |         ^\n");
    }
    out.push_str("collect2: error: ld returned 1 exit status\n");
    out
}

/// A C file with `n_functions` definitions, comments and prototypes between them.
fn generate_source(n_functions: usize) -> String {
    let mut src = String::from("#include <stdio.h>\n#define N 10\n\n");
    for i in 0..n_functions {
        src.push_str(&format!(
            "/* helper {i}\n * spans lines */\nint f{i}(int a, char *s, unsigned long n);\n\
             int f{i}(int a, char *s, unsigned long n) {{\n\t// body\n\treturn a + (int) n;\n}}\n\n"
        ));
    }
    src.push_str("int main(void) {\n\treturn 0;\n}\n");
    src
}

fn generate_table(n_rows: usize) -> String {
    (0..n_rows)
        .map(|i| format!("{} {:.3} name{}\n", i, i as f64 / 7.0, i))
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer/normalize");

    for n in [10_usize, 100, 1000] {
        let text = generate_compiler_output(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &text, |b, text| {
            b.iter(|| black_box(normalize(black_box(text))));
        });
    }

    group.finish();
}

fn bench_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer/signatures");

    for n in [10_usize, 100, 500] {
        let source = generate_source(n);
        let contracts: Vec<RequiredFunctionContract> = (0..n)
            .step_by(3)
            .map(|i| RequiredFunctionContract {
                name: format!("f{}", i),
                return_type: "int".into(),
                arg_types: vec!["unsigned long".into(), "int".into(), "char*".into()],
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| {
                let table = FunctionTable::from_source(black_box(source));
                black_box(check_contracts(&table, &contracts))
            });
        });
    }

    group.finish();
}

fn bench_columns(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer/columns");
    let columns = vec![
        ColumnSpec::of(Datatype::Int),
        ColumnSpec::of(Datatype::Float).with_decimals(3),
        ColumnSpec::of(Datatype::String).with_max_length(12),
    ];

    for n in [100_usize, 10_000] {
        let table = generate_table(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &table, |b, table| {
            b.iter(|| {
                let mut errors = Vec::new();
                check_columns(black_box(table), &columns, &mut errors);
                black_box(errors)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_signatures, bench_columns);
criterion_main!(benches);
