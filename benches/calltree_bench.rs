// Call-tree construction benchmark over a synthetic symbol database.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fortrace::domain::builder::{BuildOptions, CallTreeBuilder, CancelToken};
use fortrace::domain::database::SymbolDatabase;
use fortrace::domain::symbol::{CallReference, SymbolKind, SymbolRecord};

/// A module of `width` subroutines, each calling the next `fanout`
/// ones, so the graph has heavy node sharing.
fn synthetic_database(width: usize, fanout: usize) -> SymbolDatabase {
    let mut records = Vec::with_capacity(width + 1);
    let module = SymbolRecord {
        name: "bench_mod".to_string(),
        file: "bench.f90".to_string(),
        line_start: 1,
        line_end: (width as u32 + 2) * 10,
        kind: SymbolKind::Module,
        parent: None,
        children: (1..=width).collect(),
        use_modules: vec![],
        args: vec![],
        bind_target: None,
        extends: None,
        calls: vec![],
    };
    records.push(module);

    for i in 0..width {
        let line = (i as u32 + 1) * 10;
        let calls = (1..=fanout)
            .filter(|k| i + k < width)
            .map(|k| CallReference {
                name: format!("sub_{}", i + k),
                line: line + 1,
                arg_count: None,
                receiver_type: None,
            })
            .collect();
        records.push(SymbolRecord {
            name: format!("sub_{}", i),
            file: "bench.f90".to_string(),
            line_start: line,
            line_end: line + 9,
            kind: SymbolKind::Subroutine,
            parent: Some(0),
            children: vec![],
            use_modules: vec![],
            args: vec![],
            bind_target: None,
            extends: None,
            calls,
        });
    }

    SymbolDatabase::from_records(records)
}

fn bench_build(c: &mut Criterion) {
    let db = synthetic_database(500, 4);
    let opts = BuildOptions {
        max_depth: 50,
        poll_interval: Duration::from_millis(100),
        ..BuildOptions::default()
    };
    let builder = CallTreeBuilder::new(&db, opts);

    c.bench_function("build_call_tree_500", |b| {
        b.iter(|| {
            let outcome = builder.build(
                black_box("sub_0"),
                black_box("bench.f90"),
                10,
                &CancelToken::new(),
                None,
            );
            black_box(outcome.tree.len())
        })
    });
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
