use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mapsql::{Value, Values, Where, builder, format_sql};

/// A where-map with `n` equality filters: col0 = ?, col1 = ?, ...
fn build_filter(n: usize) -> Where {
    (0..n)
        .map(|i| (format!("col{i}"), Value::Int(i as i64)))
        .collect()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/select");

    for n in [1, 5, 10, 50, 100] {
        let filter = build_filter(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filter, |b, filter| {
            b.iter(|| {
                let mut filter = filter.clone();
                black_box(builder::select("t", &mut filter))
            });
        });
    }

    group.finish();
}

fn bench_select_in_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/select_in_list");

    for n in [5, 20, 100, 500] {
        let ids: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter(|| {
                let mut filter = Where::new().with("id in", ids.clone());
                black_box(builder::select("t", &mut filter))
            });
        });
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/update");

    for n in [1, 10, 50] {
        let values: Values = (0..n)
            .map(|i| (format!("col{i}"), Value::Text(format!("v{i}"))))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let mut filter = Where::new().with("id", 1);
                black_box(builder::update("t", values, &mut filter))
            });
        });
    }

    group.finish();
}

fn bench_format_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/format_sql");

    for n in [1, 10, 100] {
        let mut filter = build_filter(n);
        let stmt = builder::select("t", &mut filter).expect("valid filter");
        group.bench_with_input(BenchmarkId::from_parameter(n), &stmt, |b, stmt| {
            b.iter(|| black_box(format_sql(stmt.sql(), stmt.args())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_select,
    bench_select_in_list,
    bench_update,
    bench_format_sql
);
criterion_main!(benches);
