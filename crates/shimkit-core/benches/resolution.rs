//! Name resolution and member access benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shimkit_core::{wrap, Contract, MapRef, MatchMode, NameIndex, NameResolver, TypeDesc, Value};

fn candidates() -> Vec<String> {
    (0..64).map(|i| format!("field_name_{}", i)).collect()
}

fn bench_resolver(c: &mut Criterion) {
    let names = candidates();
    let resolver = NameResolver::new(MatchMode::Fuzzy);
    c.bench_function("resolve_linear_fuzzy", |b| {
        b.iter(|| resolver.resolve(black_box("FieldName63"), &names))
    });

    let mut index = NameIndex::new();
    for (i, name) in names.iter().enumerate() {
        index.insert(name, i);
    }
    c.bench_function("resolve_index_fuzzy", |b| {
        b.iter(|| index.lookup(black_box("FieldName63"), MatchMode::Fuzzy))
    });
}

fn bench_shim_get(c: &mut Criterion) {
    let mut builder = Contract::builder("Wide");
    for i in 0..64 {
        builder = builder.read_write(format!("FieldName{}", i), TypeDesc::Integer);
    }
    let contract = builder.build();
    let map = MapRef::from_entries(candidates().into_iter().enumerate().map(|(i, k)| (k, Value::from(i as i64))));
    let shim = wrap(vec![Value::Map(map)], &contract, MatchMode::Fuzzy).unwrap();

    c.bench_function("dictionary_shim_get", |b| b.iter(|| shim.get(black_box("FieldName63"))));
}

criterion_group!(benches, bench_resolver, bench_shim_get);
criterion_main!(benches);
