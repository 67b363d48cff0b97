use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use storebridge_core::bridge::{Bridge, Hooks, Methods, Split};
use storebridge_core::reactive::Consumer;
use storebridge_core::store::{Store, TrackedState};

fn wide_bridge(fields: usize) -> Bridge<()> {
    let names: Vec<&'static str> = (0..fields)
        .map(|i| &*Box::leak(format!("field{i}").into_boxed_str()))
        .collect();

    Bridge::new(move |hooks: &mut Hooks, _: &()| {
        let (first, set_first) = hooks.use_state(|| 0_u64)?;
        let tracked = names
            .iter()
            .enumerate()
            .fold(TrackedState::new(), |state, (i, name)| {
                state.with(*name, if i == 0 { first } else { i as u64 })
            });
        Ok(Split::new(
            tracked,
            Methods::new().with("set_first", move |n: u64| set_first.set(n)),
        ))
    })
}

fn store_write_benchmark(c: &mut Criterion) {
    let store = Store::new(TrackedState::new().with("count", 0_u64));

    c.bench_function("store_write", |b| {
        let mut i = 0_u64;
        b.iter(|| {
            store.set_state(TrackedState::new().with("count", black_box(i)));
            i += 1;
        });
    });
}

fn selector_read_benchmark(c: &mut Criterion) {
    let bridge = wide_bridge(8);
    let provider = bridge.mount(()).unwrap();
    let adapted = provider.scope(|| bridge.use_store().unwrap());
    let selector = adapted.store.select::<u64>("field3").unwrap();

    c.bench_function("selector_read", |b| {
        b.iter(|| {
            black_box(selector.get().unwrap());
        });
    });
}

fn method_roundtrip_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("method_roundtrip");

    for fields in [1, 8, 64] {
        let bridge = wide_bridge(fields);
        let provider = bridge.mount(()).unwrap();
        let methods = provider.methods();

        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            let mut i = 0_u64;
            b.iter(|| {
                methods.call::<u64, ()>("set_first", black_box(i)).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

fn consumer_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("consumer_fanout");

    for consumers in [1, 16, 128] {
        let bridge = wide_bridge(4);
        let provider = bridge.mount(()).unwrap();

        // Half the consumers read the field being written, half read another.
        let mounted: Vec<Consumer> = (0..consumers)
            .map(|i| {
                let field = if i % 2 == 0 { "field0" } else { "field1" };
                let reader = bridge.clone();
                provider
                    .scope(|| {
                        Consumer::mount(move || {
                            black_box(reader.use_store()?.store.get::<u64>(field)?);
                            Ok(())
                        })
                    })
                    .unwrap()
            })
            .collect();

        let methods = provider.methods();
        group.bench_with_input(BenchmarkId::from_parameter(consumers), &consumers, |b, _| {
            let mut i = 0_u64;
            b.iter(|| {
                methods.call::<u64, ()>("set_first", black_box(i)).unwrap();
                i += 1;
            });
        });
        drop(mounted);
    }
    group.finish();
}

criterion_group!(
    benches,
    store_write_benchmark,
    selector_read_benchmark,
    method_roundtrip_benchmark,
    consumer_fanout_benchmark,
);
criterion_main!(benches);
