//! Integration Tests for the Bridge
//!
//! These tests mount providers and consumers together and check what the
//! consumers observe.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use storebridge_core::bridge::{Bridge, Hooks, Methods, Record, Split};
use storebridge_core::reactive::Consumer;
use storebridge_core::store::{store_config, Container, Store, StoreConfig, TrackedState};
use storebridge_core::BridgeError;

/// A counter bridge: tracks `count`, exposes `set_count`.
fn counter_bridge() -> Bridge<i32> {
    Bridge::new(|hooks: &mut Hooks, initial: &i32| {
        let (count, set_count) = hooks.use_state(|| *initial)?;
        Ok(Split::new(
            TrackedState::new().with("count", count),
            Methods::new().with("set_count", move |n: i32| set_count.set(n)),
        ))
    })
}

/// Scenario A: a consumer of `count` follows `set_count`.
#[test]
fn consumer_follows_method_updates() {
    let bridge = counter_bridge();
    let provider = bridge.mount(5).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (reader, log) = (bridge.clone(), seen.clone());
    let consumer = provider
        .scope(|| {
            Consumer::mount(move || {
                let count: i32 = reader.use_store()?.store.get("count")?;
                log.lock().push(count);
                Ok(())
            })
        })
        .unwrap();
    assert_eq!(*seen.lock(), vec![5]);

    provider
        .scope(|| bridge.use_store()?.call::<i32, ()>("set_count", 6))
        .unwrap();

    assert_eq!(*seen.lock(), vec![5, 6]);
    assert_eq!(consumer.run_count(), 2);
}

/// Scenario B: four counters, four consumers, only the reader of the
/// changed field re-runs.
#[test]
fn consumers_rerun_only_for_their_field() {
    let bridge = Bridge::with_keys(
        |hooks: &mut Hooks, init: &[i32; 4]| {
            let (count1, set_count1) = hooks.use_state(|| init[0])?;
            let (count2, set_count2) = hooks.use_state(|| init[1])?;
            let (count3, set_count3) = hooks.use_state(|| init[2])?;
            let (count4, set_count4) = hooks.use_state(|| init[3])?;
            Ok(Record::new()
                .value("count1", count1)
                .value("count2", count2)
                .value("count3", count3)
                .value("count4", count4)
                .method("set_count1", move |n: i32| set_count1.set(n))
                .method("set_count2", move |n: i32| set_count2.set(n))
                .method("set_count3", move |n: i32| set_count3.set(n))
                .method("set_count4", move |n: i32| set_count4.set(n)))
        },
        &["count1", "count2", "count3", "count4"],
        &["set_count1", "set_count2", "set_count3", "set_count4"],
    );
    let provider = bridge.mount([1, 2, 3, 4]).unwrap();
    let readers = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    // The fourth consumer reads `count2`, like a component wired to the
    // wrong field; it must follow `count2`, not `count4`.
    let wiring = [
        ("consumer1", "count1"),
        ("consumer2", "count2"),
        ("consumer3", "count3"),
        ("consumer4", "count2"),
    ];
    let consumers: Vec<Consumer> = wiring
        .iter()
        .map(|&(name, field)| {
            let (reader, log) = (bridge.clone(), readers.clone());
            provider
                .scope(|| {
                    Consumer::mount(move || {
                        reader.use_store()?.store.get::<i32>(field)?;
                        log.lock().push(name);
                        Ok(())
                    })
                })
                .unwrap()
        })
        .collect();
    assert_eq!(consumers.len(), 4);

    let click = |method: &str, value: i32| {
        readers.lock().clear();
        provider
            .scope(|| bridge.use_store()?.call::<i32, ()>(method, value))
            .unwrap();
        let mut log = readers.lock().clone();
        log.sort_unstable();
        log
    };

    assert_eq!(click("set_count1", 2), vec!["consumer1"]);
    assert_eq!(click("set_count2", 3), vec!["consumer2", "consumer4"]);
    assert_eq!(click("set_count4", 5), Vec::<&str>::new());

    // Writing the store directly bypasses the source but still isolates.
    readers.lock().clear();
    provider
        .container()
        .set_state(TrackedState::new().with("count3", 4));
    assert_eq!(*readers.lock(), vec!["consumer3"]);

    let state = provider.container().state();
    assert_eq!(state.get_as::<i32>("count1"), Ok(2));
    assert_eq!(state.get_as::<i32>("count2"), Ok(3));
    assert_eq!(state.get_as::<i32>("count3"), Ok(4));
    assert_eq!(state.get_as::<i32>("count4"), Ok(5));
}

/// A container that adds its own `count1` next to the bridged fields.
#[derive(Clone)]
struct CounterStore {
    store: Store,
}

impl CounterStore {
    fn increment1(&self) {
        self.store.update(|state| {
            let count1 = state.get_as::<i32>("count1").unwrap_or_default();
            TrackedState::new().with("count1", count1 + 1)
        });
    }
}

impl Container for CounterStore {
    fn store(&self) -> &Store {
        &self.store
    }
}

struct CounterConfig;

impl StoreConfig for CounterConfig {
    type Container = CounterStore;

    fn create_container(&self, initial: TrackedState) -> CounterStore {
        CounterStore {
            store: Store::new(initial.with("count1", 0)),
        }
    }
}

/// Scenario C: container-native fields survive bridged updates, and
/// container-native methods never touch the source.
#[test]
fn custom_container_keeps_its_own_fields() {
    let bridge = counter_bridge().with_config(CounterConfig);
    let provider = bridge.mount(5).unwrap();
    let renders_after_mount = provider.render_count();

    provider.scope(|| {
        let adapted = bridge.use_store().unwrap();
        assert!(adapted.store.contains("count1"));
        assert_eq!(adapted.store.get::<i32>("count"), Ok(5));
        assert_eq!(adapted.store.get::<i32>("count1"), Ok(0));

        adapted.container().increment1();
        adapted.container().increment1();
        assert_eq!(adapted.store.get::<i32>("count1"), Ok(2));
        assert_eq!(provider.render_count(), renders_after_mount);

        adapted.call::<i32, ()>("set_count", 9).unwrap();
        assert_eq!(adapted.store.get::<i32>("count"), Ok(9));
        assert_eq!(adapted.store.get::<i32>("count1"), Ok(2));
    });
}

/// A closure-built configuration that forgets a tracked field fails on the
/// first read of that field, and recovers once an update writes it.
#[test]
fn incomplete_container_fails_on_read_until_written() {
    let bridge = counter_bridge().with_config(store_config(
        |_initial: TrackedState| Store::new(TrackedState::new().with("other", 1)),
        |store: &Store, next| store.set_state(next),
    ));
    let provider = bridge.mount(5).unwrap();

    provider.scope(|| {
        let adapted = bridge.use_store().unwrap();
        assert!(adapted.store.contains("count"));
        assert_eq!(
            adapted.store.get::<i32>("count"),
            Err(BridgeError::ContainerInvariant {
                field: "count".into()
            })
        );
        assert_eq!(adapted.store.get::<i32>("other"), Ok(1));
    });

    provider
        .scope(|| bridge.use_store()?.call::<i32, ()>("set_count", 6))
        .unwrap();

    provider.scope(|| {
        let adapted = bridge.use_store().unwrap();
        assert_eq!(adapted.store.get::<i32>("count"), Ok(6));
    });
}

/// State written while the first render runs is committed by `mount`.
#[test]
fn state_set_during_the_first_render_is_committed() {
    let bridge = Bridge::new(|hooks: &mut Hooks, _: &()| {
        let (count, set_count) = hooks.use_state(|| 0)?;
        if count == 0 {
            set_count.set(1);
        }
        Ok(Split::new(
            TrackedState::new().with("count", count),
            Methods::new(),
        ))
    });
    let provider = bridge.mount(()).unwrap();

    assert_eq!(provider.container().state().get_as::<i32>("count"), Ok(1));
    assert_eq!(provider.render_count(), 2);
    assert_eq!(provider.commit_count(), 1);
    assert_eq!(provider.trigger().pending(), 0);

    let reader = bridge.clone();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let _consumer = provider
        .scope(|| {
            Consumer::mount(move || {
                log.lock().push(reader.use_store()?.store.get::<i32>("count")?);
                Ok(())
            })
        })
        .unwrap();
    assert_eq!(*seen.lock(), vec![1]);
}

/// An explicit trigger request from the first render is honored the same way.
#[test]
fn trigger_requested_during_the_first_render_is_honored() {
    let input = Arc::new(Mutex::new(0));
    let bridge = Bridge::new({
        let input = input.clone();
        move |hooks: &mut Hooks, _: &()| {
            let value = {
                let mut input = input.lock();
                if hooks.is_first_render() {
                    *input = 7;
                    hooks.trigger().request()?;
                    0
                } else {
                    *input
                }
            };
            Ok(Split::new(
                TrackedState::new().with("value", value),
                Methods::new(),
            ))
        }
    });
    let provider = bridge.mount(()).unwrap();

    assert_eq!(provider.container().state().get_as::<i32>("value"), Ok(7));
    assert_eq!(provider.render_count(), 2);
}

/// P1: the container keeps its identity across argument changes.
#[test]
fn container_identity_is_stable_across_rerenders() {
    let bridge = Bridge::new(|_: &mut Hooks, label: &String| {
        Ok(Split::new(
            TrackedState::new().with("label", label.clone()),
            Methods::new(),
        ))
    });
    let provider = bridge.mount("a".to_string()).unwrap();
    let first = provider.container().clone();

    for label in ["b", "c", "d"] {
        provider.rerender(label.to_string()).unwrap();
        let current = provider.scope(|| bridge.use_store().unwrap()).store;
        assert!(current.container().ptr_eq(&first));
        assert_eq!(first.state().get_as::<String>("label"), Ok(label.to_string()));
    }

    assert_eq!(provider.render_count(), 4);
    assert_eq!(provider.commit_count(), 3);
    assert_eq!(provider.args(), "d");
}

/// P2: a selector on `a` ignores writes to `b`.
#[test]
fn selectors_are_independent() {
    let bridge = Bridge::new(|hooks: &mut Hooks, _: &()| {
        let (a, set_a) = hooks.use_state(|| 0)?;
        let (b, set_b) = hooks.use_state(|| 0)?;
        Ok(Split::new(
            TrackedState::new().with("a", a).with("b", b),
            Methods::new()
                .with("set_a", move |n: i32| set_a.set(n))
                .with("set_b", move |n: i32| set_b.set(n)),
        ))
    });
    let provider = bridge.mount(()).unwrap();

    let reader = bridge.clone();
    let consumer = provider
        .scope(|| Consumer::mount(move || reader.use_store()?.store.get::<i32>("a").map(drop)))
        .unwrap();

    provider.scope(|| {
        let adapted = bridge.use_store().unwrap();
        adapted.call::<i32, ()>("set_b", 1).unwrap();
        adapted.call::<i32, ()>("set_b", 2).unwrap();
    });
    assert_eq!(consumer.run_count(), 1);

    provider
        .scope(|| bridge.use_store()?.call::<i32, ()>("set_a", 1))
        .unwrap();
    assert_eq!(consumer.run_count(), 2);
}

/// P3: methods are refreshed even when no tracked field changed.
#[test]
fn methods_are_fresh_after_untracked_changes() {
    let bridge = Bridge::new(|hooks: &mut Hooks, _: &()| {
        let (count, set_count) = hooks.use_state(|| 0)?;
        let (step, set_step) = hooks.use_state(|| 1)?;
        Ok(Split::new(
            TrackedState::new().with("count", count),
            Methods::new()
                .with("increment", move |_: ()| set_count.set(count + step))
                .with("set_step", move |n: i32| set_step.set(n)),
        ))
    });
    let provider = bridge.mount(()).unwrap();

    let before = provider.methods().get("increment").unwrap().clone();
    provider
        .scope(|| bridge.use_store()?.call::<i32, ()>("set_step", 10))
        .unwrap();

    // Tracked state did not change, so the container was left alone...
    assert_eq!(provider.commit_count(), 0);
    // ...but the closure was replaced.
    let after = provider.methods().get("increment").unwrap().clone();
    assert!(!before.ptr_eq(&after));

    provider
        .scope(|| bridge.use_store()?.call::<(), ()>("increment", ()))
        .unwrap();
    assert_eq!(provider.container().state().get_as::<i32>("count"), Ok(10));

    provider
        .scope(|| bridge.use_store()?.call::<(), ()>("increment", ()))
        .unwrap();
    assert_eq!(provider.container().state().get_as::<i32>("count"), Ok(20));
}

/// P4: no provider, no state.
#[test]
fn missing_provider_fails_before_any_read() {
    let bridge = counter_bridge();
    let reads = Arc::new(Mutex::new(0));

    let (reader, reads_clone) = (bridge.clone(), reads.clone());
    let err = Consumer::mount(move || {
        let adapted = reader.use_store()?;
        *reads_clone.lock() += 1;
        adapted.store.get::<i32>("count").map(drop)
    })
    .unwrap_err();

    assert_eq!(
        err,
        BridgeError::MissingProvider {
            accessor: "use_store"
        }
    );
    assert_eq!(*reads.lock(), 0);

    // Mounting a provider elsewhere does not leak into this scope.
    let _provider = bridge.mount(1).unwrap();
    assert!(matches!(
        bridge.use_store(),
        Err(BridgeError::MissingProvider { .. })
    ));
}

/// P5: every recomputation is committed, in order, even when requests pile
/// up during a flush.
#[test]
fn updates_are_applied_in_recomputation_order() {
    // Each render takes the next scripted value, then repeats the last one.
    let script = Arc::new(Mutex::new(VecDeque::from([0, 1, 2, 3])));
    let last = Arc::new(Mutex::new(0));
    let bridge = Bridge::new({
        let (script, last) = (script.clone(), last.clone());
        move |_: &mut Hooks, _: &()| {
            let mut last = last.lock();
            if let Some(next) = script.lock().pop_front() {
                *last = next;
            }
            Ok(Split::new(
                TrackedState::new().with("value", *last),
                Methods::new(),
            ))
        }
    });
    let provider = bridge.mount(()).unwrap();
    let trigger = provider.trigger();

    let initial = provider.container().state().get_as::<i32>("value").unwrap();
    let sampled = Arc::new(Mutex::new(vec![initial]));
    let (log, requeue) = (sampled.clone(), trigger.clone());
    let _sub = provider.container().subscribe(move |next, _prev| {
        let value = next.get_as::<i32>("value").unwrap();
        log.lock().push(value);
        if value == 1 {
            // Both land behind the current commit.
            assert_eq!(requeue.request(), Ok(()));
            assert_eq!(requeue.request(), Ok(()));
            assert_eq!(requeue.pending(), 2);
        }
    });

    trigger.request().unwrap();

    assert_eq!(*sampled.lock(), vec![0, 1, 2, 3]);
    assert_eq!(provider.render_count(), 4);
    assert_eq!(provider.commit_count(), 3);
    assert!(script.lock().is_empty());
    assert!(!trigger.is_flushing());
}

/// A source that changes its tracked keys is rejected.
#[test]
fn tracked_key_set_is_fixed() {
    let bridge = Bridge::new(|_: &mut Hooks, extra: &bool| {
        let mut tracked = TrackedState::new().with("count", 1);
        if *extra {
            tracked = tracked.with("extra", 2);
        }
        Ok(Split::new(tracked, Methods::new()))
    });
    let provider = bridge.mount(false).unwrap();

    let err = provider.rerender(true).unwrap_err();
    assert!(matches!(err, BridgeError::ShapeChanged { .. }));
    assert_eq!(provider.last_error(), Some(err));
    assert_eq!(provider.commit_count(), 0);

    provider.rerender(false).unwrap();
    assert_eq!(provider.last_error(), None);
}

/// Unmounting releases every subscription and hides the scope.
#[test]
fn unmount_tears_down_the_scope() {
    let bridge = counter_bridge();
    let provider = bridge.mount(1).unwrap();

    let reader = bridge.clone();
    let consumer = provider
        .scope(|| Consumer::mount(move || reader.use_store()?.store.get::<i32>("count").map(drop)))
        .unwrap();
    let store = provider.container().clone();
    let methods = provider.methods();
    assert_eq!(store.subscriber_count(), 1);

    provider.unmount();
    assert_eq!(store.subscriber_count(), 0);
    assert!(store.is_closed());

    // A setter outliving its provider does nothing.
    methods.call::<i32, ()>("set_count", 7).unwrap();
    assert_eq!(store.state().get_as::<i32>("count"), Ok(1));

    // A consumer re-run after unmount no longer finds the scope.
    assert!(matches!(
        consumer.execute(),
        Err(BridgeError::MissingProvider { .. })
    ));
    assert!(consumer.last_error().is_some());
}
