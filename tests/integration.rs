//! Integration tests for the state manager.

use rxstate::{
    rx_state_manager, watch_fields, ChannelConfig, ResubscribePolicy, StateManager,
    StateManagerConfig,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
struct Counter {
    a: i32,
    b: i32,
}

watch_fields!(Counter { a, b });

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn counter() -> StateManager<Counter> {
    init_tracing();
    rx_state_manager(Counter { a: 1, b: 2 })
}

// --- Scenario Tests ---

#[test]
fn test_initial_value_is_readable() {
    let manager = counter();
    assert_eq!(*manager.state().value(), Counter { a: 1, b: 2 });
}

#[test]
fn test_watch_a_ignores_b() {
    let manager = counter();
    let renders = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&renders);
    let mut binding = manager.binding_with_host(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });
    binding.use_state(&["a"]);

    manager.update_state(|draft| draft.b = 3).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 0);

    manager.update_state(|draft| draft.a = 5).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(*binding.use_state(&["a"]), Counter { a: 5, b: 3 });
}

#[test]
fn test_zero_keys_render_on_noop() {
    let manager = counter();
    let mut slot = None;
    manager.use_state_manager::<&str>(&mut slot, &[]);

    manager.update_state(|_| {}).unwrap();

    let binding = slot.as_ref().unwrap();
    assert_eq!(binding.render_requests(), 1);
    assert!(binding.take_dirty());
}

#[test]
fn test_zero_keys_render_on_every_update() {
    let manager = counter();
    let mut binding = manager.binding();
    binding.use_state::<&str>(&[]);

    manager.update_state(|draft| draft.a += 1).unwrap();
    manager.update_state(|draft| draft.b += 1).unwrap();
    manager.set_state(Counter { a: 0, b: 0 }).unwrap();

    assert_eq!(binding.render_requests(), 3);
}

#[test]
fn test_key_count_change_resubscribes() {
    let manager = counter();
    let mut slot = None;

    manager.use_state_manager(&mut slot, &["a"]);
    let first = slot.as_ref().unwrap().subscription_id();

    manager.use_state_manager(&mut slot, &["a", "b"]);
    let second = slot.as_ref().unwrap().subscription_id();
    assert_ne!(first, second);

    manager.update_state(|draft| draft.b = 10).unwrap();
    assert_eq!(slot.as_ref().unwrap().render_requests(), 1);
}

#[test]
fn test_same_count_keeps_old_filter() {
    let manager = counter();
    let mut slot = None;

    manager.use_state_manager(&mut slot, &["a"]);
    let first = slot.as_ref().unwrap().subscription_id();

    manager.use_state_manager(&mut slot, &["b"]);
    assert_eq!(slot.as_ref().unwrap().subscription_id(), first);

    // Still filtering on "a".
    manager.update_state(|draft| draft.b = 10).unwrap();
    assert_eq!(slot.as_ref().unwrap().render_requests(), 0);

    manager.update_state(|draft| draft.a = 10).unwrap();
    assert_eq!(slot.as_ref().unwrap().render_requests(), 1);
}

#[test]
fn test_key_sequence_policy() {
    init_tracing();
    let manager = StateManager::with_config(
        Counter { a: 1, b: 2 },
        StateManagerConfig {
            resubscribe: ResubscribePolicy::KeySequence,
            ..Default::default()
        },
    );
    let mut slot = None;

    manager.use_state_manager(&mut slot, &["a"]);
    manager.use_state_manager(&mut slot, &["b"]);

    manager.update_state(|draft| draft.b = 10).unwrap();
    assert_eq!(slot.as_ref().unwrap().render_requests(), 1);

    manager.update_state(|draft| draft.a = 10).unwrap();
    assert_eq!(slot.as_ref().unwrap().render_requests(), 1);
}

#[test]
fn test_many_components() {
    let manager = counter();
    let mut watch_a = manager.binding();
    let mut watch_b = manager.binding();
    let mut watch_all = manager.binding();
    watch_a.use_state(&["a"]);
    watch_b.use_state(&["b"]);
    watch_all.use_state::<&str>(&[]);
    assert_eq!(manager.state().subscriber_count(), 3);

    for i in 0..5 {
        manager.update_state(|draft| draft.a = 100 + i).unwrap();
    }
    manager.update_state(|draft| draft.b = 50).unwrap();

    assert_eq!(watch_a.render_requests(), 5);
    assert_eq!(watch_b.render_requests(), 1);
    assert_eq!(watch_all.render_requests(), 6);

    drop(watch_a);
    watch_b.unmount();
    assert_eq!(manager.state().subscriber_count(), 1);
}

#[test]
fn test_component_removal_stops_renders() {
    let manager = counter();
    let renders = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&renders);
    let mut slot = Some(manager.binding_with_host(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    }));
    manager.use_state_manager::<&str>(&mut slot, &[]);

    manager.update_state(|draft| draft.a = 2).unwrap();
    slot.take();
    manager.update_state(|draft| draft.a = 3).unwrap();

    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(manager.state().subscriber_count(), 0);
}

#[test]
fn test_render_host_can_read_state() {
    let manager = counter();
    let reader = manager.clone();
    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let mut binding = manager.binding_with_host(move || {
        sink.lock().push(reader.value().a);
    });
    binding.use_state(&["a"]);

    manager.update_state(|draft| draft.a = 7).unwrap();
    assert_eq!(*observed.lock(), vec![7]);
}

#[test]
fn test_dynamic_record_state() {
    init_tracing();
    let mut initial = BTreeMap::new();
    initial.insert("title".to_string(), "draft".to_string());
    initial.insert("owner".to_string(), "ada".to_string());
    let manager = rx_state_manager(initial);

    let mut binding = manager.binding();
    binding.use_state(&["title"]);

    manager
        .update_state(|draft| {
            draft.insert("owner".to_string(), "grace".to_string());
        })
        .unwrap();
    assert_eq!(binding.render_requests(), 0);

    manager
        .update_state(|draft| {
            draft.insert("title".to_string(), "final".to_string());
        })
        .unwrap();
    assert_eq!(binding.render_requests(), 1);
    assert_eq!(binding.current()["owner"], "grace");
}

#[test]
fn test_watch_channel_across_threads() {
    let manager = counter();
    let watcher = manager.state().watch(ChannelConfig::default());

    let reader = std::thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(value) = watcher.recv_timeout(Duration::from_secs(2)) {
            seen.push(value.a);
            if value.a == 3 {
                break;
            }
        }
        seen
    });

    manager.update_state(|draft| draft.a = 2).unwrap();
    manager.update_state(|draft| draft.a = 3).unwrap();

    assert_eq!(reader.join().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_concurrent_updates_reach_bindings() {
    let manager = counter();
    let mut binding = manager.binding();
    binding.use_state(&["a"]);

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for _ in 0..2000 {
                    manager
                        .update_state(|draft| {
                            let a = draft.a;
                            std::thread::yield_now();
                            draft.a = a + 1;
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(manager.value().a, 16_001);
    assert_eq!(manager.state().version(), 16_000);
    // The binding never falls behind the container.
    assert!(Arc::ptr_eq(&binding.current(), &manager.value()));
}

#[test]
fn test_binding_created_before_update_does_not_render() {
    let manager = counter();
    let renders = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&renders);
    let mut binding = manager.binding_with_host(move || {
        hits.fetch_add(1, Ordering::SeqCst);
    });

    manager.update_state(|draft| draft.a = 5).unwrap();

    assert_eq!(binding.use_state(&["a"]).a, 5);
    assert_eq!(binding.render_requests(), 0);
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[test]
fn test_config_deserializes() {
    let policy: ResubscribePolicy = serde_json::from_str("\"key_sequence\"").unwrap();
    assert_eq!(policy, ResubscribePolicy::KeySequence);

    let channel: ChannelConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(channel.buffer_size, 1000);

    let channel: ChannelConfig = serde_json::from_str(r#"{"buffer_size": 8}"#).unwrap();
    assert_eq!(channel.buffer_size, 8);
}
