use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;
use stowaway::sync_value::SyncValue;

#[test]
fn test_concurrent_reads_see_same_value() {
    let value = Arc::new(SyncValue::new(String::from("configured")));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let value = Arc::clone(&value);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..1000).map(|_| value.read()).collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let reads = handle.join().unwrap();
        assert!(reads.iter().all(|s| s == "configured"));
    }
}

#[test]
fn test_thousand_concurrent_increments() {
    let value = Arc::new(SyncValue::new(7u64));
    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let value = Arc::clone(&value);
            thread::spawn(move || value.modify(|n| *n += 1))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(value.read(), 1007);
}

#[test]
fn test_readers_never_observe_partial_update() {
    // Writers keep both fields equal; a torn read would see them differ.
    let value = Arc::new(SyncValue::new((0u64, 0u64)));

    let writer = {
        let value = Arc::clone(&value);
        thread::spawn(move || {
            for _ in 0..10_000 {
                value.modify(|pair| {
                    pair.0 += 1;
                    std::hint::spin_loop();
                    pair.1 += 1;
                });
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let value = Arc::clone(&value);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let (a, b) = value.read();
                    assert_eq!(a, b);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(value.read(), (10_000, 10_000));
}

#[test]
fn test_read_modify_write_on_map() {
    let index: Arc<SyncValue<HashMap<String, usize>>> = Arc::new(SyncValue::default());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("k{}", (i + j) % 10);
                    index.modify(|map| *map.entry(key).or_insert(0) += 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let total: usize = index.with(|map| map.values().sum());
    assert_eq!(total, 800);
    assert_eq!(index.with(HashMap::len), 10);
}
