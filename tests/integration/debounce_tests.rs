use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use stowaway::cache::{FileCache, WriteMode};
use stowaway::debounce::Debouncer;
use stowaway::queue::{Executor, Job, SerialQueue};
use tempfile::tempdir;

#[test]
fn test_burst_coalesces_into_one_firing_after_last_trigger() {
    let firings = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&firings);
    let debouncer = Debouncer::new(Duration::from_millis(200)).with_callback(move || {
        recorder.lock().unwrap().push(Instant::now());
    });

    let mut last_trigger = Instant::now();
    for _ in 0..5 {
        last_trigger = Instant::now();
        debouncer.trigger();
        thread::sleep(Duration::from_millis(10));
    }
    thread::sleep(Duration::from_millis(600));

    let firings = firings.lock().unwrap();
    assert_eq!(firings.len(), 1);
    assert!(firings[0].duration_since(last_trigger) >= Duration::from_millis(200));
}

#[test]
fn test_trigger_without_callback_has_no_effect() {
    let debouncer = Debouncer::new(Duration::from_millis(20));
    debouncer.trigger();
    assert!(!debouncer.is_pending());

    // A callback set afterwards must not be fired by the earlier trigger.
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    debouncer.set_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    thread::sleep(Duration::from_millis(100));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_separate_bursts_fire_separately() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let debouncer = Debouncer::new(Duration::from_millis(30)).with_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    debouncer.trigger();
    thread::sleep(Duration::from_millis(200));
    debouncer.trigger();
    debouncer.trigger();
    thread::sleep(Duration::from_millis(200));

    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn test_trigger_from_queue_fires_back_on_that_queue() {
    let queue = SerialQueue::new("test.debounce.origin").unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let debouncer = Arc::new(
        Debouncer::new(Duration::from_millis(20)).with_callback(move || {
            let _ = tx.lock().unwrap().send(SerialQueue::current());
        }),
    );

    let from_queue = Arc::clone(&debouncer);
    queue.execute(Box::new(move || from_queue.trigger()));

    let fired_on = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(fired_on, Some(queue));
}

#[test]
fn test_trigger_from_plain_thread_fires_on_timer_thread() {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let debouncer = Debouncer::new(Duration::from_millis(20)).with_callback(move || {
        let name = thread::current().name().map(str::to_string);
        let _ = tx.lock().unwrap().send(name);
    });
    debouncer.trigger();

    let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(name.as_deref(), Some("stowaway.debounce"));
}

#[test]
fn test_custom_executor_closure() {
    let handed_over = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&handed_over);
    let executor: Arc<dyn Executor> = Arc::new(move |job: Job| {
        count.fetch_add(1, Ordering::SeqCst);
        job();
    });

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let debouncer = Debouncer::new(Duration::from_millis(20))
        .with_executor(executor)
        .with_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    debouncer.trigger();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(handed_over.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debounced_saves_write_once() {
    let dir = tempdir().unwrap();
    let cache = FileCache::with_root(dir.path(), "Debounced");
    let state = Arc::new(Mutex::new(0u32));
    let writes = Arc::new(AtomicUsize::new(0));

    let target = cache.clone();
    let snapshot = Arc::clone(&state);
    let write_count = Arc::clone(&writes);
    let debouncer = Debouncer::new(Duration::from_millis(50)).with_callback(move || {
        let value = *snapshot.lock().unwrap();
        write_count.fetch_add(1, Ordering::SeqCst);
        target.save(value.to_string(), "counter", WriteMode::Sync, None);
    });

    for _ in 0..10 {
        *state.lock().unwrap() += 1;
        debouncer.trigger();
    }
    thread::sleep(Duration::from_millis(300));

    assert_eq!(writes.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get_data("counter").unwrap(), b"10");
}

#[test]
fn test_configured_delay_drives_firing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "debounce_ms = 60\n").unwrap();
    let settings = stowaway::config::CacheSettings::load_from(&path).unwrap();

    let fired_at = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&fired_at);
    let debouncer = Debouncer::from_settings(&settings).with_callback(move || {
        *recorder.lock().unwrap() = Some(Instant::now());
    });
    assert_eq!(debouncer.delay(), Duration::from_millis(60));

    let triggered = Instant::now();
    debouncer.trigger();
    thread::sleep(Duration::from_millis(300));

    let fired = fired_at.lock().unwrap().expect("debouncer did not fire");
    assert!(fired.duration_since(triggered) >= Duration::from_millis(60));
}
