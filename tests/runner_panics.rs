//! A panicking task is isolated and reported; the worker keeps going.

use postwork::{Barrier, TaskPanic, TaskRunner, WallClock};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn panicking_task_does_not_stop_later_work() {
    postwork::test_utils::init_test_logging();
    let runner = TaskRunner::new(Arc::new(WallClock::new()));
    let survivor_ran = Arc::new(AtomicBool::new(false));

    runner.post_task(|| panic!("first task exploded"));
    let task_flag = Arc::clone(&survivor_ran);
    runner.post_task(move || {
        task_flag.store(true, Ordering::SeqCst);
    });

    // Rendezvous before close so the counter can be read from the handle.
    let rendezvous = Arc::new(Barrier::new(2));
    let task_rendezvous = Arc::clone(&rendezvous);
    runner.post_task(move || task_rendezvous.wait());
    rendezvous.wait();

    assert!(survivor_ran.load(Ordering::SeqCst));
    assert_eq!(runner.panicked_tasks(), 1);
    runner.close();
}

#[test]
fn panic_hook_receives_the_report() {
    let reports: Arc<Mutex<Vec<(u64, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let runner = TaskRunner::with_panic_hook(Arc::new(WallClock::new()), move |panic: &TaskPanic| {
        sink.lock()
            .expect("report sink")
            .push((panic.seq(), panic.payload().as_str().to_owned()));
    });

    runner.post_task(|| {});
    runner.post_task(|| panic!("kaboom"));
    runner.close();

    let reports = reports.lock().expect("report sink");
    assert_eq!(reports.len(), 1);
    // Sequence 0 was the healthy task; the panicking one came second.
    assert_eq!(reports[0], (1, "kaboom".to_owned()));
}

#[test]
fn panic_count_accumulates() {
    let runner = TaskRunner::new(Arc::new(WallClock::new()));
    for _ in 0..3 {
        runner.post_task(|| panic!("again"));
    }

    let rendezvous = Arc::new(Barrier::new(2));
    let task_rendezvous = Arc::clone(&rendezvous);
    runner.post_task(move || task_rendezvous.wait());
    rendezvous.wait();

    assert_eq!(runner.panicked_tasks(), 3);
    runner.close();
}
