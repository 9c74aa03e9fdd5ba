#![cfg(test)]

use std::{
    sync::{
        Mutex, atomic::{AtomicUsize, Ordering}
    }, time::Duration
};

use super::*;

#[test]
fn zero_streams_is_rejected() {
    assert!(matches!(ThreadPoolExecutor::new(0), Err(KernelsCacheError::Config(_))));
}

#[test]
fn run_all_waits_for_every_task() {
    let executor = ThreadPoolExecutor::new(2).expect("pool");
    let done = AtomicUsize::new(0);

    let tasks: Vec<Task<'_>> = (0..16)
        .map(|i| {
            let done = &done;
            Box::new(move || {
                std::thread::sleep(Duration::from_millis((16 - i) as u64));
                done.fetch_add(1, Ordering::SeqCst);
            }) as Task<'_>
        })
        .collect();

    executor.run_all(tasks);
    assert_eq!(done.load(Ordering::SeqCst), 16);
}

#[test]
fn parallelism_is_bounded_by_streams() {
    let executor = ThreadPoolExecutor::new(3).expect("pool");
    assert_eq!(executor.parallelism(), 3);

    let running = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);
    let tasks: Vec<Task<'_>> = (0..12)
        .map(|_| {
            let (running, peak) = (&running, &peak);
            Box::new(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
            }) as Task<'_>
        })
        .collect();

    executor.run_all(tasks);
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[test]
fn inline_executor_preserves_order() {
    let order = Mutex::new(Vec::new());
    let tasks: Vec<Task<'_>> = (0..5)
        .map(|i| {
            let order = &order;
            Box::new(move || order.lock().unwrap().push(i)) as Task<'_>
        })
        .collect();

    InlineExecutor.run_all(tasks);
    assert_eq!(order.into_inner().unwrap(), vec![0, 1, 2, 3, 4]);
}
