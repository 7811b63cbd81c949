// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Semaphore behavior, with kernel threads running on std threads.

use std::sync::Mutex;

use rtk_sync::sys::critical::CriticalGuard;
use rtk_sync::time::{Duration, Forever, NoWait};
use rtk_sync::{Error, Priority, Semaphore};

mod common;
use common::{kernel, ticks, wait_for};

#[test]
fn empty_take_would_block() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 3).unwrap();

    assert_eq!(sem.take(&kernel, NoWait), Err(Error::AgainLater));
    assert_eq!(sem.count(), Ok(0));
}

#[test]
fn give_up_to_limit() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 3).unwrap();

    for _ in 0..3 {
        assert_eq!(sem.give(&kernel), Ok(()));
    }
    assert_eq!(sem.count(), Ok(3));
    assert_eq!(sem.give(&kernel), Err(Error::Overflow));
    assert_eq!(sem.count(), Ok(3));

    for _ in 0..3 {
        assert_eq!(sem.take(&kernel, NoWait), Ok(()));
    }
    assert_eq!(sem.count(), Ok(0));
    assert_eq!(kernel.port().reschedule_count(), 0);
}

#[test]
fn take_give_round_trip() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(2, 5).unwrap();

    sem.take(&kernel, NoWait).unwrap();
    assert_eq!(sem.count(), Ok(1));
    sem.give(&kernel).unwrap();
    assert_eq!(sem.count(), Ok(2));
}

#[test]
fn take_in_isr() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(1, 1).unwrap();

    let isr = kernel.port().enter_isr();
    // Refused even though a unit is available and no wait was asked for.
    assert_eq!(sem.take(&kernel, NoWait), Err(Error::InterruptContext));
    assert_eq!(sem.take(&kernel, 5u32), Err(Error::InterruptContext));
    // Giving is fine from an interrupt handler.
    assert_eq!(sem.give(&kernel), Err(Error::Overflow));
    drop(isr);

    assert_eq!(sem.count(), Ok(1));
    assert_eq!(sem.take(&kernel, NoWait), Ok(()));
}

#[test]
fn eligibility_order() {
    let kernel = kernel();
    let sem = Semaphore::new();

    {
        let _isr = kernel.port().enter_isr();
        kernel.sched_lock().unwrap();
        assert_eq!(sem.take(&kernel, Forever), Err(Error::NullTarget));
        assert_eq!(sem.give(&kernel), Err(Error::NullTarget));

        sem.create(0, 1).unwrap();
        assert_eq!(sem.take(&kernel, Forever), Err(Error::InterruptContext));
    }

    // Still locked, and the caller is idle.
    assert_eq!(sem.take(&kernel, Forever), Err(Error::SchedulerLocked));
    kernel.sched_unlock();
    assert_eq!(sem.take(&kernel, Forever), Err(Error::IdleThreadBlocked));
    assert_eq!(sem.take(&kernel, NoWait), Err(Error::AgainLater));
}

#[test]
fn give_wakes_blocked_thread() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let worker = kernel.create_thread(Priority(3)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            kernel.port().bind(worker);
            sem.take(&kernel, Forever)
        });
        wait_for(|| sem.waiting() == Ok(1));

        // The unit goes straight to the waiter.
        sem.give(&kernel).unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
    });

    assert_eq!(sem.count(), Ok(0));
    assert_eq!(sem.waiting(), Ok(0));
    // The worker outranks the idle thread that gave.
    assert_eq!(kernel.port().reschedule_count(), 1);
}

#[test]
fn no_reschedule_for_lower_priority() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let giver = kernel.create_thread(Priority(8)).unwrap();
    let worker = kernel.create_thread(Priority(2)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            kernel.port().bind(worker);
            sem.take(&kernel, Forever)
        });
        wait_for(|| sem.waiting() == Ok(1));

        s.spawn(|| {
            kernel.port().bind(giver);
            sem.give(&kernel).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
    });

    assert_eq!(kernel.port().reschedule_count(), 0);
}

#[test]
fn give_order_is_priority_then_fifo() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let order = Mutex::new(Vec::new());

    let workers = [("low", 2), ("first", 5), ("second", 5)].map(|(name, prio)| {
        (name, kernel.create_thread(Priority(prio)).unwrap())
    });

    std::thread::scope(|s| {
        for (n, &(name, id)) in workers.iter().enumerate() {
            let (kernel, sem, order) = (&kernel, &sem, &order);
            s.spawn(move || {
                kernel.port().bind(id);
                sem.take(kernel, Forever).unwrap();
                order.lock().unwrap().push(name);
            });
            // Block them one at a time, so arrival order is known.
            wait_for(|| sem.waiting() == Ok(n + 1));
        }

        for n in 1..=workers.len() {
            sem.give(&kernel).unwrap();
            wait_for(|| order.lock().unwrap().len() == n);
        }
    });

    assert_eq!(*order.lock().unwrap(), ["first", "second", "low"]);
    assert_eq!(sem.count(), Ok(0));
}

#[test]
fn take_times_out() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let worker = kernel.create_thread(Priority(4)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            kernel.port().bind(worker);
            sem.take(&kernel, Duration::millis(3))
        });
        wait_for(|| sem.waiting() == Ok(1));

        ticks(&kernel, 2);
        assert!(!h.is_finished());
        ticks(&kernel, 1);
        assert_eq!(h.join().unwrap(), Err(Error::Timeout));
    });

    // The timed out waiter is gone, so this give is kept.
    assert_eq!(sem.waiting(), Ok(0));
    sem.give(&kernel).unwrap();
    assert_eq!(sem.count(), Ok(1));
    assert_eq!(kernel.uptime().ticks(), 3);
}

#[test]
fn forever_never_times_out() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let worker = kernel.create_thread(Priority(1)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            kernel.port().bind(worker);
            sem.take(&kernel, Forever)
        });
        wait_for(|| sem.waiting() == Ok(1));

        ticks(&kernel, 1000);
        assert_eq!(sem.waiting(), Ok(1));

        sem.give(&kernel).unwrap();
        assert_eq!(h.join().unwrap(), Ok(()));
    });
}

#[test]
fn count_stays_in_bounds() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 2).unwrap();
    let workers: Vec<_> = (0..4)
        .map(|n| kernel.create_thread(Priority(1 + n)).unwrap())
        .collect();

    std::thread::scope(|s| {
        for &id in &workers {
            let (kernel, sem) = (&kernel, &sem);
            s.spawn(move || {
                kernel.port().bind(id);
                for _ in 0..50 {
                    sem.take(kernel, Forever).unwrap();
                    assert!(sem.count().unwrap() <= 2);
                    // The give can only fail if the count were already at the limit.
                    sem.give(kernel).unwrap();
                }
            });
        }
        s.spawn(|| {
            for _ in 0..2 {
                sem.give(&kernel).unwrap();
            }
        });
    });

    assert_eq!(sem.count(), Ok(2));
    assert_eq!(sem.waiting(), Ok(0));
}

#[test]
fn give_after_timeout_in_same_section() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let worker = kernel.create_thread(Priority(6)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            kernel.port().bind(worker);
            sem.take(&kernel, 1u32)
        });
        wait_for(|| sem.waiting() == Ok(1));

        {
            // The worker can't run, so its record is still queued when give looks at it.
            let _guard = CriticalGuard::enter();
            kernel.tick();
            assert_eq!(sem.waiting(), Ok(1));
            sem.give(&kernel).unwrap();
            // The unit was not handed to a thread that already timed out.
            assert_eq!(sem.count(), Ok(1));
            assert_eq!(sem.waiting(), Ok(0));
        }

        assert_eq!(h.join().unwrap(), Err(Error::Timeout));
    });

    assert_eq!(sem.count(), Ok(1));
    assert_eq!(sem.waiting(), Ok(0));
}

#[test]
fn give_skips_timed_out_waiter() {
    let kernel = kernel();
    let sem = Semaphore::new();
    sem.create(0, 1).unwrap();
    let expiring = kernel.create_thread(Priority(9)).unwrap();
    let patient = kernel.create_thread(Priority(2)).unwrap();

    std::thread::scope(|s| {
        let a = s.spawn(|| {
            kernel.port().bind(expiring);
            sem.take(&kernel, 1u32)
        });
        wait_for(|| sem.waiting() == Ok(1));
        let b = s.spawn(|| {
            kernel.port().bind(patient);
            sem.take(&kernel, Forever)
        });
        wait_for(|| sem.waiting() == Ok(2));

        {
            let _guard = CriticalGuard::enter();
            kernel.tick();
            // The head of the list timed out, the unit goes to the next waiter.
            sem.give(&kernel).unwrap();
            assert_eq!(sem.count(), Ok(0));
            assert_eq!(sem.waiting(), Ok(0));
        }

        assert_eq!(a.join().unwrap(), Err(Error::Timeout));
        assert_eq!(b.join().unwrap(), Ok(()));
    });
}
