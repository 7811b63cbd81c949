// Copyright (c) 2024 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Kernel context: threads, priorities, the scheduler lock, and time.

use rtk_sync::config::MAX_THREADS;
use rtk_sync::time::NoWait;
use rtk_sync::{Error, Kernel, Port, Priority, Semaphore, ThreadId};

mod common;
use common::{kernel, ticks, wait_for};

#[test]
fn thread_table() {
    let kernel = kernel();
    assert_eq!(kernel.current(), ThreadId::IDLE);
    assert!(kernel.is_idle(kernel.current()));
    assert_eq!(kernel.priority(ThreadId::IDLE), Ok(Priority::IDLE));

    assert_eq!(
        kernel.create_thread(Priority(Priority::HIGHEST.0 + 1)),
        Err(Error::InvalidValue)
    );

    // The idle thread holds one slot.
    let ids: Vec<_> = (1..MAX_THREADS)
        .map(|n| kernel.create_thread(Priority(n as u8 % 8)).unwrap())
        .collect();
    assert!(ids.iter().all(|&id| !kernel.is_idle(id)));
    assert_eq!(kernel.create_thread(Priority(1)), Err(Error::InvalidValue));
}

#[test]
fn set_priority_requests_reschedule() {
    let kernel = kernel();
    let id = kernel.create_thread(Priority(1)).unwrap();
    assert_eq!(kernel.priority(id), Ok(Priority(1)));

    kernel.set_priority(id, Priority(7)).unwrap();
    assert_eq!(kernel.priority(id), Ok(Priority(7)));
    assert_eq!(kernel.port().reschedule_count(), 1);

    // Lowering it to the caller's level is not a reason to switch.
    kernel.set_priority(id, Priority::IDLE).unwrap();
    assert_eq!(kernel.port().reschedule_count(), 1);

    assert_eq!(
        kernel.set_priority(id, Priority(Priority::HIGHEST.0 + 1)),
        Err(Error::InvalidValue)
    );
}

#[test]
fn sched_lock_nests() {
    let kernel = kernel();
    kernel.sched_lock().unwrap();
    kernel.sched_lock().unwrap();
    assert_eq!(kernel.sched_lock_depth(), 2);

    kernel.sched_unlock();
    assert_eq!(kernel.sched_lock_depth(), 1);
    assert_eq!(kernel.port().reschedule_count(), 0);

    kernel.sched_unlock();
    assert_eq!(kernel.sched_lock_depth(), 0);
    assert_eq!(kernel.port().reschedule_count(), 1);

    // Unbalanced unlocks are ignored.
    kernel.sched_unlock();
    assert_eq!(kernel.sched_lock_depth(), 0);
    assert_eq!(kernel.port().reschedule_count(), 1);
}

#[test]
fn sched_lock_depth_is_bounded() {
    let kernel = kernel();
    for _ in 0..u8::MAX {
        kernel.sched_lock().unwrap();
    }
    assert_eq!(kernel.sched_lock(), Err(Error::Overflow));
    assert_eq!(kernel.sched_lock_depth(), u8::MAX);

    // Every successful lock is undone by exactly one unlock.
    for _ in 0..u8::MAX {
        kernel.sched_unlock();
    }
    assert_eq!(kernel.sched_lock_depth(), 0);
    assert_eq!(kernel.port().reschedule_count(), 1);
}

#[test]
fn uptime_counts_ticks() {
    let kernel = kernel();
    assert_eq!(kernel.uptime().ticks(), 0);
    ticks(&kernel, 250);
    assert_eq!(kernel.uptime().ticks(), 250);
}

#[test]
fn isr_nesting() {
    let kernel = kernel();
    let outer = kernel.port().enter_isr();
    {
        let _inner = kernel.port().enter_isr();
        assert_eq!(kernel.port().interrupt_nesting(), 2);
    }
    assert_eq!(kernel.port().interrupt_nesting(), 1);
    drop(outer);
    assert_eq!(kernel.port().interrupt_nesting(), 0);
}

#[test]
fn timeout_wakes_higher_priority() {
    static KERNEL: Kernel<rtk_sync::port::host::HostPort> =
        Kernel::new(rtk_sync::port::host::HostPort::new());
    static SEM: Semaphore = Semaphore::new();

    SEM.create(0, 1).unwrap();
    let worker = KERNEL.create_thread(Priority(12)).unwrap();

    std::thread::scope(|s| {
        let h = s.spawn(|| {
            KERNEL.port().bind(worker);
            SEM.take(&KERNEL, 1u32)
        });
        wait_for(|| SEM.waiting() == Ok(1));

        KERNEL.tick();
        assert_eq!(h.join().unwrap(), Err(Error::Timeout));
    });

    // The expiring thread outranks the idle thread delivering the tick.
    assert_eq!(KERNEL.port().reschedule_count(), 1);

    // The waiter removed its record on the way out, so this give is kept.
    SEM.give(&KERNEL).unwrap();
    assert_eq!(SEM.count(), Ok(1));
    assert_eq!(SEM.take(&KERNEL, NoWait), Ok(()));
}
