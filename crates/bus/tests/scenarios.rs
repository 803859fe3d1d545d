//! End-to-end arbitration scenarios with real threads.
//!
//! Each test drives arrival order explicitly: tasks that should already be on
//! the bus are acquired from the test thread, later arrivals are spawned and
//! the test waits until they show up in the wait counters before releasing.

mod common;

use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use duplex_bus::{Admission, BusController, BusEvent, RecordingObserver};
use duplex_core::{Direction, TaskSpec, WaitClass};

use common::*;

fn recorded(capacity: usize) -> (Arc<BusController>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let controller = Arc::new(BusController::with_observer(capacity, observer.clone()));
    (controller, observer)
}

#[test]
fn sends_fill_the_bus_and_receive_waits_for_direction_reset() {
    let (controller, observer) = recorded(3);
    let sends: Vec<_> = (0..3).map(|i| spec(i, NS)).collect();
    for s in &sends {
        assert_eq!(controller.acquire(s), Admission::Immediate);
    }

    let receiver = spawn_acquire(&controller, spec(10, NR));
    wait_for(&controller, |s| s.waiting(NR) == 1);

    controller.release(&sends[0]);
    controller.release(&sends[1]);
    thread::sleep(SETTLE);
    let snap = controller.snapshot();
    assert_eq!(snap.waiting(NR), 1, "receive must wait while any send is onboard");
    assert_eq!(snap.direction, Some(Direction::Send));

    controller.release(&sends[2]);
    assert_eq!(receiver.join().unwrap(), Admission::AfterWait { class: NR });
    let snap = controller.snapshot();
    assert_eq!(snap.direction, Some(Direction::Receive));
    assert_eq!(snap.occupied, 1);

    controller.release(&spec(10, NR));
    assert!(controller.snapshot().is_idle());
    check_history(&observer.events(), 3);
}

#[test]
fn priority_send_waits_out_receives_then_goes_before_normal_send() {
    let (controller, observer) = recorded(3);
    let receives: Vec<_> = (0..3).map(|i| spec(i, NR)).collect();
    for r in &receives {
        controller.acquire(r);
    }

    let priority_send = spawn_acquire(&controller, spec(10, PS));
    wait_for(&controller, |s| s.waiting(PS) == 1);
    let normal_send = spawn_acquire(&controller, spec(11, NS));
    wait_for(&controller, |s| s.waiting(NS) == 1);

    for r in &receives {
        controller.release(r);
    }
    assert_eq!(priority_send.join().unwrap(), Admission::AfterWait { class: PS });
    assert_eq!(normal_send.join().unwrap(), Admission::AfterWait { class: NS });

    let events = observer.events();
    let grant_of = |class: WaitClass| {
        events
            .iter()
            .position(|e| matches!(e, BusEvent::Granted { class: c, .. } if *c == class))
            .expect("class was never granted")
    };
    assert!(grant_of(PS) < grant_of(NS), "priority send must be woken first");

    controller.release(&spec(10, PS));
    controller.release(&spec(11, NS));
    check_history(&observer.events(), 3);
}

#[test]
fn queued_normal_sends_are_admitted_once_priority_arrivals_stop() {
    let (controller, observer) = recorded(3);
    let receive = spec(0, NR);
    controller.acquire(&receive);

    let (tx, rx) = mpsc::channel();
    let spawn = |task: TaskSpec| {
        let controller = Arc::clone(&controller);
        let tx = tx.clone();
        thread::spawn(move || {
            let admission = controller.acquire(&task);
            tx.send((task, admission)).unwrap();
        });
    };
    spawn(spec(1, PS));
    wait_for(&controller, |s| s.waiting(PS) == 1);
    for i in 2..6 {
        spawn(spec(i, NS));
    }
    wait_for(&controller, |s| s.waiting(NS) == 4);

    controller.release(&receive);
    let mut admitted = 0;
    while admitted < 5 {
        let (task, admission) = rx.recv_timeout(TIMEOUT).expect("queued task never admitted");
        assert!(admission.waited());
        controller.release(&task);
        admitted += 1;
    }
    assert!(controller.snapshot().is_idle());
    check_history(&observer.events(), 3);
}

#[test]
fn simultaneous_priority_tasks_in_opposite_directions_do_not_deadlock() {
    for round in 0..20 {
        let (controller, observer) = recorded(3);
        let barrier = Arc::new(Barrier::new(2));
        let (done_tx, done_rx) = mpsc::channel();

        for task in [spec(0, PS), spec(1, PR)] {
            let controller = Arc::clone(&controller);
            let barrier = Arc::clone(&barrier);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                barrier.wait();
                let admission = controller.acquire(&task);
                thread::sleep(Duration::from_millis(2));
                controller.release(&task);
                done_tx.send((task.direction, admission)).unwrap();
            });
        }

        let first = done_rx.recv_timeout(TIMEOUT).expect("deadlock: no task finished");
        let second = done_rx.recv_timeout(TIMEOUT).expect("deadlock: one task never finished");
        assert_ne!(first.0, second.0);
        assert!(
            !(first.1.waited() && second.1.waited()),
            "round {round}: one of the two must have gone first without waiting"
        );
        assert!(controller.snapshot().is_idle());
        check_history(&observer.events(), 3);
    }
}

#[test]
fn normal_send_arriving_during_priority_grant_boards_after_it() {
    for round in 0..20 {
        let (controller, observer) = recorded(3);
        let receive = spec(0, NR);
        controller.acquire(&receive);

        let priority_send = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let task = spec(1, PS);
                let admission = controller.acquire(&task);
                thread::sleep(Duration::from_millis(10));
                controller.release(&task);
                admission
            })
        };
        wait_for(&controller, |s| s.waiting(PS) == 1);

        // The release grants the priority sender a slot; the normal sender
        // arrives on a send-bound bus with two free slots while that grant is
        // still outstanding, and must not overtake it.
        controller.release(&receive);
        let normal = spec(2, NS);
        controller.acquire(&normal);
        controller.release(&normal);
        assert_eq!(priority_send.join().unwrap(), Admission::AfterWait { class: PS });

        let events = observer.events();
        let admitted = |id: u64| {
            events
                .iter()
                .position(|e| matches!(e, BusEvent::Admitted { task, .. } if *task == id))
                .expect("task never admitted")
        };
        assert!(
            admitted(1) < admitted(2),
            "round {round}: normal send boarded ahead of the granted priority send"
        );
        assert!(controller.snapshot().is_idle());
        check_history(&events, 3);
    }
}

#[test]
fn back_to_back_priority_sends_are_woken_before_queued_normal_send() {
    let (controller, observer) = recorded(3);
    // two long-running priority senders keep one slot free for the stream
    let fillers = [spec(100, PS), spec(101, PS)];
    for f in &fillers {
        controller.acquire(f);
    }

    let mut current = spec(0, PS);
    controller.acquire(&current);

    let normal_send = spawn_acquire(&controller, spec(50, NS));
    wait_for(&controller, |s| s.waiting(NS) == 1);

    for i in 1..4 {
        let next = spec(i, PS);
        let handle = spawn_acquire(&controller, next.clone());
        wait_for(&controller, |s| s.waiting(PS) == 1);

        controller.release(&current);
        assert_eq!(handle.join().unwrap(), Admission::AfterWait { class: PS });
        assert_eq!(
            controller.snapshot().waiting(NS),
            1,
            "normal send admitted between priority sends"
        );
        current = next;
    }

    controller.release(&current);
    assert_eq!(normal_send.join().unwrap(), Admission::AfterWait { class: NS });

    let events = observer.events();
    let normal_admitted = events
        .iter()
        .position(|e| matches!(e, BusEvent::Admitted { task: 50, .. }))
        .unwrap();
    let last_priority_admitted = events
        .iter()
        .rposition(|e| matches!(e, BusEvent::Admitted { task: 3, .. }))
        .unwrap();
    assert!(normal_admitted > last_priority_admitted);

    controller.release(&spec(50, NS));
    for f in &fillers {
        controller.release(f);
    }
    check_history(&observer.events(), 3);
}

#[test]
fn priority_send_stream_may_starve_priority_receive() {
    let (controller, observer) = recorded(1);
    let mut current = spec(0, PS);
    controller.acquire(&current);

    let receiver = spawn_acquire(&controller, spec(99, PR));
    wait_for(&controller, |s| s.waiting(PR) == 1);

    for i in 1..5 {
        let next = spec(i, PS);
        let handle = spawn_acquire(&controller, next.clone());
        wait_for(&controller, |s| s.waiting(PS) == 1);
        controller.release(&current);
        handle.join().unwrap();
        assert_eq!(controller.snapshot().waiting(PR), 1, "receive overtook the send stream");
        current = next;
    }

    controller.release(&current);
    assert_eq!(receiver.join().unwrap(), Admission::AfterWait { class: PR });
    controller.release(&spec(99, PR));
    check_history(&observer.events(), 1);
}

#[test]
fn woken_tasks_board_without_reblocking() {
    let (controller, observer) = recorded(3);
    let blocker = spec(0, NR);
    controller.acquire(&blocker);

    let (tx, rx) = mpsc::channel();
    for i in 1..=5 {
        let controller = Arc::clone(&controller);
        let tx = tx.clone();
        thread::spawn(move || {
            let task = spec(i, NS);
            let admission = controller.acquire(&task);
            tx.send((task, admission)).unwrap();
        });
    }
    wait_for(&controller, |s| s.waiting(NS) == 5);

    controller.release(&blocker);
    let first_wave: Vec<_> = (0..3)
        .map(|_| rx.recv_timeout(TIMEOUT).expect("granted task did not board"))
        .collect();
    thread::sleep(SETTLE);
    assert!(rx.try_recv().is_err(), "more tasks boarded than free slots");
    let snap = controller.snapshot();
    assert_eq!(snap.occupied, 3);
    assert_eq!(snap.reserved, 0);
    assert_eq!(snap.waiting(NS), 2);

    for (task, admission) in first_wave {
        assert!(admission.waited());
        controller.release(&task);
    }
    for _ in 0..2 {
        let (task, admission) = rx.recv_timeout(TIMEOUT).expect("granted task did not board");
        assert!(admission.waited());
        controller.release(&task);
    }
    assert!(controller.snapshot().is_idle());
    check_history(&observer.events(), 3);
}
