use std::time::Duration;

use media_fx::scheduler::{Clock, ManualClock, Scheduler};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Poll at `now` and collect everything that came out.
fn run(s: &mut Scheduler<&'static str>, now: Duration) -> Vec<&'static str> {
    s.poll(now);
    std::iter::from_fn(|| s.next_ready()).collect()
}

#[test]
fn tick_requests_fire_once() {
    let mut s = Scheduler::new();
    s.request_tick("render");
    assert_eq!(run(&mut s, ms(0)), vec!["render"]);
    assert!(run(&mut s, ms(16)).is_empty());
    assert_eq!(s.pending(), 0);
}

#[test]
fn timeout_fires_at_deadline_not_before() {
    let mut s = Scheduler::new();
    let id = s.set_timeout(ms(100), ms(300), "revert");
    assert!(run(&mut s, ms(399)).is_empty());
    assert!(s.is_pending(id));
    assert_eq!(run(&mut s, ms(400)), vec!["revert"]);
    assert!(!s.is_pending(id));
}

#[test]
fn interval_cadence_matches_period() {
    let mut s = Scheduler::new();
    s.set_interval(ms(0), ms(100), "flip");
    let mut fired = 0;
    let mut t = 0;
    while t <= 1000 {
        fired += run(&mut s, ms(t)).len();
        t += 16;
    }
    assert!((9..=10).contains(&fired), "fired {fired}");
}

#[test]
fn late_interval_catches_up_with_a_cap() {
    let mut s = Scheduler::new();
    s.set_interval(ms(0), ms(1), "flip");
    assert_eq!(run(&mut s, ms(1000)).len(), 64);
    assert_eq!(run(&mut s, ms(1001)).len(), 1);
}

#[test]
fn zero_period_is_raised_to_one_millisecond() {
    let mut s = Scheduler::new();
    s.set_interval(ms(0), Duration::ZERO, "flip");
    assert!(run(&mut s, ms(0)).is_empty());
    assert_eq!(run(&mut s, ms(1)), vec!["flip"]);
}

#[test]
fn cancel_removes_pending_and_staged_tasks() {
    let mut s = Scheduler::new();
    let a = s.set_timeout(ms(0), ms(10), "a");
    let b = s.request_tick("b");
    assert!(s.cancel(a));
    assert!(!s.cancel(a));

    s.poll(ms(20));
    assert!(s.is_pending(b));
    assert!(s.cancel(b));
    assert_eq!(s.next_ready(), None);
}

#[test]
fn timers_are_staged_before_ticks_in_deadline_order() {
    let mut s = Scheduler::new();
    s.request_tick("render");
    s.set_timeout(ms(0), ms(30), "late");
    s.set_timeout(ms(0), ms(10), "early");
    s.request_tick("detect");
    assert_eq!(run(&mut s, ms(50)), vec!["early", "late", "render", "detect"]);
}

#[test]
fn tasks_lists_staged_then_waiting() {
    let mut s = Scheduler::new();
    s.request_tick("render");
    s.set_timeout(ms(0), ms(500), "revert");
    s.poll(ms(0));
    assert_eq!(s.tasks().copied().collect::<Vec<_>>(), vec!["render", "revert"]);
    s.clear();
    assert_eq!(s.pending(), 0);
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new();
    let other = clock.clone();
    clock.advance(ms(250));
    assert_eq!(other.now(), ms(250));
    other.set(ms(10));
    assert_eq!(clock.now(), ms(10));
}
