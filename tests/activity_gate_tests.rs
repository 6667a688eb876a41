//! Property tests for the activity gate

use head_tracker::activity_gate::{ActivityGate, GatePhase, Sensitivity};
use proptest::prelude::*;
use std::time::{Duration, Instant};

const TICK_MS: u64 = 50;

fn fire_ticks(gate: &mut ActivityGate, signal: &[bool]) -> Vec<usize> {
    let start = Instant::now();
    signal
        .iter()
        .enumerate()
        .filter(|&(i, &active)| gate.update_at(active, start + Duration::from_millis(i as u64 * TICK_MS)))
        .map(|(i, _)| i)
        .collect()
}

proptest! {
    #[test]
    fn fires_only_after_sustained_activity(
        signal in prop::collection::vec(any::<bool>(), 1..200),
        min_ticks in 0u64..10,
        cooldown_ticks in 0u64..20,
    ) {
        let mut gate = ActivityGate::new(
            Duration::from_millis(min_ticks * TICK_MS),
            Duration::from_millis(cooldown_ticks * TICK_MS),
        );
        let fired = fire_ticks(&mut gate, &signal);

        for &tick in &fired {
            let window = min_ticks as usize;
            prop_assert!(tick >= window);
            prop_assert!(signal[tick - window..=tick].iter().all(|&active| active));
        }

        for pair in fired.windows(2) {
            let gap = (pair[1] - pair[0]) as u64;
            prop_assert!(gap >= cooldown_ticks + min_ticks);
            prop_assert!(gap >= 1);
        }
    }

    #[test]
    fn constant_activity_fires_periodically(
        min_ticks in 1u64..10,
        cooldown_ticks in 1u64..20,
    ) {
        let mut gate = ActivityGate::new(
            Duration::from_millis(min_ticks * TICK_MS),
            Duration::from_millis(cooldown_ticks * TICK_MS),
        );
        let fired = fire_ticks(&mut gate, &[true; 200]);

        prop_assert_eq!(fired.first().copied(), Some(min_ticks as usize));
        for pair in fired.windows(2) {
            prop_assert_eq!((pair[1] - pair[0]) as u64, cooldown_ticks + min_ticks);
        }
    }
}

#[test]
fn test_silence_never_fires() {
    let mut gate = ActivityGate::with_sensitivity(Sensitivity::High);
    assert!(fire_ticks(&mut gate, &[false; 100]).is_empty());
    assert_eq!(gate.phase(), GatePhase::Idle);
}

#[test]
fn test_reset_clears_cooldown() {
    let mut gate = ActivityGate::new(Duration::ZERO, Duration::from_secs(10));
    let now = Instant::now();
    assert!(gate.update_at(true, now));
    assert!(!gate.update_at(true, now + Duration::from_millis(50)));

    gate.reset();
    assert!(gate.update_at(true, now + Duration::from_millis(100)));
}

#[test]
fn test_runtime_reconfiguration() {
    let mut gate = ActivityGate::default();
    assert_eq!(gate.min_duration(), Duration::from_millis(300));
    gate.set_min_duration(Duration::from_millis(100));
    gate.set_cooldown(Duration::ZERO);

    let start = Instant::now();
    assert!(!gate.update_at(true, start));
    assert!(gate.update_at(true, start + Duration::from_millis(100)));
    // Accumulation restarts once the cooldown is over
    assert!(!gate.update_at(true, start + Duration::from_millis(200)));
    assert!(gate.update_at(true, start + Duration::from_millis(300)));
}
