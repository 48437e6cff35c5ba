//! Fast-start inflexibility profile arithmetic
//!
//! A committed fast-start unit walks a fixed trajectory through modes
//! 0 → 1 (synchronising) → 2 (ramp to min loading) → 3 (held at min
//! loading) → 4 (ramp-down window), with per-mode durations T1..T4 in
//! minutes. Given (CurrentMode, CurrentModeTime) at the start of the
//! dispatch interval, these functions advance 5 minutes along the
//! trajectory to find the effective mode and mode time at the interval
//! end, and compute profile-constrained ramping capability for units
//! still inside T1/T2.

use crate::DISPATCH_INTERVAL_MINUTES;

/// Max ramp-up over the interval for a unit starting in mode 1.
///
/// Output is pinned to 0 until T1 expires, follows the T2 trajectory for
/// up to `t2` minutes, then ramps at the effective rate for whatever time
/// remains above min loading.
pub fn mode_one_ramping_capability(
    t1: f64,
    t2: f64,
    min_loading: f64,
    current_mode_time: f64,
    effective_ramp_rate: f64,
) -> f64 {
    let t1_time_remaining = t1 - current_mode_time;
    let t2_time = (DISPATCH_INTERVAL_MINUTES - t1_time_remaining).min(t2).max(0.0);
    let min_loading_time = (DISPATCH_INTERVAL_MINUTES - t1_time_remaining - t2_time).max(0.0);

    // T2 = 0 means the unit jumps straight to min loading
    let t2_ramp_capability = if t2 == 0.0 {
        min_loading
    } else {
        (min_loading / t2) * t2_time
    };

    let t3_ramp_capability = (effective_ramp_rate / 60.0) * min_loading_time;

    t2_ramp_capability + t3_ramp_capability
}

/// Max ramp-up over the interval for a unit starting in mode 2.
pub fn mode_two_ramping_capability(
    t2: f64,
    min_loading: f64,
    current_mode_time: f64,
    effective_ramp_rate: f64,
) -> f64 {
    let t2_time_remaining = t2 - current_mode_time;
    let min_loading_time = (DISPATCH_INTERVAL_MINUTES - t2_time_remaining).max(0.0);

    let t2_ramp_capability = if t2 == 0.0 {
        min_loading
    } else {
        (min_loading / t2) * t2_time_remaining
    };

    let t3_ramp_capability = (effective_ramp_rate / 60.0) * min_loading_time;

    t2_ramp_capability + t3_ramp_capability
}

/// Initial MW implied by the startup trajectory for a unit in mode 2.
///
/// The trajectory position, not SCADA telemetry, defines the unit's
/// starting point while it ramps to min loading.
pub fn mode_two_initial_mw(t2: f64, min_loading: f64, current_mode_time: f64) -> f64 {
    if t2 <= 0.0 {
        min_loading
    } else {
        (min_loading / t2) * current_mode_time
    }
}

/// Minutes elapsed from the start of the inflexibility profile.
fn cumulative_profile_time(current_mode: u8, current_mode_time: f64, t1: f64, t2: f64, t3: f64) -> f64 {
    match current_mode {
        0 | 1 => current_mode_time,
        2 => t1 + current_mode_time,
        3 => t1 + t2 + current_mode_time,
        _ => t1 + t2 + t3 + current_mode_time,
    }
}

/// Mode the unit occupies at the END of the dispatch interval.
/// Mode 0 (not committed) never advances.
pub fn target_mode(current_mode: u8, current_mode_time: f64, t1: f64, t2: f64, t3: f64) -> u8 {
    if current_mode == 0 {
        return 0;
    }

    let minutes = cumulative_profile_time(
        current_mode,
        current_mode_time + DISPATCH_INTERVAL_MINUTES,
        t1,
        t2,
        t3,
    );

    let t1_end = t1;
    let t2_end = t1 + t2;
    let t3_end = t1 + t2 + t3;

    if minutes <= t1_end {
        1
    } else if minutes <= t2_end {
        2
    } else if minutes <= t3_end {
        3
    } else {
        4
    }
}

/// Minutes into the target mode at the END of the dispatch interval.
pub fn target_mode_time(
    current_mode: u8,
    current_mode_time: f64,
    t1: f64,
    t2: f64,
    t3: f64,
) -> f64 {
    let mode = target_mode(current_mode, current_mode_time, t1, t2, t3);

    let cumulative = cumulative_profile_time(
        current_mode,
        current_mode_time + DISPATCH_INTERVAL_MINUTES,
        t1,
        t2,
        t3,
    );

    match mode {
        0 => current_mode_time,
        1 => cumulative,
        2 => cumulative - t1,
        3 => cumulative - (t1 + t2),
        _ => cumulative - (t1 + t2 + t3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_zero_never_advances() {
        assert_eq!(target_mode(0, 2.0, 5.0, 5.0, 5.0), 0);
        assert_eq!(target_mode_time(0, 2.0, 5.0, 5.0, 5.0), 2.0);
    }

    #[test]
    fn test_mode_advance_within_t1() {
        // 10 minutes of T1, 2 minutes in: +5 stays in mode 1 at 7 min
        assert_eq!(target_mode(1, 2.0, 10.0, 5.0, 5.0), 1);
        assert_eq!(target_mode_time(1, 2.0, 10.0, 5.0, 5.0), 7.0);
    }

    #[test]
    fn test_mode_advance_across_boundary() {
        // 4 min of T1, 3 min in: +5 lands 4 minutes into T2
        assert_eq!(target_mode(1, 3.0, 4.0, 10.0, 5.0), 2);
        assert_eq!(target_mode_time(1, 3.0, 4.0, 10.0, 5.0), 4.0);
    }

    #[test]
    fn test_mode_advance_two_boundaries() {
        // Mode 2, 9 min into a 10-min T2, T3 = 3: +5 lands 1 min into T4
        assert_eq!(target_mode(2, 9.0, 4.0, 10.0, 3.0), 4);
        assert_eq!(target_mode_time(2, 9.0, 4.0, 10.0, 3.0), 1.0);
    }

    #[test]
    fn test_mode_four_stays_mode_four() {
        assert_eq!(target_mode(4, 2.0, 4.0, 10.0, 3.0), 4);
        assert_eq!(target_mode_time(4, 2.0, 4.0, 10.0, 3.0), 7.0);
    }

    #[test]
    fn test_mode_one_ramping_capability() {
        // 2 min of T1 left, T2 = 6, min loading 30, ramp 120 MW/h.
        // 3 minutes follow the T2 slope (30/6 per min = 15 MW), no time
        // above min loading
        let capability = mode_one_ramping_capability(4.0, 6.0, 30.0, 2.0, 120.0);
        assert!((capability - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_one_instant_t2() {
        // T2 = 0: unit reaches min loading the moment T1 expires, then
        // ramps at 120 MW/h for the remaining 3 minutes
        let capability = mode_one_ramping_capability(4.0, 0.0, 30.0, 2.0, 120.0);
        assert!((capability - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_two_trajectory_initial_mw() {
        assert!((mode_two_initial_mw(10.0, 50.0, 4.0) - 20.0).abs() < 1e-9);
        assert_eq!(mode_two_initial_mw(0.0, 50.0, 4.0), 50.0);
    }

    #[test]
    fn test_mode_two_ramping_capability() {
        // 3 min left in T2 (slope 5 MW/min), 2 min above min loading at
        // 120 MW/h
        let capability = mode_two_ramping_capability(10.0, 50.0, 7.0, 120.0);
        assert!((capability - 19.0).abs() < 1e-9);
    }
}
