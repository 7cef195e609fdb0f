//! Converts consecutive counter readings into rates.
//!
//! Both functions are pure; the previous readings they compare against are
//! owned by the sampler.

use crate::core::SystemCounterSnapshot;

/// System-wide CPU utilisation between two snapshots, in percent.
///
/// Returns `None` when there is no previous snapshot or the total tick count
/// did not increase (first sample, reboot, counter wrap). The result is
/// clamped to `[0, 100]`: the kernel's iowait counter may go backwards, which
/// would otherwise push the figure above 100.
pub fn system_cpu_percent(
    prev: Option<&SystemCounterSnapshot>,
    curr: &SystemCounterSnapshot,
) -> Option<f64> {
    let prev = prev?;
    let total_delta = signed_delta(prev.total_ticks(), curr.total_ticks());
    if total_delta <= 0 {
        return None;
    }
    let idle_delta = signed_delta(prev.idle_window_ticks(), curr.idle_window_ticks());
    let busy = 1.0 - idle_delta as f64 / total_delta as f64;
    Some((100.0 * busy).clamp(0.0, 100.0))
}

/// CPU used by one process between two readings, in percent of one CPU.
///
/// Returns `None` if the uptime did not advance or the process tick count
/// went backwards. Values above 100 are legitimate for multi-threaded
/// processes and are passed through.
pub fn process_cpu_percent(
    prev_ticks: u64,
    curr_ticks: u64,
    prev_uptime_ticks: u64,
    curr_uptime_ticks: u64,
) -> Option<f64> {
    let uptime_delta = signed_delta(prev_uptime_ticks, curr_uptime_ticks);
    let tick_delta = signed_delta(prev_ticks, curr_ticks);
    if uptime_delta <= 0 || tick_delta < 0 {
        return None;
    }
    Some(100.0 * tick_delta as f64 / uptime_delta as f64)
}

fn signed_delta(prev: u64, curr: u64) -> i128 {
    curr as i128 - prev as i128
}
