//! Text density gauge.

/// Number of gauge segments.
const SEGMENTS: usize = 10;

/// Nominal venue capacity used when none is configured.
pub const DEFAULT_MAX_CAPACITY: usize = 100;

/// Ten-segment occupancy gauge, `█` for filled segments and `░` for
/// empty ones. Counts above capacity render a full bar.
pub fn density_bar(count: usize, max_capacity: usize) -> String {
    let occupancy = if max_capacity == 0 {
        if count > 0 {
            1.0
        } else {
            0.0
        }
    } else {
        (count as f64 / max_capacity as f64).min(1.0)
    };
    let filled = (occupancy * SEGMENTS as f64) as usize;

    let mut bar = String::with_capacity(SEGMENTS * 3);
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in filled..SEGMENTS {
        bar.push('░');
    }
    bar
}

/// Status line shown in the dashboard chip row and in monitor logs.
pub fn density_line(count: usize, max_capacity: usize) -> String {
    format!("{} People detected {}", count, density_bar(count, max_capacity))
}
