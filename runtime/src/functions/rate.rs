use crate::functions::RangeWindow;

/// Extrapolated change over the window, as computed by `rate`, `increase` and `delta`.
///
/// The result is extended from the span covered by the samples towards the window bounds. Each
/// side is extended by its full gap when the gap is below 110% of the average sample interval,
/// and by half an average interval otherwise. Counters are never extrapolated below zero.
fn extrapolated_rate(w: &RangeWindow, is_counter: bool, is_rate: bool) -> Option<f64> {
    let points = w.points;
    if points.len() < 2 {
        return None;
    }
    let first = points[0];
    let last = points[points.len() - 1];

    let mut result = last.v - first.v;
    if is_counter {
        let mut last_value = 0.0;
        for p in points {
            if p.v < last_value {
                result += last_value;
            }
            last_value = p.v;
        }
    }

    let mut duration_to_start = (first.t - w.range_start()) as f64 / 1e3;
    let duration_to_end = (w.range_end() - last.t) as f64 / 1e3;
    let sampled_interval = (last.t - first.t) as f64 / 1e3;
    let average_duration_between_samples = sampled_interval / (points.len() - 1) as f64;

    if is_counter && result > 0.0 && first.v >= 0.0 {
        // Counters cannot be negative. If the extrapolation would cross zero, stop at the point
        // where the counter would have been zero.
        let duration_to_zero = sampled_interval * (first.v / result);
        if duration_to_zero < duration_to_start {
            duration_to_start = duration_to_zero;
        }
    }

    let extrapolation_threshold = average_duration_between_samples * 1.1;
    let mut extrapolate_to_interval = sampled_interval;

    if duration_to_start < extrapolation_threshold {
        extrapolate_to_interval += duration_to_start;
    } else {
        extrapolate_to_interval += average_duration_between_samples / 2.0;
    }
    if duration_to_end < extrapolation_threshold {
        extrapolate_to_interval += duration_to_end;
    } else {
        extrapolate_to_interval += average_duration_between_samples / 2.0;
    }

    result *= extrapolate_to_interval / sampled_interval;
    if is_rate {
        result /= w.range as f64 / 1e3;
    }
    Some(result)
}

pub(super) fn rate(w: &RangeWindow) -> Option<f64> {
    extrapolated_rate(w, true, true)
}

pub(super) fn increase(w: &RangeWindow) -> Option<f64> {
    extrapolated_rate(w, true, false)
}

pub(super) fn delta(w: &RangeWindow) -> Option<f64> {
    extrapolated_rate(w, false, false)
}

/// Change between the last two points, per second for `irate`.
fn instant_value(w: &RangeWindow, is_rate: bool) -> Option<f64> {
    let points = w.points;
    if points.len() < 2 {
        return None;
    }
    let last = points[points.len() - 1];
    let previous = points[points.len() - 2];

    let result = if is_rate && last.v < previous.v {
        // counter reset
        last.v
    } else {
        last.v - previous.v
    };

    let sampled_interval = last.t - previous.t;
    if sampled_interval == 0 {
        return None;
    }
    if is_rate {
        return Some(result / (sampled_interval as f64 / 1e3));
    }
    Some(result)
}

pub(super) fn irate(w: &RangeWindow) -> Option<f64> {
    instant_value(w, true)
}

pub(super) fn idelta(w: &RangeWindow) -> Option<f64> {
    instant_value(w, false)
}

#[cfg(test)]
mod tests {
    use crate::types::Point;

    use super::*;

    const MINUTE: i64 = 60_000;

    fn series(start: i64, step: i64, values: &[f64]) -> Vec<Point> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Point::new(start + i as i64 * step, *v))
            .collect()
    }

    fn window(points: &[Point], ts: i64, range: i64) -> RangeWindow<'_> {
        RangeWindow {
            points,
            ts,
            range,
            offset: 0,
            scalars: &[],
        }
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn rate_extrapolates_to_window_start() {
        // 0+80x10 at 5m intervals; the window (0, 50m] holds the points from 5m to 50m
        let all = series(0, 5 * MINUTE, &(0..=10).map(|i| i as f64 * 80.0).collect::<Vec<_>>());
        let points = &all[1..];
        let w = window(points, 50 * MINUTE, 50 * MINUTE);
        let got = rate(&w).unwrap();
        assert!(approx_eq(got, 0.26666666666666666), "got {got}");
        assert!(approx_eq(increase(&w).unwrap(), 800.0));
    }

    #[test]
    fn counter_resets_are_corrected() {
        let points = series(MINUTE, MINUTE, &[10.0, 20.0, 5.0, 15.0]);
        let w = window(&points, 4 * MINUTE, 3 * MINUTE);
        // 15 - 10 + 20 (the value before the reset), samples cover the whole window
        let got = increase(&w).unwrap();
        assert!(approx_eq(got, 25.0), "got {got}");
        // delta ignores resets
        let d = delta(&w).unwrap();
        assert!(approx_eq(d, 5.0), "got {d}");
    }

    #[test]
    fn zero_crossing_limits_start_extrapolation() {
        // value 1 at the first point, a large gap to the window start
        let points = series(10 * MINUTE, MINUTE, &[1.0, 2.0, 3.0]);
        let w = window(&points, 12 * MINUTE, 10 * MINUTE);
        // the counter would reach zero one minute before the first sample
        let got = increase(&w).unwrap();
        assert!(approx_eq(got, 3.0), "got {got}");
    }

    #[test]
    fn fewer_than_two_points_yield_nothing() {
        let points = series(0, MINUTE, &[1.0]);
        assert_eq!(rate(&window(&points, MINUTE, MINUTE)), None);
        assert_eq!(irate(&window(&[], MINUTE, MINUTE)), None);
    }

    #[test]
    fn irate_uses_last_two_points() {
        let points = series(0, 10_000, &[1.0, 5.0, 25.0]);
        let w = window(&points, 20_000, MINUTE);
        assert!(approx_eq(irate(&w).unwrap(), 2.0));
        assert!(approx_eq(idelta(&w).unwrap(), 20.0));

        let reset = series(0, 10_000, &[30.0, 10.0]);
        let w = window(&reset, 10_000, MINUTE);
        assert!(approx_eq(irate(&w).unwrap(), 1.0));
        assert!(approx_eq(idelta(&w).unwrap(), -20.0));
    }
}
