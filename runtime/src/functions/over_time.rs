use std::cmp::Ordering;

use crate::functions::RangeWindow;

fn values<'a>(w: &'a RangeWindow<'a>) -> impl Iterator<Item = f64> + 'a {
    w.points.iter().map(|p| p.v)
}

pub(super) fn avg_over_time(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    let sum: f64 = values(w).sum();
    Some(sum / w.points.len() as f64)
}

pub(super) fn count_over_time(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    Some(w.points.len() as f64)
}

pub(super) fn sum_over_time(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    Some(values(w).sum())
}

pub(super) fn last_over_time(w: &RangeWindow) -> Option<f64> {
    w.points.last().map(|p| p.v)
}

pub(super) fn present_over_time(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    Some(1.0)
}

pub(super) fn max_over_time(w: &RangeWindow) -> Option<f64> {
    let first = w.points.first()?.v;
    Some(values(w).fold(first, |max, v| if v > max || max.is_nan() { v } else { max }))
}

pub(super) fn min_over_time(w: &RangeWindow) -> Option<f64> {
    let first = w.points.first()?.v;
    Some(values(w).fold(first, |min, v| if v < min || min.is_nan() { v } else { min }))
}

/// Population variance using Welford's online algorithm.
fn variance(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    let mut count = 0.0;
    let mut mean = 0.0;
    let mut aux = 0.0;
    for v in values(w) {
        count += 1.0;
        let delta = v - mean;
        mean += delta / count;
        aux += delta * (v - mean);
    }
    Some(aux / count)
}

pub(super) fn stdvar_over_time(w: &RangeWindow) -> Option<f64> {
    variance(w)
}

pub(super) fn stddev_over_time(w: &RangeWindow) -> Option<f64> {
    variance(w).map(f64::sqrt)
}

pub(super) fn quantile_over_time(w: &RangeWindow) -> Option<f64> {
    if w.points.is_empty() {
        return None;
    }
    let q = w.scalars.first().copied().unwrap_or(f64::NAN);
    let mut values: Vec<f64> = values(w).collect();
    Some(quantile(q, &mut values))
}

/// NaN sorts before every number.
pub(crate) fn cmp_nan_first(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// The φ-quantile of `values`, interpolating linearly between the two closest ranks.
/// `values` is sorted in place.
pub(crate) fn quantile(q: f64, values: &mut [f64]) -> f64 {
    if values.is_empty() || q.is_nan() {
        return f64::NAN;
    }
    if q < 0.0 {
        return f64::NEG_INFINITY;
    }
    if q > 1.0 {
        return f64::INFINITY;
    }
    values.sort_by(cmp_nan_first);

    let n = values.len() as f64;
    let rank = q * (n - 1.0);
    let lower_index = rank.floor().max(0.0);
    let upper_index = (lower_index + 1.0).min(n - 1.0);
    let weight = rank - rank.floor();
    values[lower_index as usize] * (1.0 - weight) + values[upper_index as usize] * weight
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use crate::types::Point;

    use super::*;

    fn points(values: &[f64]) -> Vec<Point> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Point::new(i as i64 * 1000, *v))
            .collect()
    }

    fn eval(f: fn(&RangeWindow) -> Option<f64>, values: &[f64], scalars: &[f64]) -> Option<f64> {
        let points = points(values);
        let w = RangeWindow {
            points: &points,
            ts: 10_000,
            range: 60_000,
            offset: 0,
            scalars,
        };
        f(&w)
    }

    #[test]
    fn basic_aggregates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(eval(avg_over_time, &v, &[]), Some(2.5));
        assert_eq!(eval(sum_over_time, &v, &[]), Some(10.0));
        assert_eq!(eval(count_over_time, &v, &[]), Some(4.0));
        assert_eq!(eval(last_over_time, &v, &[]), Some(4.0));
        assert_eq!(eval(max_over_time, &v, &[]), Some(4.0));
        assert_eq!(eval(min_over_time, &v, &[]), Some(1.0));
        assert_eq!(eval(present_over_time, &v, &[]), Some(1.0));
        assert_eq!(eval(stdvar_over_time, &v, &[]), Some(1.25));
    }

    #[test]
    fn empty_window_yields_nothing() {
        assert_eq!(eval(sum_over_time, &[], &[]), None);
        assert_eq!(eval(max_over_time, &[], &[]), None);
        assert_eq!(eval(quantile_over_time, &[], &[0.5]), None);
    }

    #[test]
    fn min_max_skip_leading_nan() {
        let v = [f64::NAN, 3.0, 1.0];
        assert_eq!(eval(max_over_time, &v, &[]), Some(3.0));
        assert_eq!(eval(min_over_time, &v, &[]), Some(1.0));
    }

    #[test_case(0.0, 1.0)]
    #[test_case(0.5, 2.5)]
    #[test_case(1.0, 4.0)]
    #[test_case(0.25, 1.75)]
    #[test_case(-1.0, f64::NEG_INFINITY)]
    #[test_case(2.0, f64::INFINITY)]
    fn quantiles(q: f64, expected: f64) {
        assert_eq!(eval(quantile_over_time, &[4.0, 2.0, 3.0, 1.0], &[q]), Some(expected));
    }
}
