use crate::error::{ Error, Result };
use crate::telemetry::{ CarData, TelemetrySeries };

/// Result of comparing two laps on a common distance axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// Gap of the comparison lap, sampled at `reference.distance`
    pub delta: Vec<f64>,
    pub reference: TelemetrySeries,
    /// Carries `delta_time` resampled onto its own distances
    pub comparison: TelemetrySeries,
}

/// Extends a stream by one linearly extrapolated step at each end.
fn pad(stream: &[f64]) -> Vec<f64> {
    let n = stream.len();
    let start_step = stream[1] - stream[0];
    let end_step = stream[n - 1] - stream[n - 2];

    let mut padded = Vec::with_capacity(n + 2);
    padded.push(stream[0] - start_step);
    padded.extend_from_slice(stream);
    padded.push(stream[n - 1] + end_step);
    padded
}

/// Piecewise linear interpolation of `(xp, fp)` at `x`, clamped to the end
/// values outside `xp`. `xp` must be non-decreasing and finite; a non-finite
/// `x` yields NaN.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if n == 0 || !x.is_finite() {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    let hi = xp.partition_point(|v| *v <= x);
    if hi == 0 || hi >= n {
        return f64::NAN;
    }
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span == 0.0 {
        return fp[hi];
    }
    fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / span
}

fn check_finite(lap: &str, series: &TelemetrySeries) -> Result<()> {
    let columns = [("time", &series.time), ("distance", &series.distance)];
    for (name, column) in columns.iter() {
        if let Some(idx) = column.iter().position(|v| !v.is_finite()) {
            return Err(Error::Telemetry(format!["{} lap has a non-finite {} at sample {}", lap, name, idx]));
        }
    }
    Ok(())
}

/// Aligns `comparison` against `reference` and computes the running gap.
pub fn align(reference: &CarData, comparison: &CarData) -> Result<Alignment> {
    let reference = TelemetrySeries::from_car_data(reference)?;
    let mut comparison = TelemetrySeries::from_car_data(comparison)?;

    if reference.len() < 2 || comparison.len() < 2 {
        return Err(Error::Telemetry("alignment needs at least two samples per lap".to_string()));
    }
    check_finite("reference", &reference)?;
    check_finite("comparison", &comparison)?;

    let comparison_time = pad(&comparison.time);
    let comparison_distance = pad(&comparison.distance);

    let delta: Vec<f64> = reference.distance.iter()
        .zip(reference.time.iter())
        .map(|(distance, time)| interp(*distance, &comparison_distance, &comparison_time) - time)
        .collect();

    let resampled = comparison.distance.iter()
        .map(|distance| interp(*distance, &reference.distance, &delta))
        .collect();
    comparison.delta_time = Some(resampled);

    Ok(Alignment { delta, reference, comparison })
}
