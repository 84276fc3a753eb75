pub mod aligner;

use crate::error::{ Error, Result };

/// Raw per-lap car data as recorded, before distance integration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarData {
    /// Seconds since the start of the lap
    pub time: Vec<f64>,
    /// km/h
    pub speed: Vec<f64>,
    pub rpm: Vec<f64>,
    pub gear: Vec<u32>,
    /// Percent, 0 - 100
    pub throttle: Vec<f64>,
    pub brake: Vec<bool>,
    pub drs: Vec<u32>,
}

impl CarData {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn check_columns(&self) -> Result<()> {
        let n = self.time.len();
        let lengths = [
            ("speed", self.speed.len()),
            ("rpm", self.rpm.len()),
            ("gear", self.gear.len()),
            ("throttle", self.throttle.len()),
            ("brake", self.brake.len()),
            ("drs", self.drs.len()),
        ];
        for (name, len) in lengths.iter() {
            if *len != n {
                return Err(Error::Telemetry(format!["column {} has {} samples, expected {}", name, len, n]));
            }
        }
        Ok(())
    }
}

/// One row of a `TelemetrySeries`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub distance: f64,
    pub time: f64,
    pub speed: f64,
    pub rpm: f64,
    pub gear: u32,
    pub throttle: f64,
    pub brake: bool,
    pub drs: u32,
    pub delta_time: Option<f64>,
}

/// Columnar telemetry of one lap, ordered by distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySeries {
    pub distance: Vec<f64>,
    pub time: Vec<f64>,
    pub speed: Vec<f64>,
    pub rpm: Vec<f64>,
    pub gear: Vec<u32>,
    pub throttle: Vec<f64>,
    pub brake: Vec<bool>,
    pub drs: Vec<u32>,
    /// Only present on the comparison side of an alignment
    pub delta_time: Option<Vec<f64>>,
}

impl TelemetrySeries {
    /// Adds a `Distance` column by integrating speed over time.
    pub fn from_car_data(data: &CarData) -> Result<TelemetrySeries> {
        data.check_columns()?;

        let mut distance = Vec::with_capacity(data.len());
        let mut travelled = 0.0;
        let mut previous_time = 0.0;
        for (time, speed) in data.time.iter().zip(data.speed.iter()) {
            travelled += speed / 3.6 * (time - previous_time);
            previous_time = *time;
            distance.push(travelled);
        }

        Ok(TelemetrySeries {
            distance,
            time: data.time.clone(),
            speed: data.speed.clone(),
            rpm: data.rpm.clone(),
            gear: data.gear.clone(),
            throttle: data.throttle.clone(),
            brake: data.brake.clone(),
            drs: data.drs.clone(),
            delta_time: None,
        })
    }

    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    #[cfg(test)]
    pub fn is_sorted_by_distance(&self) -> bool {
        self.distance.windows(2).all(|w| w[0] <= w[1])
    }

    /// First index whose distance is `>= distance`; `len()` when every sample lies before it.
    pub fn lower_bound(&self, distance: f64) -> usize {
        self.distance.partition_point(|d| *d < distance)
    }

    pub fn sample(&self, idx: usize) -> Option<Sample> {
        if idx >= self.len() {
            return None;
        }

        Some(Sample {
            distance: self.distance[idx],
            time: *self.time.get(idx)?,
            speed: *self.speed.get(idx)?,
            rpm: *self.rpm.get(idx)?,
            gear: *self.gear.get(idx)?,
            throttle: *self.throttle.get(idx)?,
            brake: *self.brake.get(idx)?,
            drs: *self.drs.get(idx)?,
            delta_time: match &self.delta_time {
                Some(delta) => Some(*delta.get(idx)?),
                None => None,
            },
        })
    }

    /// Points of one channel against distance, for plotting.
    pub fn points(&self, channel: impl Fn(&TelemetrySeries, usize) -> f64) -> Vec<(f64, f64)> {
        (0..self.len())
            .map(|idx| (self.distance[idx], channel(self, idx)))
            .collect()
    }
}
