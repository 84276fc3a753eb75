use std::collections::BTreeMap;

use crate::cursor::DriverPair;
use crate::error::{ Error, Result };
use crate::figure::{ BoxGlyph, BoxStats, Color, Figure, Range, TextItem, Tick };
use crate::plot::{ PlotBuilder, PlotOutput };
use crate::session::Session;

pub const CANONICAL_COMPOUND_ORDER: [&str; 5] = ["SOFT", "MEDIUM", "HARD", "INTERMEDIATE", "WET"];

/// Laps slower than this multiple of their group's fastest lap are dropped.
pub const OUTLIER_THRESHOLD: f64 = 1.07;

const NCOLS: usize = 4;
const MEDIAN_COLOR: Color = Color::rgb(1.0, 0x55 as f32 / 255.0, 0xA3 as f32 / 255.0);

pub fn compound_color(compound: &str) -> Color {
    match compound {
        "SOFT" => Color::rgb(0.85, 0.12, 0.15),
        "MEDIUM" => Color::rgb(1.0, 0.84, 0.0),
        "HARD" => Color::rgb(0.94, 0.94, 0.94),
        "INTERMEDIATE" => Color::rgb(0.26, 0.69, 0.26),
        "WET" => Color::rgb(0.0, 0.4, 0.87),
        _ => Color::WHITE,
    }
}

/// Position in the canonical order; `None` for compounds that are not plotted.
pub fn compound_rank(compound: &str) -> Option<(usize, String)> {
    CANONICAL_COMPOUND_ORDER.iter()
        .position(|c| *c == compound)
        .map(|rank| (rank, compound.to_string()))
}

/// Linear interpolation between closest ranks of a sorted slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (position - lo as f64)
}

impl BoxStats {
    /// Quartiles plus whiskers at the furthest samples within 1.5 IQR.
    pub fn from_samples(samples: &[f64]) -> Option<BoxStats> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);

        let whisker_low = sorted.iter().copied().find(|v| *v >= q1 - reach).unwrap_or(q1);
        let whisker_high = sorted.iter().rev().copied().find(|v| *v <= q3 + reach).unwrap_or(q3);

        Some(BoxStats { whisker_low, q1, median, q3, whisker_high })
    }
}

/// Lap times in seconds grouped by driver, then compound, after outlier filtering.
pub type LapGroups = BTreeMap<String, BTreeMap<(usize, String), Vec<f64>>>;

pub fn consistent_laps(session: &Session) -> LapGroups {
    let mut groups: LapGroups = BTreeMap::new();
    for lap in &session.laps {
        let key = lap.compound.as_deref().and_then(compound_rank);
        if let (Some(seconds), Some(key)) = (lap.lap_time_seconds(), key) {
            groups.entry(lap.driver.clone())
                .or_default()
                .entry(key)
                .or_default()
                .push(seconds);
        }
    }

    for compounds in groups.values_mut() {
        for times in compounds.values_mut() {
            let fastest = times.iter().copied().fold(f64::INFINITY, f64::min);
            times.retain(|t| *t <= fastest * OUTLIER_THRESHOLD);
        }
    }
    groups
}

/// Lap time spread per driver and compound, one panel per driver.
pub struct LapTimeDistribution;

impl PlotBuilder for LapTimeDistribution {
    fn build(&self, session: &Session, _drivers: Option<&DriverPair>) -> PlotOutput {
        match build(session) {
            Ok(figure) => PlotOutput::figure_only(figure),
            Err(err) => {
                error!["Failed to build lap time distribution: {}", err];
                PlotOutput::figure_only(Figure::message(&format!["Could not build the chart:\n{}", err]))
            }
        }
    }
}

pub fn build(session: &Session) -> Result<Figure> {
    if session.laps.is_empty() {
        return Err(Error::Analysis("Lap data is not available for this analysis.".to_string()));
    }

    let groups = consistent_laps(session);
    if groups.is_empty() {
        return Err(Error::Analysis("No consistent laps left after filtering.".to_string()));
    }

    let mut figure = Figure::grid(groups.len(), NCOLS);
    for (panel, (driver, compounds)) in figure.panels.iter_mut().zip(groups.iter()) {
        panel.title = Some(driver.clone());

        let mut ticks = vec![];
        for (position, ((_, compound), times)) in compounds.iter().enumerate() {
            let position = position as f64;
            if let Some(stats) = BoxStats::from_samples(times) {
                panel.boxes.push(BoxGlyph {
                    position,
                    stats,
                    color: compound_color(compound),
                    median_color: MEDIAN_COLOR,
                });
            }
            ticks.push(Tick { value: position, label: compound.clone() });
        }

        panel.autoscale();
        panel.x_range = Range::new(-0.5, compounds.len() as f64 - 0.5);
        panel.x_ticks = Some(ticks);
    }
    figure.share_y();

    figure.title = Some(format![
        "{} {} - {}\nLap Time Distribution",
        session.event_name, session.year, session.name,
    ]);
    figure.texts.push(TextItem {
        x: 0.01,
        y: 0.5,
        text: "Lap Time (seconds)".to_string(),
        size: 12.0,
        vertical: true,
        centered: true,
    });

    Ok(figure)
}
