use std::sync::Arc;

use crate::cursor::{ CursorTelemetry, DriverPair };
use crate::error::{ Error, Result };
use crate::figure::{ Color, Figure, HorizontalRule, LineSeries, LineStyle, Range, Tick, MARGIN };
use crate::plot::{ CursorInput, PlotBuilder, PlotOutput };
use crate::session::{ format_lap_time, Lap, Session };
use crate::telemetry::aligner;
use crate::telemetry::TelemetrySeries;

const HEIGHT_RATIOS: [f32; 7] = [1.0, 3.0, 2.0, 1.0, 1.0, 2.0, 1.0];

/// DRS status codes at or above this mean the flap is open.
const DRS_OPEN: u32 = 10;

type Channel = fn(&TelemetrySeries, usize) -> f64;

fn speed(t: &TelemetrySeries, i: usize) -> f64 { t.speed[i] }
fn throttle(t: &TelemetrySeries, i: usize) -> f64 { t.throttle[i] }
fn brake(t: &TelemetrySeries, i: usize) -> f64 { if t.brake[i] { 1.0 } else { 0.0 } }
fn gear(t: &TelemetrySeries, i: usize) -> f64 { t.gear[i] as f64 }
fn rpm(t: &TelemetrySeries, i: usize) -> f64 { t.rpm[i] }
fn drs(t: &TelemetrySeries, i: usize) -> f64 { if t.drs[i] >= DRS_OPEN { 1.0 } else { 0.0 } }

const CHANNELS: [(&str, Channel); 6] = [
    ("Speed", speed),
    ("Throttle", throttle),
    ("Brake", brake),
    ("Gear", gear),
    ("RPM", rpm),
    ("DRS", drs),
];

/// Fastest-lap comparison of two drivers over seven panels sharing distance.
pub struct TelemetryComparison;

impl PlotBuilder for TelemetryComparison {
    fn build(&self, session: &Session, drivers: Option<&DriverPair>) -> PlotOutput {
        let result = match drivers {
            Some(drivers) => build(session, drivers),
            None => Err(Error::Analysis("Select two drivers to compare.".to_string())),
        };

        match result {
            Ok(output) => output,
            Err(err) => {
                error!["Failed to build telemetry comparison: {}", err];
                PlotOutput::figure_only(Figure::message(&format!["Could not build the chart:\n{}", err]))
            }
        }
    }
}

fn fastest_lap<'a>(session: &'a Session, code: &str) -> Result<&'a Lap> {
    session.fastest_lap(code)
        .ok_or_else(|| Error::Analysis(format!["{} has no valid fastest lap.", code]))
}

fn team_color(session: &Session, code: &str, fallback: Color) -> Color {
    session.driver(code)
        .and_then(|driver| driver.team_color.as_deref())
        .and_then(Color::from_hex)
        .unwrap_or(fallback)
}

fn same_team(session: &Session, a: &str, b: &str) -> bool {
    match (session.driver(a), session.driver(b)) {
        (Some(a), Some(b)) => !a.team.is_empty() && a.team == b.team,
        _ => false,
    }
}

fn line(label: &str, points: Vec<(f64, f64)>, color: Color, style: LineStyle) -> LineSeries {
    LineSeries { label: Some(label.to_string()), points, color, style }
}

pub fn build(session: &Session, drivers: &DriverPair) -> Result<PlotOutput> {
    let fastest_d1 = fastest_lap(session, &drivers.d1)?;
    let fastest_d2 = fastest_lap(session, &drivers.d2)?;

    let alignment = aligner::align(&fastest_d1.car_data, &fastest_d2.car_data)?;
    let reference = Arc::new(alignment.reference);
    let comparison = Arc::new(alignment.comparison);

    let color_d1 = team_color(session, &drivers.d1, Color::WHITE);
    let color_d2 = team_color(session, &drivers.d2, Color::SILVER);
    let style_d2 = if same_team(session, &drivers.d1, &drivers.d2) { LineStyle::Dashed } else { LineStyle::Solid };

    let mut figure = Figure::stacked(&HEIGHT_RATIOS);
    figure.title = Some(format![
        "{} {} - {}\n{} ({}) vs {} ({})",
        session.year, session.event_name, session.name,
        drivers.d1, fastest_d1.lap_time.map(format_lap_time).unwrap_or_default(),
        drivers.d2, fastest_d2.lap_time.map(format_lap_time).unwrap_or_default(),
    ]);

    let gap = &mut figure.panels[0];
    gap.y_label = Some("Gap (s)".to_string());
    gap.lines.push(line(
        "Gap",
        reference.distance.iter().copied().zip(alignment.delta.iter().copied()).collect(),
        Color::YELLOW,
        LineStyle::Solid,
    ));
    gap.rules.push(HorizontalRule { y: 0.0, color: Color::WHITE, style: LineStyle::Dashed });

    for (panel, (label, channel)) in figure.panels[1..].iter_mut().zip(CHANNELS.iter()) {
        panel.y_label = Some(label.to_string());
        panel.lines.push(line(&drivers.d1, reference.points(*channel), color_d1, LineStyle::Solid));
        panel.lines.push(line(&drivers.d2, comparison.points(*channel), color_d2, style_d2));
    }
    figure.panels[1].show_legend = true;

    for panel in &mut figure.panels {
        panel.autoscale();
    }
    figure.share_x();

    let drs = &mut figure.panels[6];
    drs.y_range = Range::new(0.0, 1.0).with_margin(MARGIN);
    drs.y_ticks = Some(vec![
        Tick { value: 0.0, label: "OFF".to_string() },
        Tick { value: 1.0, label: "ON".to_string() },
    ]);
    drs.x_label = Some("Distance (m)".to_string());

    let panels = (0..figure.panels.len()).collect();
    Ok(PlotOutput {
        figure,
        cursor: Some(CursorInput {
            panels,
            telemetry: CursorTelemetry { d1: reference, d2: comparison },
            drivers: drivers.clone(),
        }),
    })
}
