//! Synchronized hover cursor over panels that share a distance axis.
//!
//! The cursor owns one crosshair per panel and a tooltip, created hidden when
//! it is constructed. Pointer motion moves the crosshairs and rewrites the
//! tooltip and the status line from the two drivers' telemetry.
//!
//! Samples are looked up with a lower bound on `Distance` (the first sample at
//! or after the pointer), not the nearest sample. This mirrors the readout of
//! the tool this viewer replaces and is kept deliberately.

use std::sync::{ Arc, Mutex };

use thiserror::Error;

use crate::figure::PointerEvent;
use crate::telemetry::{ Sample, TelemetrySeries };

pub const IDLE_STATUS: &str = "Ready.";

/// Handle of a pointer motion subscription on a `RenderSurface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The surface a figure is drawn on.
pub trait RenderSurface {
    fn connect_motion(&mut self) -> SubscriptionId;
    fn disconnect_motion(&mut self, id: SubscriptionId);
    /// Asks for a redraw once pending events are handled. Repeated requests coalesce.
    fn draw_idle(&mut self);
}

pub trait StatusSink {
    fn set_status(&mut self, text: &str);
}

/// Shared single line of status text, last write wins.
#[derive(Debug, Clone, Default)]
pub struct StatusLine(Arc<Mutex<String>>);

impl StatusLine {
    pub fn new(text: &str) -> StatusLine {
        StatusLine(Arc::new(Mutex::new(text.to_string())))
    }

    pub fn get(&self) -> String {
        match self.0.lock() {
            Ok(text) => text.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatusSink for StatusLine {
    fn set_status(&mut self, text: &str) {
        let mut current = match self.0.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        current.clear();
        current.push_str(text);
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CursorError {
    #[error("telemetry for {0} is empty")]
    EmptySeries(String),

    #[error("pointer distance {0} is not a finite number")]
    InvalidDistance(f64),

    #[error("sample {index} of {driver} has a non-finite {field}")]
    MalformedSample { driver: String, index: usize, field: &'static str },

    #[error("telemetry of {0} has no DeltaTime column")]
    MissingDeltaTime(String),
}

/// Telemetry the cursor reads: `d1` is the reference, `d2` the comparison.
#[derive(Debug, Clone)]
pub struct CursorTelemetry {
    pub d1: Arc<TelemetrySeries>,
    pub d2: Arc<TelemetrySeries>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverPair {
    pub d1: String,
    pub d2: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crosshair {
    pub panel: usize,
    pub x: f64,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub text: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorOverlay {
    pub crosshairs: Vec<Crosshair>,
    pub tooltip: Tooltip,
}

impl CursorOverlay {
    pub fn is_visible(&self) -> bool {
        self.tooltip.visible
    }
}

/// Everything one pointer position produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub distance: f64,
    pub tooltip: String,
    pub status: String,
}

pub struct InteractiveCursor {
    panels: Vec<usize>,
    telemetry: CursorTelemetry,
    drivers: DriverPair,
    status: Box<dyn StatusSink>,
    overlay: CursorOverlay,
    subscription: Option<SubscriptionId>,
}

impl InteractiveCursor {
    pub fn new<S: RenderSurface>(
        surface: &mut S,
        panels: &[usize],
        telemetry: CursorTelemetry,
        drivers: DriverPair,
        status: Box<dyn StatusSink>,
    ) -> Result<InteractiveCursor, CursorError> {
        if telemetry.d1.is_empty() {
            return Err(CursorError::EmptySeries(drivers.d1));
        }
        if telemetry.d2.is_empty() {
            return Err(CursorError::EmptySeries(drivers.d2));
        }

        let overlay = CursorOverlay {
            crosshairs: panels.iter()
                .map(|panel| Crosshair { panel: *panel, x: 0.0, visible: false })
                .collect(),
            tooltip: Tooltip { text: String::new(), visible: false },
        };

        let subscription = Some(surface.connect_motion());

        Ok(InteractiveCursor {
            panels: panels.to_vec(),
            telemetry,
            drivers,
            status,
            overlay,
            subscription,
        })
    }

    pub fn overlay(&self) -> &CursorOverlay {
        &self.overlay
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    /// Handles one pointer motion event. Never fails; problems are logged and the
    /// overlay keeps its previous state.
    pub fn on_pointer_motion<S: RenderSurface>(&mut self, surface: &mut S, event: &PointerEvent) {
        if self.subscription.is_none() {
            return;
        }

        let over_panel = event.panel.map_or(false, |panel| self.panels.contains(&panel));
        let distance = match (over_panel, event.x) {
            (true, Some(distance)) => distance,
            _ => {
                self.hide(surface);
                return;
            }
        };

        match self.readout(distance) {
            Ok(Some(readout)) => {
                self.show(&readout);
                surface.draw_idle();
            },
            Ok(None) => (),
            Err(err) => error!["Interactive cursor failed at distance {}: {}", distance, err],
        }
    }

    fn hide<S: RenderSurface>(&mut self, surface: &mut S) {
        if !self.overlay.is_visible() {
            return;
        }

        for crosshair in &mut self.overlay.crosshairs {
            crosshair.visible = false;
        }
        self.overlay.tooltip.visible = false;
        self.status.set_status(IDLE_STATUS);
        surface.draw_idle();
    }

    fn show(&mut self, readout: &Readout) {
        for crosshair in &mut self.overlay.crosshairs {
            crosshair.x = readout.distance;
            crosshair.visible = true;
        }
        self.overlay.tooltip.text = readout.tooltip.clone();
        self.overlay.tooltip.visible = true;
        self.status.set_status(&readout.status);
    }

    /// Computes the readout at `distance`; `None` when the pointer lies past the
    /// end of either lap.
    pub fn readout(&self, distance: f64) -> Result<Option<Readout>, CursorError> {
        if !distance.is_finite() {
            return Err(CursorError::InvalidDistance(distance));
        }

        let d1 = &self.telemetry.d1;
        let d2 = &self.telemetry.d2;
        let idx_d1 = d1.lower_bound(distance);
        let idx_d2 = d2.lower_bound(distance);

        let (sample_d1, sample_d2) = match (d1.sample(idx_d1), d2.sample(idx_d2)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Ok(None),
        };

        check_sample(&self.drivers.d1, idx_d1, &sample_d1)?;
        check_sample(&self.drivers.d2, idx_d2, &sample_d2)?;
        let delta = match sample_d2.delta_time {
            Some(delta) if delta.is_finite() => delta,
            Some(_) => return Err(CursorError::MalformedSample {
                driver: self.drivers.d2.clone(),
                index: idx_d2,
                field: "DeltaTime",
            }),
            None => return Err(CursorError::MissingDeltaTime(self.drivers.d2.clone())),
        };

        Ok(Some(Readout {
            distance,
            tooltip: format_tooltip(distance, &self.drivers, &sample_d1, &sample_d2, delta),
            status: format_status(distance, &self.drivers, &sample_d1, &sample_d2, delta),
        }))
    }

    /// Unsubscribes from pointer motion. Later calls do nothing.
    pub fn disconnect<S: RenderSurface>(&mut self, surface: &mut S) {
        if let Some(id) = self.subscription.take() {
            surface.disconnect_motion(id);
        }
    }
}

fn check_sample(driver: &str, index: usize, sample: &Sample) -> Result<(), CursorError> {
    let fields = [("Speed", sample.speed), ("RPM", sample.rpm), ("Distance", sample.distance)];
    for (field, value) in fields.iter() {
        if !value.is_finite() {
            return Err(CursorError::MalformedSample { driver: driver.to_string(), index, field });
        }
    }
    Ok(())
}

fn truncated(distance: f64) -> i64 {
    distance.trunc() as i64
}

pub fn format_tooltip(distance: f64, drivers: &DriverPair, d1: &Sample, d2: &Sample, delta: f64) -> String {
    format!(
        "Dist: {:>5}m\n\
         ----------------------\n\
         {:<4} {:<4} {:<5} {:<2} {:>6}\n\
         {:<4} {:<4.0} {:<5.0} {:<2} {:>6}\n\
         {:<4} {:<4.0} {:<5.0} {:<2} {:>+6.2}",
        truncated(distance),
        "", "V", "RPM", "G", "Δ(s)",
        drivers.d1, d1.speed, d1.rpm, d1.gear, "0.00",
        drivers.d2, d2.speed, d2.rpm, d2.gear, delta,
    )
}

pub fn format_status(distance: f64, drivers: &DriverPair, d1: &Sample, d2: &Sample, delta: f64) -> String {
    format!(
        "Dist: {}m | {}: V={:.0} | {}: V={:.0} | Gap (vs {}): {:+.2}s",
        truncated(distance),
        drivers.d1, d1.speed,
        drivers.d2, d2.speed,
        drivers.d1, delta,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSurface {
        next_id: u64,
        connected: Vec<SubscriptionId>,
        disconnects: usize,
        redraws: usize,
    }

    impl RenderSurface for RecordingSurface {
        fn connect_motion(&mut self) -> SubscriptionId {
            self.next_id += 1;
            let id = SubscriptionId(self.next_id);
            self.connected.push(id);
            id
        }

        fn disconnect_motion(&mut self, id: SubscriptionId) {
            self.connected.retain(|c| *c != id);
            self.disconnects += 1;
        }

        fn draw_idle(&mut self) {
            self.redraws += 1;
        }
    }

    fn series(distance: &[f64], speed: &[f64], delta: Option<&[f64]>) -> Arc<TelemetrySeries> {
        let n = distance.len();
        Arc::new(TelemetrySeries {
            distance: distance.to_vec(),
            time: (0..n).map(|i| i as f64).collect(),
            speed: speed.to_vec(),
            rpm: (0..n).map(|i| 10000.0 + 100.0 * i as f64).collect(),
            gear: (0..n).map(|i| 3 + i as u32).collect(),
            throttle: vec![100.0; n],
            brake: vec![false; n],
            drs: vec![0; n],
            delta_time: delta.map(|d| d.to_vec()),
        })
    }

    fn drivers() -> DriverPair {
        DriverPair { d1: "VER".to_string(), d2: "LEC".to_string() }
    }

    fn example_telemetry() -> CursorTelemetry {
        CursorTelemetry {
            d1: series(&[0.0, 50.0, 100.0], &[100.0, 200.0, 300.0], None),
            d2: series(&[0.0, 60.0, 120.0], &[90.0, 210.0, 290.0], Some(&[0.0, -0.3, 0.1])),
        }
    }

    fn cursor(surface: &mut RecordingSurface, telemetry: CursorTelemetry) -> (InteractiveCursor, StatusLine) {
        let status = StatusLine::new("Loaded.");
        let cursor = InteractiveCursor::new(
            surface,
            &[0, 1, 2, 3, 4, 5, 6],
            telemetry,
            drivers(),
            Box::new(status.clone()),
        ).unwrap();
        (cursor, status)
    }

    #[test]
    fn construction_subscribes_once_with_hidden_overlay() {
        let mut surface = RecordingSurface::default();
        let (cursor, _) = cursor(&mut surface, example_telemetry());

        assert_eq!(surface.connected.len(), 1);
        assert_eq!(cursor.overlay().crosshairs.len(), 7);
        assert!(cursor.overlay().crosshairs.iter().all(|c| !c.visible));
        assert!(!cursor.overlay().tooltip.visible);
    }

    #[test]
    fn empty_series_is_rejected() {
        let mut surface = RecordingSurface::default();
        let telemetry = CursorTelemetry {
            d1: series(&[], &[], None),
            d2: series(&[0.0], &[100.0], Some(&[0.0])),
        };
        let result = InteractiveCursor::new(&mut surface, &[0], telemetry, drivers(), Box::new(StatusLine::default()));

        assert!(matches!(result, Err(CursorError::EmptySeries(ref d)) if d == "VER"));
        assert!(surface.connected.is_empty());
    }

    #[test]
    fn uses_lower_bound_not_nearest_sample() {
        let mut surface = RecordingSurface::default();
        let (mut cursor, status) = cursor(&mut surface, example_telemetry());

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(1, 55.0));

        // 55 lies between 50 and 100: the reference reads the sample at 100
        assert_eq!(
            cursor.overlay().tooltip.text,
            "Dist:    55m\n\
             ----------------------\n     \
             V    RPM   G    Δ(s)\n\
             VER  300  10200 5    0.00\n\
             LEC  210  10100 4   -0.30"
        );
        assert_eq!(status.get(), "Dist: 55m | VER: V=300 | LEC: V=210 | Gap (vs VER): -0.30s");
        assert!(cursor.overlay().crosshairs.iter().all(|c| c.visible && c.x == 55.0));
        assert_eq!(surface.redraws, 1);
    }

    #[test]
    fn boundary_distance_selects_that_index() {
        let mut surface = RecordingSurface::default();
        let (cursor, _) = cursor(&mut surface, example_telemetry());

        let readout = cursor.readout(50.0).unwrap().unwrap();
        assert!(readout.status.contains("VER: V=200"));
        // 50 is before the comparison's sample at 60
        assert!(readout.status.contains("LEC: V=210"));
    }

    #[test]
    fn identical_sampling_returns_exact_samples() {
        let mut surface = RecordingSurface::default();
        let distances = [0.0, 10.0, 20.0, 30.0];
        let telemetry = CursorTelemetry {
            d1: series(&distances, &[101.0, 102.0, 103.0, 104.0], None),
            d2: series(&distances, &[201.0, 202.0, 203.0, 204.0], Some(&[0.0, 0.1, 0.2, 0.3])),
        };
        let (cursor, _) = cursor(&mut surface, telemetry);

        for (i, distance) in distances.iter().enumerate() {
            let readout = cursor.readout(*distance).unwrap().unwrap();
            assert!(readout.status.contains(&format!["VER: V={}", 101 + i]));
            assert!(readout.status.contains(&format!["LEC: V={}", 201 + i]));
        }
    }

    #[test]
    fn past_end_of_shorter_series_keeps_previous_overlay() {
        let mut surface = RecordingSurface::default();
        let (mut cursor, status) = cursor(&mut surface, example_telemetry());

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 55.0));
        let before = cursor.overlay().clone();
        let status_before = status.get();

        // Past the reference's last sample at 100 but within the comparison
        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 110.0));

        assert_eq!(cursor.overlay(), &before);
        assert_eq!(status.get(), status_before);
        assert_eq!(surface.redraws, 1);
    }

    #[test]
    fn reference_delta_is_always_zero() {
        let mut surface = RecordingSurface::default();
        let telemetry = CursorTelemetry {
            d1: series(&[0.0, 10.0], &[100.0, 110.0], Some(&[4.2, 4.2])),
            d2: series(&[0.0, 10.0], &[100.0, 110.0], Some(&[1.5, 1.5])),
        };
        let (cursor, _) = cursor(&mut surface, telemetry);

        let readout = cursor.readout(5.0).unwrap().unwrap();
        let reference_line = readout.tooltip.lines().nth(3).unwrap();
        assert!(reference_line.starts_with("VER"));
        assert!(reference_line.ends_with("  0.00"));
        assert!(readout.tooltip.lines().nth(4).unwrap().ends_with(" +1.50"));
    }

    #[test]
    fn outside_events_are_idempotent() {
        let mut surface = RecordingSurface::default();
        let (mut cursor, status) = cursor(&mut surface, example_telemetry());

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(2, 10.0));
        cursor.on_pointer_motion(&mut surface, &PointerEvent::outside());
        let once = (cursor.overlay().clone(), status.get(), surface.redraws);

        cursor.on_pointer_motion(&mut surface, &PointerEvent::outside());
        let twice = (cursor.overlay().clone(), status.get(), surface.redraws);

        assert_eq!(once, twice);
        assert_eq!(status.get(), IDLE_STATUS);
        assert!(!cursor.overlay().is_visible());
        assert!(cursor.overlay().crosshairs.iter().all(|c| !c.visible));
    }

    #[test]
    fn outside_before_any_hover_changes_nothing() {
        let mut surface = RecordingSurface::default();
        let (mut cursor, status) = cursor(&mut surface, example_telemetry());

        cursor.on_pointer_motion(&mut surface, &PointerEvent::outside());

        assert_eq!(status.get(), "Loaded.");
        assert_eq!(surface.redraws, 0);
    }

    #[test]
    fn panel_not_owned_by_cursor_counts_as_outside() {
        let mut surface = RecordingSurface::default();
        let status = StatusLine::default();
        let mut cursor = InteractiveCursor::new(
            &mut surface, &[0, 1], example_telemetry(), drivers(), Box::new(status.clone()),
        ).unwrap();

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(1, 10.0));
        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(5, 10.0));
        assert!(!cursor.overlay().is_visible());
    }

    #[test]
    fn malformed_sample_is_swallowed() {
        let mut surface = RecordingSurface::default();
        let telemetry = CursorTelemetry {
            d1: series(&[0.0, 10.0], &[100.0, f64::NAN], None),
            d2: series(&[0.0, 10.0], &[100.0, 110.0], Some(&[0.0, 0.1])),
        };
        let (mut cursor, status) = cursor(&mut surface, telemetry);

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 5.0));
        assert!(!cursor.overlay().is_visible());
        assert_eq!(status.get(), "Loaded.");
        assert!(cursor.is_connected());

        // Still reacts to later, well-formed positions
        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 0.0));
        assert!(cursor.overlay().is_visible());
    }

    #[test]
    fn non_finite_delta_is_swallowed() {
        let mut surface = RecordingSurface::default();
        let telemetry = CursorTelemetry {
            d1: series(&[0.0, 10.0], &[100.0, 110.0], None),
            d2: series(&[0.0, 10.0], &[100.0, 110.0], Some(&[0.0, f64::NAN])),
        };
        let (mut cursor, status) = cursor(&mut surface, telemetry);

        assert_eq!(
            cursor.readout(5.0),
            Err(CursorError::MalformedSample { driver: "LEC".to_string(), index: 1, field: "DeltaTime" }),
        );

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 5.0));
        assert!(!cursor.overlay().is_visible());
        assert_eq!(status.get(), "Loaded.");
        assert_eq!(surface.redraws, 0);
        assert!(cursor.is_connected());
    }

    #[test]
    fn missing_delta_column_is_an_error() {
        let mut surface = RecordingSurface::default();
        let telemetry = CursorTelemetry {
            d1: series(&[0.0, 10.0], &[100.0, 110.0], None),
            d2: series(&[0.0, 10.0], &[100.0, 110.0], None),
        };
        let (cursor, _) = cursor(&mut surface, telemetry);

        assert_eq!(cursor.readout(5.0), Err(CursorError::MissingDeltaTime("LEC".to_string())));
        assert!(matches!(cursor.readout(f64::NAN), Err(CursorError::InvalidDistance(_))));
    }

    #[test]
    fn disconnect_is_idempotent_and_stops_handling() {
        let mut surface = RecordingSurface::default();
        let (mut cursor, status) = cursor(&mut surface, example_telemetry());

        cursor.disconnect(&mut surface);
        cursor.disconnect(&mut surface);
        assert_eq!(surface.disconnects, 1);
        assert!(surface.connected.is_empty());
        assert!(!cursor.is_connected());

        cursor.on_pointer_motion(&mut surface, &PointerEvent::over(0, 55.0));
        assert!(!cursor.overlay().is_visible());
        assert_eq!(status.get(), "Loaded.");
    }
}
