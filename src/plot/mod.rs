pub mod box_plot;
pub mod telemetry_comparison;

use crate::cursor::{ CursorTelemetry, DriverPair };
use crate::figure::Figure;
use crate::session::Session;

pub struct PlotOutput {
    pub figure: Figure,
    /// Present when the figure supports the interactive cursor
    pub cursor: Option<CursorInput>,
}

/// What an `InteractiveCursor` needs besides the surface and status sink.
pub struct CursorInput {
    pub panels: Vec<usize>,
    pub telemetry: CursorTelemetry,
    pub drivers: DriverPair,
}

impl PlotOutput {
    pub fn figure_only(figure: Figure) -> PlotOutput {
        PlotOutput { figure, cursor: None }
    }
}

pub trait PlotBuilder: Sync {
    fn build(&self, session: &Session, drivers: Option<&DriverPair>) -> PlotOutput;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisKind {
    #[default]
    TelemetryComparison,
    LapTimeDistribution,
}

impl AnalysisKind {
    pub fn all() -> &'static [AnalysisKind] {
        &[AnalysisKind::TelemetryComparison, AnalysisKind::LapTimeDistribution]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisKind::TelemetryComparison => "Telemetry Comparison",
            AnalysisKind::LapTimeDistribution => "Lap Time Distribution",
        }
    }

    pub fn needs_drivers(&self) -> bool {
        matches!(self, AnalysisKind::TelemetryComparison)
    }

    pub fn builder(&self) -> &'static dyn PlotBuilder {
        match self {
            AnalysisKind::TelemetryComparison => &telemetry_comparison::TelemetryComparison,
            AnalysisKind::LapTimeDistribution => &box_plot::LapTimeDistribution,
        }
    }

    pub fn build(&self, session: &Session, drivers: Option<&DriverPair>) -> PlotOutput {
        self.builder().build(session, drivers)
    }
}
