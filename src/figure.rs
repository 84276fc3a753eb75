//! Backend independent description of a chart: panels laid out in normalized
//! figure coordinates (origin top-left, y pointing down), each holding data
//! in its own x/y ranges.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const SILVER: Color = Color::rgb(0.75, 0.75, 0.75);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Color {
        Color { r, g, b, a: 1.0 }
    }

    /// Parses `#RRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Color> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).ok().map(|v| v as f32 / 255.0)
        };
        Some(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.left + self.width && y >= self.top && y <= self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Range {
        Range { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn union(&self, other: &Range) -> Range {
        Range::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Widens by `fraction` of the span on both sides; degenerate ranges get a unit span.
    pub fn with_margin(&self, fraction: f64) -> Range {
        let span = self.span();
        if span <= 0.0 {
            return Range::new(self.min - 0.5, self.max + 0.5);
        }
        Range::new(self.min - span * fraction, self.max + span * fraction)
    }

    fn of(values: impl Iterator<Item = f64>) -> Option<Range> {
        values.filter(|v| v.is_finite())
            .fold(None, |range: Option<Range>, v| match range {
                Some(r) => Some(Range::new(r.min.min(v), r.max.max(v))),
                None => Some(Range::new(v, v)),
            })
    }
}

pub const MARGIN: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct LineSeries {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
    pub color: Color,
    pub style: LineStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalRule {
    pub y: f64,
    pub color: Color,
    pub style: LineStyle,
}

/// Five number summary drawn as a box with whiskers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub whisker_low: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_high: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxGlyph {
    pub position: f64,
    pub stats: BoxStats,
    pub color: Color,
    pub median_color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub rect: Rect,
    pub title: Option<String>,
    pub y_label: Option<String>,
    pub x_label: Option<String>,
    pub x_range: Range,
    pub y_range: Range,
    pub lines: Vec<LineSeries>,
    pub rules: Vec<HorizontalRule>,
    pub boxes: Vec<BoxGlyph>,
    pub x_ticks: Option<Vec<Tick>>,
    pub y_ticks: Option<Vec<Tick>>,
    pub show_legend: bool,
}

impl Panel {
    pub fn new(rect: Rect) -> Panel {
        Panel {
            rect,
            title: None,
            y_label: None,
            x_label: None,
            x_range: Range::new(0.0, 1.0),
            y_range: Range::new(0.0, 1.0),
            lines: vec![],
            rules: vec![],
            boxes: vec![],
            x_ticks: None,
            y_ticks: None,
            show_legend: false,
        }
    }

    pub fn data_x_range(&self) -> Option<Range> {
        Range::of(self.lines.iter().flat_map(|line| line.points.iter().map(|(x, _)| *x)))
    }

    pub fn data_y_range(&self) -> Option<Range> {
        let lines = self.lines.iter().flat_map(|line| line.points.iter().map(|(_, y)| *y));
        let rules = self.rules.iter().map(|rule| rule.y);
        let boxes = self.boxes.iter().flat_map(|b| vec![b.stats.whisker_low, b.stats.whisker_high]);
        Range::of(lines.chain(rules).chain(boxes))
    }

    /// Fits both ranges to the data with the default margin.
    pub fn autoscale(&mut self) {
        if let Some(range) = self.data_x_range() {
            self.x_range = range.with_margin(MARGIN);
        }
        if let Some(range) = self.data_y_range() {
            self.y_range = range.with_margin(MARGIN);
        }
    }

    /// Data x coordinate of a normalized figure x coordinate.
    pub fn x_to_data(&self, x: f32) -> f64 {
        let fraction = ((x - self.rect.left) / self.rect.width) as f64;
        self.x_range.min + fraction * self.x_range.span()
    }

    /// Normalized figure coordinates of a data point.
    pub fn data_to_figure(&self, x: f64, y: f64) -> (f32, f32) {
        let fx = (x - self.x_range.min) / self.x_range.span();
        let fy = (y - self.y_range.min) / self.y_range.span();
        (
            self.rect.left + (fx as f32) * self.rect.width,
            self.rect.top + (1.0 - fy as f32) * self.rect.height,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub size: f32,
    pub vertical: bool,
    pub centered: bool,
}

/// Result of hit testing the pointer against a figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Index of the panel under the pointer
    pub panel: Option<usize>,
    /// Data x coordinate in that panel
    pub x: Option<f64>,
}

impl PointerEvent {
    pub fn outside() -> PointerEvent {
        PointerEvent { panel: None, x: None }
    }

    pub fn over(panel: usize, x: f64) -> PointerEvent {
        PointerEvent { panel: Some(panel), x: Some(x) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: Option<String>,
    pub panels: Vec<Panel>,
    pub texts: Vec<TextItem>,
}

const FIGURE_LEFT: f32 = 0.08;
const FIGURE_RIGHT: f32 = 0.98;
const FIGURE_TOP: f32 = 0.1;
const FIGURE_BOTTOM: f32 = 0.94;
const STACK_SPACING: f32 = 0.012;
const GRID_SPACING: f32 = 0.05;

impl Figure {
    /// Vertically stacked panels whose heights follow `ratios`.
    pub fn stacked(ratios: &[f32]) -> Figure {
        let total: f32 = ratios.iter().sum();
        let spacing = STACK_SPACING * ratios.len().saturating_sub(1) as f32;
        let available = FIGURE_BOTTOM - FIGURE_TOP - spacing;

        let mut top = FIGURE_TOP;
        let panels = ratios.iter()
            .map(|ratio| {
                let height = available * ratio / total;
                let rect = Rect { left: FIGURE_LEFT, top, width: FIGURE_RIGHT - FIGURE_LEFT, height };
                top += height + STACK_SPACING;
                Panel::new(rect)
            })
            .collect();

        Figure { title: None, panels, texts: vec![] }
    }

    /// `count` panels filling a grid row by row; trailing cells stay empty.
    pub fn grid(count: usize, ncols: usize) -> Figure {
        let ncols = ncols.max(1);
        let nrows = (count + ncols - 1) / ncols;
        let cell_width = (FIGURE_RIGHT - FIGURE_LEFT) / ncols as f32;
        let cell_height = (FIGURE_BOTTOM - FIGURE_TOP) / nrows.max(1) as f32;

        let panels = (0..count)
            .map(|i| {
                let (row, col) = (i / ncols, i % ncols);
                Panel::new(Rect {
                    left: FIGURE_LEFT + col as f32 * cell_width + GRID_SPACING / 4.0,
                    top: FIGURE_TOP + row as f32 * cell_height + GRID_SPACING,
                    width: cell_width - GRID_SPACING / 2.0,
                    height: cell_height - GRID_SPACING * 1.5,
                })
            })
            .collect();

        Figure { title: None, panels, texts: vec![] }
    }

    /// A single blank panel with a centred message.
    pub fn message(text: &str) -> Figure {
        let mut figure = Figure::grid(1, 1);
        figure.texts.push(TextItem {
            x: 0.5,
            y: 0.5,
            text: text.to_string(),
            size: 16.0,
            vertical: false,
            centered: true,
        });
        figure
    }

    /// Gives every panel the union of their x ranges.
    pub fn share_x(&mut self) {
        let shared = self.panels.iter()
            .map(|panel| panel.x_range)
            .reduce(|a, b| a.union(&b));
        if let Some(range) = shared {
            for panel in &mut self.panels {
                panel.x_range = range;
            }
        }
    }

    pub fn share_y(&mut self) {
        let shared = self.panels.iter()
            .map(|panel| panel.y_range)
            .reduce(|a, b| a.union(&b));
        if let Some(range) = shared {
            for panel in &mut self.panels {
                panel.y_range = range;
            }
        }
    }

    /// Hit tests a pointer position given in pixels of a `width` x `height` surface.
    pub fn pointer_event(&self, px: f32, py: f32, width: f32, height: f32) -> PointerEvent {
        if width <= 0.0 || height <= 0.0 {
            return PointerEvent::outside();
        }
        let (x, y) = (px / width, py / height);
        self.panels.iter()
            .position(|panel| panel.rect.contains(x, y))
            .map(|idx| PointerEvent::over(idx, self.panels[idx].x_to_data(x)))
            .unwrap_or_else(PointerEvent::outside)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Color::from_hex("#FFFFFF"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#00ff00"), Some(Color::rgb(0.0, 1.0, 0.0)));
        assert_eq!(Color::from_hex("FFFFFF"), None);
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("#GGGGGG"), None);
    }

    #[test]
    fn stacked_panels_follow_ratios_without_overlap() {
        let figure = Figure::stacked(&[1.0, 3.0]);
        let (a, b) = (&figure.panels[0].rect, &figure.panels[1].rect);
        assert!((b.height / a.height - 3.0).abs() < 1e-4);
        assert!(a.top + a.height < b.top);
    }

    #[test]
    fn grid_places_panels_row_by_row() {
        let figure = Figure::grid(5, 4);
        assert_eq!(figure.panels.len(), 5);
        assert!(figure.panels[4].rect.top > figure.panels[0].rect.top);
        assert_eq!(figure.panels[4].rect.left, figure.panels[0].rect.left);
    }

    #[test]
    fn autoscale_adds_margin() {
        let mut panel = Panel::new(Rect { left: 0.0, top: 0.0, width: 1.0, height: 1.0 });
        panel.lines.push(LineSeries {
            label: None,
            points: vec![(0.0, 10.0), (100.0, 20.0)],
            color: Color::WHITE,
            style: LineStyle::Solid,
        });
        panel.autoscale();
        assert!((panel.x_range.min + 5.0).abs() < 1e-9);
        assert!((panel.x_range.max - 105.0).abs() < 1e-9);
        assert!((panel.y_range.min - 9.5).abs() < 1e-9);
        assert!((panel.y_range.max - 20.5).abs() < 1e-9);
    }

    #[test]
    fn pointer_event_maps_to_panel_data() {
        let mut figure = Figure::stacked(&[1.0, 1.0]);
        for panel in &mut figure.panels {
            panel.x_range = Range::new(0.0, 1000.0);
        }
        let rect = figure.panels[1].rect;
        let px = (rect.left + rect.width / 2.0) * 800.0;
        let py = (rect.top + rect.height / 2.0) * 600.0;

        let event = figure.pointer_event(px, py, 800.0, 600.0);
        assert_eq!(event.panel, Some(1));
        assert!((event.x.unwrap() - 500.0).abs() < 0.5);

        assert_eq!(figure.pointer_event(1.0, 1.0, 800.0, 600.0), PointerEvent::outside());
    }
}
