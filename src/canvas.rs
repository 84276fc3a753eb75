//! Skia rendering of the application: control bar, figure, cursor overlay and
//! status bar.

use std::collections::HashMap;

use skulpin::skia_safe;
use skulpin::skia_safe::{ Color4f, Font, Paint, Path, PathEffect, Point, Typeface };
use skulpin::CoordinateSystemHelper;

use crate::app::{ AppState, Field };
use crate::cursor::{ CursorOverlay, RenderSurface, SubscriptionId };
use crate::figure::{ BoxGlyph, Color, Figure, LineSeries, LineStyle, Panel, TextItem, Tick };

pub const CONTROL_BAR_HEIGHT: f32 = 32.0;
pub const STATUS_BAR_HEIGHT: f32 = 24.0;

/// Top-left corner of the tooltip in normalized figure coordinates.
const TOOLTIP_ANCHOR: (f32, f32) = (0.15, 0.15);
const TOOLTIP_PADDING: f32 = 6.0;
const TICK_COUNT: usize = 5;
const SANS: [&str; 3] = ["Helvetica", "Arial", "DejaVu Sans"];

const BACKGROUND: Color = Color::rgb(0.07, 0.07, 0.09);
const PANEL_BACKGROUND: Color = Color::rgb(0.1, 0.1, 0.12);
const TOOLTIP_BACKGROUND: Color = Color { r: 0x19 as f32 / 255.0, g: 0x19 as f32 / 255.0, b: 0x25 as f32 / 255.0, a: 0.9 };
const GRID: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 0.15 };
const FOCUS: Color = Color::CYAN;

/// Pointer subscriptions and the coalesced redraw request of the window.
#[derive(Debug, Default)]
pub struct SkiaSurface {
    next_id: u64,
    subscriptions: Vec<SubscriptionId>,
    redraw_pending: bool,
}

impl SkiaSurface {
    pub fn is_subscribed(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Returns whether a redraw was requested since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.redraw_pending, false)
    }
}

impl RenderSurface for SkiaSurface {
    fn connect_motion(&mut self) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscriptions.push(id);
        id
    }

    fn disconnect_motion(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|s| *s != id);
    }

    fn draw_idle(&mut self) {
        self.redraw_pending = true;
    }
}

/// Area of the window the figure occupies, in logical pixels.
#[derive(Debug, Clone, Copy)]
pub struct FigureArea {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl FigureArea {
    pub fn of_window(width: f32, height: f32) -> FigureArea {
        FigureArea {
            left: 0.0,
            top: CONTROL_BAR_HEIGHT,
            width,
            height: (height - CONTROL_BAR_HEIGHT - STATUS_BAR_HEIGHT).max(0.0),
        }
    }

    fn point(&self, (x, y): (f32, f32)) -> Point {
        Point::new(self.left + x * self.width, self.top + y * self.height)
    }
}

fn color4f(color: Color) -> Color4f {
    Color4f::new(color.r, color.g, color.b, color.a)
}

fn stroke(color: Color, width: f32, style: LineStyle) -> Paint {
    let mut paint = Paint::new(color4f(color), None);
    paint.set_anti_alias(true);
    paint.set_style(skia_safe::paint::Style::Stroke);
    paint.set_stroke_width(width);
    if style == LineStyle::Dashed {
        paint.set_path_effect(PathEffect::dash(&[6.0, 4.0], 0.0));
    }
    paint
}

fn fill(color: Color) -> Paint {
    let mut paint = Paint::new(color4f(color), None);
    paint.set_anti_alias(true);
    paint
}

fn font(families: &[&str], size: f32) -> Font {
    let mut font_collection = skia_safe::textlayout::FontCollection::new();
    font_collection.set_default_font_manager(skia_safe::FontMgr::new(), None);

    let typeface = font_collection.find_typefaces(families, skia_safe::FontStyle::normal())
        .pop()
        .unwrap_or_else(Typeface::default);
    let mut font = Font::new(typeface, size);
    font.set_subpixel(true);
    font
}

/// Short decimal label for an axis value.
fn tick_label(value: f64, span: f64) -> String {
    if span >= 10.0 {
        format!["{:.0}", value]
    } else if span >= 1.0 {
        format!["{:.1}", value]
    } else {
        format!["{:.2}", value]
    }
}

fn auto_ticks(min: f64, max: f64) -> Vec<Tick> {
    let span = max - min;
    (0..TICK_COUNT)
        .map(|i| {
            let value = min + span * i as f64 / (TICK_COUNT - 1) as f64;
            Tick { value, label: tick_label(value, span) }
        })
        .collect()
}

pub struct Painter {
    font: Font,
    small: Font,
    mono: Font,
    /// Fonts of figure text items, keyed by the bits of their size
    sized: HashMap<u32, Font>,
}

impl Painter {
    pub fn new() -> Painter {
        Painter {
            font: font(&SANS, 13.0),
            small: font(&SANS, 10.0),
            mono: font(&["Monaco", "Menlo", "DejaVu Sans Mono", "Consolas"], 12.0),
            sized: HashMap::new(),
        }
    }

    fn cache_font(&mut self, size: f32) {
        self.sized.entry(size.to_bits()).or_insert_with(|| font(&SANS, size));
    }

    pub fn draw(&mut self, canvas: &mut skia_safe::Canvas, coord: &CoordinateSystemHelper, app: &AppState) {
        if let Some(figure) = &app.figure {
            for item in &figure.texts {
                self.cache_font(item.size);
            }
        }

        let size = coord.window_logical_size();
        let (width, height) = (size.width as f32, size.height as f32);
        canvas.clear(color4f(BACKGROUND));

        let area = FigureArea::of_window(width, height);
        match &app.figure {
            Some(figure) => {
                self.draw_figure(canvas, &area, figure);
                if let (Some(cursor), Some(_)) = (&app.cursor, figure.panels.first()) {
                    self.draw_overlay(canvas, &area, figure, cursor.overlay());
                }
            },
            None => {
                let text = if app.busy { "Working..." } else { "Load a session and pick an analysis." };
                self.draw_text(canvas, &self.font, text, area.point((0.5, 0.5)), Color::SILVER, true);
            },
        }

        self.draw_controls(canvas, app, width);
        self.draw_status(canvas, &app.status.get(), width, height);
    }

    fn draw_text(&self, canvas: &mut skia_safe::Canvas, font: &Font, text: &str, at: Point, color: Color, centered: bool) {
        let paint = fill(color);
        let (line_width, _) = font.measure_str(text, Some(&paint));
        let x = if centered { at.x - line_width / 2.0 } else { at.x };
        canvas.draw_str(text, Point::new(x, at.y), font, &paint);
    }

    fn draw_controls(&self, canvas: &mut skia_safe::Canvas, app: &AppState, width: f32) {
        let bar = skia_safe::Rect::from_xywh(0.0, 0.0, width, CONTROL_BAR_HEIGHT);
        canvas.draw_rect(bar, &fill(PANEL_BACKGROUND));

        let mut x = 8.0;
        for field in Field::all() {
            let value = match field {
                Field::Year => app.year.to_string(),
                Field::Event => app.events.value().unwrap_or("-").to_string(),
                Field::Session => app.sessions.value().unwrap_or("-").to_string(),
                Field::Analysis => app.analysis.display_name().to_string(),
                Field::Driver1 => app.driver1.value().unwrap_or("-").to_string(),
                Field::Driver2 => app.driver2.value().unwrap_or("-").to_string(),
            };
            let text = format!["{}: {}", field.label(), value];
            let color = if *field == app.focus { FOCUS } else { Color::WHITE };
            self.draw_text(canvas, &self.font, &text, Point::new(x, 21.0), color, false);

            let (text_width, _) = self.font.measure_str(&text, None);
            x += text_width + 18.0;
        }
    }

    fn draw_status(&self, canvas: &mut skia_safe::Canvas, status: &str, width: f32, height: f32) {
        let top = height - STATUS_BAR_HEIGHT;
        canvas.draw_rect(skia_safe::Rect::from_xywh(0.0, top, width, STATUS_BAR_HEIGHT), &fill(PANEL_BACKGROUND));
        self.draw_text(canvas, &self.mono, status, Point::new(8.0, top + 16.0), Color::WHITE, false);
    }

    fn draw_figure(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, figure: &Figure) {
        if let Some(title) = &figure.title {
            for (i, line) in title.lines().enumerate() {
                let at = area.point((0.5, 0.035)) + Point::new(0.0, 16.0 * i as f32);
                self.draw_text(canvas, &self.font, line, at, Color::WHITE, true);
            }
        }

        for panel in &figure.panels {
            self.draw_panel(canvas, area, panel);
        }

        for text in &figure.texts {
            self.draw_text_item(canvas, area, text);
        }
    }

    fn draw_text_item(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, item: &TextItem) {
        let font = self.sized.get(&item.size.to_bits()).unwrap_or(&self.font);
        let at = area.point((item.x, item.y));
        if item.vertical {
            canvas.save();
            canvas.translate(at);
            canvas.rotate(-90.0, None);
            self.draw_text(canvas, font, &item.text, Point::new(0.0, 0.0), Color::WHITE, item.centered);
            canvas.restore();
            return;
        }
        for (i, line) in item.text.lines().enumerate() {
            let line_at = at + Point::new(0.0, item.size * 1.3 * i as f32);
            self.draw_text(canvas, font, line, line_at, Color::WHITE, item.centered);
        }
    }

    fn panel_rect(area: &FigureArea, panel: &Panel) -> skia_safe::Rect {
        let top_left = area.point((panel.rect.left, panel.rect.top));
        skia_safe::Rect::from_xywh(
            top_left.x,
            top_left.y,
            panel.rect.width * area.width,
            panel.rect.height * area.height,
        )
    }

    fn to_point(area: &FigureArea, panel: &Panel, x: f64, y: f64) -> Point {
        area.point(panel.data_to_figure(x, y))
    }

    fn draw_panel(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, panel: &Panel) {
        let rect = Self::panel_rect(area, panel);
        canvas.draw_rect(rect, &fill(PANEL_BACKGROUND));

        canvas.save();
        canvas.clip_rect(rect, None, Some(true));
        self.draw_grid(canvas, area, panel);
        for rule in &panel.rules {
            let paint = stroke(rule.color, 1.0, rule.style);
            let y = Self::to_point(area, panel, panel.x_range.min, rule.y).y;
            canvas.draw_line(Point::new(rect.left, y), Point::new(rect.right, y), &paint);
        }
        for line in &panel.lines {
            self.draw_line_series(canvas, area, panel, line);
        }
        for glyph in &panel.boxes {
            self.draw_box(canvas, area, panel, glyph);
        }
        canvas.restore();

        canvas.draw_rect(rect, &stroke(Color::SILVER, 1.0, LineStyle::Solid));
        self.draw_axis_labels(canvas, area, panel, rect);

        if panel.show_legend {
            self.draw_legend(canvas, panel, rect);
        }
    }

    fn draw_grid(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, panel: &Panel) {
        let paint = stroke(GRID, 1.0, LineStyle::Dashed);
        let rect = Self::panel_rect(area, panel);
        for tick in auto_ticks(panel.x_range.min, panel.x_range.max) {
            let x = Self::to_point(area, panel, tick.value, panel.y_range.min).x;
            canvas.draw_line(Point::new(x, rect.top), Point::new(x, rect.bottom), &paint);
        }
    }

    fn draw_axis_labels(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, panel: &Panel, rect: skia_safe::Rect) {
        // Edge ticks fall in the margins
        let y_ticks = match &panel.y_ticks {
            Some(ticks) => ticks.clone(),
            None => {
                let ticks = auto_ticks(panel.y_range.min, panel.y_range.max);
                ticks[1..ticks.len() - 1].to_vec()
            },
        };
        for tick in &y_ticks {
            let y = Self::to_point(area, panel, panel.x_range.min, tick.value).y;
            let (label_width, _) = self.small.measure_str(&tick.label, None);
            self.draw_text(canvas, &self.small, &tick.label, Point::new(rect.left - label_width - 4.0, y + 3.0), Color::SILVER, false);
        }

        if let Some(label) = &panel.y_label {
            canvas.save();
            canvas.translate(Point::new(rect.left - 34.0, rect.center_y()));
            canvas.rotate(-90.0, None);
            self.draw_text(canvas, &self.small, label, Point::new(0.0, 0.0), Color::WHITE, true);
            canvas.restore();
        }

        if let Some(title) = &panel.title {
            self.draw_text(canvas, &self.font, title, Point::new(rect.center_x(), rect.top - 4.0), Color::WHITE, true);
        }

        if let Some(ticks) = &panel.x_ticks {
            for tick in ticks {
                let x = Self::to_point(area, panel, tick.value, panel.y_range.min).x;
                self.draw_text(canvas, &self.small, &tick.label, Point::new(x, rect.bottom + 12.0), Color::SILVER, true);
            }
        }

        if let Some(label) = &panel.x_label {
            for tick in auto_ticks(panel.x_range.min, panel.x_range.max) {
                let x = Self::to_point(area, panel, tick.value, panel.y_range.min).x;
                self.draw_text(canvas, &self.small, &tick.label, Point::new(x, rect.bottom + 12.0), Color::SILVER, true);
            }
            self.draw_text(canvas, &self.small, label, Point::new(rect.center_x(), rect.bottom + 26.0), Color::WHITE, true);
        }
    }

    fn draw_line_series(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, panel: &Panel, line: &LineSeries) {
        let mut path = Path::new();
        let mut started = false;
        for (x, y) in &line.points {
            if !x.is_finite() || !y.is_finite() {
                started = false;
                continue;
            }
            let point = Self::to_point(area, panel, *x, *y);
            if started {
                path.line_to(point);
            } else {
                path.move_to(point);
                started = true;
            }
        }
        canvas.draw_path(&path, &stroke(line.color, 1.5, line.style));
    }

    fn draw_box(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, panel: &Panel, glyph: &BoxGlyph) {
        const HALF_WIDTH: f64 = 0.3;
        let stats = &glyph.stats;
        let top_left = Self::to_point(area, panel, glyph.position - HALF_WIDTH, stats.q3);
        let bottom_right = Self::to_point(area, panel, glyph.position + HALF_WIDTH, stats.q1);
        let rect = skia_safe::Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y);

        let mut body = glyph.color;
        body.a = 0.8;
        canvas.draw_rect(rect, &fill(body));
        let outline = stroke(Color::WHITE, 1.0, LineStyle::Solid);
        canvas.draw_rect(rect, &outline);

        let whisker = |value: f64| Self::to_point(area, panel, glyph.position, value);
        canvas.draw_line(whisker(stats.q3), whisker(stats.whisker_high), &outline);
        canvas.draw_line(whisker(stats.q1), whisker(stats.whisker_low), &outline);

        let median_y = Self::to_point(area, panel, glyph.position, stats.median).y;
        canvas.draw_line(
            Point::new(rect.left, median_y),
            Point::new(rect.right, median_y),
            &stroke(glyph.median_color, 2.0, LineStyle::Solid),
        );
    }

    fn draw_legend(&self, canvas: &mut skia_safe::Canvas, panel: &Panel, rect: skia_safe::Rect) {
        let mut y = rect.top + 14.0;
        for line in &panel.lines {
            if let Some(label) = &line.label {
                let x = rect.right - 70.0;
                canvas.draw_line(Point::new(x, y - 4.0), Point::new(x + 20.0, y - 4.0), &stroke(line.color, 2.0, line.style));
                self.draw_text(canvas, &self.small, label, Point::new(x + 26.0, y), Color::WHITE, false);
                y += 14.0;
            }
        }
    }

    fn draw_overlay(&self, canvas: &mut skia_safe::Canvas, area: &FigureArea, figure: &Figure, overlay: &CursorOverlay) {
        let paint = stroke(Color::CYAN, 1.0, LineStyle::Dashed);
        for crosshair in overlay.crosshairs.iter().filter(|c| c.visible) {
            if let Some(panel) = figure.panels.get(crosshair.panel) {
                let rect = Self::panel_rect(area, panel);
                let x = Self::to_point(area, panel, crosshair.x, panel.y_range.min).x;
                if x >= rect.left && x <= rect.right {
                    canvas.draw_line(Point::new(x, rect.top), Point::new(x, rect.bottom), &paint);
                }
            }
        }

        if !overlay.tooltip.visible {
            return;
        }
        let lines: Vec<&str> = overlay.tooltip.text.lines().collect();
        let line_height = self.mono.size() * 1.3;
        let text_width = lines.iter()
            .map(|line| self.mono.measure_str(line, None).0)
            .fold(0.0, f32::max);

        let anchor = area.point(TOOLTIP_ANCHOR);
        let frame = skia_safe::Rect::from_xywh(
            anchor.x,
            anchor.y,
            text_width + 2.0 * TOOLTIP_PADDING,
            line_height * lines.len() as f32 + 2.0 * TOOLTIP_PADDING,
        );
        let rounded = skia_safe::RRect::new_rect_xy(frame, 4.0, 4.0);
        canvas.draw_rrect(rounded, &fill(TOOLTIP_BACKGROUND));
        canvas.draw_rrect(rounded, &stroke(Color::CYAN, 1.0, LineStyle::Solid));

        for (i, line) in lines.iter().enumerate() {
            let baseline = anchor.y + TOOLTIP_PADDING + line_height * (i as f32 + 0.8);
            self.draw_text(canvas, &self.mono, line, Point::new(anchor.x + TOOLTIP_PADDING, baseline), Color::WHITE, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redraw_requests_coalesce() {
        let mut surface = SkiaSurface::default();
        surface.draw_idle();
        surface.draw_idle();
        assert!(surface.take_redraw());
        assert!(!surface.take_redraw());
    }

    #[test]
    fn subscriptions_are_tracked() {
        let mut surface = SkiaSurface::default();
        let id = surface.connect_motion();
        assert!(surface.is_subscribed());
        surface.disconnect_motion(id);
        assert!(!surface.is_subscribed());
    }

    #[test]
    fn text_fonts_are_cached_per_size() {
        let mut painter = Painter::new();
        painter.cache_font(16.0);
        painter.cache_font(16.0);
        painter.cache_font(12.0);
        assert_eq!(painter.sized.len(), 2);
    }

    #[test]
    fn figure_area_excludes_bars() {
        let area = FigureArea::of_window(800.0, 600.0);
        assert_eq!(area.top, CONTROL_BAR_HEIGHT);
        assert_eq!(area.height, 600.0 - CONTROL_BAR_HEIGHT - STATUS_BAR_HEIGHT);
    }
}
