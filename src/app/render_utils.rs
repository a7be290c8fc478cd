use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};

/// Maps the simulation's world space onto the canvas. The viewport centre of
/// the simulation lands on the canvas centre, then pan and zoom apply.
#[derive(Clone, Copy, Debug)]
pub(super) struct CanvasTransform {
    pub rect: Rect,
    pub origin: Vec2,
    pub pan: Vec2,
    pub zoom: f32,
}

impl CanvasTransform {
    pub(super) fn to_screen(self, world: Vec2) -> Pos2 {
        self.rect.center() + self.pan + (world - self.origin) * self.zoom
    }

    pub(super) fn to_world(self, screen: Pos2) -> Vec2 {
        ((screen - self.rect.center() - self.pan) / self.zoom) + self.origin
    }
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

/// `#rrggbb` or `#rgb`. Anything else falls back to `fallback`.
pub(super) fn hex_color(text: &str, fallback: Color32) -> Color32 {
    let Some(digits) = text.trim().strip_prefix('#') else {
        return fallback;
    };
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };

    match digits.len() {
        6 => match (channel(0..2), channel(2..4), channel(4..6)) {
            (Some(r), Some(g), Some(b)) => Color32::from_rgb(r, g, b),
            _ => fallback,
        },
        3 => match (channel(0..1), channel(1..2), channel(2..3)) {
            (Some(r), Some(g), Some(b)) => Color32::from_rgb(r * 17, g * 17, b * 17),
            _ => fallback,
        },
        _ => fallback,
    }
}

pub(super) fn draw_background(painter: &Painter, transform: CanvasTransform) {
    let rect = transform.rect;
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * transform.zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + transform.pan;

    let mut x = origin.x.rem_euclid(step);
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        x += step;
    }

    let mut y = origin.y.rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70)),
        );
        y += step;
    }
}

/// Small arrowhead at `tip`, pointing along `start -> tip`.
pub(super) fn draw_arrowhead(painter: &Painter, start: Pos2, tip: Pos2, size: f32, color: Color32) {
    let direction = tip - start;
    let length = direction.length();
    if length <= f32::EPSILON {
        return;
    }
    let unit = direction / length;
    let normal = vec2(-unit.y, unit.x);
    let base = tip - unit * size;
    painter.add(eframe::egui::Shape::convex_polygon(
        vec![tip, base + normal * (size * 0.5), base - normal * (size * 0.5)],
        color,
        Stroke::NONE,
    ));
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

/// Distance from `point` to the segment `start..end`.
pub(super) fn segment_distance(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let segment = end - start;
    let length_sq = segment.length_sq();
    if length_sq <= f32::EPSILON {
        return point.distance(start);
    }
    let t = ((point - start).dot(segment) / length_sq).clamp(0.0, 1.0);
    point.distance(start + segment * t)
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    #[test]
    fn hex_colors_parse_long_and_short_forms() {
        let fallback = Color32::BLACK;
        assert_eq!(hex_color("#26328C", fallback), Color32::from_rgb(0x26, 0x32, 0x8C));
        assert_eq!(hex_color("#fff", fallback), Color32::WHITE);
        assert_eq!(hex_color("teal", fallback), fallback);
        assert_eq!(hex_color("#12345", fallback), fallback);
    }

    #[test]
    fn canvas_transform_round_trips_through_pan_and_zoom() {
        let transform = CanvasTransform {
            rect: Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
            origin: vec2(400.0, 300.0),
            pan: vec2(25.0, -10.0),
            zoom: 1.5,
        };
        assert_eq!(transform.to_screen(vec2(400.0, 300.0)), pos2(425.0, 290.0));
        let world = transform.to_world(pos2(100.0, 50.0));
        assert!((transform.to_screen(world) - pos2(100.0, 50.0)).length() < 1e-3);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let start = pos2(0.0, 0.0);
        let end = pos2(10.0, 0.0);
        assert!((segment_distance(pos2(5.0, 3.0), start, end) - 3.0).abs() < 1e-5);
        assert!((segment_distance(pos2(-4.0, 3.0), start, end) - 5.0).abs() < 1e-5);
    }
}
