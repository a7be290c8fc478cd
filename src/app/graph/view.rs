use std::collections::HashSet;

use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke, Ui, vec2};
use kb_graph::controller::EMPTY_GRAPH_MESSAGE;
use kb_graph::util::truncate_label;

use super::super::render_utils::{
    blend_color, circle_visible, dim_color, draw_arrowhead, draw_background, edge_visible,
    hex_color,
};
use super::super::{Selected, ViewModel};
use super::interaction::screen_radius;

const LABEL_CHARS: usize = 32;
const FALLBACK_COLOR: Color32 = Color32::from_rgb(38, 50, 140);
const LINK_COLOR: Color32 = Color32::from_rgb(120, 128, 140);
const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.sync_viewport(rect);
        let painter = ui.painter_at(rect);

        self.handle_graph_zoom(ui, rect, &response);

        if self.controller.state().is_empty() {
            draw_background(&painter, self.transform(rect));
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                EMPTY_GRAPH_MESSAGE,
                FontId::proportional(18.0),
                Color32::from_gray(200),
            );
            return;
        }

        let pointer = ui.input(|input| input.pointer.hover_pos());
        let transform = self.transform(rect);
        let hovered_node = if let Some(id) = &self.dragging {
            Some(id.clone())
        } else {
            pointer.and_then(|pointer| self.node_at(transform, pointer))
        };
        let hovered_link = match (&hovered_node, pointer) {
            (None, Some(pointer)) => self.link_at(transform, pointer),
            _ => None,
        };

        self.handle_node_drag(&response, transform, hovered_node.as_deref());
        self.handle_graph_pan(&response);

        if self.controller.tick() || self.dragging.is_some() {
            ui.ctx().request_repaint();
        }

        if hovered_node.is_some() || hovered_link.is_some() {
            ui.output_mut(|output| {
                output.cursor_icon = egui::CursorIcon::PointingHand;
            });
        }

        let transform = self.transform(rect);
        draw_background(&painter, transform);

        let selected_node = match &self.selected {
            Some(Selected::Node(id)) => Some(id.as_str()),
            _ => None,
        };
        let selected_link = match &self.selected {
            Some(Selected::Link(id)) => Some(id.as_str()),
            _ => None,
        };
        let focus = hovered_node.as_deref().or(selected_node);
        let highlighting = self.controller.options().link_highlighting && focus.is_some();

        let state = self.controller.state();
        let mut highlighted_nodes = HashSet::new();
        if highlighting && let Some(focus) = focus {
            highlighted_nodes.insert(focus);
            for link in state.incident_links(focus) {
                highlighted_nodes.insert(link.source.as_str());
                highlighted_nodes.insert(link.target.as_str());
            }
        }

        let zoom_sqrt = self.zoom.sqrt();
        let node_radius = screen_radius(self.zoom);
        for link in state.links() {
            let Some((source, target)) = state.link_endpoints(link) else {
                continue;
            };
            let start = transform.to_screen(source.position());
            let end = transform.to_screen(target.position());
            if !edge_visible(rect, start, end, 4.0) {
                continue;
            }

            let incident = focus.is_some_and(|id| link.touches(id));
            let is_selected = selected_link == Some(link.id.as_str());
            let is_hovered = hovered_link.as_deref() == Some(link.id.as_str());
            let base = hex_color(self.controller.link_color(&link.id), LINK_COLOR);
            let color = if is_selected {
                SELECTED_COLOR
            } else if is_hovered {
                blend_color(base, Color32::WHITE, 0.35)
            } else if highlighting && !incident {
                dim_color(base, 0.4)
            } else {
                base
            };
            let width = if is_selected || is_hovered || (highlighting && incident) {
                (2.4 * zoom_sqrt).clamp(1.4, 4.4)
            } else {
                (1.1 * zoom_sqrt).clamp(0.6, 3.0)
            };

            painter.line_segment([start, end], Stroke::new(width, color));
            let span = end - start;
            if span.length() > node_radius * 2.0 {
                draw_arrowhead(
                    &painter,
                    start,
                    end - span.normalized() * node_radius,
                    (5.0 * zoom_sqrt).clamp(3.0, 9.0),
                    color,
                );
            }

            if self.zoom > 0.6
                && let Some(label) = self.controller.link_label(&link.id)
            {
                painter.text(
                    start + (end - start) * 0.5,
                    Align2::CENTER_BOTTOM,
                    truncate_label(&label, LABEL_CHARS),
                    FontId::proportional(10.5),
                    Color32::from_gray(200),
                );
            }
        }

        for node in state.nodes() {
            let position = transform.to_screen(node.position());
            if !circle_visible(rect, position, node_radius + 40.0) {
                continue;
            }

            let is_selected = selected_node == Some(node.id.as_str());
            let is_hovered = hovered_node.as_deref() == Some(node.id.as_str());
            let base = hex_color(self.controller.node_color(&node.id), FALLBACK_COLOR);
            let color = if is_hovered {
                blend_color(base, Color32::WHITE, 0.3)
            } else if highlighting && !highlighted_nodes.contains(node.id.as_str()) {
                dim_color(base, 0.45)
            } else {
                base
            };

            painter.circle_filled(position, node_radius, color);
            let outline = if is_selected {
                Stroke::new(2.4, SELECTED_COLOR)
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(position, node_radius, outline);

            if state.is_expandable(&node.id) {
                painter.circle_stroke(
                    position,
                    node_radius + 3.0,
                    Stroke::new(1.0, Color32::from_rgba_unmultiplied(220, 220, 220, 90)),
                );
            }
            if self.resolver.is_pending(&node.id) {
                painter.circle_stroke(
                    position,
                    node_radius + 6.0,
                    Stroke::new(1.0, Color32::from_rgba_unmultiplied(103, 196, 255, 160)),
                );
            }

            let draw_label = is_selected || is_hovered || self.zoom > 0.55;
            if draw_label {
                painter.text(
                    position + vec2(node_radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    truncate_label(&self.controller.node_label(&node.id), LABEL_CHARS),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }

        if let Some(id) = &hovered_node
            && let Some(node) = state.node(id)
        {
            let panel_text = format!(
                "{}  |  {}  |  {}",
                self.controller.node_label(id),
                node.class().unwrap_or("record"),
                id
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        self.apply_graph_click(&response, hovered_node, hovered_link);
    }
}
