use eframe::egui::{self, Pos2, Rect, Ui, Vec2};
use kb_graph::{ExpandRequest, NotificationLevel, Viewport};
use tracing::debug;

use super::super::render_utils::{CanvasTransform, segment_distance};
use super::super::{Selected, ViewModel};

/// World-space node radius before zoom.
pub(super) const NODE_RADIUS: f32 = 7.0;
const LINK_HIT_DISTANCE: f32 = 5.0;

pub(super) fn screen_radius(zoom: f32) -> f32 {
    (NODE_RADIUS * zoom).clamp(3.0, 30.0)
}

impl ViewModel {
    pub(super) fn transform(&self, rect: Rect) -> CanvasTransform {
        CanvasTransform {
            rect,
            origin: self.controller.simulation().viewport().center(),
            pan: self.pan,
            zoom: self.zoom,
        }
    }

    /// Follows the canvas size. A real resize restarts the layout, so the
    /// view goes back to the unpanned, unzoomed frame.
    pub(super) fn sync_viewport(&mut self, rect: Rect) {
        let viewport = Viewport::new(rect.width(), rect.height());
        if self.controller.resize(viewport) {
            self.pan = Vec2::ZERO;
            self.zoom = 1.0;
        }
    }

    pub(super) fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let before = self.transform(rect).to_world(pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(0.1, 6.0);

        let after = self.transform(rect).to_screen(before);
        self.pan += pointer - after;
    }

    pub(super) fn handle_graph_pan(&mut self, response: &egui::Response) {
        let primary_on_canvas =
            self.dragging.is_none() && response.dragged_by(egui::PointerButton::Primary);
        if primary_on_canvas
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Topmost node under `pointer`.
    pub(super) fn node_at(&self, transform: CanvasTransform, pointer: Pos2) -> Option<String> {
        let radius = screen_radius(transform.zoom);
        self.controller
            .state()
            .nodes()
            .iter()
            .rev()
            .map(|node| (node, transform.to_screen(node.position()).distance(pointer)))
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node.id.clone())
    }

    pub(super) fn link_at(&self, transform: CanvasTransform, pointer: Pos2) -> Option<String> {
        let state = self.controller.state();
        state
            .links()
            .iter()
            .filter_map(|link| {
                let (source, target) = state.link_endpoints(link)?;
                let distance = segment_distance(
                    pointer,
                    transform.to_screen(source.position()),
                    transform.to_screen(target.position()),
                );
                (distance <= LINK_HIT_DISTANCE).then_some((link, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(link, _)| link.id.clone())
    }

    pub(super) fn handle_node_drag(
        &mut self,
        response: &egui::Response,
        transform: CanvasTransform,
        hovered_node: Option<&str>,
    ) {
        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(id) = hovered_node
            && self.controller.drag_start(id)
        {
            self.dragging = Some(id.to_owned());
        }

        if let Some(id) = &self.dragging
            && response.dragged_by(egui::PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.controller.drag_to(id, transform.to_world(pointer));
        }

        if response.drag_stopped()
            && let Some(id) = self.dragging.take()
        {
            self.controller.drag_end(&id);
        }
    }

    pub(super) fn apply_graph_click(
        &mut self,
        response: &egui::Response,
        hovered_node: Option<String>,
        hovered_link: Option<String>,
    ) {
        if response.double_clicked_by(egui::PointerButton::Primary)
            && let Some(id) = &hovered_node
        {
            self.request_expand(id);
            return;
        }

        if !response.clicked_by(egui::PointerButton::Primary) {
            return;
        }

        let selected = match (hovered_node, hovered_link) {
            (Some(id), _) => Some(Selected::Node(id)),
            (None, Some(id)) => Some(Selected::Link(id)),
            (None, None) => None,
        };
        self.set_selected(selected);
    }

    pub(in crate::app) fn set_selected(&mut self, selected: Option<Selected>) {
        if self.selected == selected {
            return;
        }
        if let Some(Selected::Node(id)) = &selected {
            self.resolver.request(id);
        }
        self.selected = selected;
    }

    pub(in crate::app) fn request_expand(&mut self, node_id: &str) {
        match self.controller.request_expand(node_id) {
            ExpandRequest::NotExpandable => {
                self.push_toast(NotificationLevel::Info, "Nothing left to expand here");
            }
            ExpandRequest::Expanded(summary) => {
                debug!(
                    node_id = %summary.node_id,
                    nodes = summary.nodes_added,
                    links = summary.links_added,
                    "expanded from canvas"
                );
            }
            ExpandRequest::NeedsSelection { candidates } => {
                debug!(node_id, candidates, "opening expansion dialog");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_radius_stays_clickable_at_any_zoom() {
        assert_eq!(screen_radius(0.01), 3.0);
        assert_eq!(screen_radius(1.0), NODE_RADIUS);
        assert_eq!(screen_radius(100.0), 30.0);
    }
}
