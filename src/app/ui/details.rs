use eframe::egui::{self, RichText, Ui};
use kb_graph::HideOutcome;
use kb_graph::kb::Record;
use tracing::warn;

use super::super::{Selected, ViewModel};

enum DetailAction {
    Expand(String),
    HideNode(String),
    HideLink(String),
    Select(Selected),
}

fn draw_record_json(ui: &mut Ui, record: &Record) {
    let text = match serde_json::to_string_pretty(record) {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, "could not render record");
            return;
        }
    };
    egui::ScrollArea::vertical()
        .id_salt("record_json_scroll")
        .max_height(360.0)
        .auto_shrink([false, true])
        .show(ui, |ui| {
            ui.label(RichText::new(text).monospace().small());
        });
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        let action = match self.selected.clone() {
            None => {
                ui.label("Select a node or link on the canvas.");
                None
            }
            Some(Selected::Node(id)) => self.draw_node_details(ui, &id),
            Some(Selected::Link(id)) => self.draw_link_details(ui, &id),
        };

        match action {
            Some(DetailAction::Expand(id)) => self.request_expand(&id),
            Some(DetailAction::HideNode(id)) => {
                if let HideOutcome::Hidden { .. } = self.controller.hide_node(&id) {
                    self.selected = None;
                }
            }
            Some(DetailAction::HideLink(id)) => {
                if self.controller.hide_link(&id) {
                    self.selected = None;
                }
            }
            Some(DetailAction::Select(selected)) => self.set_selected(Some(selected)),
            None => {}
        }
    }

    fn draw_node_details(&mut self, ui: &mut Ui, id: &str) -> Option<DetailAction> {
        let state = self.controller.state();
        let Some(node) = state.node(id) else {
            ui.label("The selected node is no longer shown.");
            return None;
        };

        ui.label(RichText::new(self.controller.node_label(id)).strong());
        ui.small(id);
        ui.label(format!("Class: {}", node.class().unwrap_or("unknown")));
        let hidden = self.controller.hidden_edge_count(id);
        if hidden > 0 {
            ui.weak(format!("{hidden} hidden edges"));
        }
        if self.resolver.is_pending(id) {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading full record...");
            });
        }

        let mut action = None;
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            let expandable = state.is_expandable(id);
            if ui
                .add_enabled(expandable, egui::Button::new("Expand"))
                .on_hover_text("Reveal neighbours that are not shown yet.")
                .clicked()
            {
                action = Some(DetailAction::Expand(id.to_owned()));
            }
            if ui.button("Hide").clicked() {
                action = Some(DetailAction::HideNode(id.to_owned()));
            }
        });

        ui.separator();
        ui.label(RichText::new("Shown links").strong());
        let mut any = false;
        for link in state.incident_links(id) {
            any = true;
            let (arrow, other) = if link.source == id {
                ("->", link.target.as_str())
            } else {
                ("<-", link.source.as_str())
            };
            let text = format!(
                "{} {arrow} {}",
                link.class().unwrap_or("link"),
                self.controller.node_label(other)
            );
            if ui.link(text).on_hover_text(link.id.as_str()).clicked() {
                action = Some(DetailAction::Select(Selected::Link(link.id.clone())));
            }
        }
        if !any {
            ui.weak("No links to shown nodes.");
        }

        ui.separator();
        ui.checkbox(&mut self.show_record_json, "Show record");
        if self.show_record_json {
            draw_record_json(ui, &node.data);
        }

        action
    }

    fn draw_link_details(&mut self, ui: &mut Ui, id: &str) -> Option<DetailAction> {
        let state = self.controller.state();
        let Some(link) = state.link(id) else {
            ui.label("The selected link is no longer shown.");
            return None;
        };

        ui.label(RichText::new(link.class().unwrap_or("link")).strong());
        ui.small(id);
        if let Some(label) = self.controller.link_label(id) {
            ui.label(label);
        }

        let mut action = None;
        ui.add_space(6.0);
        for (caption, endpoint) in [("From", &link.source), ("To", &link.target)] {
            ui.horizontal(|ui| {
                ui.label(caption);
                if ui
                    .link(self.controller.node_label(endpoint))
                    .on_hover_text(endpoint.as_str())
                    .clicked()
                {
                    action = Some(DetailAction::Select(Selected::Node(endpoint.clone())));
                }
            });
        }

        ui.add_space(6.0);
        if ui.button("Hide link").clicked() {
            action = Some(DetailAction::HideLink(id.to_owned()));
        }

        ui.separator();
        ui.checkbox(&mut self.show_record_json, "Show record");
        if self.show_record_json {
            draw_record_json(ui, &link.data);
        }

        action
    }
}
