use eframe::egui::{self, Context, RichText};
use kb_graph::graph::ExpansionCandidate;
use tracing::debug;

use super::super::ViewModel;

impl ViewModel {
    /// Window for picking which relations of a heavily connected node to
    /// reveal. Shown while the controller holds a staged selection.
    pub(in crate::app) fn draw_expansion_dialog(&mut self, ctx: &Context) {
        let Some(selection) = self.controller.selection() else {
            return;
        };
        let node_label = self.controller.node_label(selection.node_id());

        let mut open = true;
        let mut commit = false;
        let mut cancel = false;

        egui::Window::new("Expand relations")
            .collapsible(false)
            .resizable(true)
            .default_width(420.0)
            .open(&mut open)
            .show(ctx, |ui| {
                let Some(selection) = self.controller.selection_mut() else {
                    return;
                };

                ui.label(format!(
                    "{node_label} has {} hidden relations. Choose which to reveal.",
                    selection.candidates().len()
                ));
                ui.horizontal(|ui| {
                    if ui.button("Include all").clicked() {
                        selection.include_all();
                    }
                    if ui.button("Exclude all").clicked() {
                        selection.exclude_all();
                    }
                });

                ui.separator();
                ui.label(RichText::new("By relation").strong());
                let classes = selection
                    .classes()
                    .into_iter()
                    .map(str::to_owned)
                    .collect::<Vec<_>>();
                ui.horizontal_wrapped(|ui| {
                    for class in &classes {
                        let mut included = selection.is_class_included(class);
                        if ui.checkbox(&mut included, class.as_str()).changed() {
                            selection.toggle_class(class);
                        }
                    }
                });

                ui.separator();
                let candidates: Vec<ExpansionCandidate> = selection.candidates().to_vec();
                egui::ScrollArea::vertical()
                    .id_salt("expansion_candidates_scroll")
                    .max_height(320.0)
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        for candidate in &candidates {
                            let mut included = selection.is_included(&candidate.id);
                            if ui
                                .checkbox(&mut included, candidate.label.as_str())
                                .on_hover_text(candidate.id.as_str())
                                .changed()
                            {
                                selection.toggle(&candidate.id);
                            }
                        }
                    });

                ui.separator();
                ui.horizontal(|ui| {
                    let included = selection.included_count();
                    if ui
                        .add_enabled(included > 0, egui::Button::new(format!("Expand ({included})")))
                        .clicked()
                    {
                        commit = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                });
            });

        if commit {
            if let Some(summary) = self.controller.commit_selection() {
                debug!(
                    node_id = %summary.node_id,
                    nodes = summary.nodes_added,
                    links = summary.links_added,
                    "expanded from selection"
                );
            }
        } else if cancel || !open {
            self.controller.cancel_selection();
        }
    }
}
