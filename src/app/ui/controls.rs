use eframe::egui::{self, Align, Layout, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use kb_graph::kb::{record_class, record_id};
use kb_graph::{GraphOptions, ObjectKind};

use super::super::render_utils::hex_color;
use super::super::{SearchCache, SearchHit, Selected, ViewModel};

const SEARCH_RESULT_LIMIT: usize = 40;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Combo box over the enumerable properties of one kind. An empty
/// selection means "none".
fn property_picker(ui: &mut Ui, label: &str, value: &mut String, choices: &[&str]) -> bool {
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label(label);
        let selected_text = if value.is_empty() {
            "(none)"
        } else {
            value.as_str()
        };
        egui::ComboBox::from_id_salt(label)
            .selected_text(selected_text)
            .show_ui(ui, |ui| {
                changed |= ui.selectable_value(value, String::new(), "(none)").changed();
                for choice in choices {
                    changed |= ui
                        .selectable_value(value, (*choice).to_owned(), *choice)
                        .changed();
                }
            });
    });
    changed
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_record_search(ui);

        ui.separator();

        let mut options = self.controller.options().clone();
        egui::CollapsingHeader::new("Layout")
            .default_open(true)
            .show(ui, |ui| draw_layout_options(ui, &mut options));

        egui::CollapsingHeader::new("Labels and colours")
            .default_open(true)
            .show(ui, |ui| self.draw_appearance_options(ui, &mut options));

        if options != *self.controller.options() {
            self.controller.update_options(move |current| *current = options);
        }

        ui.separator();
        self.draw_legend(ui, ObjectKind::Nodes);
        self.draw_legend(ui, ObjectKind::Links);
    }

    fn draw_record_search(&mut self, ui: &mut Ui) {
        ui.label("Add a record")
            .on_hover_text("Fuzzy search over every record in the dump.");
        ui.text_edit_singleline(&mut self.search)
            .on_hover_text("Click a result to place it on the canvas.");

        let hits = self.search_hits();
        if hits.is_empty() {
            if !self.search.trim().is_empty() {
                ui.weak("No matching records.");
            }
            return;
        }

        let mut chosen = None;
        egui::ScrollArea::vertical()
            .id_salt("record_search_scroll")
            .max_height(200.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for hit in &hits {
                    let shown = self.controller.state().has_node(&hit.id);
                    let row = ui
                        .horizontal(|ui| {
                            let clicked = ui
                                .selectable_label(shown, hit.label.as_str())
                                .on_hover_text(hit.id.as_str())
                                .clicked();
                            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                                ui.weak(hit.class.as_str());
                            });
                            clicked
                        })
                        .inner;
                    if row {
                        chosen = Some(hit.id.clone());
                    }
                }
            });

        if let Some(id) = chosen {
            if !self.controller.state().has_node(&id)
                && let Some(record) = self.knowledgebase.record(&id).cloned()
            {
                self.controller.add_seed(record);
            }
            self.set_selected(Some(Selected::Node(id)));
        }
    }

    fn search_hits(&mut self) -> Vec<SearchHit> {
        let query = self.search.trim();
        if query.is_empty() {
            return Vec::new();
        }
        if let Some(cache) = &self.search_cache
            && cache.query == query
        {
            return cache.hits.clone();
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = self
            .knowledgebase
            .records()
            .filter_map(|record| {
                let id = record_id(record)?;
                let label = self.controller.preview(record);
                let score = fuzzy_match_score(&matcher, &label, query)
                    .or_else(|| fuzzy_match_score(&matcher, id, query))?;
                Some((
                    score,
                    SearchHit {
                        id: id.to_owned(),
                        label,
                        class: record_class(record).unwrap_or_default().to_owned(),
                    },
                ))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.label.cmp(&b.1.label)));
        scored.truncate(SEARCH_RESULT_LIMIT);

        let hits = scored.into_iter().map(|(_, hit)| hit).collect::<Vec<_>>();
        self.search_cache = Some(SearchCache {
            query: query.to_owned(),
            hits: hits.clone(),
        });
        hits
    }

    fn draw_appearance_options(&self, ui: &mut Ui, options: &mut GraphOptions) {
        let props = self.controller.props();
        let node_props = props.enumerable(ObjectKind::Nodes);
        let link_props = props.enumerable(ObjectKind::Links);

        ui.label(RichText::new("Nodes").strong());
        property_picker(ui, "Label by", &mut options.node_label_prop, &node_props);
        property_picker(ui, "Colour by", &mut options.nodes_color, &node_props);
        ui.checkbox(&mut options.nodes_legend, "Show node legend");

        ui.add_space(6.0);
        ui.label(RichText::new("Links").strong());
        property_picker(ui, "Link label by", &mut options.link_label_prop, &link_props);
        property_picker(ui, "Link colour by", &mut options.links_color, &link_props);
        ui.checkbox(&mut options.links_legend, "Show link legend");

        ui.add_space(6.0);
        ui.checkbox(&mut options.link_highlighting, "Highlight links of the focused node")
            .on_hover_text("Dim everything not attached to the hovered or selected node.");
    }

    fn draw_legend(&self, ui: &mut Ui, kind: ObjectKind) {
        let entries = self.controller.legend(kind);
        if entries.is_empty() {
            return;
        }

        let property = self.controller.options().color_prop(kind);
        ui.label(RichText::new(format!("{} by {property}", kind.label())).strong());
        for (value, color) in entries {
            ui.horizontal(|ui| {
                let (rect, _) =
                    ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
                ui.painter()
                    .rect_filled(rect, 2.0, hex_color(&color, egui::Color32::GRAY));
                ui.label(value);
            });
        }
        ui.add_space(6.0);
    }
}

fn draw_layout_options(ui: &mut Ui, options: &mut GraphOptions) {
    ui.checkbox(&mut options.is_tree_layout, "Tree layout")
        .on_hover_text("Stack SubClassOf hierarchies in horizontal bands.");

    ui.add(
        egui::Slider::new(&mut options.link_strength, 0.0..=1.0)
            .text("Link strength")
            .clamping(egui::SliderClamping::Always),
    )
    .on_hover_text("How strongly links pull their endpoints together.");

    ui.add(
        egui::Slider::new(&mut options.charge_strength, 0.0..=1000.0)
            .text("Repulsion")
            .clamping(egui::SliderClamping::Always),
    )
    .on_hover_text("How strongly nodes push each other apart.");

    ui.add(
        egui::Slider::new(&mut options.charge_max, 10.0..=2000.0)
            .text("Repulsion range")
            .clamping(egui::SliderClamping::Always),
    )
    .on_hover_text("Distance beyond which nodes stop repelling.");

    ui.checkbox(&mut options.auto_collision_radius, "Size collisions to labels");
    ui.add_enabled(
        !options.auto_collision_radius,
        egui::Slider::new(&mut options.collision_radius, 0.0..=60.0)
            .text("Collision radius")
            .clamping(egui::SliderClamping::Always),
    );

    ui.add(
        egui::Slider::new(&mut options.fan_out_threshold, 1..=100)
            .text("Ask before expanding more than"),
    )
    .on_hover_text("Expansions with more hidden relations open a selection dialog.");
}
