use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Align, Align2, Color32, Context, Id, Layout, Vec2, vec2};
use kb_graph::{
    FileStore, GraphController, KeyValueStore, KnowledgeBase, MemoryStore, NotificationLevel,
    RecordCache, RecordSource, Viewport,
};
use tracing::{debug, info, warn};

use super::super::resolve::Resolver;
use super::super::{LaunchConfig, Toast, ViewModel};

const TOAST_SECS: f64 = 5.0;
const MAX_TOASTS: usize = 6;

fn open_store(store_dir: Option<&Path>) -> Box<dyn KeyValueStore> {
    if let Some(dir) = store_dir {
        return Box::new(FileStore::new(dir));
    }

    match FileStore::default_location() {
        Ok(store) => {
            debug!(dir = %store.dir().display(), "using file store");
            Box::new(store)
        }
        Err(error) => {
            warn!(%error, "options and sessions will not outlive this window");
            Box::new(MemoryStore::default())
        }
    }
}

impl ViewModel {
    pub(in crate::app) fn new(
        config: Arc<LaunchConfig>,
        knowledgebase: KnowledgeBase,
        ctx: &Context,
    ) -> Self {
        let knowledgebase = Arc::new(knowledgebase);
        let source: Arc<dyn RecordSource> = knowledgebase.clone();
        let cache = Arc::new(RecordCache::new(source));
        cache.preload(knowledgebase.records().cloned());

        let mut controller = GraphController::new(
            Box::new(knowledgebase.schema().clone()),
            Arc::clone(&cache),
            open_store(config.store_dir.as_deref()),
            config.session_id.clone(),
            Viewport::default(),
        );

        let seeds = config
            .seeds
            .iter()
            .filter_map(|id| {
                let record = knowledgebase.record(id).cloned();
                if record.is_none() {
                    warn!(id = %id, "seed record is not in the dump");
                }
                record
            })
            .collect::<Vec<_>>();
        let outcome = controller.initialize(&seeds);
        info!(?outcome, session_id = %config.session_id, "graph ready");

        let run = Some(controller.start_simulation());

        Self {
            config,
            knowledgebase,
            controller,
            resolver: Resolver::spawn(cache, ctx.clone()),
            run,
            live_physics: true,
            search: String::new(),
            search_cache: None,
            selected: None,
            dragging: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            show_record_json: false,
            toasts: VecDeque::new(),
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, reload_requested: &mut bool) {
        self.absorb_resolutions();
        self.absorb_notifications();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("kb-graph");
                    ui.separator();
                    ui.label(format!("dump: {}", self.config.dump_path.display()));
                    ui.label(format!("records: {}", self.knowledgebase.len()));
                    ui.label(format!("session: {}", self.controller.session_id()));
                    ui.label(format!(
                        "shown: {} nodes, {} links",
                        self.controller.state().nodes().len(),
                        self.controller.state().links().len()
                    ));

                    if ui.button("Reload dump").clicked() {
                        *reload_requested = true;
                    }
                    if ui
                        .button("Clear graph")
                        .on_hover_text("Remove every node and forget the stored session.")
                        .clicked()
                    {
                        self.controller.clear();
                        self.selected = None;
                    }
                    if ui.button("Save session").clicked() {
                        match self.controller.save_session() {
                            Ok(()) => self.push_toast(NotificationLevel::Info, "Session saved"),
                            Err(error) => self.push_toast(
                                NotificationLevel::Error,
                                format!("Could not save the session: {error}"),
                            ),
                        }
                    }

                    if ui
                        .checkbox(&mut self.live_physics, "Live layout")
                        .on_hover_text("Run the force simulation while the graph is shown.")
                        .changed()
                    {
                        self.set_live_physics(self.live_physics);
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(run) = &self.run
                            && run.is_attached()
                        {
                            ui.label(format!(
                                "run {}  α {:.3}",
                                run.generation(),
                                self.controller.simulation().alpha()
                            ));
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .show(ui, |ui| self.draw_controls(ui));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));

        self.draw_expansion_dialog(ctx);
        self.draw_toasts(ctx);
    }

    /// Stops the layout, flushes the session and joins the resolver.
    pub(in crate::app) fn shutdown(&mut self) {
        self.set_live_physics(false);
        if let Err(error) = self.controller.save_session() {
            warn!(%error, "could not save graph session");
        }
        self.resolver.shutdown();
    }

    fn set_live_physics(&mut self, enabled: bool) {
        self.live_physics = enabled;
        if enabled {
            self.run = Some(self.controller.start_simulation());
        } else {
            self.controller.stop_simulation();
            self.run = None;
        }
    }

    pub(in crate::app) fn push_toast(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.toasts.push_back(Toast {
            level,
            message: message.into(),
            shown_at: None,
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    fn absorb_notifications(&mut self) {
        for notification in self.controller.take_notifications() {
            self.push_toast(notification.level, notification.message);
        }
    }

    fn absorb_resolutions(&mut self) {
        for (id, result) in self.resolver.drain() {
            let outcome = self.controller.apply_resolution(&id, result);
            debug!(id = %id, ?outcome, "record resolved");
        }
    }

    fn draw_toasts(&mut self, ctx: &Context) {
        if self.toasts.is_empty() {
            return;
        }

        let now = ctx.input(|input| input.time);
        for toast in &mut self.toasts {
            toast.shown_at.get_or_insert(now);
        }
        self.toasts
            .retain(|toast| toast.shown_at.is_some_and(|shown| now - shown < TOAST_SECS));

        egui::Area::new(Id::new("notifications"))
            .anchor(Align2::RIGHT_BOTTOM, vec2(-12.0, -12.0))
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let color = match toast.level {
                        NotificationLevel::Info => Color32::from_gray(225),
                        NotificationLevel::Warning => Color32::from_rgb(246, 194, 92),
                        NotificationLevel::Error => Color32::from_rgb(241, 110, 94),
                    };
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.colored_label(color, toast.message.as_str());
                    });
                    ui.add_space(4.0);
                }
            });

        ctx.request_repaint_after(Duration::from_millis(250));
    }
}
