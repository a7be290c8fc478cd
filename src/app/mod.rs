use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context, Vec2};
use kb_graph::kb::load_knowledgebase;
use kb_graph::{GraphController, KnowledgeBase, NotificationLevel, RunHandle};
use tracing::error;

mod graph;
mod render_utils;
mod resolve;
mod ui;

use self::resolve::Resolver;

/// Everything the command line decides before the window opens.
pub struct LaunchConfig {
    pub dump_path: PathBuf,
    pub seeds: Vec<String>,
    pub session_id: String,
    pub store_dir: Option<PathBuf>,
}

pub struct GraphApp {
    config: Arc<LaunchConfig>,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<KnowledgeBase, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    config: Arc<LaunchConfig>,
    knowledgebase: Arc<KnowledgeBase>,
    controller: GraphController,
    resolver: Resolver,
    run: Option<RunHandle>,
    live_physics: bool,
    search: String,
    search_cache: Option<SearchCache>,
    selected: Option<Selected>,
    dragging: Option<String>,
    pan: Vec2,
    zoom: f32,
    show_record_json: bool,
    toasts: VecDeque<Toast>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Selected {
    Node(String),
    Link(String),
}

struct SearchCache {
    query: String,
    hits: Vec<SearchHit>,
}

#[derive(Clone)]
struct SearchHit {
    id: String,
    label: String,
    class: String,
}

struct Toast {
    level: NotificationLevel,
    message: String,
    /// Frame time of the first paint; the toast expires relative to it.
    shown_at: Option<f64>,
}

impl GraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: LaunchConfig) -> Self {
        let config = Arc::new(config);
        let state = Self::start_load(&config);
        Self { config, state }
    }

    fn spawn_load(dump_path: PathBuf) -> Receiver<Result<KnowledgeBase, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_knowledgebase(&dump_path)
                .with_context(|| format!("loading {}", dump_path.display()))
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(config: &LaunchConfig) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(config.dump_path.clone()),
        }
    }
}

impl eframe::App for GraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(knowledgebase) => AppState::Ready(Box::new(ViewModel::new(
                            Arc::clone(&self.config),
                            knowledgebase,
                            ctx,
                        ))),
                        Err(message) => {
                            error!(%message, "knowledgebase load failed");
                            AppState::Error(message)
                        }
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading knowledgebase...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the knowledgebase");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.config));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                model.show(ctx, &mut reload_requested);
                if reload_requested {
                    model.shutdown();
                    transition = Some(Self::start_load(&self.config));
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
