mod app;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Knowledgebase dump to explore (JSON).
    dump: PathBuf,

    /// Record id to place on the canvas when no session is stored.
    #[arg(long = "seed", value_name = "RID")]
    seeds: Vec<String>,

    /// Name of the stored graph session to restore and update.
    #[arg(long, default_value = "default")]
    session: String,

    /// Directory holding options and sessions. Defaults to the user config dir.
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "kb-graph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::GraphApp::new(
                cc,
                app::LaunchConfig {
                    dump_path: args.dump,
                    seeds: args.seeds,
                    session_id: args.session,
                    store_dir: args.store_dir,
                },
            )))
        }),
    )
}
