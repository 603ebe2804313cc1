use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use taleweaver_cli::app::{self, RunOptions};
use taleweaver_cli::Theme;

#[derive(Parser)]
#[command(name = "taleweaver")]
#[command(about = "Taleweaver - a text adventure narrated by a language model")]
#[command(version)]
struct Cli {
    /// Theme for a new adventure (skips the theme prompt)
    #[arg(short, long)]
    theme: Option<String>,

    /// Narrator model
    #[arg(short, long)]
    model: Option<String>,

    /// Model used to compact narration before it is stored
    #[arg(long)]
    compactor_model: Option<String>,

    /// Save file location
    #[arg(long)]
    save_file: Option<PathBuf>,

    /// Start a new adventure even if a saved one exists
    #[arg(long)]
    new: bool,

    /// Store narration uncompacted
    #[arg(long)]
    no_compaction: bool,

    /// Color palette (dark, tokyo-night, dracula)
    #[arg(long, default_value = "dark")]
    palette: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = taleweaver_core::Settings::load();

    if let Some(model) = cli.model {
        settings.narrator.model = model;
    }
    if let Some(model) = cli.compactor_model {
        settings.compactor.model = model;
    }
    if let Some(path) = cli.save_file {
        settings.game.save_path = Some(path);
    }
    if cli.no_compaction {
        settings.compactor.enabled = false;
    }

    let options = RunOptions {
        theme: cli.theme,
        fresh: cli.new,
        palette: Theme::by_name(&cli.palette),
    };

    app::run(&settings, options).await
}
