use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pretender::command::{Controller, Prompt};
use pretender::config::Config;
use pretender::render::Ui;
use pretender::source::{self, Clipboard};
use pretender::state::RuntimeState;
use pretender::typing::{EditorId, EngineSettings, MemoryEditor, TypingEngine};
use pretender::tui;

#[derive(Parser)]
#[command(name = "pretender", about = "Type prepared code one keystroke at a time")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: pretender.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs here; the terminal is in raw mode
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Text to type
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Read the text to type from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Override typing.keystroke_delay_ms
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate code for a task and print it
    Generate {
        /// Programming task
        task: Vec<String>,
    },
}

fn init_logging(path: Option<&PathBuf>) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let mut config = Config::load(cli.config.as_deref());
    if let Some(delay) = cli.delay_ms {
        config.typing.keystroke_delay_ms = delay;
    }

    let editor = Arc::new(MemoryEditor::new(EditorId(1)));
    let (engine, engine_events) =
        TypingEngine::new(Arc::clone(&editor), EngineSettings::from(&config.typing));
    let (ui, ui_events) = Ui::new();
    let clipboard: Arc<dyn Clipboard> = Arc::from(source::default_clipboard());
    let controller = Controller::new(engine, RuntimeState::new(), ui, clipboard, &config);

    if let Some(Command::Generate { task }) = cli.command {
        let task = task.join(" ");
        anyhow::ensure!(!task.trim().is_empty(), "no task given");
        let code = controller.generate(&task).await?;
        println!("{}", code.replace("\r\n", "\n"));
        return Ok(());
    }

    let initial = match (cli.text, cli.file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        (None, None) => None,
    };
    let prompt = initial
        .filter(|text| controller.set_text(text))
        .map(|_| Prompt::Activate);

    tracing::info!("Starting terminal host");
    tui::run(controller, engine_events, ui_events, prompt).await?;
    Ok(())
}
