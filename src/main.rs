use clap::Parser;
use rill::Provider;
use rill::core::config::{self, CliOverrides};
use rill::core::queue::UpdateQueue;
use rill::core::state::App;
use rill::core::streaming::StreamingSession;
use rill::core::tools::{ToolRunner, default_registry};
use rill::inference::providers::build_backend;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

#[derive(Parser)]
#[command(name = "rill", version, about = "Streaming chat in the terminal")]
struct Args {
    /// LLM provider to use
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Model name sent to the provider
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Response token limit (1 - 65536)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Target frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Start with tool calling disabled
    #[arg(long)]
    no_tools: bool,

    /// Where the log is written
    #[arg(long, default_value = "rill.log")]
    log_file: PathBuf,

    /// Log at info level instead of debug
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            provider: self.provider,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            fps: self.fps,
            no_tools: self.no_tools,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // File logger; stdout belongs to the TUI
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let level = if args.quiet {
        LevelFilter::Info
    } else {
        LevelFilter::Debug
    };
    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(level, log_config, log_file);
    }

    let file_config = config::load_config()?;
    let resolved = config::resolve(&file_config, &args.overrides());
    log::info!(
        "rill starting up with provider {:?}, model {}",
        resolved.provider,
        resolved.model_name
    );

    let queue = Arc::new(UpdateQueue::new());
    let session = Arc::new(StreamingSession::new(Arc::clone(&queue)));
    let registry = Arc::new(default_registry());
    let tool_count = registry.len();
    let tools = Arc::new(ToolRunner::new(registry, Arc::clone(&session)));
    let backend = build_backend(&resolved, tools, Handle::current())?;

    let mut app = App::new(backend, queue, session, resolved.generation_params());
    app.tool_count = tool_count;
    app.show_sidebar = resolved.show_sidebar;

    rill::tui::run(app, resolved.target_fps)?;
    Ok(())
}
