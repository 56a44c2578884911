mod event;
mod tui;
mod widgets;

use std::sync::Arc;

use cogito_core::config::AgentCfg;
use cogito_core::runtime::ShutdownGuard;
use cogito_llm::provider::LlmProvider;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config errors surface before the terminal switches to raw mode.
    let cfg = Arc::new(AgentCfg::from_env()?);

    // Restore the terminal if anything panics while in raw mode.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen);
        default_hook(info);
    }));

    // Raw mode owns the terminal, so logs only go to a file and only on request.
    if std::env::var("RUST_LOG").is_ok() {
        let path = std::env::temp_dir().join("cogito.log");
        let file = std::fs::File::create(&path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
        tracing::info!(path = %path.display(), "logging to file");
    }

    let provider = cfg.http_provider();
    tracing::info!(name = provider.name(), model = %cfg.model, "provider initialized");
    let provider: Arc<dyn LlmProvider> = Arc::new(provider);

    let shutdown = ShutdownGuard::new();
    shutdown.spawn_signal_listener();

    tui::run_app(cfg, provider, shutdown.token()).await
}
