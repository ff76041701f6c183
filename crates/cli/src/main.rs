mod config_commands;
mod model_commands;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    courier_agents::{GeminiModelInfo, GeminiProvider},
    courier_chat::{DispatchSettings, Dispatcher},
    courier_config::{CourierConfig, GeminiConfig, Severity},
    courier_sessions::ConversationStore,
    courier_telegram::TelegramOutbound,
    tracing::{debug, error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", version, about = "Courier: chat with Gemini from Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./courier.toml, then the user config directory).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (default when no subcommand is provided).
    Run,
    /// List Gemini models that can generate content.
    Models,
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config_path = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Run) => run(config_path).await,
        Some(Commands::Models) => model_commands::list_models(config_path).await,
        Some(Commands::Check { verbose }) => config_commands::check(config_path, verbose),
    }
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    let result = courier_config::validate(config_path);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Info => debug!(path = %d.path, category = d.category, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration: {} error(s); run `courier check` for details",
            result.count(Severity::Error)
        );
    }

    let config = load_config(config_path)?;

    let gemini = Arc::new(gemini_provider(&config.gemini)?);
    match gemini.list_models().await {
        Ok(models) => {
            let names: Vec<&str> = models
                .iter()
                .filter(|m| m.supports_generation())
                .map(GeminiModelInfo::model_id)
                .collect();
            debug!(count = names.len(), models = ?names, "available gemini models");
        },
        Err(e) => warn!(error = %e, "failed to list gemini models"),
    }

    let bot = courier_telegram::build_bot(&config.telegram)?;
    let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
    let dispatcher = Dispatcher::new(
        Arc::new(ConversationStore::default()),
        Arc::clone(&gemini) as _,
        Arc::clone(&outbound) as _,
        outbound as _,
    )
    .with_settings(dispatch_settings(&config));

    let polling =
        courier_telegram::start_polling(bot, &config.telegram, Arc::new(dispatcher)).await?;
    info!(
        model = gemini.model(),
        vision_model = gemini.vision_model(),
        "courier running, press Ctrl-C to stop"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutting down");
        },
        () = polling.cancel.cancelled() => warn!("telegram polling stopped"),
    }
    polling.shutdown().await;
    Ok(())
}

/// Load the explicit config file, or discover one, then apply env overrides.
fn load_config(path: Option<&Path>) -> anyhow::Result<CourierConfig> {
    match path {
        Some(path) => {
            let mut config = courier_config::load_config(path)?;
            courier_config::apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(courier_config::discover_and_load()),
    }
}

fn gemini_provider(config: &GeminiConfig) -> anyhow::Result<GeminiProvider> {
    let api_key = config
        .api_key
        .clone()
        .context("gemini.api_key is not configured (set GEMINI_API_KEY)")?;
    let provider = GeminiProvider::new(api_key, config.model.clone(), config.vision_model.clone())
        .with_base_url(config.base_url.as_str())
        .with_max_output_tokens(config.max_output_tokens)
        .with_timeout(Duration::from_secs(config.request_timeout_secs))?;
    Ok(provider)
}

fn dispatch_settings(config: &CourierConfig) -> DispatchSettings {
    let mut settings = DispatchSettings {
        max_message_len: config.chat.max_message_len,
        ..Default::default()
    };
    if let Some(prompt) = &config.chat.image_prompt {
        settings.image_prompt = prompt.clone();
    }
    settings
}
