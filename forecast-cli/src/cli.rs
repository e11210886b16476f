use anyhow::Context;
use clap::{Parser, Subcommand};
use forecast_core::{Config, TelegramNotifier, WeatherFetcher, run_once};
use std::path::PathBuf;
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "forecast-digest",
    version,
    about = "Post the last hours of the local forecast to a Telegram channel"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the forecast and send it to the channel.
    Run,

    /// Fetch the forecast and print it without sending.
    Show,

    /// Store the bot token and channel id in the config file.
    Configure,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            // Location metadata and delivery status are always shown.
            0 => "warn,forecast_core=info,forecast_digest=info",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_file_path()?),
        }
    }

    fn load_config(&self, env: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let path = self.config_path()?;
        let mut cfg = Config::load_from(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        cfg.apply_env_from(env);
        Ok(cfg)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.run_with_env(|key| std::env::var(key).ok()).await
    }

    /// Same as `run`, reading credential overrides through `env`.
    async fn run_with_env(self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        match self.command {
            None | Some(Command::Run) => {
                let cfg = self.load_config(&env)?;

                // Credentials are checked before any request goes out.
                let notifier = TelegramNotifier::new(&cfg.telegram)?;
                let fetcher = WeatherFetcher::from_config(&cfg)?;

                let delivery = run_once(&fetcher, &notifier)
                    .await
                    .context("Failed to deliver the forecast digest")?;
                info!(status = delivery.status, "Digest sent");
            }
            Some(Command::Show) => {
                let cfg = self.load_config(&env)?;
                let fetcher = WeatherFetcher::from_config(&cfg)?;

                let report = fetcher.fetch_report().await.context("Failed to build the report")?;
                println!("{report}");
            }
            Some(Command::Configure) => {
                let path = self.config_path()?;
                configure(&path)?;
                println!("Saved Telegram settings to {}", path.display());
            }
        }

        Ok(())
    }
}

/// Interactive prompt for the Telegram credentials.
fn configure(path: &std::path::Path) -> anyhow::Result<()> {
    let mut cfg = Config::load_from(path)?;

    let token = inquire::Password::new("Telegram bot token:")
        .without_confirmation()
        .with_help_message("Issued by @BotFather, e.g. 123456:ABC-DEF...")
        .prompt()
        .context("Bot token prompt was cancelled")?;

    let channel = inquire::Text::new("Channel id:")
        .with_initial_value(cfg.telegram.channel_id.as_deref().unwrap_or_default())
        .with_help_message("@channel_name or numeric chat id")
        .prompt()
        .context("Channel id prompt was cancelled")?;

    if token.trim().is_empty() || channel.trim().is_empty() {
        anyhow::bail!("Both the bot token and the channel id are required");
    }

    cfg.upsert_telegram(token.trim().to_string(), channel.trim().to_string());
    cfg.save_to(path)?;
    Ok(())
}
