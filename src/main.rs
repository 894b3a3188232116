use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use talkbox::cli::{Cli, Commands, ConfigAction};
use talkbox::config::Config;
use talkbox::daemon::{run_server, speak_once};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("talkbox={}", cli.log_level())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_server(config).await?;
        }
        Some(Commands::Serve { bind }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            run_server(config).await?;
        }
        Some(Commands::Speak { text }) => {
            let config = load_config(cli.config.as_deref())?;
            let text = text.join(" ");
            tokio::task::spawn_blocking(move || speak_once(&config, &text))
                .await
                .context("speak task failed")??;
        }
        Some(Commands::Say { text, server }) => {
            talkbox::intake::client::say(&server, &text.join(" "))
                .await
                .with_context(|| format!("failed to send text to {}", server))?;
            if !cli.quiet {
                eprintln!("{} sent to {}", "✓".green(), server);
            }
        }
        Some(Commands::Devices) => {
            list_output_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "talkbox",
                &mut std::io::stdout(),
            );
        }
    }
    Ok(())
}

/// Load configuration with environment overrides.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// List output devices (cpal builds) and the external players found.
fn list_output_devices() -> Result<()> {
    #[cfg(feature = "cpal-audio")]
    {
        talkbox::audio::suppress_audio_warnings();
        let devices = talkbox::audio::list_output_devices()?;
        if devices.is_empty() {
            println!("No audio output devices found");
        } else {
            println!("Audio output devices:");
            for (idx, device) in devices.iter().enumerate() {
                println!("  [{}] {}", idx, device);
            }
        }
    }

    println!("Players for the command backend:");
    for player in talkbox::defaults::PLAYERS {
        match talkbox::audio::command::find_player(Some(*player)) {
            Some(path) => println!("  {} {} ({})", "✓".green(), player, path.display()),
            None => println!("  {} {}", "✗".red(), player.dimmed()),
        }
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let marker = if config_path.exists() {
                "".to_string()
            } else {
                format!(" {}", "(not found, using defaults)".dimmed())
            };
            println!("{}{}", config_path.display(), marker);
        }
    }
    Ok(())
}
