use anyhow::{Context, Result};
use clap::Parser;
use framestep::app::{DecodeSummary, decode_samples, stream_samples};
use framestep::audio::wav::load_wav_file;
use framestep::cli::{Cli, Commands, ConfigAction};
use framestep::config::Config;
use framestep::decode::instance::ResultStatus;
use framestep::decode::report::PassReport;
use owo_colors::OwoColorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(version = %framestep::version_string(), "framestep starting");

    match cli.command {
        Commands::Decode {
            input,
            segment,
            reject_short_ms,
            streaming,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if segment {
                config.scheduler.explicit_segmentation = true;
            }
            if let Some(ms) = reject_short_ms {
                config.scheduler.reject_short_ms = ms;
            }

            let samples = load_wav_file(&input, config.audio.sample_rate)?;
            let summary = if streaming {
                stream_samples(&config, &samples)?
            } else {
                decode_samples(&config, &samples)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&input, &summary);
            }
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Path => {
                println!("{}", Config::default_path().display());
            }
        },
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` raises the default `warn` level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "framestep=debug",
        _ => "framestep=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn print_summary(input: &Path, summary: &DecodeSummary) {
    println!(
        "{} {} ({} frames, {} passes)",
        "Decoded".bold(),
        input.display(),
        summary.frames,
        summary.passes.len()
    );
    for (index, report) in summary.passes.iter().enumerate() {
        print_pass(index + 1, report);
    }
    if !summary.utterances.is_empty() {
        println!("{}", "Utterances:".bold());
        for utterance in &summary.utterances {
            match (utterance.start_frame, utterance.end_frame) {
                (Some(start), Some(end)) => println!(
                    "  {:<12} frames {}..={} of {}",
                    utterance.instance, start, end, utterance.frame_count
                ),
                _ => println!(
                    "  {:<12} {}",
                    utterance.instance,
                    "no speech".dimmed()
                ),
            }
        }
    }
}

fn print_pass(number: usize, report: &PassReport) {
    let consumed = report
        .streams
        .first()
        .map_or(0, |stream| stream.consumed_frames);
    println!("Pass {} ended {:?} after {} frames", number, report.end, consumed);
    for instance in &report.instances {
        let status = match instance.status {
            Some(ResultStatus::Ok) => "ok".green().to_string(),
            Some(status) => status.to_string().yellow().to_string(),
            None => "inactive".dimmed().to_string(),
        };
        println!("  {:<12} {}", instance.name, status);
    }
}
