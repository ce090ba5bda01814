// SYNOID Forge Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use synoid_forge::config::ForgeConfig;
use synoid_forge::generator::MediaGenerator;
use synoid_forge::health;
use synoid_forge::server;
use synoid_forge::session::Artifact;
use synoid_forge::state::ForgeState;
use synoid_forge::transcode::Transcoder;
use synoid_forge::translation::{Translate, Translator};

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "synoid-forge")]
#[command(about = "SYNOID Forge: text to image and video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Media Generator web UI
    Serve {
        /// Port to run the server on (overrides FORGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Load both pipelines before accepting requests
        #[arg(long)]
        preload: bool,
    },

    /// Generate a single image
    Image {
        /// Prompt, in any language
        #[arg(short, long)]
        prompt: String,

        /// Output PNG path
        #[arg(short, long, default_value = "generated_image.png")]
        output: PathBuf,

        /// Send the prompt to the model as typed
        #[arg(long)]
        no_translate: bool,
    },

    /// Generate a short video clip
    Video {
        /// Prompt, in any language
        #[arg(short, long)]
        prompt: String,

        /// Length in seconds
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        length: u32,

        /// Output MP4 path
        #[arg(short, long, default_value = "generated_video.mp4")]
        output: PathBuf,

        /// Send the prompt to the model as typed
        #[arg(long)]
        no_translate: bool,
    },

    /// Translate text with the configured service
    Translate {
        #[arg(short, long)]
        text: String,

        /// Destination language (overrides FORGE_TARGET_LANG)
        #[arg(short, long)]
        dest: Option<String>,
    },

    /// Convert a video to browser-playable H.264
    Convert {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check external dependencies
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    // Keep model download and HTTP internals quiet unless asked for.
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,hyper=warn,reqwest=warn,tokenizers=warn");
    }

    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("🚨 [FORGE PANIC] at {}: {}", location, message);
    }));

    let args = Cli::parse();
    let config = ForgeConfig::from_env()?;

    info!("--- SYNOID FORGE v{} ---", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Serve { port, preload } => {
            let port = port.unwrap_or(config.port);
            let config = Arc::new(config);

            let report = health::check_dependencies(&config).await;
            let missing = report.missing();
            if !missing.is_empty() {
                tracing::warn!("⚠️ Missing dependencies: {:?}. Some features may not work.", missing);
            }

            let state = Arc::new(ForgeState::new(config));
            // Sessions do not survive a restart, neither do their files.
            if let Err(e) = state.generator.purge_outputs().await {
                tracing::warn!("⚠️ Could not clean output directory: {:#}", e);
            }
            if preload {
                state.generator.registry().preload().await?;
            }

            info!("🌐 Starting Media Generator on port {}...", port);
            server::start_server(port, state).await?;
        }
        Commands::Image {
            prompt,
            output,
            no_translate,
        } => {
            let generator = cli_generator(config);
            let prompt = resolve_prompt(&generator, &prompt, no_translate).await?;

            if let Artifact::Image { png, width, height } = generator.render_image(&prompt).await? {
                tokio::fs::write(&output, png.as_slice()).await?;
                println!("🖼️ Image saved: {:?} ({}x{})", output, width, height);
            }
        }
        Commands::Video {
            prompt,
            length,
            output,
            no_translate,
        } => {
            let work_dir = config.output_dir.join("cli");
            let generator = cli_generator(config);
            let prompt = resolve_prompt(&generator, &prompt, no_translate).await?;

            match generator.render_video(&prompt, length, &work_dir).await {
                Ok(Artifact::Video { playable_path, .. }) => {
                    tokio::fs::copy(&playable_path, &output).await?;
                    let size_mb = tokio::fs::metadata(&output).await?.len() as f64 / 1_048_576.0;
                    println!("🎬 Video saved: {:?} ({:.2} MB)", output, size_mb);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Video generation failed: {:#}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Translate { text, dest } => {
            let dest = dest.unwrap_or_else(|| config.target_lang.clone());
            let translator = Translator::new(&config.translate_url);
            println!("{}", translator.translate(&text, &dest).await?);
        }
        Commands::Convert { input, output } => {
            let transcoder = Transcoder::new(&config.ffmpeg_bin);
            let out = transcoder.convert_to_h264(&input, &output).await?;
            println!("🎞️ Converted: {:?}", out);
        }
        Commands::Check => {
            health::print_status(&config).await;
        }
    }

    Ok(())
}

fn cli_generator(config: ForgeConfig) -> MediaGenerator {
    let state = ForgeState::new(Arc::new(config));
    state.generator
}

async fn resolve_prompt(
    generator: &MediaGenerator,
    prompt: &str,
    no_translate: bool,
) -> anyhow::Result<String> {
    if no_translate {
        return Ok(prompt.to_string());
    }
    let translated = generator.translate_prompt(prompt).await?;
    info!("Prompt: \"{}\" -> \"{}\"", prompt, translated);
    Ok(translated)
}
