// Kokoro command line interface
// Fetches model assets, lists the catalog and runs the nodes from a shell

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use kokoro_core::{AssetSpec, KokoroConfig, ModelSpec};
use kokoro_nodes::{NodeInputs, NodeRegistry, NodeValue};
use kokoro_tts::{AssetProvisioner, DownloadProgress, VoiceHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kokoro")]
#[command(about = "Kokoro text-to-speech nodes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Model identifier from the catalog
    #[arg(long, short, global = true)]
    model: Option<String>,

    /// Directory holding model weights and voices
    #[arg(long, global = true)]
    asset_dir: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the model weights and voice table
    Fetch,

    /// List the voices of the model
    Voices,

    /// List the languages of the model
    Languages,

    /// Print node schemas as JSON
    Nodes,

    /// Synthesize text to a WAV file
    Speak {
        /// Text to speak
        #[arg(long, short)]
        text: String,

        /// Voice name
        #[arg(long, default_value = "af_sarah")]
        voice: String,

        /// Second voice to blend with
        #[arg(long)]
        blend: Option<String>,

        /// Share of the first voice when blending
        #[arg(long, default_value = "0.5")]
        weight: f64,

        /// Speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Language display name or code
        #[arg(long, default_value = "English")]
        lang: String,

        /// Output WAV path
        #[arg(long, short, default_value = "kokoro.wav")]
        out: PathBuf,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<KokoroConfig> {
    let mut config = match &cli.config {
        Some(path) => KokoroConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => KokoroConfig::from_env(),
    };

    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(dir) = &cli.asset_dir {
        config.asset_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn fetch_with_progress(provisioner: &AssetProvisioner, asset: &AssetSpec) -> anyhow::Result<PathBuf> {
    let path = provisioner.asset_path(asset)?;
    if path.exists() {
        println!("{} already present", asset.filename);
        return Ok(path);
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")?,
    );
    pb.set_message(asset.filename.clone());

    let bar = pb.clone();
    let path = provisioner
        .ensure_asset_with_progress(asset, move |p: DownloadProgress| {
            if let Some(total) = p.total {
                bar.set_length(total);
            }
            bar.set_position(p.downloaded);
        })
        .await?;

    pb.finish_with_message(format!("{} done", asset.filename));
    Ok(path)
}

async fn fetch(config: KokoroConfig) -> anyhow::Result<()> {
    let provisioner = AssetProvisioner::new(Arc::new(config))?;
    let model = provisioner.model().clone();

    println!("Model {} -> {}", model.id, provisioner.asset_dir().display());
    fetch_with_progress(&provisioner, &model.model_file).await?;
    fetch_with_progress(&provisioner, &model.voices_file).await?;
    Ok(())
}

fn speaker_output(mut outputs: Vec<NodeValue>) -> anyhow::Result<VoiceHandle> {
    match outputs.pop() {
        Some(NodeValue::Speaker(handle)) => Ok(handle),
        _ => bail!("speaker node returned no speaker"),
    }
}

async fn select(registry: &NodeRegistry, voice: &str) -> anyhow::Result<VoiceHandle> {
    let mut inputs = NodeInputs::new();
    inputs.insert("speaker_name".to_string(), NodeValue::Choice(voice.to_string()));
    speaker_output(registry.invoke("KokoroSpeaker", inputs).await?)
}

/// Display name for a language code, as the generator's choice widget expects
fn lang_for_node(model: &ModelSpec, lang: &str) -> String {
    if model.free_text_language || model.language_by_name(lang).is_some() {
        return lang.to_string();
    }

    model
        .languages
        .iter()
        .find(|l| l.code == lang)
        .map(|l| l.name.clone())
        .unwrap_or_else(|| lang.to_string())
}

#[allow(clippy::too_many_arguments)]
async fn speak(
    config: KokoroConfig,
    text: String,
    voice: String,
    blend: Option<String>,
    weight: f64,
    speed: f64,
    lang: String,
    out: PathBuf,
) -> anyhow::Result<()> {
    // fetch up front so downloads get a progress bar
    fetch(config.clone()).await?;

    let lang = lang_for_node(&config.model_spec()?, &lang);
    let registry = NodeRegistry::from_config(config)?;

    let mut speaker = select(&registry, &voice).await?;
    if let Some(other) = blend {
        let second = select(&registry, &other).await?;
        let mut inputs = NodeInputs::new();
        inputs.insert("speaker_a".to_string(), NodeValue::Speaker(speaker));
        inputs.insert("speaker_b".to_string(), NodeValue::Speaker(second));
        inputs.insert("weight".to_string(), NodeValue::Float(weight));
        speaker = speaker_output(registry.invoke("KokoroSpeakerCombiner", inputs).await?)?;
        info!("Blended {} and {} at {}", voice, other, weight);
    }

    let mut inputs = NodeInputs::new();
    inputs.insert("text".to_string(), NodeValue::Text(text));
    inputs.insert("speaker".to_string(), NodeValue::Speaker(speaker));
    inputs.insert("speed".to_string(), NodeValue::Float(speed));
    inputs.insert("lang".to_string(), NodeValue::Text(lang));

    let audio = match registry.invoke("KokoroGenerator", inputs).await?.pop() {
        Some(NodeValue::Audio(tensor)) => tensor.to_audio(),
        _ => bail!("generator returned no audio"),
    };

    audio.write_wav(&out)?;
    println!(
        "Wrote {} ({} samples, {:.2}s at {} Hz)",
        out.display(),
        audio.samples.len(),
        audio.duration_secs(),
        audio.sample_rate
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Fetch => fetch(config).await?,
        Commands::Voices => {
            let model = config.model_spec()?;
            for voice in &model.voices {
                let marker = if *voice == model.default_voice { " (default)" } else { "" };
                println!("{}{}", voice, marker);
            }
        }
        Commands::Languages => {
            let model = config.model_spec()?;
            for lang in &model.languages {
                println!("{:<20} {}", lang.name, lang.code);
            }
            if model.free_text_language {
                println!("(other espeak-ng language codes are accepted)");
            }
        }
        Commands::Nodes => {
            let registry = NodeRegistry::from_config(config)?;
            println!("{}", serde_json::to_string_pretty(&registry.schemas())?);
        }
        Commands::Speak { text, voice, blend, weight, speed, lang, out } => {
            speak(config, text, voice, blend, weight, speed, lang, out).await?;
        }
    }

    Ok(())
}
