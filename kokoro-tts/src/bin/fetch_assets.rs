//! Binary for downloading Kokoro model assets from command line

use kokoro_core::KokoroConfig;
use kokoro_tts::{AssetProvisioner, TtsError};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), TtsError> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let mut config = KokoroConfig::from_env();
    if let Some(model) = args.get(1) {
        config.model = model.clone();
    }
    config.validate()?;

    let provisioner = match AssetProvisioner::new(Arc::new(config)) {
        Ok(provisioner) => provisioner,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: fetch_assets [model_id]");
            std::process::exit(1);
        }
    };

    println!("Fetching assets for {} into {:?}...", provisioner.model().id, provisioner.asset_dir());
    let paths = provisioner.ensure_all().await?;
    println!("Model weights: {:?}", paths.model);
    println!("Voice table:   {:?}", paths.voices);

    Ok(())
}
