//! Basic Kokoro synthesis example
//!
//! Needs espeak-ng on PATH; model assets are downloaded on first run.

use kokoro_core::KokoroConfig;
use kokoro_tts::{KokoroSynthesizer, VoiceHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = KokoroConfig::from_env();
    let synthesizer = KokoroSynthesizer::new(config)?;

    let voice = VoiceHandle::Named("af_sarah".to_string());
    let text = "Hello, I am a synthesized voice running on Kokoro.";

    println!("Synthesizing speech...");
    match synthesizer.synthesize(text, &voice, 1.0, "English").await {
        Ok(audio) => {
            println!(
                "Synthesized {} samples ({:.2}s at {} Hz)",
                audio.samples.len(),
                audio.duration_secs(),
                audio.sample_rate
            );
            audio.write_wav("basic_speak.wav")?;
            println!("Wrote basic_speak.wav");
        }
        Err(e) => {
            eprintln!("Failed to synthesize speech: {}", e);
        }
    }

    Ok(())
}
