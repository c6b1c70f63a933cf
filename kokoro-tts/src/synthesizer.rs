//! Kokoro speech synthesizer

use crate::assets::AssetProvisioner;
use crate::audio::AudioResult;
use crate::engines::{EngineLoader, OnnxEngineLoader, SynthesisEngine};
use crate::error::{SynthesisError, TtsError};
use crate::phonemizer::{EspeakPhonemizer, Phonemizer};
use crate::tokenizer::{pad, Tokenizer};
use crate::voice::{VoiceEmbedding, VoiceHandle, VoiceStore};
use kokoro_core::{Error as CoreError, KokoroConfig, ModelSpec};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Text, voice, speed and language in; mono samples out
pub struct KokoroSynthesizer {
    config: Arc<KokoroConfig>,
    voices: VoiceStore,
    tokenizer: Tokenizer,
    phonemizer: Arc<dyn Phonemizer>,
    loader: Arc<dyn EngineLoader>,
    // only populated when the configuration asks for session reuse
    session: Mutex<Option<Arc<dyn SynthesisEngine>>>,
}

impl KokoroSynthesizer {
    /// espeak-ng phonemizer and ONNX Runtime engine for the configured model
    pub fn new(config: KokoroConfig) -> Result<Self, TtsError> {
        config.validate()?;

        let model = config.model_spec()?;
        let phonemizer = Arc::new(EspeakPhonemizer::new(config.espeak_path.as_deref()));
        let loader = Arc::new(OnnxEngineLoader::new(config.intra_threads));

        Ok(Self::with_components(Arc::new(config), model, phonemizer, loader))
    }

    /// Synthesizer with caller-supplied phonemizer and engine loader
    pub fn with_components(
        config: Arc<KokoroConfig>,
        model: ModelSpec,
        phonemizer: Arc<dyn Phonemizer>,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        let tokenizer = Tokenizer::for_model(&model);
        let provisioner = AssetProvisioner::with_model(config.clone(), model);

        Self {
            config,
            voices: VoiceStore::new(provisioner),
            tokenizer,
            phonemizer,
            loader,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &KokoroConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelSpec {
        self.voices.model()
    }

    pub fn voices(&self) -> &VoiceStore {
        &self.voices
    }

    pub fn provisioner(&self) -> &AssetProvisioner {
        self.voices.provisioner()
    }

    /// Synthesize `text` with the given voice.
    ///
    /// `language` is a display name from the model's language list, or a raw
    /// code where the model accepts one. Failures are logged before they are
    /// returned.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceHandle,
        speed: f32,
        language: &str,
    ) -> Result<AudioResult, SynthesisError> {
        let result = self.run(text, voice, speed, language).await;

        match &result {
            Ok(audio) => info!(
                "Synthesized {} samples ({:.2}s) at {} Hz",
                audio.samples.len(),
                audio.duration_secs(),
                audio.sample_rate
            ),
            Err(e) => error!("Kokoro synthesis failed: {}", e),
        }

        result
    }

    async fn run(
        &self,
        text: &str,
        voice: &VoiceHandle,
        speed: f32,
        language: &str,
    ) -> Result<AudioResult, SynthesisError> {
        let model = self.voices.model();

        if !speed.is_finite() || speed <= 0.0 {
            return Err(SynthesisError::InvalidInput(format!("Invalid speed: {}", speed)));
        }

        if text.trim().is_empty() {
            debug!("Empty text, returning silence");
            return Ok(AudioResult::new(Vec::new(), model.sample_rate));
        }

        if text.len() > 100_000 {
            return Err(SynthesisError::InvalidInput("Text too long (max 100KB)".to_string()));
        }

        let lang_code = model
            .resolve_language(language)
            .map_err(|e| SynthesisError::InvalidInput(e.to_string()))?;

        let assets = self
            .voices
            .provisioner()
            .ensure_all()
            .await
            .map_err(SynthesisError::AssetFetch)?;

        let embedding = self.resolve_voice(voice).await?;

        let phonemes = self
            .phonemizer
            .phonemize(text, &lang_code)
            .map_err(SynthesisError::Synthesis)?;
        let chunks = self.tokenizer.chunk(&phonemes);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }
        debug!("{} phoneme symbols in {} chunk(s)", phonemes.chars().count(), chunks.len());

        let engine = self.engine(&assets.model).map_err(SynthesisError::EngineLoad)?;

        let mut samples = Vec::new();
        for chunk in &chunks {
            let style = embedding.style_row(chunk.len());
            let audio = engine
                .synthesize(&pad(chunk), style, speed)
                .await
                .map_err(SynthesisError::Synthesis)?;
            samples.extend_from_slice(&audio);
        }

        if samples.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        Ok(AudioResult::new(samples, model.sample_rate))
    }

    async fn resolve_voice(&self, voice: &VoiceHandle) -> Result<VoiceEmbedding, SynthesisError> {
        let embedding = self.voices.resolve(voice).await.map_err(|e| match e {
            TtsError::Core(CoreError::UnknownVoice { .. }) => SynthesisError::InvalidInput(e.to_string()),
            other => SynthesisError::Synthesis(other),
        })?;

        let style_dim = self.voices.model().style_dim;
        if embedding.dim() != style_dim {
            return Err(SynthesisError::InvalidInput(format!(
                "Voice style dimension {} does not match model ({})",
                embedding.dim(),
                style_dim
            )));
        }

        Ok(embedding)
    }

    fn engine(&self, model_path: &std::path::Path) -> Result<Arc<dyn SynthesisEngine>, TtsError> {
        if !self.config.reuse_session {
            return self.loader.load(model_path);
        }

        let mut session = self.session.lock();
        if let Some(engine) = session.as_ref() {
            return Ok(engine.clone());
        }

        let engine = self.loader.load(model_path)?;
        *session = Some(engine.clone());
        Ok(engine)
    }

    /// Drop a reused inference session
    pub fn unload(&self) {
        if self.session.lock().take().is_some() {
            info!("Released Kokoro inference session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::CustomEngine;
    use crate::phonemizer::MockPhonemizer;
    use kokoro_core::Catalog;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: Arc<KokoroConfig>,
        model: ModelSpec,
    }

    fn fixture(reuse_session: bool, with_assets: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = KokoroConfig::with_asset_dir(dir.path());
        config.reuse_session = reuse_session;

        let mut model = Catalog::builtin().unwrap().model("kokoro-v1.0").unwrap().clone();
        model.model_file.url = "https://127.0.0.1:9/kokoro-v1.0.onnx".to_string();
        model.voices_file.url = "https://127.0.0.1:9/voices-v1.0.bin".to_string();

        if with_assets {
            std::fs::write(dir.path().join(&model.model_file.filename), b"onnx").unwrap();
            std::fs::write(dir.path().join(&model.voices_file.filename), b"npz").unwrap();
        }

        Fixture {
            _dir: dir,
            config: Arc::new(config),
            model,
        }
    }

    /// Row `i` is filled with `i`
    fn ramp_voice() -> VoiceHandle {
        let rows = 16;
        let data = (0..rows).flat_map(|r| vec![r as f32; 256]).collect();
        VoiceHandle::Embedding(VoiceEmbedding::new(rows, 256, data).unwrap())
    }

    fn phonemizer(output: &'static str) -> Arc<dyn Phonemizer> {
        let mut mock = MockPhonemizer::new();
        mock.expect_phonemize().returning(move |_, _| Ok(output.to_string()));
        Arc::new(mock)
    }

    /// Engine echoing the style value once per padded token
    fn echo_loader(loads: Arc<AtomicUsize>) -> Arc<dyn EngineLoader> {
        Arc::new(move |_: &Path| -> Result<Arc<dyn SynthesisEngine>, TtsError> {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(CustomEngine::from_fn("echo", |tokens, style, _speed| {
                Ok(vec![style[0]; tokens.len()])
            })))
        })
    }

    #[tokio::test]
    async fn test_empty_text_skips_everything() {
        let f = fixture(false, false);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            Arc::new(MockPhonemizer::new()),
            echo_loader(loads.clone()),
        );

        let audio = synth.synthesize("   ", &ramp_voice(), 1.0, "English").await.unwrap();
        assert!(audio.is_empty());
        assert_eq!(audio.sample_rate, 24000);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesize_uses_style_row_for_token_count() {
        let f = fixture(false, true);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            phonemizer("həlˈoʊ"),
            echo_loader(loads.clone()),
        );

        let audio = synth
            .synthesize("Hello", &ramp_voice(), 1.0, "English")
            .await
            .unwrap();

        // six symbols plus two pad ids, style row six
        assert_eq!(audio.samples, vec![6.0; 8]);
        assert_eq!(audio.sample_rate, 24000);
    }

    #[tokio::test]
    async fn test_session_reloaded_per_call_by_default() {
        let f = fixture(false, true);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            phonemizer("ab"),
            echo_loader(loads.clone()),
        );

        synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap();
        synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_reuse() {
        let f = fixture(true, true);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            phonemizer("ab"),
            echo_loader(loads.clone()),
        );

        synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap();
        synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        synth.unload();
        synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_long_input_is_chunked() {
        let mut f = fixture(false, true);
        f.model.max_tokens = 3;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader: Arc<dyn EngineLoader> =
            Arc::new(move |_: &Path| -> Result<Arc<dyn SynthesisEngine>, TtsError> {
                let counter = counter.clone();
                Ok(Arc::new(CustomEngine::from_fn("count", move |tokens, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert!(tokens.len() <= 5);
                    assert_eq!(tokens[0], 0);
                    assert_eq!(tokens[tokens.len() - 1], 0);
                    Ok(vec![0.0; 10])
                })))
            });

        let synth =
            KokoroSynthesizer::with_components(f.config.clone(), f.model.clone(), phonemizer("ab ab ab"), loader);

        let audio = synth.synthesize("x", &ramp_voice(), 1.0, "English").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(audio.samples.len(), 30);
    }

    #[tokio::test]
    async fn test_missing_assets_is_asset_fetch_error() {
        let f = fixture(false, false);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            phonemizer("ab"),
            echo_loader(loads.clone()),
        );

        let err = synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::AssetFetch(_)));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_load_failure() {
        let f = fixture(false, true);
        let loader: Arc<dyn EngineLoader> =
            Arc::new(|_: &Path| -> Result<Arc<dyn SynthesisEngine>, TtsError> {
                Err(TtsError::Ort("corrupt model".to_string()))
            });
        let synth =
            KokoroSynthesizer::with_components(f.config.clone(), f.model.clone(), phonemizer("ab"), loader);

        let err = synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EngineLoad(_)));
    }

    #[tokio::test]
    async fn test_engine_without_samples_is_empty_audio() {
        let f = fixture(false, true);
        let loader: Arc<dyn EngineLoader> =
            Arc::new(|_: &Path| -> Result<Arc<dyn SynthesisEngine>, TtsError> {
                Ok(Arc::new(CustomEngine::from_fn("silent", |_, _, _| Ok(Vec::new()))))
            });
        let synth =
            KokoroSynthesizer::with_components(f.config.clone(), f.model.clone(), phonemizer("ab"), loader);

        let err = synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyAudio));
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let f = fixture(false, true);
        let loads = Arc::new(AtomicUsize::new(0));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            phonemizer("ab"),
            echo_loader(loads.clone()),
        );

        let err = synth.synthesize("ab", &ramp_voice(), 1.0, "Klingon").await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));

        let err = synth.synthesize("ab", &ramp_voice(), 0.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));

        let unknown = VoiceHandle::Named("zz_nobody".to_string());
        let err = synth.synthesize("ab", &unknown, 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));

        let narrow = VoiceHandle::Embedding(VoiceEmbedding::new(2, 8, vec![0.0; 16]).unwrap());
        let err = synth.synthesize("ab", &narrow, 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::InvalidInput(_)));

        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_phonemizer_failure() {
        let f = fixture(false, true);
        let mut mock = MockPhonemizer::new();
        mock.expect_phonemize()
            .returning(|_, _| Err(TtsError::Phonemizer("espeak-ng missing".to_string())));
        let synth = KokoroSynthesizer::with_components(
            f.config.clone(),
            f.model.clone(),
            Arc::new(mock),
            echo_loader(Arc::new(AtomicUsize::new(0))),
        );

        let err = synth.synthesize("ab", &ramp_voice(), 1.0, "English").await.unwrap_err();
        assert!(matches!(err, SynthesisError::Synthesis(TtsError::Phonemizer(_))));
    }
}
