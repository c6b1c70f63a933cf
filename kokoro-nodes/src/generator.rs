//! Speech generation node

use crate::error::NodeError;
use crate::node::{self, InputKind, InputSpec, Node, NodeInputs, NodeOutputs, NodeSchema, NodeValue, OutputSpec, AUDIO_TYPE, CATEGORY, SPEAKER_TYPE};
use async_trait::async_trait;
use kokoro_tts::{KokoroSynthesizer, SynthesisError};
use std::sync::Arc;

pub const CLASS_NAME: &str = "KokoroGenerator";
pub const DISPLAY_NAME: &str = "Kokoro Generator";

const DEFAULT_TEXT: &str = "I am a synthesized robot";

/// Synthesizes text with a speaker handle into a `(1, 1, N)` waveform
pub struct KokoroGenerator {
    synthesizer: Arc<KokoroSynthesizer>,
}

impl KokoroGenerator {
    pub fn new(synthesizer: Arc<KokoroSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Node for KokoroGenerator {
    fn schema(&self) -> NodeSchema {
        let model = self.synthesizer.model();

        let lang = if model.free_text_language {
            let code = model
                .language_by_name(&model.default_language)
                .map(|l| l.code.clone())
                .unwrap_or_else(|| model.default_language.clone());
            InputKind::Text {
                multiline: false,
                default: code,
            }
        } else {
            InputKind::Choice {
                options: model.language_names(),
                default: model.default_language.clone(),
            }
        };

        NodeSchema {
            class_name: CLASS_NAME.to_string(),
            display_name: DISPLAY_NAME.to_string(),
            category: CATEGORY.to_string(),
            function: "generate".to_string(),
            inputs: vec![
                InputSpec::new(
                    "text",
                    InputKind::Text {
                        multiline: true,
                        default: DEFAULT_TEXT.to_string(),
                    },
                ),
                InputSpec::new(
                    "speaker",
                    InputKind::Custom {
                        type_tag: SPEAKER_TYPE.to_string(),
                    },
                ),
                InputSpec::new(
                    "speed",
                    InputKind::Float {
                        default: 1.0,
                        min: 0.1,
                        max: 4.0,
                        step: 0.05,
                    },
                ),
                InputSpec::new("lang", lang),
            ],
            outputs: vec![OutputSpec::new("audio", AUDIO_TYPE)],
        }
    }

    async fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutputs, NodeError> {
        let text = node::text(inputs, CLASS_NAME, "text")?;
        let speaker = node::speaker(inputs, CLASS_NAME, "speaker")?;
        let speed = node::float(inputs, CLASS_NAME, "speed")?;
        let lang = node::text(inputs, CLASS_NAME, "lang")?;

        let audio = self
            .synthesizer
            .synthesize(text, speaker, speed as f32, lang)
            .await?;

        let tensor = audio
            .into_tensor()
            .map_err(|e| NodeError::Synthesis(SynthesisError::Synthesis(e)))?;

        Ok(vec![NodeValue::Audio(tensor)])
    }
}
