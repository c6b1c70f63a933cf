//! Speaker selection node

use crate::error::NodeError;
use crate::node::{self, InputKind, InputSpec, Node, NodeInputs, NodeOutputs, NodeSchema, NodeValue, OutputSpec, CATEGORY, SPEAKER_TYPE};
use async_trait::async_trait;
use kokoro_tts::KokoroSynthesizer;
use std::sync::Arc;
use tracing::debug;

pub const CLASS_NAME: &str = "KokoroSpeaker";
pub const DISPLAY_NAME: &str = "Kokoro Speaker";

/// Turns a catalog voice name into a speaker handle.
///
/// Models with deferred voice resolution pass the name through untouched;
/// eager models load the style table here, downloading assets if needed.
pub struct KokoroSpeaker {
    synthesizer: Arc<KokoroSynthesizer>,
}

impl KokoroSpeaker {
    pub fn new(synthesizer: Arc<KokoroSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Node for KokoroSpeaker {
    fn schema(&self) -> NodeSchema {
        let model = self.synthesizer.model();
        NodeSchema {
            class_name: CLASS_NAME.to_string(),
            display_name: DISPLAY_NAME.to_string(),
            category: CATEGORY.to_string(),
            function: "select".to_string(),
            inputs: vec![InputSpec::new(
                "speaker_name",
                InputKind::Choice {
                    options: model.voices.clone(),
                    default: model.default_voice.clone(),
                },
            )],
            outputs: vec![OutputSpec::new("speaker", SPEAKER_TYPE)],
        }
    }

    async fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutputs, NodeError> {
        let name = node::text(inputs, CLASS_NAME, "speaker_name")?;
        let handle = self.synthesizer.voices().select(name).await?;
        debug!("Selected speaker '{}'", name);
        Ok(vec![NodeValue::Speaker(handle)])
    }
}
