//! Speaker blending node

use crate::error::NodeError;
use crate::node::{self, InputKind, InputSpec, Node, NodeInputs, NodeOutputs, NodeSchema, NodeValue, OutputSpec, CATEGORY, SPEAKER_TYPE};
use async_trait::async_trait;
use kokoro_tts::KokoroSynthesizer;
use std::sync::Arc;
use tracing::debug;

pub const CLASS_NAME: &str = "KokoroSpeakerCombiner";
pub const DISPLAY_NAME: &str = "Kokoro Speaker Combiner";

/// Weighted average of two speakers: `weight * a + (1 - weight) * b`
pub struct KokoroSpeakerCombiner {
    synthesizer: Arc<KokoroSynthesizer>,
}

impl KokoroSpeakerCombiner {
    pub fn new(synthesizer: Arc<KokoroSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Node for KokoroSpeakerCombiner {
    fn schema(&self) -> NodeSchema {
        let speaker = || InputKind::Custom {
            type_tag: SPEAKER_TYPE.to_string(),
        };

        NodeSchema {
            class_name: CLASS_NAME.to_string(),
            display_name: DISPLAY_NAME.to_string(),
            category: CATEGORY.to_string(),
            function: "combine".to_string(),
            inputs: vec![
                InputSpec::new("speaker_a", speaker()),
                InputSpec::new("speaker_b", speaker()),
                InputSpec::new(
                    "weight",
                    InputKind::Float {
                        default: 0.5,
                        min: 0.0,
                        max: 1.0,
                        step: 0.05,
                    },
                ),
            ],
            outputs: vec![OutputSpec::new("speaker", SPEAKER_TYPE)],
        }
    }

    async fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutputs, NodeError> {
        let a = node::speaker(inputs, CLASS_NAME, "speaker_a")?;
        let b = node::speaker(inputs, CLASS_NAME, "speaker_b")?;
        let weight = node::float(inputs, CLASS_NAME, "weight")?;

        let handle = self
            .synthesizer
            .voices()
            .combine(a, b, weight as f32)
            .await?;

        debug!("Combined speakers with weight {}", weight);
        Ok(vec![NodeValue::Speaker(handle)])
    }
}
