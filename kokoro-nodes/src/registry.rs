//! Node class registry

use crate::combiner::KokoroSpeakerCombiner;
use crate::error::NodeError;
use crate::generator::KokoroGenerator;
use crate::node::{Node, NodeInputs, NodeOutputs, NodeSchema};
use crate::speaker::KokoroSpeaker;
use kokoro_core::KokoroConfig;
use kokoro_tts::{KokoroSynthesizer, TtsError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Class name to node mapping, as handed to the host at load time
#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the three Kokoro nodes sharing one synthesizer
    pub fn with_kokoro_nodes(synthesizer: Arc<KokoroSynthesizer>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(KokoroSpeaker::new(synthesizer.clone())));
        registry.register(Arc::new(KokoroSpeakerCombiner::new(synthesizer.clone())));
        registry.register(Arc::new(KokoroGenerator::new(synthesizer)));
        registry
    }

    pub fn from_config(config: KokoroConfig) -> Result<Self, TtsError> {
        let synthesizer = KokoroSynthesizer::new(config)?;
        Ok(Self::with_kokoro_nodes(Arc::new(synthesizer)))
    }

    pub fn register(&mut self, node: Arc<dyn Node>) {
        let class_name = node.schema().class_name;
        if self.nodes.insert(class_name.clone(), node).is_some() {
            warn!("Replaced node class {}", class_name);
        } else {
            debug!("Registered node class {}", class_name);
        }
    }

    pub fn get(&self, class_name: &str) -> Option<Arc<dyn Node>> {
        self.nodes.get(class_name).cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Class name to display name mapping
    pub fn display_names(&self) -> BTreeMap<String, String> {
        self.nodes
            .iter()
            .map(|(class, node)| (class.clone(), node.schema().display_name))
            .collect()
    }

    pub fn schemas(&self) -> Vec<NodeSchema> {
        self.nodes.values().map(|n| n.schema()).collect()
    }

    fn node(&self, class_name: &str) -> Result<Arc<dyn Node>, NodeError> {
        self.get(class_name)
            .ok_or_else(|| NodeError::UnknownNode(class_name.to_string()))
    }

    /// Fill defaults, validate, then execute
    pub async fn invoke(&self, class_name: &str, inputs: NodeInputs) -> Result<NodeOutputs, NodeError> {
        let node = self.node(class_name)?;
        let schema = node.schema();
        let inputs = schema.apply_defaults(inputs);
        schema.validate(&inputs)?;

        info!("Executing {}", class_name);
        node.execute(&inputs).await
    }

    /// Change-detection key for a node invocation
    pub fn fingerprint(&self, class_name: &str, inputs: NodeInputs) -> Result<String, NodeError> {
        let node = self.node(class_name)?;
        let inputs = node.schema().apply_defaults(inputs);
        Ok(node.fingerprint(&inputs))
    }
}
