//! Node-graph host contract
//!
//! A node advertises a [`NodeSchema`] (named, typed inputs and outputs) and
//! is executed with a map of [`NodeValue`]s keyed by input name.

use crate::error::NodeError;
use crate::fingerprint;
use async_trait::async_trait;
use kokoro_tts::{AudioTensor, VoiceHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type tag of speaker handles passed between nodes
pub const SPEAKER_TYPE: &str = "KOKORO_SPEAKER";
/// Type tag of generated audio
pub const AUDIO_TYPE: &str = "AUDIO";
/// Category every Kokoro node is listed under
pub const CATEGORY: &str = "kokoro";

pub type NodeInputs = BTreeMap<String, NodeValue>;
pub type NodeOutputs = Vec<NodeValue>;

/// Widget or connection type of one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    Text { multiline: bool, default: String },
    Float { default: f64, min: f64, max: f64, step: f64 },
    Choice { options: Vec<String>, default: String },
    /// Connection carrying a value produced by another node
    Custom { type_tag: String },
}

impl InputKind {
    pub fn type_tag(&self) -> &str {
        match self {
            InputKind::Text { .. } => "STRING",
            InputKind::Float { .. } => "FLOAT",
            InputKind::Choice { .. } => "COMBO",
            InputKind::Custom { type_tag } => type_tag,
        }
    }

    fn default_value(&self) -> Option<NodeValue> {
        match self {
            InputKind::Text { default, .. } => Some(NodeValue::Text(default.clone())),
            InputKind::Float { default, .. } => Some(NodeValue::Float(*default)),
            InputKind::Choice { default, .. } => Some(NodeValue::Choice(default.clone())),
            InputKind::Custom { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: InputKind,
}

impl InputSpec {
    pub fn new(name: impl Into<String>, kind: InputKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub type_tag: String,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }
}

/// What a node tells the host about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub class_name: String,
    pub display_name: String,
    pub category: String,
    /// Name of the entry point the host calls
    pub function: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl NodeSchema {
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Fill absent widget inputs with their defaults
    pub fn apply_defaults(&self, mut inputs: NodeInputs) -> NodeInputs {
        for spec in &self.inputs {
            if !inputs.contains_key(&spec.name) {
                if let Some(value) = spec.kind.default_value() {
                    inputs.insert(spec.name.clone(), value);
                }
            }
        }
        inputs
    }

    /// Check presence, types, choice membership and numeric bounds
    pub fn validate(&self, inputs: &NodeInputs) -> Result<(), NodeError> {
        for spec in &self.inputs {
            let value = inputs.get(&spec.name).ok_or_else(|| NodeError::MissingInput {
                node: self.class_name.clone(),
                input: spec.name.clone(),
            })?;

            let mismatch = || NodeError::TypeMismatch {
                input: spec.name.clone(),
                expected: spec.kind.type_tag().to_string(),
                found: value.type_tag().to_string(),
            };

            match (&spec.kind, value) {
                (InputKind::Text { .. }, NodeValue::Text(_)) => {}
                (InputKind::Float { min, max, .. }, NodeValue::Float(v)) => {
                    if !v.is_finite() || *v < *min || *v > *max {
                        return Err(NodeError::OutOfRange {
                            input: spec.name.clone(),
                            value: *v,
                            min: *min,
                            max: *max,
                        });
                    }
                }
                (InputKind::Choice { options, .. }, NodeValue::Choice(v) | NodeValue::Text(v)) => {
                    if !options.iter().any(|o| o == v) {
                        return Err(NodeError::InvalidChoice {
                            input: spec.name.clone(),
                            value: v.clone(),
                        });
                    }
                }
                (InputKind::Custom { type_tag }, value) if value.type_tag() == type_tag.as_str() => {}
                _ => return Err(mismatch()),
            }
        }

        Ok(())
    }
}

/// Values flowing along graph edges
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Text(String),
    Float(f64),
    Choice(String),
    Speaker(VoiceHandle),
    Audio(AudioTensor),
}

impl NodeValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            NodeValue::Text(_) => "STRING",
            NodeValue::Float(_) => "FLOAT",
            NodeValue::Choice(_) => "COMBO",
            NodeValue::Speaker(_) => SPEAKER_TYPE,
            NodeValue::Audio(_) => AUDIO_TYPE,
        }
    }
}

/// Typed accessors for validated inputs
pub(crate) fn text<'a>(inputs: &'a NodeInputs, node: &str, name: &str) -> Result<&'a str, NodeError> {
    match inputs.get(name) {
        Some(NodeValue::Text(s)) | Some(NodeValue::Choice(s)) => Ok(s),
        Some(other) => Err(type_mismatch(name, "STRING", other)),
        None => Err(missing(node, name)),
    }
}

pub(crate) fn float(inputs: &NodeInputs, node: &str, name: &str) -> Result<f64, NodeError> {
    match inputs.get(name) {
        Some(NodeValue::Float(v)) => Ok(*v),
        Some(other) => Err(type_mismatch(name, "FLOAT", other)),
        None => Err(missing(node, name)),
    }
}

pub(crate) fn speaker<'a>(
    inputs: &'a NodeInputs,
    node: &str,
    name: &str,
) -> Result<&'a VoiceHandle, NodeError> {
    match inputs.get(name) {
        Some(NodeValue::Speaker(handle)) => Ok(handle),
        Some(other) => Err(type_mismatch(name, SPEAKER_TYPE, other)),
        None => Err(missing(node, name)),
    }
}

fn type_mismatch(name: &str, expected: &str, found: &NodeValue) -> NodeError {
    NodeError::TypeMismatch {
        input: name.to_string(),
        expected: expected.to_string(),
        found: found.type_tag().to_string(),
    }
}

fn missing(node: &str, name: &str) -> NodeError {
    NodeError::MissingInput {
        node: node.to_string(),
        input: name.to_string(),
    }
}

/// A graph node the host can schedule
#[async_trait]
pub trait Node: Send + Sync {
    fn schema(&self) -> NodeSchema;

    /// Run the node on validated inputs
    async fn execute(&self, inputs: &NodeInputs) -> Result<NodeOutputs, NodeError>;

    /// Change-detection key; equal inputs give equal keys
    fn fingerprint(&self, inputs: &NodeInputs) -> String {
        fingerprint::of_inputs(&self.schema().class_name, inputs)
    }
}
