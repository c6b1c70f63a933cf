//! Deterministic change-detection keys
//!
//! Every field is written with a one-byte tag and a length prefix so that no
//! two distinct input maps produce the same byte stream.

use crate::node::{NodeInputs, NodeValue};
use kokoro_tts::VoiceHandle;
use sha2::{Digest, Sha256};

/// SHA-256 over tagged, length-prefixed fields
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new(class_name: &str) -> Self {
        let mut fp = Self {
            hasher: Sha256::new(),
        };
        fp.bytes(b'N', class_name.as_bytes());
        fp
    }

    fn bytes(&mut self, tag: u8, data: &[u8]) {
        self.hasher.update([tag]);
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
    }

    fn floats(&mut self, tag: u8, values: &[f32]) {
        self.hasher.update([tag]);
        self.hasher.update((values.len() as u64).to_le_bytes());
        for v in values {
            self.hasher.update(v.to_bits().to_le_bytes());
        }
    }

    pub fn key(&mut self, name: &str) -> &mut Self {
        self.bytes(b'K', name.as_bytes());
        self
    }

    pub fn value(&mut self, value: &NodeValue) -> &mut Self {
        match value {
            NodeValue::Text(s) => self.bytes(b'T', s.as_bytes()),
            NodeValue::Float(v) => self.bytes(b'F', &v.to_bits().to_le_bytes()),
            NodeValue::Choice(s) => self.bytes(b'C', s.as_bytes()),
            NodeValue::Speaker(handle) => self.speaker(handle),
            NodeValue::Audio(audio) => {
                self.bytes(b'R', &audio.sample_rate.to_le_bytes());
                let samples: Vec<f32> = audio.waveform.iter().copied().collect();
                self.floats(b'A', &samples);
            }
        }
        self
    }

    fn speaker(&mut self, handle: &VoiceHandle) {
        match handle {
            VoiceHandle::Named(name) => self.bytes(b'S', name.as_bytes()),
            VoiceHandle::Embedding(embedding) => {
                let (rows, dim) = embedding.shape();
                let mut shape = Vec::with_capacity(16);
                shape.extend_from_slice(&(rows as u64).to_le_bytes());
                shape.extend_from_slice(&(dim as u64).to_le_bytes());
                self.bytes(b'E', &shape);
                self.floats(b'V', embedding.as_slice());
            }
        }
    }

    /// Lowercase hex digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Key over a node class and all of its inputs, in name order
pub fn of_inputs(class_name: &str, inputs: &NodeInputs) -> String {
    let mut fp = Fingerprint::new(class_name);
    for (name, value) in inputs {
        fp.key(name).value(value);
    }
    fp.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kokoro_tts::VoiceEmbedding;

    fn inputs(text: &str, speed: f64) -> NodeInputs {
        let mut inputs = NodeInputs::new();
        inputs.insert("text".to_string(), NodeValue::Text(text.to_string()));
        inputs.insert("speed".to_string(), NodeValue::Float(speed));
        inputs.insert(
            "speaker".to_string(),
            NodeValue::Speaker(VoiceHandle::Named("af_sarah".to_string())),
        );
        inputs
    }

    #[test]
    fn test_deterministic() {
        let a = of_inputs("KokoroGenerator", &inputs("hello", 1.0));
        let b = of_inputs("KokoroGenerator", &inputs("hello", 1.0));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_single_change_differs() {
        let base = of_inputs("KokoroGenerator", &inputs("hello", 1.0));
        assert_ne!(base, of_inputs("KokoroGenerator", &inputs("hello!", 1.0)));
        assert_ne!(base, of_inputs("KokoroGenerator", &inputs("hello", 1.05)));
        assert_ne!(base, of_inputs("KokoroSpeaker", &inputs("hello", 1.0)));
    }

    #[test]
    fn test_field_boundaries_matter() {
        let mut a = NodeInputs::new();
        a.insert("ab".to_string(), NodeValue::Text("c".to_string()));
        let mut b = NodeInputs::new();
        b.insert("a".to_string(), NodeValue::Text("bc".to_string()));
        assert_ne!(of_inputs("X", &a), of_inputs("X", &b));
    }

    #[test]
    fn test_text_and_choice_differ() {
        let mut a = NodeInputs::new();
        a.insert("lang".to_string(), NodeValue::Text("English".to_string()));
        let mut b = NodeInputs::new();
        b.insert("lang".to_string(), NodeValue::Choice("English".to_string()));
        assert_ne!(of_inputs("X", &a), of_inputs("X", &b));
    }

    #[test]
    fn test_embedding_contents_matter() {
        let e1 = VoiceEmbedding::new(1, 2, vec![0.1, 0.2]).unwrap();
        let e2 = VoiceEmbedding::new(1, 2, vec![0.1, 0.3]).unwrap();

        let mut a = NodeInputs::new();
        a.insert("speaker".to_string(), NodeValue::Speaker(VoiceHandle::Embedding(e1)));
        let mut b = NodeInputs::new();
        b.insert("speaker".to_string(), NodeValue::Speaker(VoiceHandle::Embedding(e2)));
        assert_ne!(of_inputs("X", &a), of_inputs("X", &b));
    }
}
