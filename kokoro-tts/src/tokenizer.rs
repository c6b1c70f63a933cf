//! Phoneme string to token ids

use kokoro_core::ModelSpec;
use std::collections::HashMap;
use tracing::debug;

/// Id used for padding on both ends of every chunk
pub const PAD_TOKEN: i64 = 0;

/// Symbols after which a chunk may be split
const BREAK_SYMBOLS: &[char] = &[' ', '.', ',', ';', ':', '!', '?', '—', '…'];

#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: HashMap<char, i64>,
    max_tokens: usize,
}

impl Tokenizer {
    pub fn new(vocab: HashMap<char, i64>, max_tokens: usize) -> Self {
        Self {
            vocab,
            max_tokens: max_tokens.max(1),
        }
    }

    pub fn for_model(model: &ModelSpec) -> Self {
        Self::new(model.vocabulary(), model.max_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Token ids for every known symbol; unknown symbols are dropped
    pub fn encode(&self, phonemes: &str) -> Vec<i64> {
        self.encode_marked(phonemes).into_iter().map(|(id, _)| id).collect()
    }

    fn encode_marked(&self, phonemes: &str) -> Vec<(i64, bool)> {
        let mut dropped = 0usize;
        let tokens: Vec<(i64, bool)> = phonemes
            .chars()
            .filter_map(|c| match self.vocab.get(&c) {
                Some(id) => Some((*id, BREAK_SYMBOLS.contains(&c))),
                None => {
                    dropped += 1;
                    None
                }
            })
            .collect();

        if dropped > 0 {
            debug!("Dropped {} symbols missing from the vocabulary", dropped);
        }
        tokens
    }

    /// Encode and split into chunks of at most `max_tokens` ids.
    ///
    /// Chunks end after a space or punctuation symbol where possible.
    pub fn chunk(&self, phonemes: &str) -> Vec<Vec<i64>> {
        let tokens = self.encode_marked(phonemes);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let hard_end = (start + self.max_tokens).min(tokens.len());
            let end = if hard_end == tokens.len() {
                hard_end
            } else {
                tokens[start..hard_end]
                    .iter()
                    .rposition(|(_, is_break)| *is_break)
                    .map(|pos| start + pos + 1)
                    .unwrap_or(hard_end)
            };

            let chunk: Vec<i64> = tokens[start..end].iter().map(|(id, _)| *id).collect();
            if chunk.iter().any(|id| *id != PAD_TOKEN) {
                chunks.push(chunk);
            }
            start = end;
        }

        chunks
    }
}

/// Surround a chunk with the pad id
pub fn pad(chunk: &[i64]) -> Vec<i64> {
    let mut padded = Vec::with_capacity(chunk.len() + 2);
    padded.push(PAD_TOKEN);
    padded.extend_from_slice(chunk);
    padded.push(PAD_TOKEN);
    padded
}
