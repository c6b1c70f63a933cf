//! Grapheme-to-phoneme conversion

use crate::error::TtsError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Punctuation kept verbatim between phonemized segments
const PRESERVED_PUNCTUATION: &[char] = &[
    ';', ':', ',', '.', '!', '?', '¡', '¿', '—', '…', '"', '«', '»', '“', '”', '(', ')',
];

/// Converts text into the IPA symbol string the tokenizer consumes
#[cfg_attr(test, mockall::automock)]
pub trait Phonemizer: Send + Sync {
    /// `language` is an espeak-style code such as `en-us`
    fn phonemize(&self, text: &str, language: &str) -> Result<String, TtsError>;

    fn name(&self) -> &str;

    fn is_available(&self) -> bool;
}

/// espeak-ng subprocess
#[derive(Debug, Clone)]
pub struct EspeakPhonemizer {
    program: PathBuf,
}

impl EspeakPhonemizer {
    /// Uses the given executable, or `espeak-ng` from PATH
    pub fn new(program: Option<&Path>) -> Self {
        Self {
            program: program
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("espeak-ng")),
        }
    }

    fn run(&self, segment: &str, language: &str) -> Result<String, TtsError> {
        // text goes through stdin so it can never be read as a flag
        let mut child = Command::new(&self.program)
            .args(["-q", "--ipa", "--stdin", "-v", language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TtsError::Phonemizer(format!(
                    "Failed to run {:?}: {}",
                    self.program, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(segment.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(TtsError::Phonemizer(format!(
                "{:?} failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let phonemes = String::from_utf8(output.stdout)
            .map_err(|_| TtsError::Phonemizer("Phonemizer emitted non-UTF-8 output".to_string()))?;

        Ok(phonemes.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl Default for EspeakPhonemizer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Phonemizer for EspeakPhonemizer {
    fn phonemize(&self, text: &str, language: &str) -> Result<String, TtsError> {
        if !is_language_code(language) {
            return Err(TtsError::Phonemizer(format!("Invalid language code '{}'", language)));
        }

        let mut out = String::new();
        for piece in split_punctuation(&sanitize(text)) {
            match piece {
                Piece::Words(words) => {
                    let phonemes = self.run(words, language)?;
                    if !phonemes.is_empty() {
                        if !out.is_empty() && !out.ends_with(' ') {
                            out.push(' ');
                        }
                        out.push_str(&phonemes);
                    }
                }
                Piece::Punct(p) => out.push(p),
            }
        }

        let out = out.trim().to_string();
        debug!("Phonemized {} chars into {} symbols", text.len(), out.chars().count());
        Ok(out)
    }

    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Words(&'a str),
    Punct(char),
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn split_punctuation(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if PRESERVED_PUNCTUATION.contains(&c) {
            let words = text[start..i].trim();
            if !words.is_empty() {
                pieces.push(Piece::Words(words));
            }
            pieces.push(Piece::Punct(c));
            start = i + c.len_utf8();
        }
    }

    let words = text[start..].trim();
    if !words.is_empty() {
        pieces.push(Piece::Words(words));
    }

    pieces
}

fn is_language_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 32
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
