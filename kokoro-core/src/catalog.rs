//! Versioned model catalog
//!
//! Each Kokoro release ships its own voice set, language list and phoneme
//! vocabulary. Those tables live in `catalog/models.toml` keyed by model
//! identifier instead of being spread across the nodes.

use crate::error::{Error, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../catalog/models.toml");

static BUILTIN: OnceCell<Catalog> = OnceCell::new();

/// How a speaker selection is turned into a voice handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceResolution {
    /// Keep the voice name; the generator resolves it at synthesis time
    Deferred,
    /// Load the style table as soon as the voice is selected
    Eager,
}

/// A remote file the provisioner materializes locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub filename: String,
    pub url: String,
    /// Lowercase hex SHA-256 of the file, if known
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Display name to language code mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    pub code: String,
}

/// Everything the nodes need to know about one model release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub sample_rate: u32,
    pub style_dim: usize,
    pub max_tokens: usize,
    pub default_voice: String,
    pub default_language: String,
    pub voice_resolution: VoiceResolution,
    /// Accept raw language codes in addition to display names
    #[serde(default)]
    pub free_text_language: bool,
    pub voices: Vec<String>,
    pub languages: Vec<Language>,
    pub model_file: AssetSpec,
    pub voices_file: AssetSpec,
    /// Dense vocabulary: a symbol's id is its position in this string
    #[serde(default)]
    pub symbols: Option<String>,
    /// Sparse vocabulary: explicit symbol to id table
    #[serde(default)]
    pub vocab: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub default_model: String,
    pub models: BTreeMap<String, ModelSpec>,
}

impl Catalog {
    /// Catalog compiled into the crate
    pub fn builtin() -> Result<&'static Catalog> {
        BUILTIN.get_or_try_init(|| Catalog::from_toml_str(BUILTIN_CATALOG))
    }

    /// Parse and validate a catalog document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut catalog: Catalog = toml::from_str(content)
            .map_err(|e| Error::Catalog(format!("Failed to parse catalog: {}", e)))?;

        for (id, model) in catalog.models.iter_mut() {
            model.id = id.clone();
        }

        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a TOML file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Look up a model by identifier
    pub fn model(&self, id: &str) -> Result<&ModelSpec> {
        self.models
            .get(id)
            .ok_or_else(|| Error::UnknownModel(id.to_string()))
    }

    /// The model used when the configuration doesn't name one
    pub fn default_model(&self) -> Result<&ModelSpec> {
        self.model(&self.default_model)
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|s| s.as_str())
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::Catalog("Catalog defines no models".to_string()));
        }

        if !self.models.contains_key(&self.default_model) {
            return Err(Error::Catalog(format!(
                "Default model '{}' is not defined",
                self.default_model
            )));
        }

        for model in self.models.values() {
            model.validate()?;
        }

        Ok(())
    }
}

impl ModelSpec {
    fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Catalog(format!("{}: {}", self.id, msg)));

        if self.sample_rate == 0 {
            return fail("sample_rate must be positive".to_string());
        }
        if self.style_dim == 0 {
            return fail("style_dim must be positive".to_string());
        }
        if self.max_tokens == 0 {
            return fail("max_tokens must be positive".to_string());
        }
        if self.voices.is_empty() {
            return fail("no voices listed".to_string());
        }
        if !self.has_voice(&self.default_voice) {
            return fail(format!("default voice '{}' is not listed", self.default_voice));
        }
        if self.languages.is_empty() {
            return fail("no languages listed".to_string());
        }
        if self.language_by_name(&self.default_language).is_none() {
            return fail(format!(
                "default language '{}' is not listed",
                self.default_language
            ));
        }

        match (&self.symbols, self.vocab.is_empty()) {
            (Some(_), false) => return fail("both symbols and vocab are set".to_string()),
            (None, true) => return fail("no vocabulary".to_string()),
            _ => {}
        }

        for key in self.vocab.keys() {
            if key.chars().count() != 1 {
                return fail(format!("vocab key '{}' is not a single symbol", key));
            }
        }

        for asset in [&self.model_file, &self.voices_file] {
            if asset.filename.is_empty() || asset.url.is_empty() {
                return fail("asset filename and url are required".to_string());
            }
        }

        Ok(())
    }

    pub fn has_voice(&self, name: &str) -> bool {
        self.voices.iter().any(|v| v == name)
    }

    pub fn language_by_name(&self, name: &str) -> Option<&Language> {
        self.languages.iter().find(|l| l.name == name)
    }

    pub fn language_names(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.name.clone()).collect()
    }

    /// Resolve a language selection to a phonemizer code.
    ///
    /// Display names always resolve; raw codes are accepted when the model
    /// allows free-text languages or the code is one of the listed ones.
    pub fn resolve_language(&self, selection: &str) -> Result<String> {
        if let Some(lang) = self.language_by_name(selection) {
            return Ok(lang.code.clone());
        }

        let code = selection.trim();
        if self.languages.iter().any(|l| l.code == code) {
            return Ok(code.to_string());
        }

        let well_formed = !code.is_empty()
            && code.len() <= 32
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if self.free_text_language && well_formed {
            return Ok(code.to_string());
        }

        Err(Error::UnknownLanguage {
            model: self.id.clone(),
            language: selection.to_string(),
        })
    }

    /// Symbol to token id table
    pub fn vocabulary(&self) -> HashMap<char, i64> {
        match &self.symbols {
            // later duplicates win, matching how the dense table was built
            Some(symbols) => symbols
                .chars()
                .enumerate()
                .map(|(i, c)| (c, i as i64))
                .collect(),
            None => self
                .vocab
                .iter()
                .filter_map(|(k, v)| k.chars().next().map(|c| (c, *v)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.default_model, "kokoro-v1.0");
        assert!(catalog.model("kokoro-v0.19").is_ok());
    }

    #[test]
    fn test_v1_tables() {
        let model = Catalog::builtin().unwrap().model("kokoro-v1.0").unwrap();
        assert_eq!(model.voices.len(), 54);
        assert_eq!(model.sample_rate, 24000);
        assert_eq!(model.voice_resolution, VoiceResolution::Deferred);
        assert_eq!(model.model_file.filename, "kokoro-v1.0.onnx");
        assert_eq!(model.voices_file.filename, "voices-v1.0.bin");
        assert!(model.has_voice("af_sarah"));
        assert!(model.has_voice("pm_santa"));
        assert_eq!(model.language_names().len(), 7);
    }

    #[test]
    fn test_resolve_language() {
        let model = Catalog::builtin().unwrap().model("kokoro-v1.0").unwrap();
        assert_eq!(model.resolve_language("English").unwrap(), "en-us");
        assert_eq!(model.resolve_language("Mandarin Chinese").unwrap(), "cmn");
        assert_eq!(model.resolve_language("es").unwrap(), "es");
        assert!(model.resolve_language("Klingon").is_err());
        assert!(model.resolve_language("de").is_err());

        let old = Catalog::builtin().unwrap().model("kokoro-v0.19").unwrap();
        assert_eq!(old.resolve_language("de").unwrap(), "de");
        assert!(old.resolve_language("de; rm").is_err());
    }

    #[test]
    fn test_vocabularies_agree_on_shared_symbols() {
        let catalog = Catalog::builtin().unwrap();
        let sparse = catalog.model("kokoro-v1.0").unwrap().vocabulary();
        let dense = catalog.model("kokoro-v0.19").unwrap().vocabulary();

        assert_eq!(sparse[&'a'], 43);
        assert_eq!(dense[&'a'], 43);
        assert_eq!(sparse[&'ˈ'], 156);
        assert_eq!(dense[&'ˈ'], 156);
        assert_eq!(dense[&'$'], 0);
        assert_eq!(sparse[&'\u{0303}'], 17);
    }

    #[test]
    fn test_rejects_missing_default_voice() {
        let broken = BUILTIN_CATALOG.replace(
            "default_voice = \"af_sarah\"\ndefault_language = \"English\"\nvoice_resolution = \"eager\"",
            "default_voice = \"nobody\"\ndefault_language = \"English\"\nvoice_resolution = \"eager\"",
        );
        let err = Catalog::from_toml_str(&broken).unwrap_err();
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn test_rejects_unknown_default_model() {
        let broken = BUILTIN_CATALOG.replace(
            "default_model = \"kokoro-v1.0\"",
            "default_model = \"kokoro-v9\"",
        );
        assert!(matches!(
            Catalog::from_toml_str(&broken),
            Err(Error::Catalog(_))
        ));
    }
}
