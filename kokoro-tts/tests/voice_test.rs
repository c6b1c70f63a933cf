//! Tests for NPZ voice tables and speaker selection

use kokoro_core::{Catalog, Error as CoreError, KokoroConfig, ModelSpec};
use kokoro_tts::{AssetProvisioner, TtsError, VoiceHandle, VoiceLoadOptions, VoiceStore, VoiceTable};
use ndarray::{Array2, Array3};
use ndarray_npy::NpzWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const ROWS: usize = 4;
const DIM: usize = 256;

/// Voice whose every value is `value`
fn voice(value: f32) -> Array3<f32> {
    Array3::from_elem((ROWS, 1, DIM), value)
}

fn write_table(path: &Path, voices: &[(&str, f32)]) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    for (name, value) in voices {
        npz.add_array(*name, &voice(*value)).unwrap();
    }
    npz.finish().unwrap();
}

fn model(id: &str) -> ModelSpec {
    let mut model = Catalog::builtin().unwrap().model(id).unwrap().clone();
    model.model_file.url = "https://127.0.0.1:9/model.onnx".to_string();
    model.voices_file.url = "https://127.0.0.1:9/voices.bin".to_string();
    model
}

fn store(dir: &TempDir, model: ModelSpec) -> VoiceStore {
    let config = KokoroConfig::with_asset_dir(dir.path());
    VoiceStore::new(AssetProvisioner::with_model(Arc::new(config), model))
}

#[test]
fn test_table_names_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("voices.bin");
    write_table(&path, &[("af_sarah", 1.0), ("af_bella", 2.0)]);

    let mut table = VoiceTable::open(&path, VoiceLoadOptions::default()).unwrap();
    let mut names = table.names();
    names.sort();
    assert_eq!(names, vec!["af_bella", "af_sarah"]);
    assert!(table.contains("af_sarah"));
    assert!(!table.contains("am_adam"));

    let sarah = table.load("af_sarah").unwrap();
    assert_eq!(sarah.shape(), (ROWS, DIM));
    assert!(sarah.as_slice().iter().all(|v| *v == 1.0));
}

#[test]
fn test_table_accepts_two_dimensional_voices() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("voices.bin");
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("af_sky", &Array2::<f32>::zeros((ROWS, DIM))).unwrap();
    npz.finish().unwrap();

    let mut table = VoiceTable::open(&path, VoiceLoadOptions::default()).unwrap();
    assert_eq!(table.load("af_sky").unwrap().shape(), (ROWS, DIM));
}

#[test]
fn test_table_rejects_wrong_style_dim() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("voices.bin");
    write_table(&path, &[("af_sarah", 1.0)]);

    let options = VoiceLoadOptions {
        style_dim: 128,
        max_rows: None,
    };
    let mut table = VoiceTable::open(&path, options).unwrap();
    assert!(matches!(table.load("af_sarah"), Err(TtsError::Voice(_))));
}

#[test]
fn test_table_rejects_too_many_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("voices.bin");
    write_table(&path, &[("af_sarah", 1.0)]);

    let options = VoiceLoadOptions {
        style_dim: DIM,
        max_rows: Some(ROWS - 1),
    };
    let mut table = VoiceTable::open(&path, options).unwrap();
    assert!(table.load("af_sarah").is_err());
}

#[test]
fn test_open_rejects_non_archive() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("voices.bin");
    std::fs::write(&path, b"not a zip archive").unwrap();

    assert!(matches!(
        VoiceTable::open(&path, VoiceLoadOptions::default()),
        Err(TtsError::Voice(_))
    ));
}

#[tokio::test]
async fn test_deferred_selection_keeps_name() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir, model("kokoro-v1.0"));

    // no voice table on disk and no reachable server: selection must not touch either
    let handle = store.select("af_sarah").await.unwrap();
    assert_eq!(handle, VoiceHandle::Named("af_sarah".to_string()));
}

#[tokio::test]
async fn test_eager_selection_loads_embedding() {
    let temp_dir = TempDir::new().unwrap();
    write_table(&temp_dir.path().join("voices.bin"), &[("af_sarah", 0.5)]);
    let store = store(&temp_dir, model("kokoro-v0.19"));

    match store.select("af_sarah").await.unwrap() {
        VoiceHandle::Embedding(embedding) => {
            assert_eq!(embedding.shape(), (ROWS, DIM));
            assert!(embedding.as_slice().iter().all(|v| *v == 0.5));
        }
        other => panic!("Expected embedding, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_voice_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir, model("kokoro-v1.0"));

    match store.select("xx_nobody").await {
        Err(TtsError::Core(CoreError::UnknownVoice { voice, .. })) => assert_eq!(voice, "xx_nobody"),
        other => panic!("Expected UnknownVoice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_combine_named_voices() {
    let temp_dir = TempDir::new().unwrap();
    write_table(
        &temp_dir.path().join("voices-v1.0.bin"),
        &[("af_sarah", 1.0), ("af_bella", 3.0)],
    );
    let store = store(&temp_dir, model("kokoro-v1.0"));

    let sarah = store.select("af_sarah").await.unwrap();
    let bella = store.select("af_bella").await.unwrap();

    match store.combine(&sarah, &bella, 0.75).await.unwrap() {
        VoiceHandle::Embedding(mixed) => {
            assert!(mixed.as_slice().iter().all(|v| (*v - 1.5).abs() < 1e-6));
        }
        other => panic!("Expected embedding, got {:?}", other),
    }

    assert!(matches!(
        store.combine(&sarah, &bella, 1.01).await,
        Err(TtsError::InvalidWeight(_))
    ));
}
