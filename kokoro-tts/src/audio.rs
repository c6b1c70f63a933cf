//! Synthesized audio and its host-facing tensor form

use crate::error::TtsError;
use ndarray::Array3;
use std::path::Path;

/// Mono samples straight from the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioResult {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Reshape into a `(1, 1, N)` tensor
    pub fn into_tensor(self) -> Result<AudioTensor, TtsError> {
        let n = self.samples.len();
        let waveform = Array3::from_shape_vec((1, 1, n), self.samples)
            .map_err(|e| TtsError::Engine(format!("Failed to shape audio tensor: {}", e)))?;

        Ok(AudioTensor {
            waveform,
            sample_rate: self.sample_rate,
        })
    }

    /// Write a 32-bit float mono WAV file
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<(), TtsError> {
        let path = path.as_ref();
        let mut writer =
            hound::WavWriter::create(path, wav_spec(self.sample_rate)).map_err(wav_error)?;

        write_samples(&mut writer, &self.samples)?;
        writer.finalize().map_err(wav_error)?;
        Ok(())
    }
}

/// `(batch, channel, samples)` waveform with its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTensor {
    pub waveform: Array3<f32>,
    pub sample_rate: u32,
}

impl AudioTensor {
    pub fn shape(&self) -> (usize, usize, usize) {
        self.waveform.dim()
    }

    pub fn num_samples(&self) -> usize {
        self.waveform.shape()[2]
    }

    /// Flatten back into an [`AudioResult`]
    pub fn to_audio(&self) -> AudioResult {
        AudioResult::new(self.waveform.iter().copied().collect(), self.sample_rate)
    }
}

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    }
}

fn write_samples<W>(writer: &mut hound::WavWriter<W>, samples: &[f32]) -> Result<(), TtsError>
where
    W: std::io::Write + std::io::Seek,
{
    for sample in samples {
        writer.write_sample(*sample).map_err(wav_error)?;
    }
    Ok(())
}

fn wav_error(err: hound::Error) -> TtsError {
    match err {
        hound::Error::IoError(e) => TtsError::Io(e),
        other => TtsError::Io(std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
    }
}
