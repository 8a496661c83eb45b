//! WAV encoding for upload and decoding of recorded files.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use rmai_types::error::TranscriptionError;

/// Encode mono f32 samples as 16-bit PCM WAV bytes.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, TranscriptionError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(samples.len() * 2 + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| TranscriptionError::Audio(format!("wav header: {e}")))?;
        for &s in samples {
            let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| TranscriptionError::Audio(format!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| TranscriptionError::Audio(format!("wav finalize: {e}")))?;
    }
    Ok(cursor.into_inner())
}

/// Read a WAV file as mono f32 samples, averaging channels.
///
/// Returns the samples and the file's sample rate.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), TranscriptionError> {
    let reader = WavReader::open(path)
        .map_err(|e| TranscriptionError::Audio(format!("open {}: {e}", path.display())))?;
    decode(reader)
}

fn decode<R: std::io::Read>(mut reader: WavReader<R>) -> Result<(Vec<f32>, u32), TranscriptionError> {
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| TranscriptionError::Audio(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| TranscriptionError::Audio(e.to_string()))?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_wav_decodes_back_to_mono() {
        let samples = vec![0.0, 0.5, -0.5, 1.0];
        let bytes = encode_wav(&samples, 16_000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let (decoded, rate) = decode(WavReader::new(Cursor::new(bytes)).unwrap()).unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(decoded.len(), 4);
        assert!((decoded[1] - 0.5).abs() < 1e-3);
        assert!((decoded[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn stereo_is_averaged() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [1.0_f32, 0.0, 0.2, 0.4] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, rate) = read_wav_mono(&path).unwrap();
        assert_eq!(rate, 8_000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_audio_error() {
        let err = read_wav_mono(Path::new("/nonexistent/x.wav")).unwrap_err();
        assert!(matches!(err, TranscriptionError::Audio(_)));
    }
}
