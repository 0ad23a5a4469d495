use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Unsupported channel layout: {0}")]
    UnsupportedLayout(String),
    #[error("WAV decode error: {0}")]
    Wav(String),
    #[error("FLAC decode error: {0}")]
    Flac(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw decoded audio: interleaving already undone, samples normalized to [-1, 1].
#[derive(Debug)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f64>>,
}

/// Sanity cap on channel count. Anything above this is almost certainly
/// a corrupt header rather than a real recording.
const MAX_CHANNELS: usize = 16;

/// Decode an audio file by extension: hound for WAV, claxon for FLAC.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "wav" => decode_wav(path),
        "flac" => decode_flac(path),
        other => Err(DecodeError::UnsupportedFormat(other.to_string())),
    }
}

fn check_layout(channels: usize) -> Result<(), DecodeError> {
    if channels == 0 {
        return Err(DecodeError::UnsupportedLayout("zero channels".into()));
    }
    if channels > MAX_CHANNELS {
        return Err(DecodeError::UnsupportedLayout(format!(
            "{channels} channels (max {MAX_CHANNELS})"
        )));
    }
    Ok(())
}

fn decode_wav(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let n_channels = spec.channels as usize;
    check_layout(n_channels)?;

    let mut channels: Vec<Vec<f64>> = vec![Vec::new(); n_channels];

    match spec.sample_format {
        hound::SampleFormat::Float => {
            for (i, sample) in reader.samples::<f32>().enumerate() {
                let s = sample.map_err(wav_error)?;
                channels[i % n_channels].push(s as f64);
            }
        }
        hound::SampleFormat::Int => {
            // Full-scale for N-bit PCM is 2^(N-1)
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f64;
            for (i, sample) in reader.samples::<i32>().enumerate() {
                let s = sample.map_err(wav_error)?;
                channels[i % n_channels].push(s as f64 * scale);
            }
        }
    }

    Ok(DecodedAudio {
        sample_rate: spec.sample_rate,
        channels,
    })
}

fn decode_flac(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let mut reader = claxon::FlacReader::open(path).map_err(flac_error)?;
    let streaminfo = reader.streaminfo();
    let n_channels = streaminfo.channels as usize;
    check_layout(n_channels)?;

    let scale = 1.0 / (1i64 << (streaminfo.bits_per_sample - 1)) as f64;
    let mut channels: Vec<Vec<f64>> = vec![Vec::new(); n_channels];

    let mut blocks = reader.blocks();
    let mut buffer = Vec::new();
    loop {
        match blocks.read_next_or_eof(buffer) {
            Ok(Some(block)) => {
                for (ch, out) in channels.iter_mut().enumerate() {
                    out.extend(block.channel(ch as u32).iter().map(|&s| s as f64 * scale));
                }
                buffer = block.into_buffer();
            }
            Ok(None) => break,
            Err(e) => return Err(flac_error(e)),
        }
    }

    Ok(DecodedAudio {
        sample_rate: streaminfo.sample_rate,
        channels,
    })
}

fn wav_error(e: hound::Error) -> DecodeError {
    match e {
        hound::Error::IoError(io) => DecodeError::Io(io),
        other => DecodeError::Wav(other.to_string()),
    }
}

fn flac_error(e: claxon::Error) -> DecodeError {
    match e {
        claxon::Error::IoError(io) => DecodeError::Io(io),
        other => DecodeError::Flac(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_wav(name: &str, spec: hound::WavSpec, frames: &[Vec<i16>]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("acoustat_decode_{}_{}", std::process::id(), name));
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for frame in frames {
            for &s in frame {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_decode_stereo_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let frames: Vec<Vec<i16>> = (0..100).map(|i| vec![i as i16 * 100, -(i as i16) * 100]).collect();
        let path = temp_wav("stereo.wav", spec, &frames);

        let decoded = decode_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels.len(), 2);
        assert_eq!(decoded.channels[0].len(), 100);
        assert_eq!(decoded.channels[1].len(), 100);
        // De-interleaving: channel 0 positive ramp, channel 1 negative
        assert!(decoded.channels[0][50] > 0.0);
        assert!(decoded.channels[1][50] < 0.0);
        // 16-bit normalization keeps everything inside [-1, 1]
        assert!(decoded.channels[0].iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = decode_file(Path::new("recording.mp3")).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(ref e) if e == "mp3"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = decode_file(Path::new("/nonexistent/acoustat_missing.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
