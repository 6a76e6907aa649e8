use crate::common::assert_error_traits;
use crate::source::{FrameReader, ReadError};
use crate::Source;
use hound::{SampleFormat, WavSpec};
use std::io::{self, Write};
use std::path;
use std::sync::Arc;

/// Frames pulled from the source per read.
const CHUNK_FRAMES: usize = 4096;

/// Occurs when a source could not be saved as WAV.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ToWavError {
    /// The output file could not be created.
    #[error("Opening file for writing")]
    OpenFile(#[source] Arc<std::io::Error>),
    /// The WAV header could not be written.
    #[error("Could not create wav writer")]
    Creating(#[source] Arc<hound::Error>),
    /// The source failed while being drained.
    #[error("Failed to read from the source")]
    Reading(#[source] ReadError),
    /// A sample could not be written.
    #[error("Failed to write samples writer")]
    Writing(#[source] Arc<hound::Error>),
    /// The WAV header could not be updated with the final length.
    #[error("Failed to update the wav header")]
    Finishing(#[source] Arc<hound::Error>),
    /// Buffered bytes could not be flushed.
    #[error("Failed to flush all bytes to writer")]
    Flushing(#[source] Arc<std::io::Error>),
}
assert_error_traits!(ToWavError);

/// Saves a source's output into a wav file as 16-bit PCM. This function is intended primarily
/// for testing and diagnostics: it shows what a pipeline produces without an audio device.
///
/// If the file already exists it will be overwritten.
///
/// # Note
/// This is a convenience wrapper around `wav_to_writer`
pub fn wav_to_file(
    source: impl Source,
    wav_file: impl AsRef<path::Path>,
) -> Result<(), ToWavError> {
    let mut file = std::fs::File::create(wav_file)
        .map_err(Arc::new)
        .map_err(ToWavError::OpenFile)?;
    wav_to_writer(source, &mut file)
}

/// Drains a source into a writer as 16-bit PCM WAV.
///
/// # Example
/// ```rust
/// use sincstretch::buffer::SamplesBuffer;
/// use sincstretch::wav_to_writer;
///
/// let source = SamplesBuffer::new(1, 8000, vec![0i16, 1, 2, 3, 4]);
/// let mut writer = std::io::Cursor::new(Vec::new());
/// wav_to_writer(source, &mut writer)?;
/// let wav_bytes: Vec<u8> = writer.into_inner();
/// assert_eq!(wav_bytes.len(), 44 + 5 * 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn wav_to_writer(
    mut source: impl Source,
    writer: &mut (impl io::Write + io::Seek),
) -> Result<(), ToWavError> {
    let format = WavSpec {
        channels: source.channels(),
        sample_rate: source.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = io::BufWriter::new(writer);
    {
        let mut writer = hound::WavWriter::new(&mut writer, format)
            .map_err(Arc::new)
            .map_err(ToWavError::Creating)?;
        let mut reader = FrameReader::new();
        let mut buf = vec![0; CHUNK_FRAMES * source.channels() as usize];
        loop {
            let frames = reader
                .read(&mut source, &mut buf)
                .map_err(ToWavError::Reading)?;
            if frames == 0 {
                break;
            }
            for &sample in &buf[..frames * source.channels() as usize] {
                writer
                    .write_sample(sample)
                    .map_err(Arc::new)
                    .map_err(ToWavError::Writing)?;
            }
        }
        writer
            .finalize()
            .map_err(Arc::new)
            .map_err(ToWavError::Finishing)?;
    }
    writer
        .flush()
        .map_err(Arc::new)
        .map_err(ToWavError::Flushing)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::wav_to_file;
    use crate::buffer::SamplesBuffer;
    use crate::source::SineWave;
    use crate::Source;
    use std::io::BufReader;

    #[test]
    fn test_wav_to_file() {
        let make_source = || {
            let mut tone = SineWave::new(22050, 745.0).with_amplitude(0.1);
            let mut samples = vec![0i16; 22050];
            tone.read(&mut samples).unwrap();
            SamplesBuffer::new(1, 22050, samples).speed_change(1.5)
        };
        std::fs::create_dir_all("target/tmp").expect("temp dir can be created");
        let wav_file_path = "target/tmp/save-to-wav-test.wav";
        wav_to_file(make_source(), wav_file_path).expect("output file can be written");

        let file = std::fs::File::open(wav_file_path).expect("output file can be opened");
        let mut reader =
            hound::WavReader::new(BufReader::new(file)).expect("wav file can be read back");
        let mut reference = make_source();
        assert_eq!(reference.sample_rate(), reader.spec().sample_rate);
        assert_eq!(reference.channels(), reader.spec().channels);

        let actual_samples: Vec<i16> = reader.samples::<i16>().map(|x| x.unwrap()).collect();
        let mut expected_samples = Vec::new();
        let mut buf = [0i16; 1000];
        loop {
            let read = reference.read(&mut buf).unwrap();
            if read == 0 {
                break;
            }
            expected_samples.extend_from_slice(&buf[..read]);
        }
        assert_eq!(actual_samples, expected_samples);
    }
}
