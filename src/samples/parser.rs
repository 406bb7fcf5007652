// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoders that turn a fetched sample body into a waveform.

use std::io::Cursor;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

/// Error type for the text format.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: '{text}' is not a number")]
    NotANumber { line: usize, text: String },
}

/// Error types for container decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Audio decode error: {0}")]
    AudioError(#[from] SymphoniaError),

    #[error("No audio track found")]
    NoTrack,

    #[error("Sample rate not specified")]
    UnknownSampleRate,

    #[error("Failed to resample from {0}Hz to {1}Hz")]
    ResamplingFailed(u32, u32),

    #[error("Decode task failed: {0}")]
    Interrupted(String),
}

/// Parses a newline-delimited list of numbers, one per line.
///
/// A single trailing newline does not produce a value and a trailing `\r` on a
/// line is ignored. Anything else that is not a number is rejected.
pub async fn parse_text(text: &str) -> Result<Vec<f32>, ParseError> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let value = line.strip_suffix('\r').unwrap_or(line).trim();
            value.parse::<f32>().map_err(|_| ParseError::NotANumber {
                line: idx + 1,
                text: line.to_string(),
            })
        })
        .collect()
}

/// Decodes an audio container into the samples of its first channel at
/// `sample_rate`. Decoding runs on the blocking pool.
pub async fn parse_generic(bytes: Vec<u8>, sample_rate: u32) -> Result<Vec<f32>, DecodeError> {
    tokio::task::spawn_blocking(move || decode_first_channel(bytes, sample_rate))
        .await
        .map_err(|e| DecodeError::Interrupted(e.to_string()))?
}

/// The format reader and decoder live only for the duration of this call.
fn decode_first_channel(bytes: Vec<u8>, sample_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    while let Some(packet) = next_packet(format_reader.as_mut(), track_id, samples.len())? {
        let frames = match decoder.decode(&packet) {
            Ok(decoded) => first_channel(decoded),
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                first_channel(decoder.decode(&packet)?)
            }
            Err(e) => return Err(e.into()),
        };
        samples.extend(frames);
    }

    debug!(
        frames = samples.len(),
        source_rate,
        target_rate = sample_rate,
        "Decoded sample"
    );

    resample(samples, source_rate, sample_rate)
}

/// Reads the next packet belonging to `track_id`. Returns `Ok(None)` at the end
/// of the stream.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    track_id: u32,
    decoded_frames: usize,
) -> Result<Option<Packet>, DecodeError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => return Ok(Some(packet)),
            Ok(_) => continue,
            Err(e) if is_end_of_stream(&e, decoded_frames) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Whether a reader error marks the end of the stream rather than a failure.
fn is_end_of_stream(err: &SymphoniaError, decoded_frames: usize) -> bool {
    match err {
        SymphoniaError::IoError(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
        // Some readers report the end of the stream as a decode error. Before
        // any audio has been decoded it means the container is corrupt.
        SymphoniaError::DecodeError(_) => decoded_frames > 0,
        _ => false,
    }
}

/// Extracts the first channel of a decoded buffer as f32. Other channels are
/// dropped, not mixed down.
fn first_channel(decoded: AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => first_plane(&buf, |sample| sample),
        AudioBufferRef::F64(buf) => first_plane(&buf, |sample: f64| sample.into_sample()),
        AudioBufferRef::S8(buf) => first_plane(&buf, |sample: i8| sample.into_sample()),
        AudioBufferRef::S16(buf) => first_plane(&buf, |sample: i16| sample.into_sample()),
        AudioBufferRef::S24(buf) => first_plane(&buf, |sample| sample.into_sample()),
        AudioBufferRef::S32(buf) => first_plane(&buf, |sample: i32| sample.into_sample()),
        AudioBufferRef::U8(buf) => first_plane(&buf, |sample: u8| sample.into_sample()),
        AudioBufferRef::U16(buf) => first_plane(&buf, |sample: u16| sample.into_sample()),
        AudioBufferRef::U24(buf) => first_plane(&buf, |sample| sample.into_sample()),
        AudioBufferRef::U32(buf) => first_plane(&buf, |sample: u32| sample.into_sample()),
    }
}

fn first_plane<T, F>(buf: &AudioBuffer<T>, convert: F) -> Vec<f32>
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    if buf.spec().channels.count() == 0 {
        return Vec::new();
    }
    buf.chan(0).iter().map(|&sample| convert(sample)).collect()
}

/// Input block size for the sinc resampler.
const RESAMPLE_CHUNK: usize = 1024;

/// Converts a mono signal from `source_rate` to `target_rate` with a
/// band-limited sinc resampler. The output has `ceil(len * ratio)` frames and
/// the resampler's delay removed.
fn resample(
    samples: Vec<f32>,
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, DecodeError> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let failed = || DecodeError::ResamplingFailed(source_rate, target_rate);
    let ratio = target_rate as f64 / source_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1).map_err(|_| failed())?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let next = pos + resampler.input_frames_next();
        let chunk = [&samples[pos..next]];
        let out = resampler.process(&chunk[..], None).map_err(|_| failed())?;
        output.extend_from_slice(&out[0]);
        pos = next;
    }
    if pos < samples.len() {
        let chunk = [&samples[pos..]];
        let out = resampler
            .process_partial(Some(&chunk[..]), None)
            .map_err(|_| failed())?;
        output.extend_from_slice(&out[0]);
    }
    // Flush the filter until the delayed tail is out.
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|_| failed())?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}
