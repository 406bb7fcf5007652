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

//! Post-processing applied to every decoded waveform before playback.
//!
//! Buffers handed to playback carry one reserved trailing sample so that
//! interpolation at the last index never reads out of bounds.

/// Number of reserved samples appended after the decoded values.
pub const RESERVED_TAIL: usize = 1;

/// Arithmetic mean of a waveform; zero when empty.
pub fn mean(wave: &[f32]) -> f32 {
    if wave.is_empty() {
        return 0.0;
    }
    let sum: f64 = wave.iter().map(|&s| s as f64).sum();
    (sum / wave.len() as f64) as f32
}

/// Subtracts the mean from every sample. The output is one sample longer than
/// the input and the reserved tail is left at zero.
pub fn center(wave: &[f32]) -> Vec<f32> {
    let mean = mean(wave);
    let mut centered = vec![0.0; wave.len() + RESERVED_TAIL];
    for (out, &sample) in centered.iter_mut().zip(wave) {
        *out = sample - mean;
    }
    centered
}

/// Copies a waveform and appends the reserved zero tail.
pub fn extend(wave: &[f32]) -> Vec<f32> {
    let mut extended = Vec::with_capacity(wave.len() + RESERVED_TAIL);
    extended.extend_from_slice(wave);
    extended.resize(wave.len() + RESERVED_TAIL, 0.0);
    extended
}

/// Exclusive prefix sum: `out[0] == 0` and `out[i] == out[i - 1] + wave[i - 1]`.
/// The output has the same length as the input.
pub fn integral(wave: &[f32]) -> Vec<f32> {
    let mut acc = 0.0f64;
    wave.iter()
        .map(|&sample| {
            let value = acc as f32;
            acc += sample as f64;
            value
        })
        .collect()
}
