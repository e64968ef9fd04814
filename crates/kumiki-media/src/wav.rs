//! Raw PCM to WAV container conversion.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::error::{MediaError, MediaResult};

/// Size of the canonical RIFF/WAVE header written by [`pcm_to_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Format of signed 16-bit little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// Speech output: 24 kHz mono.
    pub const SPEECH: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
    };

    /// Music output: 48 kHz stereo.
    pub const MUSIC: PcmFormat = PcmFormat {
        sample_rate: 48_000,
        channels: 2,
    };

    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * 2
    }

    /// Seconds of audio in `len` bytes of PCM.
    pub fn duration_of(&self, len: usize) -> f64 {
        len as f64 / f64::from(self.bytes_per_second())
    }
}

/// Wrap 16-bit PCM samples in a WAV header.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> MediaResult<Vec<u8>> {
    let data_len = u32::try_from(pcm.len())
        .map_err(|_| MediaError::invalid_argument("PCM payload too large for WAV"))?;
    let block_align = format.channels * 2;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(36 + data_len)?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_u32::<LittleEndian>(16)?;
    out.write_u16::<LittleEndian>(1)?;
    out.write_u16::<LittleEndian>(format.channels)?;
    out.write_u32::<LittleEndian>(format.sample_rate)?;
    out.write_u32::<LittleEndian>(format.bytes_per_second())?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(16)?;
    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(data_len)?;
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Estimated duration of a WAV file of `file_len` bytes in `format`.
pub fn estimate_wav_duration(file_len: u64, format: PcmFormat) -> f64 {
    let data = file_len.saturating_sub(WAV_HEADER_LEN as u64);
    data as f64 / f64::from(format.bytes_per_second())
}
