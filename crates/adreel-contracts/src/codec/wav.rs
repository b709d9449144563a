use super::CodecError;

pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 16-bit mono at 24 kHz, the format returned by the speech capability.
    pub const SPEECH: Self = Self {
        sample_rate: 24_000,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn block_align(&self) -> Result<u16, CodecError> {
        self.channels
            .checked_mul(self.bits_per_sample / 8)
            .ok_or(CodecError::InvalidPcmFormat(*self))
    }

    pub fn byte_rate(&self) -> Result<u32, CodecError> {
        self.sample_rate
            .checked_mul(u32::from(self.block_align()?))
            .ok_or(CodecError::InvalidPcmFormat(*self))
    }
}

/// Canonical RIFF/WAVE header for `data_len` bytes of PCM.
fn wav_header(data_len: u32, format: PcmFormat) -> Result<[u8; WAV_HEADER_LEN], CodecError> {
    let riff_len = data_len
        .checked_add(36)
        .ok_or(CodecError::PcmTooLarge(data_len as usize))?;
    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate()?.to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align()?.to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    Ok(header)
}

pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, CodecError> {
    let data_len = u32::try_from(pcm.len()).map_err(|_| CodecError::PcmTooLarge(pcm.len()))?;
    let header = wav_header(data_len, format)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(pcm);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn read_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn container_length_and_size_fields_track_payload() -> anyhow::Result<()> {
        let pcm = vec![7u8; 4_800];
        let wav = pcm_to_wav(&pcm, PcmFormat::SPEECH)?;

        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(read_u32(&wav, 4), 36 + pcm.len() as u32);
        assert_eq!(read_u32(&wav, 40), pcm.len() as u32);
        assert_eq!(read_u16(&wav, 20), 1);
        assert_eq!(&wav[44..], pcm.as_slice());
        Ok(())
    }

    #[test]
    fn header_fields_sit_at_canonical_offsets() -> anyhow::Result<()> {
        let header = wav_header(10, PcmFormat::SPEECH)?;
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(read_u32(&header, 16), 16);
        assert_eq!(read_u16(&header, 22), 1);
        assert_eq!(read_u32(&header, 24), 24_000);
        assert_eq!(read_u32(&header, 28), 48_000);
        assert_eq!(read_u16(&header, 32), 2);
        assert_eq!(read_u16(&header, 34), 16);
        assert_eq!(&header[36..40], b"data");
        Ok(())
    }

    #[test]
    fn stereo_format_derives_rate_and_alignment() -> anyhow::Result<()> {
        let format = PcmFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
        };
        assert_eq!(format.block_align()?, 4);
        assert_eq!(format.byte_rate()?, 176_400);
        Ok(())
    }

    #[test]
    fn size_fields_that_overflow_are_rejected() {
        let oversized = wav_header(u32::MAX - 35, PcmFormat::SPEECH);
        assert!(matches!(oversized, Err(CodecError::PcmTooLarge(_))));

        let wide = PcmFormat {
            sample_rate: u32::MAX,
            channels: 8,
            bits_per_sample: 32,
        };
        assert!(matches!(
            pcm_to_wav(&[0u8; 4], wide),
            Err(CodecError::InvalidPcmFormat(_))
        ));
        let too_many_channels = PcmFormat {
            sample_rate: 8_000,
            channels: u16::MAX,
            bits_per_sample: 16,
        };
        assert!(matches!(
            too_many_channels.block_align(),
            Err(CodecError::InvalidPcmFormat(_))
        ));
    }

    #[test]
    fn empty_payload_still_yields_valid_header() -> anyhow::Result<()> {
        let wav = pcm_to_wav(&[], PcmFormat::SPEECH)?;
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(read_u32(&wav, 4), 36);
        assert_eq!(read_u32(&wav, 40), 0);
        Ok(())
    }
}
