use crate::util::{AssetError, SAMPLE_FORMAT_TAG, SAMPLE_HEADER_LEN};

/// A validated view over a raw sample lump.
///
/// Layout: `[u16 format tag][u16 sample rate][u32 sample count]` (all little
/// endian) followed by `sample count` unsigned 8-bit mono samples. Bytes past
/// the declared count are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample<'a> {
    pub sample_rate: u32,
    pub samples: &'a [u8],
}

impl<'a> RawSample<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, AssetError> {
        if bytes.len() < SAMPLE_HEADER_LEN {
            return Err(AssetError::TruncatedHeader(bytes.len()));
        }
        let tag = u16::from_le_bytes([bytes[0], bytes[1]]);
        if tag != SAMPLE_FORMAT_TAG {
            return Err(AssetError::BadFormatTag(tag));
        }
        let sample_rate = u16::from_le_bytes([bytes[2], bytes[3]]) as u32;
        let declared = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        let available = bytes.len() - SAMPLE_HEADER_LEN;
        if declared > available {
            return Err(AssetError::DeclaredLengthOverflow { declared, available });
        }
        if declared == 0 {
            return Err(AssetError::Empty);
        }
        if sample_rate == 0 {
            return Err(AssetError::BadSampleRate);
        }

        Ok(RawSample {
            sample_rate,
            samples: &bytes[SAMPLE_HEADER_LEN..SAMPLE_HEADER_LEN + declared],
        })
    }
}

/// Decoded sample data at the output device rate, ready for the mixer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmSample {
    pub sample_rate: u32,
    pub data: Vec<u8>,
}

impl PcmSample {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Build a raw sample lump; used by tools and tests that synthesize sounds.
pub fn encode_raw_sample(sample_rate: u16, samples: &[u8]) -> Vec<u8> {
    let mut b = Vec::with_capacity(SAMPLE_HEADER_LEN + samples.len());
    b.extend_from_slice(&SAMPLE_FORMAT_TAG.to_le_bytes());
    b.extend_from_slice(&sample_rate.to_le_bytes());
    b.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    b.extend_from_slice(samples);
    b
}
