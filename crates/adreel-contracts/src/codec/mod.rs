mod encoded_image;
mod wav;

pub use encoded_image::{extension_for_media_type, media_type_for_name, EncodedImage};
pub use wav::{pcm_to_wav, PcmFormat, WAV_HEADER_LEN};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("image payload is empty")]
    EmptyImage,

    #[error("failed reading {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PCM payload of {0} bytes does not fit a WAV container")]
    PcmTooLarge(usize),

    #[error("PCM format {0:?} overflows the WAV rate fields")]
    InvalidPcmFormat(wav::PcmFormat),
}
