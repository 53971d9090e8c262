//! Conversion between wire images ([`ImageMsg`]) and packed frames
//! ([`Image`]).

use mapbridge_types::{BridgeError, Header, Image, ImageMsg};

pub const MONO8: &str = "mono8";
pub const BGR8: &str = "bgr8";
pub const RGB8: &str = "rgb8";
pub const BGRA8: &str = "bgra8";

/// Pure image transport conversion.
pub trait ImageCodec: Send + Sync {
    /// Turn a wire image into a packed frame.
    fn decode(&self, wire: &ImageMsg) -> Result<Image, BridgeError>;

    /// Turn a packed frame into a wire image stamped with `header`.
    ///
    /// Single-channel frames encode as grayscale, multi-channel frames as
    /// colour.
    fn encode(&self, image: &Image, header: Header) -> Result<ImageMsg, BridgeError>;
}

/// Uncompressed codec for 8-bit encodings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

fn channels_for(encoding: &str) -> Option<u8> {
    match encoding {
        MONO8 => Some(1),
        BGR8 | RGB8 => Some(3),
        BGRA8 => Some(4),
        _ => None,
    }
}

impl ImageCodec for RawCodec {
    fn decode(&self, wire: &ImageMsg) -> Result<Image, BridgeError> {
        let channels = channels_for(&wire.encoding)
            .ok_or_else(|| BridgeError::Decode(format!("unsupported encoding '{}'", wire.encoding)))?;

        let row_len = wire.width as usize * channels as usize;
        let step = wire.step as usize;
        if step < row_len {
            return Err(BridgeError::Decode(format!(
                "step {step} is shorter than a {row_len}-byte row"
            )));
        }
        let needed = step * wire.height as usize;
        if wire.data.len() < needed {
            return Err(BridgeError::Decode(format!(
                "payload holds {} bytes, {}x{} {} needs {needed}",
                wire.data.len(),
                wire.width,
                wire.height,
                wire.encoding
            )));
        }

        let mut data = Vec::with_capacity(row_len * wire.height as usize);
        for row in wire.data.chunks(step.max(1)).take(wire.height as usize) {
            data.extend_from_slice(&row[..row_len]);
        }
        if wire.encoding == RGB8 {
            for pixel in data.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
        }

        Ok(Image::new(wire.width, wire.height, channels, data))
    }

    fn encode(&self, image: &Image, header: Header) -> Result<ImageMsg, BridgeError> {
        let encoding = match image.channels {
            1 => MONO8,
            3 => BGR8,
            4 => BGRA8,
            n => return Err(BridgeError::Encode(format!("cannot encode {n}-channel image"))),
        };
        if image.data.len() != image.expected_len() {
            return Err(BridgeError::Encode(format!(
                "{}x{}x{} image holds {} bytes, expected {}",
                image.width,
                image.height,
                image.channels,
                image.data.len(),
                image.expected_len()
            )));
        }

        Ok(ImageMsg {
            header,
            height: image.height,
            width: image.width,
            encoding: encoding.to_string(),
            step: image.width * u32::from(image.channels),
            data: image.data.clone(),
        })
    }
}
