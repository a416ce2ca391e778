//! Animated image encoding for sampled capture frames.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use loopdraw_common::clock::Millis;
use loopdraw_common::error::{LoopdrawError, LoopdrawResult};

/// One sampled frame of a GIF capture.
#[derive(Debug, Clone)]
pub struct GifFrame {
    /// Flattened, scaled frame pixels.
    pub image: RgbaImage,

    /// Session-clock time the frame was sampled at.
    pub captured_at_ms: Millis,
}

impl GifFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Turns an ordered frame sequence into an animated image.
pub trait AnimationEncoder: Send {
    /// Encode `frames`, each shown for `delay_ms`, looping forever.
    fn encode(&mut self, frames: &[GifFrame], delay_ms: u32) -> LoopdrawResult<Vec<u8>>;

    /// Encoder name for logging.
    fn name(&self) -> &str;
}

/// GIF encoder backed by the `image` crate.
#[derive(Debug, Clone)]
pub struct GifAnimationEncoder {
    /// Quantization speed, 1 (best) to 30 (fastest).
    speed: i32,
}

impl GifAnimationEncoder {
    pub fn new(speed: i32) -> Self {
        Self {
            speed: speed.clamp(1, 30),
        }
    }
}

impl Default for GifAnimationEncoder {
    fn default() -> Self {
        Self::new(10)
    }
}

impl AnimationEncoder for GifAnimationEncoder {
    fn encode(&mut self, frames: &[GifFrame], delay_ms: u32) -> LoopdrawResult<Vec<u8>> {
        if frames.is_empty() {
            return Err(LoopdrawError::encode("No frames to encode"));
        }

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.speed);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| LoopdrawError::encode(format!("Failed to set GIF repeat: {e}")))?;
            let delay = Delay::from_numer_denom_ms(delay_ms, 1);
            encoder
                .encode_frames(
                    frames
                        .iter()
                        .map(|f| Frame::from_parts(f.image.clone(), 0, 0, delay)),
                )
                .map_err(|e| LoopdrawError::encode(format!("Failed to encode GIF: {e}")))?;
            // Dropping the encoder writes the GIF trailer.
        }

        tracing::debug!(frames = frames.len(), bytes = bytes.len(), "GIF encoded");
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "gif"
    }
}
