//! Frame decoders.

use crate::capture::Frame;

/// Attempts to find a QR payload in a single frame.
///
/// Returning `None` is normal: most frames contain no readable code.
pub trait QrDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String>;
}

impl<D: QrDecoder + ?Sized> QrDecoder for Box<D> {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        (**self).decode(frame)
    }
}

/// Adapts a closure into a decoder.
pub struct FnDecoder<F>(pub F);

impl<F> QrDecoder for FnDecoder<F>
where
    F: FnMut(&Frame) -> Option<String>,
{
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        (self.0)(frame)
    }
}

/// Pure-Rust QR decoder backed by `rqrr`.
#[cfg(feature = "qr")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

#[cfg(feature = "qr")]
impl QrDecoder for RqrrDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        if !frame.is_valid() {
            return None;
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.luma_at(x, y),
        );
        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
    }
}
