//! QR code scanning over a live video stream.
//!
//! The decode loop samples one frame per display tick, hands it to a
//! [`QrDecoder`] and reports the first payload it sees. Payloads are
//! forwarded untouched; interpreting them is the redemption client's job.

mod decode_loop;
mod decoder;

pub use decode_loop::{DecodeLoop, FrameSource, ScanHandle, ScanOutcome};
#[cfg(feature = "qr")]
pub use decoder::RqrrDecoder;
pub use decoder::{FnDecoder, QrDecoder};
