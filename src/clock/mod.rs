//! Client-side token countdown.
//!
//! The backend owns token validity. The clock here only mirrors the
//! time-to-live so the dashboard can show how long a code stays up and
//! clear it once it lapses.

mod countdown;

pub use countdown::{format_remaining, ClockEvent, TokenClock};
