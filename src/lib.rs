//! wavepipe: resolves signature-protected streaming URLs from third-party
//! media services and reassembles their segmented or range-addressed
//! transport into one continuous, seekable audio byte stream.
//!
//! The moving parts, leaf to root:
//! - [`timer::Timer`]: the sole scheduling primitive.
//! - [`cipher`]: replays a player script's obfuscated signature transform.
//! - [`container`]: incremental WebM/EBML decoding with cue-index seeks.
//! - [`manifest`]: DASH-like and HLS-like manifest text parsing.
//! - [`stream`]: the four session variants stitching it all together
//!   over the [`transport`] seam.

pub mod cipher;
pub mod common;
pub mod config;
pub mod container;
pub mod manifest;
pub mod stream;
pub mod timer;
pub mod transport;

pub use common::errors::StreamError;
pub use config::{Config, StreamConfig};
pub use stream::{SessionContext, StreamEvent, StreamKind, StreamSession};
pub use timer::Timer;
