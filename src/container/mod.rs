pub mod ebml;
pub mod header;
pub mod seeker;

pub use header::{ContainerHeader, CueIndex, TrackEntry, TrackKind, TrackTable};
pub use seeker::{ParserState, SeekMode, WebmSeeker};
