use crate::common::errors::StreamError;
use crate::container::ebml::{self, ids};

/// Matroska track types. Only audio is emitted downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
    Other(u64),
}

impl From<u64> for TrackKind {
    fn from(v: u64) -> Self {
        match v {
            1 => Self::Video,
            2 => Self::Audio,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub number: u64,
    pub kind: TrackKind,
    pub codec: String,
}

#[derive(Debug, Clone, Default)]
pub struct TrackTable {
    entries: Vec<TrackEntry>,
}

impl TrackTable {
    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn audio_track(&self) -> Option<&TrackEntry> {
        self.entries.iter().find(|t| t.kind == TrackKind::Audio)
    }
}

/// Ordered `(time_ms, byte_pos)` pairs from the Cues element.
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    points: Vec<(u64, u64)>,
}

impl CueIndex {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(u64, u64)] {
        &self.points
    }

    /// Exact-match lookup of a (truncated) cue time in milliseconds.
    pub fn position_at(&self, time_ms: u64) -> Option<u64> {
        self.points
            .iter()
            .find(|(t, _)| *t == time_ms)
            .map(|(_, pos)| *pos)
    }
}

/// The projected head model: segment info, track table and cue index.
/// Immutable once the head is fully parsed.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub timecode_scale: u64,
    pub duration: Option<f64>,
    pub tracks: TrackTable,
    pub cues: CueIndex,
}

impl ContainerHeader {
    /// Converts a raw timecode into milliseconds using the segment scale.
    pub fn timecode_to_ms(&self, timecode: u64) -> u64 {
        timecode * self.timecode_scale / 1_000_000
    }
}

/// Accumulates head-phase leaf elements into a `ContainerHeader`.
///
/// The seeker drives it: master starts/ends come from the element walk,
/// leaves arrive with their full payload.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    timecode_scale: Option<u64>,
    duration: Option<f64>,
    tracks: Vec<TrackEntry>,
    cues: Vec<(u64, u64)>,

    pending_track: Option<PendingTrack>,
    pending_cue: Option<PendingCue>,
}

#[derive(Debug, Default)]
struct PendingTrack {
    number: Option<u64>,
    kind: Option<u64>,
    codec: Option<String>,
}

#[derive(Debug, Default)]
struct PendingCue {
    time: Option<u64>,
    position: Option<u64>,
}

impl HeaderBuilder {
    pub fn master_started(&mut self, id: u32) {
        match id {
            ids::TRACK_ENTRY => self.pending_track = Some(PendingTrack::default()),
            ids::CUE_POINT => self.pending_cue = Some(PendingCue::default()),
            _ => {}
        }
    }

    pub fn master_ended(&mut self, id: u32) {
        match id {
            ids::TRACK_ENTRY => {
                if let Some(pending) = self.pending_track.take() {
                    if let (Some(number), Some(kind)) = (pending.number, pending.kind) {
                        self.tracks.push(TrackEntry {
                            number,
                            kind: kind.into(),
                            codec: pending.codec.unwrap_or_default(),
                        });
                    }
                }
            }
            ids::CUE_POINT => {
                if let Some(pending) = self.pending_cue.take() {
                    if let (Some(time), Some(pos)) = (pending.time, pending.position) {
                        self.cues.push((time, pos));
                    }
                }
            }
            _ => {}
        }
    }

    pub fn leaf(&mut self, id: u32, payload: &[u8]) {
        match id {
            ids::TIMECODE_SCALE => self.timecode_scale = Some(ebml::parse_uint(payload)),
            ids::DURATION => self.duration = ebml::parse_float(payload),
            ids::TRACK_NUMBER => {
                if let Some(t) = self.pending_track.as_mut() {
                    t.number = Some(ebml::parse_uint(payload));
                }
            }
            ids::TRACK_TYPE => {
                if let Some(t) = self.pending_track.as_mut() {
                    t.kind = Some(ebml::parse_uint(payload));
                }
            }
            ids::CODEC_ID => {
                if let Some(t) = self.pending_track.as_mut() {
                    t.codec = Some(String::from_utf8_lossy(payload).into_owned());
                }
            }
            ids::CUE_TIME => {
                if let Some(c) = self.pending_cue.as_mut() {
                    c.time = Some(ebml::parse_uint(payload));
                }
            }
            ids::CUE_POSITION => {
                if let Some(c) = self.pending_cue.as_mut() {
                    c.position = Some(ebml::parse_uint(payload));
                }
            }
            _ => {}
        }
    }

    /// Seals the head model. Cue times are converted to milliseconds here
    /// so lookups never depend on the segment scale again.
    pub fn finish(mut self) -> Result<ContainerHeader, StreamError> {
        // Flush dangling masters in case the head ended without a size.
        self.master_ended(ids::TRACK_ENTRY);
        self.master_ended(ids::CUE_POINT);

        let timecode_scale = self.timecode_scale.unwrap_or(1_000_000);
        let to_ms = |t: u64| t * timecode_scale / 1_000_000;

        let mut points: Vec<(u64, u64)> = self
            .cues
            .into_iter()
            .map(|(t, p)| (to_ms(t), p))
            .collect();
        points.sort_by_key(|(t, _)| *t);

        if self.tracks.is_empty() {
            return Err(StreamError::ContainerParse("no tracks in head".into()));
        }

        Ok(ContainerHeader {
            timecode_scale,
            duration: self.duration,
            tracks: TrackTable {
                entries: self.tracks,
            },
            cues: CueIndex { points },
        })
    }
}
