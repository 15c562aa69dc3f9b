use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tracing::{debug, trace};

use crate::common::errors::StreamError;
use crate::container::ebml::{self, CLUSTER_ID_BYTES, ElementKind, ids};
use crate::container::header::{ContainerHeader, HeaderBuilder};

/// Whether incoming bytes are header elements or data-phase blocks.
/// Moves forward exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    ReadingHead,
    ReadingData,
}

/// Frame emission policy after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Emit every audio frame from the cue point onward.
    Normal,
    /// Drop frames until the exact target timestamp is reached.
    Precise,
}

/// Push-based WebM decoder with seek support.
///
/// Bytes arrive in arbitrarily-sized writes; element boundaries may span
/// writes. Before each element the cursor is checkpointed and rolled back
/// if the full field or payload has not arrived yet, so a short write
/// leaves the machine exactly where the next write can resume it.
pub struct WebmSeeker {
    buf: Vec<u8>,
    /// Absolute stream offset of `buf[0]`.
    base_offset: u64,
    state: ParserState,
    builder: Option<HeaderBuilder>,
    header: Option<ContainerHeader>,
    /// Open master elements: id plus absolute end offset (None = unknown size).
    masters: Vec<(u32, Option<u64>)>,
    mode: SeekMode,
    /// Absolute target in ms while precise filtering is pending.
    pending_target_ms: Option<u64>,
    /// Remainder below the 10 s cue granularity, kept for fine positioning.
    time_left_ms: u64,
    cluster_timecode: u64,
}

impl WebmSeeker {
    pub fn new(mode: SeekMode) -> Self {
        Self {
            buf: Vec::with_capacity(64 * 1024),
            base_offset: 0,
            state: ParserState::ReadingHead,
            builder: Some(HeaderBuilder::default()),
            header: None,
            masters: Vec::new(),
            mode,
            pending_target_ms: None,
            time_left_ms: 0,
            cluster_timecode: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn head_complete(&self) -> bool {
        self.header.is_some()
    }

    pub fn header(&self) -> Option<&ContainerHeader> {
        self.header.as_ref()
    }

    /// Remainder in milliseconds left over by the last `seek()` truncation.
    pub fn time_left_ms(&self) -> u64 {
        self.time_left_ms
    }

    /// Scans a raw byte range for the first Cluster ID pattern, the resync
    /// point when seeking into unparsed data. Absence means the fetched
    /// range missed a cluster boundary and the caller must widen it.
    pub fn closest_cluster_offset(buf: &[u8]) -> Result<usize, StreamError> {
        buf.windows(CLUSTER_ID_BYTES.len())
            .position(|w| w == CLUSTER_ID_BYTES)
            .ok_or_else(|| StreamError::ContainerParse("no cluster boundary in range".into()))
    }

    /// Translates a playback time into the byte offset of its cue point.
    ///
    /// Time is truncated down to the 10-second cue granularity; the
    /// remainder is retained as `time_left` for precise-mode refinement.
    pub fn seek(&mut self, target_secs: u64) -> Result<u64, StreamError> {
        let header = self
            .header
            .as_ref()
            .ok_or_else(|| StreamError::ContainerParse("cues missing".into()))?;
        if header.cues.is_empty() {
            return Err(StreamError::ContainerParse("cues missing".into()));
        }

        let truncated_ms = (target_secs - target_secs % 10) * 1000;
        let time_left = (target_secs % 10) * 1000;

        let position = header
            .cues
            .position_at(truncated_ms)
            .ok_or_else(|| StreamError::ContainerParse("cue not found".into()))?;

        self.time_left_ms = time_left;
        if self.mode == SeekMode::Precise {
            self.pending_target_ms = Some(truncated_ms + time_left);
        }
        debug!(
            "seek {}s -> cue at {}ms, byte {}, {}ms to refine",
            target_secs, truncated_ms, position, time_left
        );
        Ok(position)
    }

    /// Repositions the machine at an absolute stream offset for the data
    /// phase, discarding any buffered bytes. The head model is kept.
    pub fn begin_data_at(&mut self, abs_offset: u64) {
        self.buf.clear();
        self.base_offset = abs_offset;
        self.masters.clear();
        self.state = ParserState::ReadingData;
        self.cluster_timecode = 0;
    }

    /// Explicit "head complete" signal for sources that deliver the head
    /// separately from the data stream.
    pub fn mark_head_complete(&mut self) -> Result<(), StreamError> {
        if self.state == ParserState::ReadingData {
            return Ok(());
        }
        self.finish_head()
    }

    fn finish_head(&mut self) -> Result<(), StreamError> {
        let builder = self
            .builder
            .take()
            .ok_or_else(|| StreamError::ContainerParse("head already sealed".into()))?;
        self.header = Some(builder.finish()?);
        self.state = ParserState::ReadingData;
        debug!("container head complete");
        Ok(())
    }

    /// Consumes one write, returning any audio frames it completed.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, StreamError> {
        self.buf.extend_from_slice(data);

        let mut out = Vec::new();
        let mut cursor = 0usize;

        loop {
            self.close_finished_masters(cursor);

            let checkpoint = cursor;
            let Some((id, id_len)) = ebml::read_id(&self.buf[cursor..])? else {
                break;
            };
            cursor += id_len;

            let Some((size, size_len)) = ebml::read_size(&self.buf[cursor..])? else {
                cursor = checkpoint;
                break;
            };
            cursor += size_len;

            // The first Cluster marks the end of the head. The cluster's
            // own header is consumed as a normal master element below.
            if self.state == ParserState::ReadingHead && id == ids::CLUSTER {
                self.finish_head()?;
            }

            if ebml::kind_of(id) == ElementKind::Master {
                // An unknown-size cluster has no end offset; it is closed
                // by the next cluster's arrival.
                if id == ids::CLUSTER && matches!(self.masters.last(), Some((ids::CLUSTER, None))) {
                    self.masters.pop();
                }
                let end = if size == u64::MAX {
                    None
                } else {
                    Some(self.base_offset + cursor as u64 + size)
                };
                self.masters.push((id, end));
                if let Some(builder) = self.builder.as_mut() {
                    builder.master_started(id);
                }
                trace!("master {:#x} open (end={:?})", id, end);
                continue;
            }

            if size == u64::MAX {
                return Err(StreamError::ContainerParse(format!(
                    "leaf element {:#x} with unknown size",
                    id
                )));
            }
            let size = size as usize;
            if self.buf.len() - cursor < size {
                // Payload not fully buffered: roll back to the element
                // start and resume on the next write.
                cursor = checkpoint;
                break;
            }

            match self.state {
                ParserState::ReadingHead => {
                    if let Some(builder) = self.builder.as_mut() {
                        builder.leaf(id, &self.buf[cursor..cursor + size]);
                    }
                }
                ParserState::ReadingData => match id {
                    ids::TIMECODE => {
                        self.cluster_timecode = ebml::parse_uint(&self.buf[cursor..cursor + size]);
                    }
                    ids::SIMPLE_BLOCK => {
                        // Copied out so the block handler can update seek state.
                        let block = self.buf[cursor..cursor + size].to_vec();
                        if let Some(frame) = self.simple_block_frame(&block) {
                            out.push(frame);
                        }
                    }
                    _ => {}
                },
            }
            cursor += size;
        }

        self.buf.drain(..cursor);
        self.base_offset += cursor as u64;
        Ok(out)
    }

    #[cfg(test)]
    fn open_master_count(&self) -> usize {
        self.masters.len()
    }

    /// Pops master elements whose payload the cursor has moved past,
    /// notifying the header builder during the head phase.
    fn close_finished_masters(&mut self, cursor: usize) {
        let abs = self.base_offset + cursor as u64;
        while let Some(&(id, Some(end))) = self.masters.last() {
            if abs < end {
                break;
            }
            self.masters.pop();
            if let Some(builder) = self.builder.as_mut() {
                builder.master_ended(id);
            }
        }
    }

    /// Extracts the frame payload from a SimpleBlock if it belongs to the
    /// audio track, honoring a pending precise-seek target.
    fn simple_block_frame(&mut self, block: &[u8]) -> Option<Bytes> {
        if block.len() < 4 {
            return None;
        }

        let header = self.header.as_ref()?;
        let audio_track = header.tracks.audio_track()?.number;
        let track = (block[0] & 0x0F) as u64;
        if track != audio_track {
            return None;
        }

        let relative = BigEndian::read_i16(&block[1..3]);
        let block_ms = header
            .timecode_to_ms(self.cluster_timecode)
            .saturating_add_signed(relative as i64);

        if let Some(target) = self.pending_target_ms {
            if block_ms < target {
                trace!("precise seek: dropping frame at {}ms < {}ms", block_ms, target);
                return None;
            }
            self.pending_target_ms = None;
        }

        // Frame bytes follow the 4-byte SimpleBlock prefix.
        Some(Bytes::copy_from_slice(&block[4..]))
    }
}
