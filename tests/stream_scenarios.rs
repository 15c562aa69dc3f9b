//! End-to-end session scenarios over a scripted transport: range math to
//! a clean end, mid-stream 403 recovery, live precache + manifest
//! refresh, HLS cycling and cue-index seeking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use wavepipe::StreamError;
use wavepipe::cipher::CipherCache;
use wavepipe::common::types::AudioContainer;
use wavepipe::config::StreamConfig;
use wavepipe::container::ebml::{encode_size, ids};
use wavepipe::stream::{SessionContext, StreamEvent, StreamKind, StreamSession};
use wavepipe::transport::{
    BodyStream, FetchOptions, FetchResponse, FormatResolver, ResolvedFormat, StreamResponse,
    Transport,
};

// ---------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct RecordedCall {
    url: String,
    range: Option<(u64, Option<u64>)>,
}

type Responder =
    Box<dyn Fn(&str, &FetchOptions, usize) -> Result<(u16, Bytes), StreamError> + Send + Sync>;

struct MockNet {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
    counter: AtomicUsize,
}

impl MockNet {
    fn new(responder: Responder) -> Arc<Self> {
        Arc::new(Self {
            responder,
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    fn record(&self, url: &str, opts: &FetchOptions) -> usize {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            range: opts.range.map(|r| (r.start, r.end)),
        });
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for MockNet {
    async fn fetch(&self, url: &str, opts: FetchOptions) -> Result<FetchResponse, StreamError> {
        let n = self.record(url, &opts);
        let (status, body) = (self.responder)(url, &opts, n)?;
        Ok(FetchResponse {
            status,
            headers: Default::default(),
            body,
        })
    }

    async fn fetch_stream(
        &self,
        url: &str,
        opts: FetchOptions,
    ) -> Result<StreamResponse, StreamError> {
        let n = self.record(url, &opts);
        let (status, body) = (self.responder)(url, &opts, n)?;
        Ok(StreamResponse {
            status,
            body: Box::new(MockBody::new(body)),
        })
    }
}

struct MockBody {
    chunks: VecDeque<Bytes>,
}

impl MockBody {
    fn new(body: Bytes) -> Self {
        // Deliver in 1 MB pieces so multi-chunk draining is exercised.
        let mut chunks = VecDeque::new();
        let mut rest = body;
        while rest.len() > 1024 * 1024 {
            chunks.push_back(rest.split_to(1024 * 1024));
        }
        if !rest.is_empty() {
            chunks.push_back(rest);
        }
        Self { chunks }
    }
}

#[async_trait]
impl BodyStream for MockBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        Ok(self.chunks.pop_front())
    }

    fn abort(&mut self) {
        self.chunks.clear();
    }
}

struct MockResolver {
    formats: Vec<ResolvedFormat>,
    count: AtomicUsize,
}

impl MockResolver {
    fn new(formats: Vec<ResolvedFormat>) -> Arc<Self> {
        Arc::new(Self {
            formats,
            count: AtomicUsize::new(0),
        })
    }

    fn resolutions(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FormatResolver for MockResolver {
    async fn resolve_format(
        &self,
        _media_url: &str,
        _quality: u32,
    ) -> Result<ResolvedFormat, StreamError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(self.formats[n.min(self.formats.len() - 1)].clone())
    }
}

fn on_demand_format(url: &str, content_length: u64, duration_secs: u64) -> ResolvedFormat {
    ResolvedFormat {
        url: url.to_string(),
        container: AudioContainer::Webm,
        codec: "opus".into(),
        content_length: Some(content_length),
        duration_secs: Some(duration_secs),
        live: false,
        cipher: None,
    }
}

fn session_ctx(
    net: Arc<MockNet>,
    resolver: Arc<MockResolver>,
    config: StreamConfig,
    start_time_secs: Option<u64>,
) -> SessionContext {
    SessionContext {
        media_url: "https://media.example/watch?v=abc123".into(),
        quality: 0,
        start_time_secs,
        config,
        transport: net,
        resolver,
        cipher: Arc::new(CipherCache::new(reqwest::Client::new())),
    }
}

/// Deterministic body content so byte continuity across retries is
/// checkable: byte at absolute offset `i` is `i % 251`.
fn pattern(start: u64, len: u64) -> Bytes {
    (start..start + len).map(|i| (i % 251) as u8).collect()
}

async fn collect_until_terminal(
    rx: &flume::Receiver<StreamEvent>,
    budget: Duration,
) -> (Vec<Bytes>, Option<StreamEvent>) {
    let deadline = tokio::time::Instant::now() + budget;
    let mut data = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, rx.recv_async()).await {
            Ok(Ok(StreamEvent::Data(bytes))) => data.push(bytes),
            Ok(Ok(terminal)) => return (data, Some(terminal)),
            Ok(Err(_)) | Err(_) => return (data, None),
        }
    }
}

// ---------------------------------------------------------------------
// Scenario A: on-demand range math to a clean end
// ---------------------------------------------------------------------

const CONTENT_LENGTH: u64 = 12_000_000;
const DURATION_SECS: u64 = 1_200;

fn ranged_responder(content_length: u64, fail_call: Option<usize>) -> Responder {
    Box::new(move |_url, opts, n| {
        if Some(n) == fail_call {
            return Ok((403, Bytes::new()));
        }
        let range = opts.range.expect("range request expected");
        let end = range.end.unwrap_or(content_length).min(content_length);
        Ok((200, pattern(range.start, end - range.start)))
    })
}

#[tokio::test]
async fn scenario_a_range_requests_cover_content_exactly() {
    let net = MockNet::new(ranged_responder(CONTENT_LENGTH, None));
    let resolver = MockResolver::new(vec![on_demand_format(
        "https://cdn.example/s1",
        CONTENT_LENGTH,
        DURATION_SECS,
    )]);

    let ctx = session_ctx(net.clone(), resolver.clone(), StreamConfig::default(), None);
    let (session, rx) = StreamSession::open(ctx).await.unwrap();
    assert_eq!(session.kind(), StreamKind::RangeFetch);

    let (data, terminal) = collect_until_terminal(&rx, Duration::from_secs(5)).await;
    assert!(matches!(terminal, Some(StreamEvent::End)));

    let total: u64 = data.iter().map(|b| b.len() as u64).sum();
    assert_eq!(total, CONTENT_LENGTH);

    // bytes_per_sec = 12_000_000 / 1200 = 10_000; each request spans
    // 300 * 10_000 bytes, the final one open-ended.
    let calls = net.calls();
    let ranges: Vec<_> = calls.iter().map(|c| c.range.unwrap()).collect();
    assert_eq!(
        ranges,
        vec![
            (0, Some(3_000_000)),
            (3_000_000, Some(6_000_000)),
            (6_000_000, Some(9_000_000)),
            (9_000_000, None),
        ]
    );
    assert_eq!(resolver.resolutions(), 1);
}

// ---------------------------------------------------------------------
// Scenario B: 403 mid-stream, resume at the same offset
// ---------------------------------------------------------------------

#[tokio::test]
async fn scenario_b_403_reresolves_and_resumes_without_gap() {
    // The third transport call answers 403 once.
    let net = MockNet::new(ranged_responder(CONTENT_LENGTH, Some(3)));
    let resolver = MockResolver::new(vec![
        on_demand_format("https://cdn.example/s1", CONTENT_LENGTH, DURATION_SECS),
        on_demand_format("https://cdn.example/s2", CONTENT_LENGTH, DURATION_SECS),
    ]);

    // Shrunk keep-alive so the tick-gated retry happens within the test.
    let config = StreamConfig {
        keepalive_secs: 1,
        ..Default::default()
    };
    let ctx = session_ctx(net.clone(), resolver.clone(), config, None);
    let (_session, rx) = StreamSession::open(ctx).await.unwrap();

    let (data, terminal) = collect_until_terminal(&rx, Duration::from_secs(5)).await;
    assert!(matches!(terminal, Some(StreamEvent::End)));

    // One re-resolution beyond the initial one.
    assert_eq!(resolver.resolutions(), 2);

    let calls = net.calls();
    // Call 3 got the 403; call 4 repeats its exact range on the fresh URL.
    assert_eq!(calls[2].range, Some((6_000_000, Some(9_000_000))));
    assert!(calls[2].url.ends_with("/s1"));
    assert_eq!(calls[3].range, Some((6_000_000, Some(9_000_000))));
    assert!(calls[3].url.ends_with("/s2"));

    // No byte duplicated or skipped: the output is the exact pattern.
    let total: u64 = data.iter().map(|b| b.len() as u64).sum();
    assert_eq!(total, CONTENT_LENGTH);
    let mut offset = 0u64;
    for chunk in &data {
        assert_eq!(chunk, &pattern(offset, chunk.len() as u64));
        offset += chunk.len() as u64;
    }
}

#[tokio::test]
async fn persistent_403_retries_are_paced_by_the_keepalive() {
    // Every request fails; the retry loop must wait out the keep-alive
    // interval between re-resolutions instead of spinning.
    let net = MockNet::new(Box::new(|_url, _opts, _n| Ok((403, Bytes::new()))));
    let resolver = MockResolver::new(vec![on_demand_format(
        "https://cdn.example/s1",
        CONTENT_LENGTH,
        DURATION_SECS,
    )]);

    let config = StreamConfig {
        keepalive_secs: 1,
        ..Default::default()
    };
    let ctx = session_ctx(net.clone(), resolver.clone(), config, None);
    let (session, rx) = StreamSession::open(ctx).await.unwrap();

    let (data, terminal) = collect_until_terminal(&rx, Duration::from_millis(2500)).await;
    assert!(data.is_empty());
    assert!(terminal.is_none(), "session must keep retrying, not fail");
    session.close();

    // 2.5 s at a 1 s interval: the initial resolution plus roughly one
    // per tick. A hot loop would rack up thousands.
    let resolutions = resolver.resolutions();
    assert!(resolutions >= 2, "expected tick-gated retries, got {}", resolutions);
    assert!(resolutions <= 4, "retry loop not paced: {} resolutions", resolutions);
}

// ---------------------------------------------------------------------
// Scenario C: live precache, steady state and manifest refresh
// ---------------------------------------------------------------------

fn live_manifest(base_url: &str, first_seq: u64, duration_secs: u64) -> String {
    let urls: String = (first_seq..first_seq + 3)
        .map(|s| format!("<SegmentURL media=\"sq/{}\"/>", s))
        .collect();
    format!(
        "<MPD><AdaptationSet id=\"0\"><Representation>\
         <BaseURL>{}</BaseURL>\
         <SegmentList duration=\"{}\">{}</SegmentList>\
         </Representation></AdaptationSet></MPD>",
        base_url, duration_secs, urls
    )
}

fn live_format(manifest_url: &str) -> ResolvedFormat {
    ResolvedFormat {
        url: manifest_url.to_string(),
        container: AudioContainer::Webm,
        codec: "opus".into(),
        content_length: None,
        duration_secs: None,
        live: true,
        cipher: None,
    }
}

#[tokio::test]
async fn scenario_c_live_precache_and_refresh_keep_sequence() {
    let net = MockNet::new(Box::new(|url, _opts, _n| {
        if url == "https://live.example/manifest-v1" {
            Ok((200, live_manifest("https://seg.example/v1/", 100, 1).into()))
        } else if url == "https://live.example/manifest-v2" {
            // Refreshed manifest advertises later segments; the session
            // must keep its own counter regardless.
            Ok((200, live_manifest("https://seg.example/v2/", 104, 1).into()))
        } else {
            Ok((200, Bytes::from(format!("seg:{}", url))))
        }
    }));
    let resolver = MockResolver::new(vec![
        live_format("https://live.example/manifest-v1"),
        live_format("https://live.example/manifest-v2"),
    ]);

    let config = StreamConfig {
        manifest_refresh_secs: 2,
        live_precache: 3,
        ..Default::default()
    };
    let ctx = session_ctx(net.clone(), resolver.clone(), config, None);
    let (session, rx) = StreamSession::open(ctx).await.unwrap();
    assert_eq!(session.kind(), StreamKind::LiveManifest);

    // Precache of 100..=102 is immediate; steady state ticks once a
    // second; the refresh fires at ~2 s. Watch for ~3.5 s.
    let (data, terminal) = collect_until_terminal(&rx, Duration::from_millis(3500)).await;
    assert!(terminal.is_none(), "live session must not end on its own");
    session.close();

    let segment_calls: Vec<String> = net
        .calls()
        .into_iter()
        .filter(|c| c.url.contains("/sq/"))
        .map(|c| c.url)
        .collect();

    // Precache came from the v1 base at sequences 100..=102.
    assert_eq!(
        &segment_calls[..3],
        &[
            "https://seg.example/v1/sq/100",
            "https://seg.example/v1/sq/101",
            "https://seg.example/v1/sq/102",
        ]
    );
    // Steady state continued at 103.
    assert_eq!(segment_calls[3], "https://seg.example/v1/sq/103");

    // The refresh switched bases without resetting the counter: strictly
    // increasing sequence numbers, each fetched exactly once.
    let sequences: Vec<u64> = segment_calls
        .iter()
        .map(|u| u.rsplit('/').next().unwrap().parse().unwrap())
        .collect();
    assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));

    assert!(
        segment_calls.iter().any(|u| u.contains("/v2/")),
        "expected post-refresh fetches from the v2 base, got {:?}",
        segment_calls
    );
    assert_eq!(resolver.resolutions(), 2);
    // The last fetch may still be in flight at the cutoff.
    assert!(data.len() >= segment_calls.len() - 1);
}

#[tokio::test]
async fn live_refresh_adopts_new_target_duration() {
    // v1 paces segments at 2 s; the refreshed v2 manifest tightens the
    // cadence to 1 s and the interval timer must follow it.
    let net = MockNet::new(Box::new(|url, _opts, _n| {
        if url == "https://live.example/manifest-v1" {
            Ok((200, live_manifest("https://seg.example/v1/", 100, 2).into()))
        } else if url == "https://live.example/manifest-v2" {
            Ok((200, live_manifest("https://seg.example/v2/", 103, 1).into()))
        } else {
            Ok((200, Bytes::from(format!("seg:{}", url))))
        }
    }));
    let resolver = MockResolver::new(vec![
        live_format("https://live.example/manifest-v1"),
        live_format("https://live.example/manifest-v2"),
    ]);

    let config = StreamConfig {
        manifest_refresh_secs: 1,
        live_precache: 1,
        ..Default::default()
    };
    let ctx = session_ctx(net.clone(), resolver, config, None);
    let (session, _rx) = StreamSession::open(ctx).await.unwrap();

    // Refresh at ~1 s re-arms the interval to 1 s, so ticks land at
    // ~2 s and ~3 s. The old 2 s cadence would only manage one tick
    // before the cutoff.
    tokio::time::sleep(Duration::from_millis(3500)).await;
    session.close();

    let post_refresh: Vec<String> = net
        .calls()
        .into_iter()
        .filter(|c| c.url.contains("/v2/sq/"))
        .map(|c| c.url)
        .collect();
    assert!(
        post_refresh.len() >= 2,
        "interval kept the stale cadence: {:?}",
        post_refresh
    );
}

// ---------------------------------------------------------------------
// HLS playlist cycling
// ---------------------------------------------------------------------

#[tokio::test]
async fn hls_playlist_runs_to_exhaustion() {
    let playlist = "#EXTM3U\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/0.ts\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/1.ts\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/2.ts\n\
        #EXT-X-ENDLIST\n";
    let net = MockNet::new(Box::new(move |url, _opts, _n| {
        if url.ends_with(".m3u8") {
            Ok((200, Bytes::from(playlist.to_string())))
        } else {
            Ok((200, Bytes::from(format!("ts:{}", url))))
        }
    }));
    let resolver = MockResolver::new(vec![ResolvedFormat {
        url: "https://cdn.example/list.m3u8".into(),
        container: AudioContainer::Ts,
        codec: "aac".into(),
        content_length: None,
        duration_secs: Some(360),
        live: false,
        cipher: None,
    }]);

    let ctx = session_ctx(net.clone(), resolver, StreamConfig::default(), None);
    let (session, rx) = StreamSession::open(ctx).await.unwrap();
    assert_eq!(session.kind(), StreamKind::HlsSegment);

    let (data, terminal) = collect_until_terminal(&rx, Duration::from_secs(5)).await;
    assert!(matches!(terminal, Some(StreamEvent::End)));
    assert_eq!(data.len(), 3);
    assert_eq!(&data[0][..], b"ts:https://cdn.example/seg/0.ts");
}

#[tokio::test]
async fn hls_transport_error_defers_to_refresh() {
    let playlist = "#EXTM3U\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/0.ts\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/1.ts\n\
        #EXTINF:120.0,\nhttps://cdn.example/seg/2.ts\n\
        #EXT-X-ENDLIST\n";
    // The middle segment drops the connection once, then recovers.
    let dropped = Arc::new(AtomicUsize::new(0));
    let dropped_for_net = dropped.clone();
    let net = MockNet::new(Box::new(move |url, _opts, _n| {
        if url.ends_with(".m3u8") {
            Ok((200, Bytes::from(playlist.to_string())))
        } else if url.ends_with("1.ts") && dropped_for_net.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(StreamError::Transport("connection reset".into()))
        } else {
            Ok((200, Bytes::from(format!("ts:{}", url))))
        }
    }));
    let resolver = MockResolver::new(vec![ResolvedFormat {
        url: "https://cdn.example/list.m3u8".into(),
        container: AudioContainer::Ts,
        codec: "aac".into(),
        content_length: None,
        duration_secs: Some(360),
        live: false,
        cipher: None,
    }]);

    let config = StreamConfig {
        playlist_refresh_secs: 1,
        ..Default::default()
    };
    let ctx = session_ctx(net.clone(), resolver, config, None);
    let (_session, rx) = StreamSession::open(ctx).await.unwrap();

    // The dropped fetch defers to the next refresh cycle, which resumes
    // at the failed segment; the stream still ends cleanly and in order.
    let (data, terminal) = collect_until_terminal(&rx, Duration::from_secs(5)).await;
    assert!(matches!(terminal, Some(StreamEvent::End)));
    assert_eq!(data.len(), 3);
    assert_eq!(&data[1][..], b"ts:https://cdn.example/seg/1.ts");
    assert_eq!(&data[2][..], b"ts:https://cdn.example/seg/2.ts");
}

// ---------------------------------------------------------------------
// Seek-then-range-fetch over a synthetic WebM
// ---------------------------------------------------------------------

fn el(id: u32, payload: &[u8]) -> Vec<u8> {
    let id_bytes = id.to_be_bytes();
    let skip = id_bytes.iter().position(|&b| b != 0).unwrap_or(3);
    let mut out = id_bytes[skip..].to_vec();
    out.extend_from_slice(&encode_size(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

fn uint8(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn simple_block(track: u8, relative_ms: i16, frame: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x80 | track];
    payload.extend_from_slice(&relative_ms.to_be_bytes());
    payload.push(0x80);
    payload.extend_from_slice(frame);
    el(ids::SIMPLE_BLOCK, &payload)
}

/// Two-pass builder: cue positions are fixed-width so the layout is
/// stable, then filled in with the real cluster offsets.
fn seekable_webm() -> Vec<u8> {
    fn build(positions: [u64; 3]) -> Vec<u8> {
        let info = el(
            ids::INFO,
            &el(ids::TIMECODE_SCALE, &uint8(1_000_000)),
        );
        let tracks = el(
            ids::TRACKS,
            &el(ids::TRACK_ENTRY, &{
                let mut p = el(ids::TRACK_NUMBER, &uint8(1));
                p.extend_from_slice(&el(ids::TRACK_TYPE, &uint8(2)));
                p.extend_from_slice(&el(ids::CODEC_ID, b"A_OPUS"));
                p
            }),
        );
        let cue = |time_ms: u64, pos: u64| {
            el(ids::CUE_POINT, &{
                let mut p = el(ids::CUE_TIME, &uint8(time_ms));
                p.extend_from_slice(&el(
                    ids::CUE_TRACK_POSITIONS,
                    &el(ids::CUE_POSITION, &uint8(pos)),
                ));
                p
            })
        };
        let cues = el(ids::CUES, &{
            let mut p = cue(0, positions[0]);
            p.extend_from_slice(&cue(10_000, positions[1]));
            p.extend_from_slice(&cue(20_000, positions[2]));
            p
        });

        let cluster = |timecode_ms: u64, blocks: &[Vec<u8>]| {
            el(ids::CLUSTER, &{
                let mut p = el(ids::TIMECODE, &uint8(timecode_ms));
                for b in blocks {
                    p.extend_from_slice(b);
                }
                p
            })
        };

        let mut doc = el(ids::EBML_HEAD, &[]);
        doc.extend_from_slice(&el(ids::SEGMENT, &{
            let mut p = info;
            p.extend_from_slice(&tracks);
            p.extend_from_slice(&cues);
            p.extend_from_slice(&cluster(0, &[simple_block(1, 0, b"f00")]));
            p.extend_from_slice(&cluster(
                10_000,
                &[simple_block(1, 0, b"f10"), simple_block(1, 5000, b"f15")],
            ));
            p.extend_from_slice(&cluster(20_000, &[simple_block(1, 0, b"f20")]));
            p
        }));
        doc
    }

    let draft = build([0; 3]);
    let cluster_id = [0x1F, 0x43, 0xB6, 0x75];
    let offsets: Vec<u64> = draft
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == cluster_id)
        .map(|(i, _)| i as u64)
        .collect();
    assert_eq!(offsets.len(), 3);
    build([offsets[0], offsets[1], offsets[2]])
}

#[tokio::test]
async fn seek_session_emits_frames_from_target_time() {
    let doc = seekable_webm();
    let doc_len = doc.len() as u64;

    let doc_for_net = doc.clone();
    let net = MockNet::new(Box::new(move |_url, opts, _n| {
        let range = opts.range.expect("range request expected");
        let end = range.end.unwrap_or(doc_len).min(doc_len) as usize;
        Ok((
            200,
            Bytes::copy_from_slice(&doc_for_net[range.start as usize..end]),
        ))
    }));
    let resolver = MockResolver::new(vec![on_demand_format(
        "https://cdn.example/audio.webm?mime=audio/webm",
        doc_len,
        30,
    )]);

    let ctx = session_ctx(net.clone(), resolver, StreamConfig::default(), Some(15));
    let (session, rx) = StreamSession::open(ctx).await.unwrap();
    assert_eq!(session.kind(), StreamKind::SeekFetch);

    let (data, terminal) = collect_until_terminal(&rx, Duration::from_secs(5)).await;
    assert!(matches!(terminal, Some(StreamEvent::End)));

    // Precise mode starts emission at the 15 s frame; raw container
    // bytes never reach the output, only frame payloads.
    let frames: Vec<&[u8]> = data.iter().map(|b| &b[..]).collect();
    assert_eq!(frames, vec![&b"f15"[..], &b"f20"[..]]);

    // The first media request resumed at the 10 s cue's cluster offset.
    let calls = net.calls();
    let head_range = calls[0].range.unwrap();
    assert_eq!(head_range.0, 0);
    let data_range = calls[1].range.unwrap();
    assert!(data_range.0 > 0);
}

#[tokio::test]
async fn out_of_range_seek_is_rejected_before_fetching() {
    let net = MockNet::new(Box::new(|_, _, _| Ok((200, Bytes::new()))));
    let resolver = MockResolver::new(vec![on_demand_format(
        "https://cdn.example/s1",
        CONTENT_LENGTH,
        DURATION_SECS,
    )]);

    let ctx = session_ctx(net.clone(), resolver, StreamConfig::default(), Some(9_999));
    let err = StreamSession::open(ctx).await.err().expect("must reject");
    assert!(matches!(err, StreamError::SeekOutOfRange { .. }));
    assert!(net.calls().is_empty(), "no stream traffic may happen");
}
