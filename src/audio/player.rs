//! Desktop playback engine: reqwest download, symphonia decode, cpal output.
//!
//! Each `set_source` creates a binding made of a download task, a decode
//! thread that owns the cpal stream, and a monitor task that reports
//! position and buffering. Only the decode thread reports media errors.

use crate::audio::decoder::AudioDecoder;
use crate::audio::engine::{
    EngineEvent, EventSink, MediaErrorCode, PlayFuture, PlayRejected, PlaybackEngine,
};
use crate::audio::stream_source::{HttpStreamSource, StreamWriter, MAX_BUFFER_AHEAD};
use crate::audio::{lock, wait};
use crate::error::{AppError, AppResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use futures_util::future::{self, FutureExt};
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Sentinel value meaning "no seek requested".
const NO_SEEK: u64 = u64::MAX;
/// About two seconds of 44.1 kHz stereo.
const MAX_RING_SAMPLES: usize = 176_400;
const DRAIN_POLL: Duration = Duration::from_millis(100);
const BACKLOG_POLL: Duration = Duration::from_millis(50);

pub const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Maps an HTTP response to a media error before any bytes are decoded.
/// The host answers blocked or private files with an HTML interstitial page.
pub fn classify_response(
    status: StatusCode,
    content_type: Option<&str>,
) -> Result<(), MediaErrorCode> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE => {
            return Err(MediaErrorCode::SourceNotSupported)
        }
        s if !s.is_success() => return Err(MediaErrorCode::Network),
        _ => {}
    }
    let is_html = content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false);
    if is_html {
        Err(MediaErrorCode::SourceNotSupported)
    } else {
        Ok(())
    }
}

/// Host and path only; query strings may carry credentials.
fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.host_str().unwrap_or(""), parsed.path()),
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Shared ring buffer between the decode thread and the cpal callback.
struct SampleRingBuffer {
    buffer: VecDeque<f32>,
    finished: bool,
}

/// Output settings that outlive individual bindings.
struct OutputState {
    playing: AtomicBool,
    volume: Mutex<f32>,
    muted: AtomicBool,
}

impl OutputState {
    fn gain(&self) -> f32 {
        if self.muted.load(Ordering::Relaxed) {
            0.0
        } else {
            *lock(&self.volume)
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

/// State of one URL binding, shared by its download task, decode thread,
/// monitor task and output callback.
struct BindingState {
    ring: (Mutex<SampleRingBuffer>, Condvar),
    stop: AtomicBool,
    /// Seek target in milliseconds (NO_SEEK = no pending seek).
    seek_target_ms: AtomicU64,
    samples_played: AtomicU64,
    sample_rate: AtomicU32,
    channels: AtomicUsize,
    /// Metadata has been reported for this binding.
    ready: AtomicBool,
}

impl BindingState {
    fn new() -> Self {
        Self {
            ring: (
                Mutex::new(SampleRingBuffer {
                    buffer: VecDeque::with_capacity(88_200),
                    finished: false,
                }),
                Condvar::new(),
            ),
            stop: AtomicBool::new(false),
            seek_target_ms: AtomicU64::new(NO_SEEK),
            samples_played: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            channels: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn has_pending_seek(&self) -> bool {
        self.seek_target_ms.load(Ordering::Acquire) != NO_SEEK
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Flags are flipped under the ring lock so a waiting decode thread
    /// cannot miss the wakeup.
    fn stop(&self) {
        let (mutex, cvar) = &self.ring;
        let _ring = lock(mutex);
        self.stop.store(true, Ordering::Release);
        cvar.notify_all();
    }

    fn set_format(&self, sample_rate: u32, channels: usize) {
        self.sample_rate.store(sample_rate, Ordering::Release);
        self.channels.store(channels, Ordering::Release);
    }

    fn samples_per_second(&self) -> f64 {
        self.sample_rate.load(Ordering::Acquire) as f64 * self.channels.load(Ordering::Acquire) as f64
    }

    fn position_seconds(&self) -> f64 {
        let rate = self.samples_per_second();
        if rate > 0.0 {
            self.samples_played.load(Ordering::Relaxed) as f64 / rate
        } else {
            0.0
        }
    }

    fn request_seek(&self, position_seconds: f64) {
        let position_seconds = position_seconds.max(0.0);
        {
            let (mutex, cvar) = &self.ring;
            let _ring = lock(mutex);
            self.seek_target_ms
                .store((position_seconds * 1000.0) as u64, Ordering::Release);
            cvar.notify_all();
        }
        // Reflect the new position right away; the decode thread confirms it.
        let sample_position = (position_seconds * self.samples_per_second()) as u64;
        self.samples_played.store(sample_position, Ordering::Relaxed);
    }

    fn buffered(&self) -> (usize, bool) {
        let ring = lock(&self.ring.0);
        (ring.buffer.len(), ring.finished)
    }
}

struct Binding {
    state: Arc<BindingState>,
    writer: StreamWriter,
    download: tokio::task::JoinHandle<()>,
    monitor: tokio::task::JoinHandle<()>,
    decode: Option<std::thread::JoinHandle<()>>,
}

impl Binding {
    fn teardown(mut self) {
        self.state.stop();
        self.writer.abort();
        self.download.abort();
        self.monitor.abort();
        if let Some(handle) = self.decode.take() {
            if handle.join().is_err() {
                log::warn!("Decode thread panicked during teardown");
            }
        }
    }
}

pub struct NativeEngine {
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
    output: Arc<OutputState>,
    binding: Option<Binding>,
}

impl NativeEngine {
    /// Must be called from within a tokio runtime; download and monitor
    /// tasks are spawned onto it.
    pub fn new(client: reqwest::Client) -> AppResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Audio(format!("NativeEngine requires a tokio runtime: {}", e)))?;
        Ok(Self {
            client,
            runtime,
            output: Arc::new(OutputState {
                playing: AtomicBool::new(false),
                volume: Mutex::new(1.0),
                muted: AtomicBool::new(false),
            }),
            binding: None,
        })
    }

    pub fn has_output_device() -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    fn stop_binding(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.teardown();
        }
    }
}

impl PlaybackEngine for NativeEngine {
    fn set_source(&mut self, url: &str, sink: EventSink) {
        self.stop_binding();
        self.output.playing.store(false, Ordering::SeqCst);

        let state = Arc::new(BindingState::new());
        let (source, writer) = HttpStreamSource::new();

        let download = self
            .runtime
            .spawn(download(self.client.clone(), url.to_string(), writer.clone()));
        let monitor = self.runtime.spawn(monitor(
            Arc::clone(&state),
            Arc::clone(&self.output),
            sink.clone(),
        ));

        let thread_state = Arc::clone(&state);
        let thread_output = Arc::clone(&self.output);
        let thread_writer = writer.clone();
        let thread_sink = sink.clone();
        let decode = std::thread::Builder::new()
            .name(format!("decode-{}", sink.generation()))
            .spawn(move || decode_loop(source, thread_writer, thread_state, thread_output, thread_sink));

        let decode = match decode {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn decode thread: {}", e);
                sink.emit(EngineEvent::Error {
                    code: MediaErrorCode::Aborted,
                });
                None
            }
        };

        self.binding = Some(Binding {
            state,
            writer,
            download,
            monitor,
            decode,
        });
    }

    fn play(&mut self) -> PlayFuture {
        let result = if self.binding.is_none() {
            Err(PlayRejected::new("no source bound"))
        } else if !Self::has_output_device() {
            Err(PlayRejected::new("no audio output device available"))
        } else {
            self.output.playing.store(true, Ordering::SeqCst);
            Ok(())
        };
        future::ready(result).boxed()
    }

    fn pause(&mut self) {
        self.output.playing.store(false, Ordering::SeqCst);
    }

    fn seek(&mut self, position: f64) {
        if let Some(binding) = &self.binding {
            binding.state.request_seek(position);
        }
    }

    fn set_volume(&mut self, volume: f64) {
        *lock(&self.output.volume) = volume.clamp(0.0, 1.0) as f32;
    }

    fn set_muted(&mut self, muted: bool) {
        self.output.muted.store(muted, Ordering::SeqCst);
    }

    fn unload(&mut self) {
        self.output.playing.store(false, Ordering::SeqCst);
        self.stop_binding();
    }
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.stop_binding();
    }
}

async fn download(client: reqwest::Client, url: String, writer: StreamWriter) {
    let target = redact(&url);
    log::info!("Starting audio download: {}", target);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Failed to start audio download from {}: {}", target, e);
            writer.set_error(MediaErrorCode::Network, format!("Failed to start download: {}", e));
            return;
        }
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log::info!(
        "Audio download response: status={}, content-type={}, content-length={:?}",
        status,
        content_type.as_deref().unwrap_or("unknown"),
        response.content_length()
    );

    if let Err(code) = classify_response(status, content_type.as_deref()) {
        log::warn!("Audio download from {} refused ({}): {:?}", target, status, code);
        writer.set_error(code, format!("Download failed: HTTP {}", status));
        return;
    }
    writer.set_content_type(content_type);

    let mut stream = response.bytes_stream();
    let mut total_bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                total_bytes += bytes.len() as u64;
                if !writer.write_bytes(&bytes) {
                    log::debug!("Audio download: reader gone after {} bytes", total_bytes);
                    return;
                }
                while writer.backlog() >= MAX_BUFFER_AHEAD && !writer.is_aborted() {
                    tokio::time::sleep(BACKLOG_POLL).await;
                }
            }
            Err(e) => {
                log::warn!(
                    "Audio download stream error after {} bytes: {}",
                    total_bytes,
                    e
                );
                writer.set_error(MediaErrorCode::Network, format!("Download error: {}", e));
                return;
            }
        }
    }
    log::info!("Audio download complete: {} bytes", total_bytes);
    writer.finish();
}

/// Emits `TimeUpdate` while playing, and `Waiting`/`CanPlay` when the ring
/// buffer runs dry before end of stream and when it refills.
async fn monitor(state: Arc<BindingState>, output: Arc<OutputState>, sink: EventSink) {
    let mut ticker = tokio::time::interval(TIME_UPDATE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut starved = false;

    loop {
        ticker.tick().await;
        if state.is_stopped() || !sink.is_active() {
            break;
        }
        if !state.is_ready() || !output.is_playing() {
            continue;
        }

        let (buffered, finished) = state.buffered();
        if buffered == 0 && !finished && !starved {
            starved = true;
            sink.emit(EngineEvent::Waiting);
        } else if starved && (buffered > 0 || finished) {
            starved = false;
            sink.emit(EngineEvent::CanPlay);
        }
        sink.emit(EngineEvent::TimeUpdate {
            current_time: state.position_seconds(),
        });
    }
}

fn open_output(
    sample_rate: u32,
    channels: usize,
    state: &Arc<BindingState>,
    output: &Arc<OutputState>,
    sink: &EventSink,
) -> AppResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AppError::Audio("No output device available".into()))?;

    let stream_config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_state = Arc::clone(state);
    let callback_output = Arc::clone(output);
    let error_sink = sink.clone();

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !callback_output.is_playing() || callback_state.is_stopped() {
                    data.fill(0.0);
                    return;
                }

                let gain = callback_output.gain();
                let (mutex, cvar) = &callback_state.ring;
                let mut ring = lock(mutex);

                let available = ring.buffer.len().min(data.len());
                for (i, sample) in data.iter_mut().enumerate() {
                    *sample = if i < available {
                        ring.buffer.pop_front().unwrap_or(0.0) * gain
                    } else {
                        0.0
                    };
                }

                callback_state
                    .samples_played
                    .fetch_add(available as u64, Ordering::Relaxed);
                cvar.notify_all();
            },
            move |err| {
                log::error!("cpal output error: {}", err);
                error_sink.emit(EngineEvent::Error {
                    code: MediaErrorCode::Aborted,
                });
            },
            None,
        )
        .map_err(|e| AppError::Audio(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AppError::Audio(format!("Failed to start output stream: {}", e)))?;

    Ok(stream)
}

fn decode_loop(
    source: HttpStreamSource,
    stream: StreamWriter,
    state: Arc<BindingState>,
    output: Arc<OutputState>,
    sink: EventSink,
) {
    let mime = source.wait_ready();
    if state.is_stopped() {
        return;
    }
    if let Some(code) = stream.failure_code() {
        sink.emit(EngineEvent::Error { code });
        return;
    }

    let mut decoder = match AudioDecoder::new(source, mime.as_deref()) {
        Ok(decoder) => decoder,
        Err(e) => {
            if state.is_stopped() {
                return;
            }
            let code = stream
                .failure_code()
                .unwrap_or(MediaErrorCode::SourceNotSupported);
            log::warn!("Probe failed ({:?}): {}", code, e);
            sink.emit(EngineEvent::Error { code });
            return;
        }
    };

    let sample_rate = decoder.sample_rate();
    let channels = decoder.channels();
    state.set_format(sample_rate, channels);

    // Owned by this thread so it is created and dropped on the same thread.
    let _output_stream = match open_output(sample_rate, channels, &state, &output, &sink) {
        Ok(stream) => stream,
        Err(e) => {
            log::error!("{}", e);
            sink.emit(EngineEvent::Error {
                code: MediaErrorCode::Aborted,
            });
            return;
        }
    };

    state.ready.store(true, Ordering::Release);
    sink.emit(EngineEvent::MetadataReady {
        duration: decoder.duration_seconds().unwrap_or(0.0),
    });
    sink.emit(EngineEvent::CanPlay);

    let (ring_lock, ring_cvar) = &state.ring;
    loop {
        if state.is_stopped() {
            return;
        }

        let pending_seek = state.seek_target_ms.swap(NO_SEEK, Ordering::AcqRel);
        if pending_seek != NO_SEEK {
            let seek_seconds = pending_seek as f64 / 1000.0;
            log::info!("Decode thread: seeking to {:.2}s", seek_seconds);
            {
                let mut ring = lock(ring_lock);
                ring.buffer.clear();
                ring.finished = false;
                ring_cvar.notify_all();
            }
            if let Err(e) = decoder.seek(seek_seconds) {
                log::warn!("Decode thread: seek failed: {}", e);
            }
            let new_samples = (seek_seconds * sample_rate as f64 * channels as f64) as u64;
            state.samples_played.store(new_samples, Ordering::Relaxed);
            continue;
        }

        {
            let mut ring = lock(ring_lock);
            if ring.finished {
                while !ring.buffer.is_empty() && !state.is_stopped() && !state.has_pending_seek() {
                    ring = ring_cvar
                        .wait_timeout(ring, DRAIN_POLL)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| PoisonError::into_inner(e).0);
                }
                if state.is_stopped() || state.has_pending_seek() {
                    continue;
                }
                drop(ring);
                sink.emit(EngineEvent::Ended);
                return;
            }

            while ring.buffer.len() >= MAX_RING_SAMPLES
                && !state.is_stopped()
                && !state.has_pending_seek()
            {
                ring = wait(ring_cvar, ring);
            }
        }

        if state.is_stopped() || state.has_pending_seek() {
            continue;
        }

        match decoder.decode_next() {
            Ok(Some(decoded)) => {
                let mut ring = lock(ring_lock);
                ring.buffer.extend(decoded.samples.iter());
                ring_cvar.notify_all();
            }
            Ok(None) => {
                let mut ring = lock(ring_lock);
                ring.finished = true;
                ring_cvar.notify_all();
            }
            Err(e) => {
                if state.is_stopped() {
                    return;
                }
                let code = stream.failure_code().unwrap_or(MediaErrorCode::Decode);
                log::warn!("Decode error ({:?}): {}", code, e);
                sink.emit(EngineEvent::Error { code });
                return;
            }
        }
    }
}
