//! Scripted engine for tests: records every call, keeps the latest sink so a
//! test can inject events, and can be told to refuse `play()`.

use crate::audio::engine::{EngineEvent, EventSink, PlayFuture, PlayRejected, PlaybackEngine};
use futures_util::FutureExt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetSource(String),
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    Unload,
}

#[derive(Default)]
struct MockState {
    calls: Vec<EngineCall>,
    sink: Option<EventSink>,
    stale_sinks: Vec<EventSink>,
    reject_play: bool,
}

#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn sources(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::SetSource(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.state.lock().unwrap().reject_play = reject;
    }

    /// Emits through the current binding's sink.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let sink = self.state.lock().unwrap().sink.clone();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    /// Emits through the sink of the binding before the current one.
    pub fn emit_stale(&self, event: EngineEvent) -> bool {
        let sink = self.state.lock().unwrap().stale_sinks.last().cloned();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    pub fn generation(&self) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .sink
            .as_ref()
            .map(|s| s.generation())
    }
}

impl PlaybackEngine for MockEngine {
    fn set_source(&mut self, url: &str, sink: EventSink) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::SetSource(url.to_string()));
        if let Some(old) = state.sink.replace(sink) {
            state.stale_sinks.push(old);
        }
    }

    fn play(&mut self) -> PlayFuture {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Play);
        let result = if state.reject_play {
            Err(PlayRejected::new("autoplay blocked"))
        } else {
            Ok(())
        };
        futures_util::future::ready(result).boxed()
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().calls.push(EngineCall::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::Seek(position));
    }

    fn set_volume(&mut self, volume: f64) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::SetVolume(volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(EngineCall::SetMuted(muted));
    }

    fn unload(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Unload);
        if let Some(old) = state.sink.take() {
            state.stale_sinks.push(old);
        }
    }
}
