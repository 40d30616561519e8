use crate::audio::engine::MediaErrorCode;
use crate::audio::{lock, wait};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex};

/// How far the download may run ahead of the decoder before it pauses.
pub const MAX_BUFFER_AHEAD: usize = 8 * 1024 * 1024;

/// Shared state between the HTTP download task and the symphonia reader.
struct StreamBuffer {
    /// All downloaded bytes (append-only from writer side).
    data: Vec<u8>,
    /// Read cursor position.
    position: usize,
    /// Response headers have been accepted.
    ready: bool,
    content_type: Option<String>,
    /// Whether the download has completed.
    finished: bool,
    failure: Option<(MediaErrorCode, String)>,
    /// The reader side went away; further writes are discarded.
    aborted: bool,
}

type Shared = Arc<(Mutex<StreamBuffer>, Condvar)>;

/// Adapter that makes an HTTP byte stream look like a seekable `Read` + `symphonia::core::io::MediaSource`.
/// All downloaded bytes are retained in memory so symphonia can seek backwards.
pub struct HttpStreamSource {
    shared: Shared,
}

impl HttpStreamSource {
    pub fn new() -> (Self, StreamWriter) {
        let shared = Arc::new((
            Mutex::new(StreamBuffer {
                data: Vec::with_capacity(1024 * 1024),
                position: 0,
                ready: false,
                content_type: None,
                finished: false,
                failure: None,
                aborted: false,
            }),
            Condvar::new(),
        ));

        let source = Self {
            shared: Arc::clone(&shared),
        };
        let writer = StreamWriter { shared };

        (source, writer)
    }

    /// Blocks until the response was accepted or the download ended.
    /// Returns the declared content type.
    pub fn wait_ready(&self) -> Option<String> {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        while !state.ready && !state.finished && !state.aborted {
            state = wait(cvar, state);
        }
        state.content_type.clone()
    }
}

impl Read for HttpStreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);

        while state.position >= state.data.len()
            && !state.finished
            && state.failure.is_none()
            && !state.aborted
        {
            state = wait(cvar, state);
        }

        if let Some((_, ref message)) = state.failure {
            return Err(io::Error::new(io::ErrorKind::Other, message.clone()));
        }
        if state.aborted {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "stream aborted",
            ));
        }

        let available = state.data.len().saturating_sub(state.position);
        if available == 0 {
            return Ok(0); // EOF
        }

        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&state.data[state.position..state.position + to_read]);
        state.position += to_read;

        Ok(to_read)
    }
}

impl Seek for HttpStreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (mutex, _) = &*self.shared;
        let mut state = lock(mutex);

        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => state.position as i64 + offset,
            SeekFrom::End(offset) => state.data.len() as i64 + offset,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek to negative position",
            ));
        }

        state.position = new_pos as usize;
        Ok(state.position as u64)
    }
}

impl symphonia::core::io::MediaSource for HttpStreamSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        let (mutex, _) = &*self.shared;
        let state = lock(mutex);
        if state.finished && state.failure.is_none() {
            Some(state.data.len() as u64)
        } else {
            None
        }
    }
}

/// Writer end that receives bytes from the HTTP download task. Never blocks,
/// so it is safe to drive from async code.
#[derive(Clone)]
pub struct StreamWriter {
    shared: Shared,
}

impl StreamWriter {
    pub fn set_content_type(&self, content_type: Option<String>) {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        state.content_type = content_type;
        state.ready = true;
        cvar.notify_all();
    }

    /// Appends a chunk. Returns false once the reader has aborted.
    pub fn write_bytes(&self, data: &[u8]) -> bool {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        if state.aborted || state.finished {
            return !state.aborted;
        }
        state.data.extend_from_slice(data);
        cvar.notify_all();
        true
    }

    /// Bytes downloaded but not yet consumed by the decoder.
    pub fn backlog(&self) -> usize {
        let (mutex, _) = &*self.shared;
        let state = lock(mutex);
        state.data.len().saturating_sub(state.position)
    }

    /// Classification of a failed download, if it failed.
    pub fn failure_code(&self) -> Option<MediaErrorCode> {
        let (mutex, _) = &*self.shared;
        lock(mutex).failure.as_ref().map(|(code, _)| *code)
    }

    pub fn is_aborted(&self) -> bool {
        let (mutex, _) = &*self.shared;
        lock(mutex).aborted
    }

    pub fn finish(&self) {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        state.finished = true;
        cvar.notify_all();
    }

    pub fn set_error(&self, code: MediaErrorCode, message: impl Into<String>) {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        state.failure = Some((code, message.into()));
        state.finished = true;
        cvar.notify_all();
    }

    /// Tears the stream down from the consumer side: blocked readers return
    /// an error and the download loop stops at its next chunk.
    pub fn abort(&self) {
        let (mutex, cvar) = &*self.shared;
        let mut state = lock(mutex);
        state.aborted = true;
        cvar.notify_all();
    }
}
