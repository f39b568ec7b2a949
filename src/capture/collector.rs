//! Background chunk collection.
//!
//! A worker thread wakes every chunk interval, drains whole frames from the input ring buffer
//! and appends one encoded chunk. Chunks are tagged with the epoch the collector was spawned
//! under; once the epoch is bumped (cancel), late chunks are discarded.

use rtrb::Consumer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio_engine::errors::CaptureError;
use crate::capture::encoder::WavChunkEncoder;

#[derive(Debug, Default)]
struct ChunkBuffer {
    epoch: u64,
    chunks: Vec<Vec<u8>>,
}

pub struct ChunkCollector {
    buffer: Arc<Mutex<ChunkBuffer>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChunkCollector {
    pub fn spawn(
        mut consumer: Consumer<f32>,
        encoder: WavChunkEncoder,
        interval: Duration,
    ) -> Result<Self, CaptureError> {
        let buffer = Arc::new(Mutex::new(ChunkBuffer::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let epoch = 0;

        let worker_buffer = Arc::clone(&buffer);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("capture-collector".to_string())
            .spawn(move || {
                loop {
                    thread::park_timeout(interval);
                    let stopping = worker_stop.load(Ordering::Acquire);
                    collect_chunk(&mut consumer, &encoder, &worker_buffer, epoch);
                    if stopping {
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::DeviceUnavailable(format!("Collector thread: {e}")))?;

        Ok(Self {
            buffer,
            stop,
            handle: Some(handle),
        })
    }

    /// Number of chunks collected so far.
    pub fn chunk_count(&self) -> usize {
        self.buffer.lock().map(|b| b.chunks.len()).unwrap_or(0)
    }

    /// Stops the worker after a final drain and returns every collected chunk in order.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Capture collector thread panicked");
            }
        }
        match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut buffer.chunks),
            Err(_) => Vec::new(),
        }
    }

    /// Discards collected chunks and detaches the worker; anything it produces later is dropped.
    pub fn halt(mut self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.epoch = buffer.epoch.wrapping_add(1);
            buffer.chunks.clear();
        }
        self.signal_stop();
        self.handle.take();
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.as_ref() {
            handle.thread().unpark();
        }
    }
}

impl Drop for ChunkCollector {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.signal_stop();
        }
    }
}

fn collect_chunk(
    consumer: &mut Consumer<f32>,
    encoder: &WavChunkEncoder,
    buffer: &Mutex<ChunkBuffer>,
    epoch: u64,
) {
    let channels = usize::from(encoder.format().channels).max(1);
    let available = consumer.slots();
    let whole = available - available % channels;
    if whole == 0 {
        return;
    }

    let Ok(read) = consumer.read_chunk(whole) else {
        return;
    };
    let (first, second) = read.as_slices();
    let mut samples = Vec::with_capacity(whole);
    samples.extend_from_slice(first);
    samples.extend_from_slice(second);
    read.commit_all();

    let chunk = encoder.encode_chunk(&samples);
    if let Ok(mut buffer) = buffer.lock() {
        if buffer.epoch == epoch {
            buffer.chunks.push(chunk);
        }
    }
}
