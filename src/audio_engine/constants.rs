//! Audio engine configuration constants and limits.

/// Number of addressable slots on the soundboard grid.
pub const GRID_SIZE: usize = 12;

/// Maximum number of voices that can be active simultaneously.
///
/// At most one voice exists per sound id, so the grid bounds real usage well below this.
pub const MAX_VOICES: usize = 32;

/// Capacity of the control and event ring buffers between the engine and the audio thread.
pub const MESSAGE_QUEUE_CAPACITY: usize = 1024;

/// Event queue slots kept free for voice end and drop events. Loop events are skipped once
/// the queue is this close to full.
pub const EVENT_QUEUE_RESERVE: usize = MAX_VOICES * 2;

/// Interval at which buffered microphone samples are encoded into a chunk.
pub const CHUNK_INTERVAL_MS: u64 = 100;

/// Silent gap inserted before a looping voice restarts.
pub const LOOP_GAP_MS: u64 = 10;

/// Seconds of input audio the capture ring buffer can hold between collector wake-ups.
pub const CAPTURE_BUFFER_SECONDS: usize = 2;

/// Input frames per resampler chunk.
pub const RESAMPLE_CHUNK_FRAMES: usize = 1024;

