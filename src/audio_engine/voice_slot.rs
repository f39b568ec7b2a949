use crate::messages::{SampleBuffer, VoiceId};

/// One preallocated mixer voice.
///
/// A slot is reused across voices; `voice` identifies which started voice currently owns it.
pub struct VoiceSlot {
    pub active: bool,
    pub voice: VoiceId,
    pub sample: Option<SampleBuffer>,
    pub frame_pos: usize,
    pub looping: bool,
    /// Silent frames left before a looping voice restarts from the beginning.
    pub gap_remaining: usize,
}

impl VoiceSlot {
    pub fn new() -> Self {
        Self {
            active: false,
            voice: 0,
            sample: None,
            frame_pos: 0,
            looping: false,
            gap_remaining: 0,
        }
    }

    pub fn start(&mut self, voice: VoiceId, sample: SampleBuffer, looping: bool) {
        self.active = true;
        self.voice = voice;
        self.sample = Some(sample);
        self.frame_pos = 0;
        self.looping = looping;
        self.gap_remaining = 0;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.sample = None;
        self.frame_pos = 0;
        self.looping = false;
        self.gap_remaining = 0;
    }

    /// Rewinds a looping voice after its restart gap has elapsed.
    pub fn restart(&mut self) {
        self.frame_pos = 0;
        self.gap_remaining = 0;
    }

    pub fn is_playing_voice(&self, voice: VoiceId) -> bool {
        self.active && self.voice == voice
    }
}

impl Default for VoiceSlot {
    fn default() -> Self {
        Self::new()
    }
}
