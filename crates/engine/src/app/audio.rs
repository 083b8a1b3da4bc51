use tracing::debug;

/// Music control the engagement layer drives when play pauses and resumes.
pub trait AudioSink {
    fn pause_music(&mut self);
    fn continue_music(&mut self);
}

/// Sink for hosts without audio. Tracks the requested state and logs it.
#[derive(Debug, Default)]
pub struct SilentAudio {
    paused: bool,
}

impl SilentAudio {
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl AudioSink for SilentAudio {
    fn pause_music(&mut self) {
        self.paused = true;
        debug!("music_paused");
    }

    fn continue_music(&mut self) {
        self.paused = false;
        debug!("music_continued");
    }
}
