//! Audio mixer state
//!
//! Sound synthesis belongs to the presenter; the game only tracks what should
//! play and how loud. Nothing here feeds back into the simulation.

/// Sound cues raised by the game loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Engine loop + music start (new run)
    RunStart,
    /// Player hit an obstacle; fade engine and music
    Crash,
}

/// Volume step for +/- keys
pub const VOLUME_STEP: f32 = 0.1;

/// Music volume and mute switch
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMix {
    music_volume: f32,
    muted: bool,
}

impl Default for AudioMix {
    fn default() -> Self {
        Self {
            music_volume: 0.8,
            muted: false,
        }
    }
}

impl AudioMix {
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Set music volume (0.0 - 1.0)
    pub fn set_volume(&mut self, vol: f32) {
        self.music_volume = vol.clamp(0.0, 1.0);
    }

    pub fn volume_up(&mut self) {
        self.set_volume(self.music_volume + VOLUME_STEP);
    }

    pub fn volume_down(&mut self) {
        self.set_volume(self.music_volume - VOLUME_STEP);
    }

    pub fn volume(&self) -> f32 {
        self.music_volume
    }

    /// Get effective volume
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.music_volume }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamped() {
        let mut mix = AudioMix::default();
        for _ in 0..5 {
            mix.volume_up();
        }
        assert_eq!(mix.volume(), 1.0);
        for _ in 0..15 {
            mix.volume_down();
        }
        assert_eq!(mix.volume(), 0.0);
    }

    #[test]
    fn test_mute_keeps_volume() {
        let mut mix = AudioMix::default();
        mix.toggle_mute();
        assert_eq!(mix.effective_volume(), 0.0);
        assert_eq!(mix.volume(), 0.8);
        mix.toggle_mute();
        assert_eq!(mix.effective_volume(), 0.8);
    }
}
