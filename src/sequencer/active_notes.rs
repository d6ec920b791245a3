// Active notes - Reference-counted set of sounding pitches

/// Per-pitch count of attacks not yet released
///
/// Overlapping notes of the same pitch each hold a reference, so the pitch
/// stays active until the last of them is released.
#[derive(Debug, Clone)]
pub struct ActiveNoteSet {
    counts: [u32; 128],
    active: usize,
}

impl ActiveNoteSet {
    pub fn new() -> Self {
        Self {
            counts: [0; 128],
            active: 0,
        }
    }

    pub fn record_attack(&mut self, pitch: u8) {
        let Some(count) = self.counts.get_mut(pitch as usize) else {
            return;
        };
        if *count == 0 {
            self.active += 1;
        }
        *count += 1;
    }

    /// Decrement, floored at zero. Returns true when the pitch went silent.
    pub fn record_release(&mut self, pitch: u8) -> bool {
        let Some(count) = self.counts.get_mut(pitch as usize) else {
            return false;
        };
        match *count {
            0 => false,
            1 => {
                *count = 0;
                self.active -= 1;
                true
            }
            _ => {
                *count -= 1;
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.counts = [0; 128];
        self.active = 0;
    }

    pub fn is_active(&self, pitch: u8) -> bool {
        self.count(pitch) > 0
    }

    pub fn count(&self, pitch: u8) -> u32 {
        self.counts.get(pitch as usize).copied().unwrap_or(0)
    }

    /// Sounding pitches in ascending order
    pub fn pitches(&self) -> Vec<u8> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(pitch, _)| pitch as u8)
    }

    /// Number of distinct sounding pitches
    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Bit mask of sounding pitches, bit n set for pitch n
    pub fn mask(&self) -> u128 {
        self.iter().fold(0u128, |mask, pitch| mask | (1u128 << pitch))
    }
}

impl Default for ActiveNoteSet {
    fn default() -> Self {
        Self::new()
    }
}
