// Cue scheduling and transport clock shared by instrument implementations

use super::{Cue, CueHandle};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sort key of a pending cue: fire time, then registration order
#[derive(Debug, Clone, Copy)]
struct CueKey {
    at: f64,
    seq: u64,
}

impl PartialEq for CueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CueKey {}

impl PartialOrd for CueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Time-ordered set of pending cues with O(log n) cancellation
///
/// Cues registered with the same fire time come out in registration order.
#[derive(Debug, Default)]
pub struct CueQueue {
    pending: BTreeMap<CueKey, (CueHandle, Cue)>,
    index: HashMap<CueHandle, CueKey>,
    next_handle: CueHandle,
}

impl CueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, cue: Cue, at: f64) -> CueHandle {
        let handle = self.next_handle;
        self.next_handle += 1;

        let key = CueKey { at, seq: handle };
        self.pending.insert(key, (handle, cue));
        self.index.insert(handle, key);
        handle
    }

    pub fn cancel(&mut self, handle: CueHandle) -> bool {
        match self.index.remove(&handle) {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.index.clear();
    }

    /// Pop every cue with a fire time at or before `now`
    pub fn take_due(&mut self, now: f64) -> Vec<(CueHandle, Cue)> {
        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().at > now {
                break;
            }
            let (handle, cue) = entry.remove();
            self.index.remove(&handle);
            due.push((handle, cue));
        }
        due
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending cues in firing order
    pub fn iter(&self) -> impl Iterator<Item = (f64, Cue)> + '_ {
        self.pending.iter().map(|(key, (_, cue))| (key.at, *cue))
    }
}

/// Musical-time clock driven by an external wall clock
///
/// The position is anchored whenever the clock starts or its rate changes,
/// so a new rate only applies to time elapsed after the change.
#[derive(Debug, Clone, Copy)]
pub struct TransportClock {
    anchor_position: f64,
    anchor_wall: f64,
    rate: f64,
    running: bool,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            anchor_position: 0.0,
            anchor_wall: 0.0,
            rate: 1.0,
            running: false,
        }
    }

    pub fn start(&mut self, from: f64, now: f64) {
        self.anchor_position = from;
        self.anchor_wall = now;
        self.running = true;
    }

    pub fn stop(&mut self, now: f64) -> f64 {
        self.anchor_position = self.position(now);
        self.anchor_wall = now;
        self.running = false;
        self.anchor_position
    }

    pub fn set_rate(&mut self, rate: f64, now: f64) {
        if self.running {
            self.anchor_position = self.position(now);
            self.anchor_wall = now;
        }
        self.rate = rate;
    }

    pub fn position(&self, now: f64) -> f64 {
        if self.running {
            self.anchor_position + (now - self.anchor_wall).max(0.0) * self.rate
        } else {
            self.anchor_position
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_cues_come_out_in_time_order() {
        let mut queue = CueQueue::new();
        queue.schedule(Cue::Release { pitch: 60 }, 2.0);
        queue.schedule(Cue::Attack { pitch: 60 }, 1.0);
        queue.schedule(Cue::End, 3.0);

        let due: Vec<Cue> = queue.take_due(2.0).into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            due,
            vec![Cue::Attack { pitch: 60 }, Cue::Release { pitch: 60 }]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![(3.0, Cue::End)]);
    }

    #[test]
    fn test_same_time_keeps_registration_order() {
        let mut queue = CueQueue::new();
        queue.schedule(Cue::Release { pitch: 62 }, 1.0);
        queue.schedule(Cue::Attack { pitch: 62 }, 1.0);
        queue.schedule(Cue::End, 1.0);

        let due: Vec<Cue> = queue.take_due(1.0).into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            due,
            vec![Cue::Release { pitch: 62 }, Cue::Attack { pitch: 62 }, Cue::End]
        );
    }

    #[test]
    fn test_cancelled_cue_never_fires() {
        let mut queue = CueQueue::new();
        let keep = queue.schedule(Cue::Attack { pitch: 60 }, 0.5);
        let drop = queue.schedule(Cue::Attack { pitch: 64 }, 0.5);

        assert!(queue.cancel(drop));
        assert!(!queue.cancel(drop));

        let due = queue.take_due(1.0);
        assert_eq!(due, vec![(keep, Cue::Attack { pitch: 60 })]);
        assert!(!queue.cancel(keep));
    }

    #[test]
    fn test_clear() {
        let mut queue = CueQueue::new();
        let handle = queue.schedule(Cue::End, 0.0);
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.take_due(10.0).is_empty());
        assert!(!queue.cancel(handle));
    }

    #[test]
    fn test_clock_advances_at_rate() {
        let mut clock = TransportClock::new();
        clock.start(2.0, 10.0);

        assert_eq!(clock.position(11.0), 3.0);

        clock.set_rate(2.0, 11.0);
        assert_eq!(clock.position(12.0), 5.0);
    }

    #[test]
    fn test_rate_change_does_not_rescale_elapsed_time() {
        let mut clock = TransportClock::new();
        clock.start(0.0, 0.0);
        clock.set_rate(0.5, 4.0);

        // 4s at 1.0 then 2s at 0.5
        assert_eq!(clock.position(6.0), 5.0);
    }

    #[test]
    fn test_stopped_clock_is_frozen() {
        let mut clock = TransportClock::new();
        clock.start(1.0, 0.0);
        let frozen = clock.stop(1.5);

        assert_eq!(frozen, 2.5);
        assert_eq!(clock.position(100.0), 2.5);
        assert!(!clock.is_running());

        clock.set_rate(2.0, 100.0);
        assert_eq!(clock.position(200.0), 2.5);
        assert_eq!(clock.rate(), 2.0);
    }
}
