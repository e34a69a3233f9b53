//! Interpolation.
//!
//! The server sends discrete snapshots at tick boundaries. The client
//! renders at its own rate and interpolates remote character positions
//! between the two most recent snapshots. The local character is not
//! interpolated; it is predicted and snapped to authority.

use std::collections::VecDeque;

use arena_shared::{
    character::CharacterId,
    math::Vec3,
    net::{CharacterState, Snapshot},
};

/// Buffered snapshot history for interpolation.
#[derive(Default)]
pub struct SnapshotBuffer {
    history: VecDeque<Snapshot>,
    max: usize,
}

impl SnapshotBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max,
        }
    }

    pub fn push(&mut self, snap: Snapshot) {
        self.history.push_back(snap);
        while self.history.len() > self.max {
            self.history.pop_front();
        }
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no snapshots are buffered.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Gets an interpolated position for a character given a fractional alpha.
    ///
    /// `alpha` should be in $[0,1]$ where 0 = older snapshot, 1 = newer.
    pub fn interp_character(&self, id: CharacterId, alpha: f32) -> Option<Vec3> {
        if self.history.len() < 2 {
            return None;
        }
        let a = &self.history[self.history.len() - 2];
        let b = &self.history[self.history.len() - 1];

        let pa = find_character(a, id).map(|c| c.state.pos);
        let pb = find_character(b, id).map(|c| c.state.pos);
        match (pa, pb) {
            (Some(pa), Some(pb)) => Some(pa.lerp(pb, alpha)),
            _ => None,
        }
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.history.back()
    }
}

/// Convenience: find a character's state in a snapshot.
pub fn find_character(snap: &Snapshot, id: CharacterId) -> Option<&CharacterState> {
    snap.characters.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::codec::StateWire;

    fn snap(tick: u32, pos: Vec3) -> Snapshot {
        Snapshot {
            tick,
            characters: vec![CharacterState {
                id: CharacterId(1),
                state: StateWire {
                    orient: Vec3::ZERO,
                    pos,
                    vel: Vec3::ZERO,
                    state: 0,
                    weap: -1,
                },
                health: 100.0,
                armor: None,
            }],
        }
    }

    #[test]
    fn interp_blends_the_two_latest_snapshots() {
        let mut buf = SnapshotBuffer::new(4);
        buf.push(snap(1, Vec3::new(0.0, 0.0, 0.0)));
        buf.push(snap(2, Vec3::new(2.0, 0.0, 0.0)));

        let mid = buf.interp_character(CharacterId(1), 0.5).expect("interp");
        assert_eq!(mid, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn interp_needs_two_snapshots_and_a_known_character() {
        let mut buf = SnapshotBuffer::new(4);
        assert!(buf.interp_character(CharacterId(1), 0.5).is_none());
        buf.push(snap(1, Vec3::ZERO));
        assert!(buf.interp_character(CharacterId(1), 0.5).is_none());
        buf.push(snap(2, Vec3::ZERO));
        assert!(buf.interp_character(CharacterId(9), 0.5).is_none());
    }

    #[test]
    fn buffer_drops_oldest_beyond_capacity() {
        let mut buf = SnapshotBuffer::new(2);
        for tick in 0..5 {
            buf.push(snap(tick, Vec3::ZERO));
        }
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.last_snapshot().map(|s| s.tick), Some(4));
    }
}
