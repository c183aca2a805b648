use std::collections::{HashMap, VecDeque};

use tilescout_vision::{FrameSignature, TileSignature};

use crate::{action::Direction, config::PolicyConfig};

/// Set of directions, stored as a 4-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub const EMPTY: Self = Self(0);

    #[must_use]
    pub const fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    pub const fn insert(&mut self, dir: Direction) {
        self.0 |= 1 << dir.index();
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |&dir| self.contains(dir))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<T: IntoIterator<Item = Direction>>(iter: T) -> Self {
        let mut set = Self::EMPTY;
        for dir in iter {
            set.insert(dir);
        }
        set
    }
}

/// Fixed-capacity queue that evicts its oldest element when full.
#[derive(Debug, Clone)]
pub(crate) struct RingBuffer<T> {
    capacity: usize,
    buf: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            buf: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buf.len() >= self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    pub(crate) fn pop_newest(&mut self) -> Option<T> {
        self.buf.pop_back()
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.buf.retain(f);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.buf.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }
}

/// Streak of identical failed moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailureStreak {
    pub(crate) direction: Direction,
    pub(crate) target: Option<TileSignature>,
    pub(crate) count: u32,
}

/// Short-term exploration state, keyed by frame signature ("location").
///
/// Lives only in memory and is cleared by [`crate::ExplorationPolicy::reset`].
#[derive(Debug, Clone)]
pub struct ExplorationMemory {
    tried: HashMap<FrameSignature, DirectionSet>,
    move_history: RingBuffer<Direction>,
    recent_frames: RingBuffer<FrameSignature>,
    stuck_counter: u32,
    first_stuck: bool,
    streak: Option<FailureStreak>,
}

impl ExplorationMemory {
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            tried: HashMap::new(),
            move_history: RingBuffer::with_capacity(config.move_history_capacity),
            recent_frames: RingBuffer::with_capacity(config.recent_frames_capacity),
            stuck_counter: 0,
            first_stuck: false,
            streak: None,
        }
    }

    pub fn clear(&mut self) {
        self.tried.clear();
        self.move_history.clear();
        self.recent_frames.clear();
        self.stuck_counter = 0;
        self.first_stuck = false;
        self.streak = None;
    }

    #[must_use]
    pub fn tried(&self, location: FrameSignature) -> DirectionSet {
        self.tried.get(&location).copied().unwrap_or_default()
    }

    pub fn mark_tried(&mut self, location: FrameSignature, dir: Direction) {
        self.tried.entry(location).or_default().insert(dir);
    }

    pub fn clear_tried(&mut self, location: FrameSignature) {
        self.tried.remove(&location);
    }

    #[must_use]
    pub const fn stuck_counter(&self) -> u32 {
        self.stuck_counter
    }

    pub const fn reset_stuck(&mut self) {
        self.stuck_counter = 0;
        self.first_stuck = false;
    }

    /// Returns `true` once right after the first failed move of a streak.
    pub(crate) const fn take_first_stuck(&mut self) -> bool {
        let first = self.first_stuck;
        self.first_stuck = false;
        first
    }

    /// Number of times `frame` appears in the recent window.
    #[must_use]
    pub fn recent_count(&self, frame: FrameSignature) -> usize {
        self.recent_frames.iter().filter(|&&f| f == frame).count()
    }

    #[must_use]
    pub fn recent_len(&self) -> usize {
        self.recent_frames.len()
    }

    pub(crate) fn push_recent(&mut self, frame: FrameSignature) {
        self.recent_frames.push(frame);
    }

    pub(crate) fn forget_recent(&mut self, frame: FrameSignature) {
        self.recent_frames.retain(|&f| f != frame);
    }

    pub(crate) fn pop_move(&mut self) -> Option<Direction> {
        self.move_history.pop_newest()
    }

    pub(crate) const fn streak(&self) -> Option<FailureStreak> {
        self.streak
    }

    /// Updates stuck bookkeeping with the outcome of a move made from `location`.
    pub(crate) fn record_outcome(
        &mut self,
        location: FrameSignature,
        direction: Direction,
        target: Option<TileSignature>,
        moved: bool,
    ) {
        if moved {
            self.move_history.push(direction);
            self.reset_stuck();
            self.streak = None;
            return;
        }

        self.stuck_counter = self.stuck_counter.saturating_add(1);
        self.first_stuck = self.stuck_counter == 1;
        self.mark_tried(location, direction);
        self.streak = match self.streak {
            Some(streak) if streak.direction == direction && streak.target == target => {
                Some(FailureStreak {
                    count: streak.count.saturating_add(1),
                    ..streak
                })
            }
            _ => Some(FailureStreak {
                direction,
                target,
                count: 1,
            }),
        };
    }
}
