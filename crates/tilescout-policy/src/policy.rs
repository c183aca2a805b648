use arrayvec::ArrayVec;
use rand::{Rng as _, SeedableRng as _, seq::IndexedRandom as _};
use rand_pcg::Pcg32;
use tilescout_store::{Walkability, WalkabilityView};
use tilescout_vision::{Classification, FrameSignature, StateType, TileGrid, TilePos, TileSignature};

use crate::{
    action::{Action, Direction},
    config::{PolicyConfig, PolicyMode},
    exits,
    memory::ExplorationMemory,
    seed::PolicySeed,
};

/// Why the policy chose its action; carried for logging and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DecisionReason {
    #[display("screen is not actionable")]
    NotActionable,
    #[display("title screen")]
    TitleScreen,
    #[display("battle")]
    Battle,
    #[display("menu open")]
    MenuOpen,
    #[display("text box on screen")]
    DismissTextBox,
    #[display("retry after first failed move")]
    RetryAfterStuck,
    #[display("loop escape")]
    LoopEscape,
    #[display("stuck, untried direction")]
    StuckUntried,
    #[display("backtrack")]
    Backtrack,
    #[display("random interact")]
    RandomInteract,
    #[display("random cancel")]
    RandomCancel,
    #[display("towards exit")]
    Exit,
    #[display("untried direction")]
    Untried,
    #[display("all directions tried")]
    AllTried,
    #[display("probe adjacent unknown tile")]
    ProbeAdjacent,
    #[display("walk towards unknown tile")]
    ProbeAlongPath,
    #[display("known walkable tile")]
    KnownWalkable,
    #[display("no known walkable tile")]
    NoWalkable,
}

/// Write the run loop applies to the walkability store on the policy's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUpdate {
    ForceFailures {
        signature: TileSignature,
        count: u32,
    },
}

/// Result of one [`ExplorationPolicy::decide`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub reason: DecisionReason,
    pub store_updates: Vec<StoreUpdate>,
    /// Tiles from the player to the tile a discovery move is aiming for.
    pub target_distance: Option<usize>,
}

impl Decision {
    fn new(action: Action, reason: DecisionReason) -> Self {
        Self {
            action,
            reason,
            store_updates: Vec::new(),
            target_distance: None,
        }
    }
}

/// Outcome of the previous move, confirmed against the following frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub direction: Direction,
    /// Signature of the tile the player tried to step onto, if it was on screen.
    pub target: Option<TileSignature>,
    pub moved: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    direction: Direction,
    from: FrameSignature,
    target: Option<TileSignature>,
}

/// Stateful decision engine choosing one action per cycle.
///
/// The policy never writes to the store. Learned walkability flows in through
/// a [`WalkabilityView`], and required writes flow out as
/// [`Decision::store_updates`].
#[derive(Debug, Clone)]
pub struct ExplorationPolicy {
    config: PolicyConfig,
    rng: Pcg32,
    memory: ExplorationMemory,
    pending: Option<PendingMove>,
}

impl ExplorationPolicy {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_seed(config, rand::rng().random())
    }

    /// Like [`Self::new`], but with a specific seed for reproducible decisions.
    #[must_use]
    pub fn with_seed(config: PolicyConfig, seed: PolicySeed) -> Self {
        let memory = ExplorationMemory::new(&config);
        Self {
            config,
            rng: Pcg32::from_seed(seed.0),
            memory,
            pending: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    #[must_use]
    pub fn memory(&self) -> &ExplorationMemory {
        &self.memory
    }

    #[must_use]
    pub fn mode(&self) -> PolicyMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: PolicyMode) {
        self.config.mode = mode;
    }

    /// Clears exploration memory and forgets the pending move.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.pending = None;
    }

    /// Forgets the move chosen by the last [`Self::decide`] without learning
    /// anything from it. Call this when the move could not be delivered.
    pub fn abandon_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(direction = %pending.direction, "pending move abandoned");
        }
    }

    /// Resolves the previous move by comparing the frame it started from with `frame`.
    ///
    /// Returns `None` if the previous action was not a move.
    pub fn confirm_outcome(&mut self, frame: FrameSignature) -> Option<MoveOutcome> {
        let pending = self.pending.take()?;
        let moved = frame != pending.from;
        self.memory
            .record_outcome(pending.from, pending.direction, pending.target, moved);
        Some(MoveOutcome {
            direction: pending.direction,
            target: pending.target,
            moved,
        })
    }

    /// Chooses the next action.
    ///
    /// `store` should reflect the outcome returned by the preceding
    /// [`Self::confirm_outcome`].
    pub fn decide<V>(
        &mut self,
        classification: &Classification,
        grid: &TileGrid,
        frame: FrameSignature,
        store: &V,
    ) -> Decision
    where
        V: WalkabilityView + ?Sized,
    {
        self.pending = None;

        if classification.has_dismissible_text_box() || self.matches_textbox_pattern(grid) {
            return Decision::new(Action::Cancel, DecisionReason::DismissTextBox);
        }

        let decision = match classification.state {
            StateType::BlackScreen | StateType::Unknown => {
                Decision::new(Action::Wait, DecisionReason::NotActionable)
            }
            StateType::Title => Decision::new(Action::OpenMenu, DecisionReason::TitleScreen),
            StateType::Battle => Decision::new(Action::Interact, DecisionReason::Battle),
            StateType::Menu | StateType::Dialogue => {
                Decision::new(Action::Cancel, DecisionReason::MenuOpen)
            }
            StateType::Overworld => match self.config.mode {
                PolicyMode::Explore => self.explore(grid, frame),
                PolicyMode::Discovery => self.discover(grid, store),
            },
        };

        if let Action::Move(direction) = decision.action {
            self.pending = Some(PendingMove {
                direction,
                from: frame,
                target: self.target_signature(grid, direction),
            });
        }
        tracing::debug!(
            action = %decision.action,
            reason = %decision.reason,
            frame = %frame,
            "decided"
        );
        decision
    }

    fn matches_textbox_pattern(&self, grid: &TileGrid) -> bool {
        let patterns = &self.config.textbox_signatures;
        if patterns.is_empty() {
            return false;
        }
        let matches = grid
            .signatures()
            .filter(|sig| patterns.contains(sig))
            .count();
        matches >= self.config.textbox_min_matches.max(1)
    }

    fn neighbor(&self, direction: Direction, steps: usize) -> Option<TilePos> {
        let (dx, dy) = direction.delta();
        let steps = isize::try_from(steps).ok()?;
        self.config
            .player_tile
            .offset(dx.checked_mul(steps)?, dy.checked_mul(steps)?)
    }

    fn target_signature(&self, grid: &TileGrid, direction: Direction) -> Option<TileSignature> {
        grid.get(self.neighbor(direction, 1)?).map(|tile| tile.signature)
    }

    fn random_direction(&mut self) -> Direction {
        Direction::ALL[self.rng.random_range(0..Direction::LEN)]
    }

    fn random_untried(&mut self, location: FrameSignature) -> Option<Direction> {
        let tried = self.memory.tried(location);
        let untried: ArrayVec<Direction, { Direction::LEN }> = Direction::ALL
            .into_iter()
            .filter(|&dir| !tried.contains(dir))
            .collect();
        untried.choose(&mut self.rng).copied()
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.rng.random::<f64>() < probability
    }

    fn explore(&mut self, grid: &TileGrid, location: FrameSignature) -> Decision {
        self.memory.push_recent(location);

        if self.memory.take_first_stuck()
            && let Some(dir) = self.random_untried(location)
        {
            return Decision::new(Action::Move(dir), DecisionReason::RetryAfterStuck);
        }

        if self.memory.recent_count(location) >= self.config.loop_repeat_threshold {
            tracing::debug!(frame = %location, "loop detected");
            self.memory.clear_tried(location);
            self.memory.forget_recent(location);
            let dir = self.random_direction();
            return Decision::new(Action::Move(dir), DecisionReason::LoopEscape);
        }

        if self.memory.stuck_counter() >= self.config.stuck_threshold {
            if let Some(dir) = self.random_untried(location) {
                return Decision::new(Action::Move(dir), DecisionReason::StuckUntried);
            }
            if let Some(last) = self.memory.pop_move() {
                self.memory.clear_tried(location);
                self.memory.reset_stuck();
                return Decision::new(Action::Move(last.opposite()), DecisionReason::Backtrack);
            }
            tracing::debug!("stuck with nothing to backtrack, clearing exploration memory");
            self.memory.clear();
        }

        if self.chance(self.config.interact_probability) {
            self.memory.reset_stuck();
            return Decision::new(Action::Interact, DecisionReason::RandomInteract);
        }
        if self.chance(self.config.cancel_probability) {
            self.memory.reset_stuck();
            return Decision::new(Action::Cancel, DecisionReason::RandomCancel);
        }

        let tried = self.memory.tried(location);
        if let Some(exit) = exits::best_exit(
            grid,
            self.config.player_tile,
            self.config.exit_darkness_threshold,
            tried,
            self.config.tried_direction_penalty,
        ) {
            return Decision::new(Action::Move(exit.direction), DecisionReason::Exit);
        }

        if let Some(dir) = self.random_untried(location) {
            return Decision::new(Action::Move(dir), DecisionReason::Untried);
        }

        self.memory.clear_tried(location);
        let dir = self.random_direction();
        Decision::new(Action::Move(dir), DecisionReason::AllTried)
    }

    fn discover<V>(&mut self, grid: &TileGrid, store: &V) -> Decision
    where
        V: WalkabilityView + ?Sized,
    {
        let mut store_updates = Vec::new();
        let stuck_dir = match self.memory.streak() {
            Some(streak) if streak.count >= self.config.discovery_stuck_limit => {
                if streak.count == self.config.discovery_stuck_limit
                    && let Some(signature) = streak.target
                {
                    tracing::info!(
                        %signature,
                        direction = %streak.direction,
                        "direction keeps failing, forcing tile to blocking"
                    );
                    store_updates.push(StoreUpdate::ForceFailures {
                        signature,
                        count: self.config.forced_block_observations,
                    });
                }
                Some(streak.direction)
            }
            _ => None,
        };

        let mut decision = self.discovery_move(grid, store, stuck_dir);
        decision.store_updates = store_updates;
        decision
    }

    fn walkability_at<V>(
        &self,
        grid: &TileGrid,
        store: &V,
        dir: Direction,
        steps: usize,
    ) -> Option<Walkability>
    where
        V: WalkabilityView + ?Sized,
    {
        let tile = grid.get(self.neighbor(dir, steps)?)?;
        Some(store.walkability(tile.signature))
    }

    fn discovery_move<V>(
        &mut self,
        grid: &TileGrid,
        store: &V,
        stuck_dir: Option<Direction>,
    ) -> Decision
    where
        V: WalkabilityView + ?Sized,
    {
        let open: ArrayVec<Direction, { Direction::LEN }> = Direction::ALL
            .into_iter()
            .filter(|&dir| Some(dir) != stuck_dir)
            .collect();

        let adjacent_unknown: ArrayVec<Direction, { Direction::LEN }> = open
            .iter()
            .copied()
            .filter(|&dir| self.walkability_at(grid, store, dir, 1) == Some(Walkability::Unknown))
            .collect();
        if let Some(&dir) = adjacent_unknown.choose(&mut self.rng) {
            let mut decision = Decision::new(Action::Move(dir), DecisionReason::ProbeAdjacent);
            decision.target_distance = Some(1);
            return decision;
        }

        let extent = grid.cols().max(grid.rows());
        for distance in 2..=extent {
            let reachable: ArrayVec<Direction, { Direction::LEN }> = open
                .iter()
                .copied()
                .filter(|&dir| self.unknown_via_walkable_path(grid, store, dir, distance))
                .collect();
            if let Some(&dir) = reachable.choose(&mut self.rng) {
                let mut decision = Decision::new(Action::Move(dir), DecisionReason::ProbeAlongPath);
                decision.target_distance = Some(distance);
                return decision;
            }
        }

        let walkable: ArrayVec<Direction, { Direction::LEN }> = open
            .iter()
            .copied()
            .filter(|&dir| self.walkability_at(grid, store, dir, 1) == Some(Walkability::Walkable))
            .collect();
        if let Some(&dir) = walkable.choose(&mut self.rng) {
            return Decision::new(Action::Move(dir), DecisionReason::KnownWalkable);
        }

        let dir = open
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_else(|| self.random_direction());
        Decision::new(Action::Move(dir), DecisionReason::NoWalkable)
    }

    /// `true` if the tile `distance` steps away is unknown and every tile
    /// before it is known walkable.
    fn unknown_via_walkable_path<V>(
        &self,
        grid: &TileGrid,
        store: &V,
        dir: Direction,
        distance: usize,
    ) -> bool
    where
        V: WalkabilityView + ?Sized,
    {
        let path_walkable = (1..distance)
            .all(|step| self.walkability_at(grid, store, dir, step) == Some(Walkability::Walkable));
        path_walkable
            && self.walkability_at(grid, store, dir, distance) == Some(Walkability::Unknown)
    }
}
