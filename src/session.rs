//! Player-facing session: actions, item use, busy windows, save and load.
//!
//! The loaded pet, inventory and level sit behind one mutex shared with the decay
//! timers, so player actions, decay ticks and the game-over check never interleave.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{SessionError, StoreError};
use crate::inventory::{Inventory, ItemCategory};
use crate::model::{Pet, PetReaction, StatKind, Stats, Variant};
use crate::sim::{lock, DecayScheduler, DecaySink, GameOverSignal, Hook};
use crate::storage::{GameProgress, RestoredSlot, SaveSlot, SaveStore, SlotSummary};

pub type BusyHook = Arc<dyn Fn(bool) + Send + Sync>;

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Busy,
    GameOver,
}

/// The four direct care actions. Each adds one point to its stat regardless of variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectAction {
    Feed,
    Play,
    Groom,
    Rest,
}

impl DirectAction {
    pub fn stat(self) -> StatKind {
        match self {
            DirectAction::Feed => StatKind::Hunger,
            DirectAction::Play => StatKind::Fun,
            DirectAction::Groom => StatKind::Grooming,
            DirectAction::Rest => StatKind::Sleep,
        }
    }
}

/// The pet's own variant-flavoured behaviours, see [`Pet::eat`] and friends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PetAction {
    Eat,
    Play,
    Sleep,
    Groom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub level: u32,
    pub stats: Stats,
    /// Units of the used item left, for item use.
    pub remaining: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub save_id: u32,
    pub username: String,
    pub pet: Pet,
    pub inventory: Inventory,
    pub level: u32,
    pub phase: Phase,
}

pub struct SessionState {
    save_id: u32,
    username: String,
    pet: Pet,
    inventory: Inventory,
    level: u32,
    phase: Phase,
    /// A busy window whose closing `on_busy_changed(false)` has not been sent yet.
    busy_window: bool,
}

impl SessionState {
    fn from_slot(slot: SaveSlot) -> Self {
        Self {
            save_id: slot.save_id,
            username: slot.username,
            pet: slot.pet,
            inventory: slot.inventory,
            level: slot.progress.level.max(1),
            phase: Phase::Idle,
            busy_window: false,
        }
    }

    fn to_slot(&self, save_id: u32, at: NaiveDateTime) -> SaveSlot {
        SaveSlot {
            save_id,
            username: self.username.clone(),
            pet: self.pet.clone(),
            inventory: self.inventory.clone(),
            progress: GameProgress {
                level: self.level,
                last_played: Some(at),
            },
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            save_id: self.save_id,
            username: self.username.clone(),
            pet: self.pet.clone(),
            inventory: self.inventory.clone(),
            level: self.level,
            phase: self.phase,
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::Busy => Err(SessionError::Busy),
            Phase::GameOver => Err(SessionError::GameOver),
        }
    }

    /// Moves to `GameOver` when every stat is zero. True only on that transition.
    fn check_game_over(&mut self) -> bool {
        if self.phase != Phase::GameOver && self.pet.is_exhausted() {
            self.phase = Phase::GameOver;
            return true;
        }
        false
    }

    fn outcome(&self, remaining: Option<u32>) -> Outcome {
        Outcome {
            level: self.level,
            stats: self.pet.stats(),
            remaining,
        }
    }
}

impl DecaySink for SessionState {
    fn decay(&mut self, stat: StatKind) -> bool {
        if self.phase == Phase::GameOver {
            return false;
        }
        self.pet.decrease(stat, 1);
        debug!(stat = %stat, value = %self.pet.stat(stat), "stat decreased");
        self.check_game_over()
    }
}

struct ActiveSession {
    state: Arc<Mutex<SessionState>>,
    token: CancellationToken,
    scheduler: DecayScheduler<SessionState>,
    signal: GameOverSignal,
}

pub struct SessionController {
    store: SaveStore,
    settings: Settings,
    on_game_over: Option<Hook>,
    on_busy_changed: Option<BusyHook>,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(store: SaveStore, settings: Settings) -> Self {
        Self {
            store,
            settings,
            on_game_over: None,
            on_busy_changed: None,
            active: None,
        }
    }

    /// Called once, a grace delay after the pet's stats all reach zero. Applies to
    /// sessions started after registration.
    pub fn on_game_over(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.on_game_over = Some(Arc::new(hook));
    }

    /// Called with `true` when an action starts a busy window and `false` when it ends,
    /// including when game over or [`end_session`](Self::end_session) cuts it short.
    pub fn on_busy_changed(&mut self, hook: impl Fn(bool) + Send + Sync + 'static) {
        self.on_busy_changed = Some(Arc::new(hook));
    }

    pub fn create_save(&self, username: &str) -> Result<u32, SessionError> {
        self.store.create(username, now()).map_err(|e| {
            error!(error = %e, "could not create save");
            SessionError::from(e)
        })
    }

    pub fn list_saves(&self) -> Result<Vec<SlotSummary>, SessionError> {
        Ok(self.store.list()?)
    }

    /// Records the chosen pet for `save_id` and starts playing it.
    ///
    /// Starts the decay timers, so it must be called inside a tokio runtime.
    pub fn choose_pet(
        &mut self,
        save_id: u32,
        name: &str,
        variant: Variant,
    ) -> Result<SessionSnapshot, SessionError> {
        if let Err(e) = self.store.assign_pet(save_id, name, variant) {
            warn!(save_id, error = %e, "could not record chosen pet");
            return Err(e.into());
        }
        self.load_save(save_id)
    }

    /// Replaces the current session with the stored slot. An unknown id or unreadable
    /// file leaves the current session running; a malformed document or slot loads the
    /// fallback pet.
    ///
    /// Starts the decay timers, so it must be called inside a tokio runtime.
    pub fn load_save(&mut self, save_id: u32) -> Result<SessionSnapshot, SessionError> {
        let restored = match self.store.find(save_id) {
            Ok(r) => r,
            Err(StoreError::Malformed(reason)) => {
                warn!(save_id, reason = %reason, "save file malformed");
                RestoredSlot::fallback(save_id, reason)
            }
            Err(StoreError::SlotNotFound(id)) => {
                warn!(save_id = id, "save data not found");
                return Err(SessionError::SlotNotFound(id));
            }
            Err(e) => {
                error!(save_id, error = %e, "failed to load save data");
                return Err(e.into());
            }
        };
        if restored.degraded.is_some() {
            warn!(
                save_id,
                pet = restored.slot.pet.name(),
                "initialized default pet"
            );
        }
        self.end_session();
        Ok(self.begin(restored.slot))
    }

    fn begin(&mut self, slot: SaveSlot) -> SessionSnapshot {
        let token = CancellationToken::new();
        let intervals = slot
            .pet
            .variant()
            .profile()
            .decay
            .scaled(self.settings.decay_time_scale);
        let state = Arc::new(Mutex::new(SessionState::from_slot(slot)));
        let signal = GameOverSignal::new(
            self.settings.game_over_grace(),
            token.clone(),
            self.on_game_over.clone(),
        );
        let scheduler = DecayScheduler::start(state.clone(), intervals, &token, signal.clone());

        let (snapshot, ended) = {
            let mut s = lock(&state);
            let ended = s.check_game_over();
            (s.snapshot(), ended)
        };
        info!(
            save_id = snapshot.save_id,
            username = %snapshot.username,
            pet = snapshot.pet.name(),
            pet_type = %snapshot.pet.variant(),
            level = snapshot.level,
            "session started"
        );
        if ended {
            scheduler.stop();
            signal.raise();
        }
        self.active = Some(ActiveSession {
            state,
            token,
            scheduler,
            signal,
        });
        snapshot
    }

    /// Stops the decay timers, pending busy windows and any pending game-over notice. An
    /// open busy window is closed with `on_busy_changed(false)`.
    pub fn end_session(&mut self) {
        if let Some(session) = self.active.take() {
            session.scheduler.stop();
            session.token.cancel();
            let (save_id, closed) = {
                let mut s = lock(&session.state);
                (s.save_id, std::mem::take(&mut s.busy_window))
            };
            if closed {
                self.notify_busy(false);
            }
            info!(save_id, "session ended");
        }
    }

    /// Writes the current session into slot `save_id`, stamped with the current time.
    pub fn save_game(&self, save_id: u32) -> Result<(), SessionError> {
        let session = self.active.as_ref().ok_or(SessionError::NoSession)?;
        let slot = lock(&session.state).to_slot(save_id, now());
        match self.store.update(&slot) {
            Ok(()) => {
                info!(save_id, level = slot.progress.level, "game data saved");
                Ok(())
            }
            Err(e) => {
                error!(save_id, error = %e, "failed to save game data");
                Err(e.into())
            }
        }
    }

    pub fn active_save_id(&self) -> Option<u32> {
        self.active.as_ref().map(|s| lock(&s.state).save_id)
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.active.as_ref().map(|s| lock(&s.state).snapshot())
    }

    pub fn pet_snapshot(&self) -> Option<Pet> {
        self.active.as_ref().map(|s| lock(&s.state).pet.clone())
    }

    pub fn is_game_over(&self) -> bool {
        self.phase() == Some(Phase::GameOver)
    }

    pub fn is_busy(&self) -> bool {
        self.phase() == Some(Phase::Busy)
    }

    fn phase(&self) -> Option<Phase> {
        self.active.as_ref().map(|s| lock(&s.state).phase)
    }

    pub fn feed(&self) -> Result<Outcome, SessionError> {
        self.direct(DirectAction::Feed)
    }

    pub fn play_with(&self) -> Result<Outcome, SessionError> {
        self.direct(DirectAction::Play)
    }

    pub fn groom(&self) -> Result<Outcome, SessionError> {
        self.direct(DirectAction::Groom)
    }

    pub fn rest(&self) -> Result<Outcome, SessionError> {
        self.direct(DirectAction::Rest)
    }

    pub fn direct(&self, action: DirectAction) -> Result<Outcome, SessionError> {
        self.act(self.settings.busy.direct_action(), |state| {
            let stat = action.stat();
            state.pet.increase(stat, 1);
            state.level = state.level.saturating_add(1);
            info!(
                action = ?action,
                stat = %stat,
                value = %state.pet.stat(stat),
                level = state.level,
                "care action"
            );
            Ok(state.outcome(None))
        })
    }

    /// Uses one `category{index}` item: applies the variant's effect for the category,
    /// takes one from the inventory and raises the level (gifts by two).
    pub fn use_item(&self, category: ItemCategory, index: u32) -> Result<Outcome, SessionError> {
        let name = category.item_name(index);
        self.act(self.settings.busy.item(category), |state| {
            if state.inventory.quantity(&name).unwrap_or(0) == 0 {
                info!(item = %name, "no item left");
                return Err(SessionError::NoItemLeft(name.clone()));
            }
            state.inventory.remove_item(&name, 1)?;
            let effect = state.pet.variant().item_effect(category);
            state.pet.apply(effect);
            state.level = state.level.saturating_add(category.level_gain());
            let remaining = state.inventory.quantity(&name);
            info!(
                item = %name,
                remaining = remaining.unwrap_or(0),
                level = state.level,
                "item used"
            );
            Ok(state.outcome(remaining))
        })
    }

    /// Runs one of the pet's behaviour methods. These do not raise the level.
    pub fn pet_action(&self, action: PetAction) -> Result<PetReaction, SessionError> {
        self.act(self.settings.busy.direct_action(), |state| {
            let reaction = match action {
                PetAction::Eat => state.pet.eat(),
                PetAction::Play => state.pet.play(),
                PetAction::Sleep => state.pet.sleep(),
                PetAction::Groom => state.pet.groom(),
            };
            if reaction.is_noop() {
                warn!("{}", reaction.describe(&state.pet));
            } else {
                info!("{}", reaction.describe(&state.pet));
            }
            Ok(reaction)
        })
    }

    /// Gatekeeper for every action: rejects while busy or after game over, runs `f`
    /// under the state lock, checks for game over, then opens the busy window.
    fn act<R>(
        &self,
        busy_for: Duration,
        f: impl FnOnce(&mut SessionState) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let session = self.active.as_ref().ok_or(SessionError::NoSession)?;
        let (result, ended) = {
            let mut state = lock(&session.state);
            if let Err(e) = state.ensure_ready() {
                debug!(error = %e, "action rejected");
                return Err(e);
            }
            let result = f(&mut *state)?;
            let ended = state.check_game_over();
            if !ended && !busy_for.is_zero() {
                state.phase = Phase::Busy;
                state.busy_window = true;
            }
            (result, ended)
        };
        if ended {
            session.scheduler.stop();
            session.signal.raise();
        } else if !busy_for.is_zero() {
            self.notify_busy(true);
            self.schedule_idle(session, busy_for);
        }
        Ok(result)
    }

    fn notify_busy(&self, busy: bool) {
        if let Some(hook) = &self.on_busy_changed {
            hook(busy);
        }
    }

    /// Closes the busy window after `after`, or as soon as the decay timers stop because
    /// the game ended. Teardown closes it from [`end_session`](Self::end_session) instead.
    fn schedule_idle(&self, session: &ActiveSession, after: Duration) {
        let state = session.state.clone();
        let stopped = session.scheduler.stopped();
        let hook = self.on_busy_changed.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stopped.cancelled() => {}
                _ = tokio::time::sleep(after) => {}
            }
            let closed = {
                let mut s = lock(&state);
                if s.phase == Phase::Busy {
                    s.phase = Phase::Idle;
                }
                std::mem::take(&mut s.busy_window)
            };
            if closed {
                debug!("busy window over");
                if let Some(hook) = hook {
                    hook(false);
                }
            }
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stat;

    fn state(stats: Stats) -> SessionState {
        SessionState {
            save_id: 1,
            username: "u".into(),
            pet: Pet::with_stats("p", Variant::Dragon, stats),
            inventory: Inventory::starter(),
            level: 1,
            phase: Phase::Idle,
            busy_window: false,
        }
    }

    #[test]
    fn decay_floors_at_zero_and_ends_once() {
        let mut s = state(Stats {
            hunger: Stat::new(1),
            fun: Stat::EMPTY,
            sleep: Stat::EMPTY,
            grooming: Stat::EMPTY,
        });
        assert!(!s.decay(StatKind::Fun));
        assert_eq!(s.pet.stat(StatKind::Fun), Stat::EMPTY);
        assert!(s.decay(StatKind::Hunger));
        assert_eq!(s.phase, Phase::GameOver);
        assert!(!s.decay(StatKind::Hunger));
        assert!(!s.check_game_over());
    }

    #[test]
    fn three_empty_stats_are_not_game_over() {
        let mut s = state(Stats {
            hunger: Stat::EMPTY,
            fun: Stat::EMPTY,
            sleep: Stat::EMPTY,
            grooming: Stat::new(2),
        });
        assert!(!s.check_game_over());
        assert!(!s.decay(StatKind::Grooming));
        assert_eq!(s.phase, Phase::Idle);
    }

    #[test]
    fn busy_and_game_over_reject_actions() {
        let mut s = state(Stats::default());
        assert!(s.ensure_ready().is_ok());
        s.phase = Phase::Busy;
        assert!(matches!(s.ensure_ready(), Err(SessionError::Busy)));
        s.phase = Phase::GameOver;
        assert!(matches!(s.ensure_ready(), Err(SessionError::GameOver)));
    }

    #[test]
    fn slot_conversion_keeps_level_floor() {
        let slot = SaveSlot {
            save_id: 4,
            username: "u".into(),
            pet: Pet::new("p", Variant::Phoenix),
            inventory: Inventory::new(),
            progress: GameProgress {
                level: 0,
                last_played: None,
            },
        };
        let s = SessionState::from_slot(slot);
        assert_eq!(s.level, 1);
        let at = chrono::NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let back = s.to_slot(9, at);
        assert_eq!(back.save_id, 9);
        assert_eq!(back.progress.last_played, Some(at));
    }
}
