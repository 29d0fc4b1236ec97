//! The base/out algebra and the arena-owned chain of play states.

use serde::{Deserialize, Serialize};

use crate::domain::{Advance, Base, BattedBall, Count, Out, Pitch, PositionRef, Tag};

/// Occupied bases plus the out count of a half-inning in progress.
#[derive(Debug, Default, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct BaseOut {
    pub first: bool,
    pub second: bool,
    pub third: bool,
    pub outs: u8,
}

impl BaseOut {
    pub const EMPTY: Self = Self {
        first: false,
        second: false,
        third: false,
        outs: 0,
    };

    pub const fn new(first: bool, second: bool, third: bool, outs: u8) -> Self {
        Self {
            first,
            second,
            third,
            outs,
        }
    }

    /// Places a runner at `base`, or removes one when `out` is set. Home is
    /// not an occupancy.
    pub fn runner(&mut self, base: Base, out: bool) {
        match base {
            Base::First => self.first = !out,
            Base::Second => self.second = !out,
            Base::Third => self.third = !out,
            Base::Home => {}
        }
    }

    /// Applies the successful advances of one play: every named source base
    /// is vacated, then every non-Home destination is occupied. Runners the
    /// advance does not name stay put.
    pub fn apply(&mut self, advance: &Advance) {
        for (from, _) in advance.iter() {
            if let Some(base) = from.current_base() {
                self.runner(base, true);
            }
        }
        for (_, to) in advance.iter() {
            self.runner(to, false);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn scoring_position(&self) -> bool {
        self.second || self.third
    }

    pub fn runners(&self) -> u8 {
        u8::from(self.first) + u8::from(self.second) + u8::from(self.third)
    }

    /// Whether a runner advancing to `base` can be forced out there.
    pub fn force(&self, base: Base) -> bool {
        match base {
            Base::First => true,
            Base::Second => self.first,
            Base::Third => self.first && self.second,
            Base::Home => self.first && self.second && self.third,
        }
    }

    /// The farthest base at which a force is live.
    pub fn forced(&self) -> Base {
        if self.first && self.second && self.third {
            Base::Home
        } else if self.first && self.second {
            Base::Third
        } else if self.first {
            Base::Second
        } else {
            Base::First
        }
    }

    /// The state tag for this situation; the out count must be in play.
    pub fn state(&self) -> StateKind {
        if self.outs > 2 {
            StateKind::Null
        } else {
            StateKind::InPlay(*self)
        }
    }

    /// Packed encoding: `0x10 * (outs + 1) | first << 2 | second << 1 | third`.
    pub fn code(&self) -> u8 {
        0x10 * (self.outs + 1)
            | u8::from(self.first) << 2
            | u8::from(self.second) << 1
            | u8::from(self.third)
    }
}

/// One of the 24 in-play situations, a terminal marker, or null.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum StateKind {
    Null,
    InPlay(BaseOut),
    EndHalf,
    EndInning,
    EndGame,
}

impl Default for StateKind {
    fn default() -> Self {
        Self::Null
    }
}

impl StateKind {
    const END_HALF_CODE: u8 = 0x40;
    const END_INNING_CODE: u8 = 0x41;
    const END_GAME_CODE: u8 = 0x42;

    pub fn code(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::InPlay(base_out) => base_out.code(),
            Self::EndHalf => Self::END_HALF_CODE,
            Self::EndInning => Self::END_INNING_CODE,
            Self::EndGame => Self::END_GAME_CODE,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Null,
            Self::END_HALF_CODE => Self::EndHalf,
            Self::END_INNING_CODE => Self::EndInning,
            Self::END_GAME_CODE => Self::EndGame,
            c => {
                let outs = (c >> 4).wrapping_sub(1);
                if outs > 2 {
                    return Self::Null;
                }
                Self::InPlay(BaseOut::new(c & 0x04 != 0, c & 0x02 != 0, c & 0x01 != 0, outs))
            }
        }
    }

    /// The situation this state represents; sentinels read as empty bases.
    pub fn base_out(self) -> BaseOut {
        match self {
            Self::InPlay(base_out) => base_out,
            _ => BaseOut::EMPTY,
        }
    }

    pub const fn end_of_inning(self) -> bool {
        matches!(self, Self::EndHalf | Self::EndInning)
    }
}

/// What a play line decoded to.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum EventKind {
    NoPlay,
    Out,
    Error,
    FoulError,
    Strikeout,
    Walk,
    IntentionalWalk,
    HitByPitch,
    Interference,
    Single,
    Double,
    GroundRuleDouble,
    Triple,
    HomeRun,
    FieldersChoice,
    StolenBase,
    CaughtStealing,
    Pickoff,
    PickoffCaughtStealing,
    Balk,
    DefensiveIndifference,
    OtherAdvance,
    PassedBall,
    WildPitch,
}

impl Default for EventKind {
    fn default() -> Self {
        Self::NoPlay
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub outs: Vec<Out>,
    pub advance: Advance,
    pub runs_scored: u32,
}

/// Handle into the state arena. Nodes never move, so an id stays valid for
/// the arena's lifetime.
pub type StateId = usize;

/// One play, threaded into its game's chain and its batter's chain.
#[derive(Debug, Default, Clone)]
pub struct State {
    pub kind: StateKind,
    pub event: Event,
    pub batter: PositionRef,
    pub pitches: Vec<Pitch>,
    pub base_runners: Vec<PositionRef>,
    pub batted_ball: BattedBall,
    pub inning: u8,
    pub count: Count,
    /// True when the visiting team is at bat.
    pub visiting: bool,
    /// Run totals at entry to this state.
    pub runs_home: u32,
    pub runs_visiting: u32,
    pub game: Option<Tag>,
    /// The batter's next plate appearance.
    pub player_link: Option<StateId>,
    /// The next state in the game.
    pub game_link: Option<StateId>,
}

impl State {
    fn new(kind: StateKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs_home + self.runs_visiting
    }

    pub fn end_of_inning(&self) -> bool {
        self.kind.end_of_inning()
    }
}

/// Flat arena owning every state in the process. Games interleave in the
/// arena in parse order but each game's chain is threaded by `game_link`.
#[derive(Debug, Default)]
pub struct StateArena {
    states: Vec<State>,
}

impl StateArena {
    pub fn create(&mut self, kind: StateKind) -> StateId {
        self.states.push(State::new(kind));
        self.states.len() - 1
    }

    pub fn get(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id)
    }

    pub fn count(&self) -> usize {
        self.states.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// Clears a node back to null. Ids are never reused, so removal keeps
    /// every other handle valid.
    pub fn remove(&mut self, id: StateId) {
        if let Some(state) = self.states.get_mut(id) {
            *state = State::new(StateKind::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaseRunner;

    fn all_in_play() -> Vec<BaseOut> {
        let mut all = Vec::with_capacity(24);
        for outs in 0..3 {
            for bits in 0..8u8 {
                all.push(BaseOut::new(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0, outs));
            }
        }
        all
    }

    #[test]
    fn state_codes_are_a_bijection() {
        let mut seen = std::collections::HashSet::new();
        for base_out in all_in_play() {
            let code = base_out.code();
            assert!(seen.insert(code), "duplicate code {code:#x}");
            assert_eq!(StateKind::from_code(code), StateKind::InPlay(base_out));
        }
        assert_eq!(seen.len(), 24);
    }

    #[test]
    fn sentinel_codes_round_trip() {
        for kind in [
            StateKind::Null,
            StateKind::EndHalf,
            StateKind::EndInning,
            StateKind::EndGame,
        ] {
            assert_eq!(StateKind::from_code(kind.code()), kind);
        }
        assert_eq!(StateKind::from_code(0x55), StateKind::Null);
    }

    #[test]
    fn empty_bases_no_outs_is_0x10() {
        assert_eq!(BaseOut::EMPTY.code(), 0x10);
        let loaded_two_out = BaseOut::new(true, true, true, 2);
        assert_eq!(loaded_two_out.code(), 0x37);
    }

    #[test]
    fn applying_an_advance_to_fresh_bases_gives_destination_occupancy() {
        let mut advance = Advance::default();
        advance.set(BaseRunner::Batter, Base::First);
        advance.set(BaseRunner::First, Base::Third);
        advance.set(BaseRunner::Third, Base::Home);
        let mut base_out = BaseOut::EMPTY;
        base_out.apply(&advance);
        assert_eq!(base_out, BaseOut::new(true, false, true, 0));
    }

    #[test]
    fn unnamed_runners_stay_put() {
        // Runner on second holds while the batter singles.
        let mut base_out = BaseOut::new(false, true, false, 1);
        let mut advance = Advance::default();
        advance.set(BaseRunner::Batter, Base::First);
        base_out.apply(&advance);
        assert_eq!(base_out, BaseOut::new(true, true, false, 1));
    }

    #[test]
    fn force_situations() {
        let first_only = BaseOut::new(true, false, false, 0);
        assert!(first_only.force(Base::First));
        assert!(first_only.force(Base::Second));
        assert!(!first_only.force(Base::Third));
        assert_eq!(first_only.forced(), Base::Second);

        let loaded = BaseOut::new(true, true, true, 0);
        assert!(loaded.force(Base::Home));
        assert_eq!(loaded.forced(), Base::Home);
        assert_eq!(loaded.runners(), 3);
        assert!(loaded.scoring_position());
        assert!(!BaseOut::new(true, false, false, 0).scoring_position());
    }

    #[test]
    fn arena_handles_stay_valid() {
        let mut arena = StateArena::default();
        let a = arena.create(StateKind::InPlay(BaseOut::EMPTY));
        let b = arena.create(StateKind::EndGame);
        arena.get_mut(a).unwrap().game_link = Some(b);
        arena.remove(a);
        assert_eq!(arena.get(a).map(|s| s.kind), Some(StateKind::Null));
        assert_eq!(arena.get(b).map(|s| s.kind), Some(StateKind::EndGame));
        assert_eq!(arena.count(), 2);
    }
}
