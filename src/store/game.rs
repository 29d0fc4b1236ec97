//! Game records, the lineup book, and the instance coordinate that orders
//! moments within a game.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{
    FieldCondition, FieldingPosition, GameType, Precipitation, Sky, Tag, WindDirection,
};
use crate::store::state::{BaseOut, StateId};
use crate::store::table::Keyed;

/// The time coordinate of a game: every state maps to a unique instance.
/// Ordered by inning, then runs, then outs, then runner count.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Instance {
    pub base_out: BaseOut,
    pub inning: u8,
    pub runs: u32,
}

impl Instance {
    /// The moment before the first pitch of a game.
    pub const STARTER: Self = Self {
        base_out: BaseOut::EMPTY,
        inning: 0,
        runs: 0,
    };

    pub const fn new(base_out: BaseOut, inning: u8, runs: u32) -> Self {
        Self {
            base_out,
            inning,
            runs,
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::STARTER
    }
}

impl Ord for Instance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inning
            .cmp(&other.inning)
            .then(self.runs.cmp(&other.runs))
            .then(self.base_out.outs.cmp(&other.base_out.outs))
            .then(self.base_out.runners().cmp(&other.base_out.runners()))
            // Base patterns as a final key, so the order is total and agrees
            // with equality.
            .then(self.base_out.first.cmp(&other.base_out.first))
            .then(self.base_out.second.cmp(&other.base_out.second))
            .then(self.base_out.third.cmp(&other.base_out.third))
    }
}

impl PartialOrd for Instance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A lineup entry: where a player plays, where they bat, and when they
/// entered the game.
#[derive(Debug, Default, Eq, PartialEq, Copy, Clone)]
pub struct Card {
    pub position: FieldingPosition,
    /// Batting order slot; 0 for pitchers under the DH rule.
    pub order: u8,
    /// The instance at which the player entered.
    pub instance: Instance,
    pub visiting: bool,
}

/// Every player who appeared in a game, with temporal lookup by position or
/// batting order. Insertion is substitution.
#[derive(Debug, Default, Clone)]
pub struct Lineup {
    cards: BTreeMap<Tag, Card>,
}

impl Lineup {
    /// Subs a player in; also used for the starting lineup. Returns true on
    /// a first appearance. Re-inserting an existing player updates position
    /// and order in place, keeping the original entry instance.
    pub fn substitute(
        &mut self,
        tag: Tag,
        instance: Instance,
        position: FieldingPosition,
        order: u8,
        visiting: bool,
    ) -> bool {
        match self.cards.entry(tag) {
            Entry::Vacant(slot) => {
                slot.insert(Card {
                    position,
                    order,
                    instance,
                    visiting,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let card = slot.get_mut();
                card.position = position;
                card.order = order;
                false
            }
        }
    }

    pub fn get(&self, tag: &Tag) -> Option<Card> {
        self.cards.get(tag).copied()
    }

    /// The player's card, or the zero-initialized card when absent.
    pub fn card(&self, tag: &Tag) -> Card {
        self.get(tag).unwrap_or_default()
    }

    /// The first player whose card was entered exactly at `instance`.
    pub fn find_at(&self, instance: &Instance) -> Option<Tag> {
        self.cards
            .iter()
            .find(|(_, card)| card.instance == *instance)
            .map(|(tag, _)| *tag)
    }

    pub fn find_by_position(
        &self,
        position: FieldingPosition,
        visiting: bool,
        after: &Instance,
    ) -> Option<Tag> {
        self.select(after, |card| {
            card.position == position && card.visiting == visiting
        })
    }

    pub fn find_by_order(&self, order: u8, visiting: bool, after: &Instance) -> Option<Tag> {
        self.select(after, |card| {
            card.order == order && card.visiting == visiting
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Card)> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Selects among matching cards the one in effect at `after`: the latest
    /// entry before it, else the earliest entry following it. A card entered
    /// exactly at `after` wins unless the incumbent shares that instance.
    fn select<F>(&self, after: &Instance, matches: F) -> Option<Tag>
    where
        F: Fn(&Card) -> bool,
    {
        let mut best: Option<(&Tag, &Card)> = None;
        for (tag, card) in &self.cards {
            if !matches(card) {
                continue;
            }
            let replace = match best {
                None => true,
                Some((_, incumbent)) => {
                    if card.instance < *after {
                        card.instance > incumbent.instance
                    } else if card.instance > *after {
                        card.instance < incumbent.instance
                    } else {
                        incumbent.instance != card.instance
                    }
                }
            };
            if replace {
                best = Some((tag, card));
            }
        }
        best.map(|(tag, _)| *tag)
    }
}

#[derive(Debug, Clone)]
pub struct Game {
    tag: Tag,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub year: u16,
    pub game_type: GameType,
    pub sky: Sky,
    pub field_condition: FieldCondition,
    pub precipitation: Precipitation,
    pub temperature: Option<u8>,
    pub wind_direction: WindDirection,
    pub wind_speed: Option<u8>,
    pub use_dh: bool,
    pub attendance: Option<u32>,
    pub duration_minutes: Option<u16>,
    pub night: bool,
    pub ballpark: Option<Tag>,
    pub team_home: Option<Tag>,
    pub team_visiting: Option<Tag>,
    pub winning_pitcher: Option<Tag>,
    pub losing_pitcher: Option<Tag>,
    pub save_pitcher: Option<Tag>,
    pub runs_home: u32,
    pub runs_visiting: u32,
    pub comment: String,
    pub lineup: Lineup,
    /// Head of this game's state chain.
    pub plays: Option<StateId>,
}

impl Keyed for Game {
    fn with_tag(tag: Tag) -> Self {
        Self {
            tag,
            date: None,
            start_time: None,
            year: 0,
            game_type: GameType::default(),
            sky: Sky::default(),
            field_condition: FieldCondition::default(),
            precipitation: Precipitation::default(),
            temperature: None,
            wind_direction: WindDirection::default(),
            wind_speed: None,
            use_dh: false,
            attendance: None,
            duration_minutes: None,
            night: false,
            ballpark: None,
            team_home: None,
            team_visiting: None,
            winning_pitcher: None,
            losing_pitcher: None,
            save_pitcher: None,
            runs_home: 0,
            runs_visiting: 0,
            comment: String::new(),
            lineup: Lineup::default(),
            plays: None,
        }
    }

    fn tag(&self) -> Tag {
        self.tag
    }
}

impl Game {
    pub fn batting_team(&self, visiting: bool) -> Option<Tag> {
        if visiting {
            self.team_visiting
        } else {
            self.team_home
        }
    }

    pub fn fielding_team(&self, visiting: bool) -> Option<Tag> {
        if visiting {
            self.team_home
        } else {
            self.team_visiting
        }
    }

    pub fn runs(&self) -> u32 {
        self.runs_home + self.runs_visiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(inning: u8, runs: u32, outs: u8) -> Instance {
        Instance::new(BaseOut::new(false, false, false, outs), inning, runs)
    }

    #[test]
    fn instances_order_by_inning_runs_outs_runners() {
        assert!(instance(1, 0, 0) < instance(2, 0, 0));
        assert!(instance(3, 1, 0) < instance(3, 2, 0));
        assert!(instance(3, 1, 1) < instance(3, 1, 2));
        let no_runners = instance(3, 1, 1);
        let one_runner = Instance::new(BaseOut::new(true, false, false, 1), 3, 1);
        assert!(no_runners < one_runner);
        assert!(Instance::STARTER < instance(1, 0, 0));
    }

    #[test]
    fn absent_card_reads_as_zeroed() {
        let lineup = Lineup::default();
        let card = lineup.card(&Tag::player("ghost001"));
        assert_eq!(card.position, FieldingPosition::Unknown);
        assert_eq!(card.order, 0);
        assert_eq!(card.instance, Instance::STARTER);
        assert!(!card.visiting);
    }

    #[test]
    fn reinsertion_updates_in_place() {
        let mut lineup = Lineup::default();
        let tag = Tag::player("martb101");
        assert!(lineup.substitute(
            tag,
            Instance::STARTER,
            FieldingPosition::LeftFielder,
            7,
            false
        ));
        assert!(!lineup.substitute(
            tag,
            instance(5, 2, 1),
            FieldingPosition::CenterFielder,
            7,
            false
        ));
        let card = lineup.card(&tag);
        assert_eq!(card.position, FieldingPosition::CenterFielder);
        // The original entry instance survives the update.
        assert_eq!(card.instance, Instance::STARTER);
    }

    #[test]
    fn position_lookup_prefers_latest_entry_before_the_instant() {
        let mut lineup = Lineup::default();
        let starter = Tag::player("clemr001");
        let reliever = Tag::player("stanb001");
        lineup.substitute(
            starter,
            Instance::STARTER,
            FieldingPosition::Pitcher,
            0,
            false,
        );
        lineup.substitute(
            reliever,
            instance(7, 3, 0),
            FieldingPosition::Pitcher,
            0,
            false,
        );

        // Mid-game, before the relief appearance, the starter is pitching.
        assert_eq!(
            lineup.find_by_position(FieldingPosition::Pitcher, false, &instance(5, 1, 1)),
            Some(starter)
        );
        // After it, the reliever is.
        assert_eq!(
            lineup.find_by_position(FieldingPosition::Pitcher, false, &instance(8, 3, 0)),
            Some(reliever)
        );
        // Visiting-side lookup finds nothing.
        assert_eq!(
            lineup.find_by_position(FieldingPosition::Pitcher, true, &instance(5, 1, 1)),
            None
        );
    }

    #[test]
    fn order_lookup_uses_the_same_tie_break() {
        let mut lineup = Lineup::default();
        let first = Tag::player("aaaa0001");
        let second = Tag::player("bbbb0001");
        lineup.substitute(first, instance(1, 0, 0), FieldingPosition::PinchHitter, 4, true);
        lineup.substitute(second, instance(6, 2, 0), FieldingPosition::PinchHitter, 4, true);
        assert_eq!(lineup.find_by_order(4, true, &instance(3, 1, 0)), Some(first));
        assert_eq!(lineup.find_by_order(4, true, &instance(7, 2, 0)), Some(second));
    }

    #[test]
    fn find_at_matches_exact_entry_instance() {
        let mut lineup = Lineup::default();
        let tag = Tag::player("hendr001");
        lineup.substitute(tag, instance(6, 2, 1), FieldingPosition::PinchRunner, 9, true);
        assert_eq!(lineup.find_at(&instance(6, 2, 1)), Some(tag));
        assert_eq!(lineup.find_at(&instance(6, 2, 2)), None);
    }
}
