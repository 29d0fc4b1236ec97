//! Player records and their per-team-year stat lines.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{FieldingPosition, Handedness, Tag};
use crate::store::stat::{BaseRunning, Batting, Fielding, General, Pitching};
use crate::store::table::Keyed;

/// Key for a player's season entry. A stat line can be scoped to a team
/// across years, to a year across teams, or to one team-season. Ordering is
/// by variant first, then team, then year.
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Hash)]
pub enum TeamYearKey {
    Team(Tag),
    TeamYear(Tag, u16),
    Year(u16),
}

impl TeamYearKey {
    pub fn team(&self) -> Option<Tag> {
        match self {
            Self::Team(t) | Self::TeamYear(t, _) => Some(*t),
            Self::Year(_) => None,
        }
    }

    pub fn year(&self) -> Option<u16> {
        match self {
            Self::TeamYear(_, y) | Self::Year(y) => Some(*y),
            Self::Team(_) => None,
        }
    }
}

/// A player's line for one [`TeamYearKey`]. Entries are born null and become
/// valid the first time a roster or substitution touches them.
#[derive(Debug, Default, Clone)]
pub struct PlayerYear {
    pub team: Option<Tag>,
    pub number: Option<u8>,
    pub positions: Vec<FieldingPosition>,
    pub throws: Handedness,
    pub bats: Handedness,
    pub batting: Batting,
    pub fielding: Fielding,
    pub pitching: Pitching,
    pub base_running: BaseRunning,
    pub general: General,
    valid: bool,
}

impl PlayerYear {
    pub fn validate(&mut self) {
        self.valid = true;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn add_position(&mut self, position: FieldingPosition) {
        if position != FieldingPosition::Unknown && !self.positions.contains(&position) {
            self.positions.push(position);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    tag: Tag,
    pub first_name: String,
    pub surname: String,
    pub debut: Option<NaiveDate>,
    years: BTreeMap<TeamYearKey, PlayerYear>,
}

impl Keyed for Player {
    fn with_tag(tag: Tag) -> Self {
        Self {
            tag,
            first_name: String::new(),
            surname: String::new(),
            debut: None,
            years: BTreeMap::new(),
        }
    }

    fn tag(&self) -> Tag {
        self.tag
    }
}

impl Player {
    /// Returns the season entry for `key`, creating a null one if absent.
    pub fn year_mut(&mut self, key: TeamYearKey) -> &mut PlayerYear {
        let entry = self.years.entry(key).or_default();
        if entry.team.is_none() {
            entry.team = key.team();
        }
        entry
    }

    pub fn year(&self, key: &TeamYearKey) -> Option<&PlayerYear> {
        self.years.get(key)
    }

    pub fn years(&self) -> impl Iterator<Item = (&TeamYearKey, &PlayerYear)> {
        self.years.iter()
    }

    pub fn filter_years<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a PlayerYear>
    where
        F: Fn(&PlayerYear) -> bool + 'a,
    {
        self.years.values().filter(move |y| predicate(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_orders_by_variant_then_team_then_year() {
        let bos = Tag::team("BOS");
        let nya = Tag::team("NYA");
        let mut keys = vec![
            TeamYearKey::Year(1987),
            TeamYearKey::TeamYear(nya, 1986),
            TeamYearKey::Team(nya),
            TeamYearKey::TeamYear(bos, 1987),
            TeamYearKey::TeamYear(bos, 1986),
            TeamYearKey::Team(bos),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                TeamYearKey::Team(bos),
                TeamYearKey::Team(nya),
                TeamYearKey::TeamYear(bos, 1986),
                TeamYearKey::TeamYear(bos, 1987),
                TeamYearKey::TeamYear(nya, 1986),
                TeamYearKey::Year(1987),
            ]
        );
    }

    #[test]
    fn year_entries_start_null() {
        let mut player = Player::with_tag(Tag::player("fisk0001"));
        let key = TeamYearKey::TeamYear(Tag::team("CHA"), 1987);
        assert!(!player.year_mut(key).is_valid());
        player.year_mut(key).validate();
        assert!(player.year(&key).map(PlayerYear::is_valid).unwrap_or(false));
        assert_eq!(player.year_mut(key).team, Some(Tag::team("CHA")));
    }

    #[test]
    fn positions_deduplicate() {
        let mut year = PlayerYear::default();
        year.add_position(FieldingPosition::Catcher);
        year.add_position(FieldingPosition::Catcher);
        year.add_position(FieldingPosition::FirstBaseman);
        year.add_position(FieldingPosition::Unknown);
        assert_eq!(
            year.positions,
            vec![FieldingPosition::Catcher, FieldingPosition::FirstBaseman]
        );
    }
}
