//! Franchise records, one entry per season the team fielded a club.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{League, Tag};
use crate::store::table::Keyed;

#[derive(Debug, Clone)]
pub struct TeamYear {
    pub league: League,
    pub location: String,
    pub name: String,
    valid: bool,
}

impl Default for TeamYear {
    fn default() -> Self {
        Self {
            league: League::National,
            location: String::new(),
            name: String::new(),
            valid: false,
        }
    }
}

impl TeamYear {
    pub fn validate(&mut self) {
        self.valid = true;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

#[derive(Debug, Clone)]
pub struct Team {
    tag: Tag,
    pub debut: Option<NaiveDate>,
    years: BTreeMap<u16, TeamYear>,
}

impl Keyed for Team {
    fn with_tag(tag: Tag) -> Self {
        Self {
            tag,
            debut: None,
            years: BTreeMap::new(),
        }
    }

    fn tag(&self) -> Tag {
        self.tag
    }
}

impl Team {
    /// Returns the season entry, creating a null one if absent.
    pub fn year_mut(&mut self, year: u16) -> &mut TeamYear {
        self.years.entry(year).or_default()
    }

    pub fn year(&self, year: u16) -> Option<&TeamYear> {
        self.years.get(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = (u16, &TeamYear)> {
        self.years.iter().map(|(y, t)| (*y, t))
    }
}
