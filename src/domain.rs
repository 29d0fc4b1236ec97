//! Shared vocabulary for the baseball domain: identifiers, enumerated codes,
//! and the small compound values (counts, pitches, advances, outs) that the
//! event grammar produces.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use arrayvec::ArrayString;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::util::digit_vec;

/// Width of a tag reference. Retrosheet identifiers top out at 8 characters,
/// but team/season composites can run longer.
pub const TAG_LEN: usize = 12;

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Display, Serialize, Deserialize,
)]
pub enum TagKind {
    Player,
    Umpire,
    Manager,
    Team,
    Game,
    Season,
    Ballpark,
}

/// A typed, fixed-capacity identifier. References are opaque ASCII and
/// compare case-insensitively; ordering is kind first, then reference.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Tag {
    kind: TagKind,
    reference: ArrayString<TAG_LEN>,
}

impl Tag {
    pub fn new(kind: TagKind, reference: &str) -> Self {
        let mut r = ArrayString::new();
        for c in reference.trim().chars().take(TAG_LEN) {
            if c.is_ascii() && !c.is_ascii_control() {
                let _ = r.try_push(c);
            }
        }
        Self { kind, reference: r }
    }

    pub fn player(reference: &str) -> Self {
        Self::new(TagKind::Player, reference)
    }

    pub fn team(reference: &str) -> Self {
        Self::new(TagKind::Team, reference)
    }

    pub fn game(reference: &str) -> Self {
        Self::new(TagKind::Game, reference)
    }

    pub fn ballpark(reference: &str) -> Self {
        Self::new(TagKind::Ballpark, reference)
    }

    pub const fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.reference.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.folded().eq(other.folded())
    }
}

impl Eq for Tag {}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.folded().cmp(other.folded()))
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        for b in self.folded() {
            b.hash(state);
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumString, Display, AsRefStr, Copy, Clone,
    Serialize, Deserialize,
)]
pub enum League {
    #[strum(serialize = "NA")]
    NationalAssociation,
    #[strum(serialize = "NL")]
    National,
    #[strum(serialize = "AA")]
    AmericanAssociation,
    #[strum(serialize = "UA")]
    Union,
    #[strum(serialize = "PL")]
    Players,
    #[strum(serialize = "AL")]
    American,
    #[strum(serialize = "FL")]
    Federal,
}

impl League {
    /// Unknown league strings fall back to the NL, the convention the
    /// historical park master assumes.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s.trim()).unwrap_or(Self::National)
    }

    /// Team files carry a single league letter.
    pub fn from_letter(c: char) -> Self {
        if c == 'A' {
            Self::American
        } else {
            Self::National
        }
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
pub enum Handedness {
    #[strum(serialize = "R")]
    Right,
    #[strum(serialize = "L")]
    Left,
    #[strum(serialize = "B", serialize = "S")]
    Switch,
    Unknown,
}

impl Handedness {
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s.trim()).unwrap_or(Self::Unknown)
    }
}

impl Default for Handedness {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, TryFromPrimitive, IntoPrimitive, Copy, Clone,
    Serialize, Deserialize,
)]
#[repr(u8)]
pub enum FieldingPosition {
    Unknown = 0,
    Pitcher,
    Catcher,
    FirstBaseman,
    SecondBaseman,
    ThirdBaseman,
    Shortstop,
    LeftFielder,
    CenterFielder,
    RightFielder,
    DesignatedHitter,
    PinchHitter,
    PinchRunner,
}

impl FieldingPosition {
    pub fn fielding_vec(int_str: &str) -> Vec<Self> {
        digit_vec(int_str)
            .iter()
            .map(|d| Self::try_from(*d).unwrap_or(Self::Unknown))
            .collect()
    }

    /// Roster and lineup records use numeric codes for the positions (10-12
    /// cover DH and the pinch roles) and the rosters also accept letter
    /// codes for the bench roles.
    pub fn from_roster_code(code: &str) -> Self {
        match code.trim() {
            "D" | "DH" => Self::DesignatedHitter,
            "PH" => Self::PinchHitter,
            "PR" => Self::PinchRunner,
            c => c
                .parse::<u8>()
                .ok()
                .and_then(|d| Self::try_from(d).ok())
                .unwrap_or(Self::Unknown),
        }
    }
}

impl Default for FieldingPosition {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumString, Display, AsRefStr, Copy, Clone,
    IntoPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Base {
    #[strum(serialize = "1")]
    First = 1,
    #[strum(serialize = "2")]
    Second,
    #[strum(serialize = "3")]
    Third,
    #[strum(serialize = "H")]
    Home,
}

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumString, Display, AsRefStr, Copy, Clone,
    TryFromPrimitive, IntoPrimitive, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum BaseRunner {
    #[strum(serialize = "B")]
    Batter,
    #[strum(serialize = "1")]
    First,
    #[strum(serialize = "2")]
    Second,
    #[strum(serialize = "3")]
    Third,
}

impl BaseRunner {
    /// In some cases only the base being advanced to is known. This returns
    /// the runner who would be advancing to that base (always the runner on
    /// the previous base, otherwise it would be specified).
    pub const fn from_target_base(base: Base) -> Self {
        match base {
            Base::First => Self::Batter,
            Base::Second => Self::First,
            Base::Third => Self::Second,
            Base::Home => Self::Third,
        }
    }

    pub const fn from_current_base(base: Base) -> Self {
        match base {
            Base::First => Self::First,
            Base::Second => Self::Second,
            Base::Third => Self::Third,
            Base::Home => Self::Batter,
        }
    }

    /// The base this runner occupies, if already on base.
    pub const fn current_base(self) -> Option<Base> {
        match self {
            Self::Batter => None,
            Self::First => Some(Base::First),
            Self::Second => Some(Base::Second),
            Self::Third => Some(Base::Third),
        }
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Sky {
    Cloudy,
    Dome,
    Night,
    Overcast,
    Sunny,
    Unknown,
}

impl Default for Sky {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum FieldCondition {
    Dry,
    Soaked,
    Wet,
    Damp,
    Unknown,
}

impl Default for FieldCondition {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Precipitation {
    Rain,
    Drizzle,
    Showers,
    Snow,
    None,
    Unknown,
}

impl Default for Precipitation {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum WindDirection {
    FromCF,
    FromLF,
    FromRF,
    #[strum(serialize = "ltor")]
    LeftToRight,
    #[strum(serialize = "rtol")]
    RightToLeft,
    ToCF,
    ToLF,
    ToRF,
    Unknown,
}

impl Default for WindDirection {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
pub enum GameType {
    Unknown,
    #[strum(serialize = "0")]
    SingleGame,
    #[strum(serialize = "1")]
    DoubleHeaderFirst,
    #[strum(serialize = "2")]
    DoubleHeaderSecond,
}

impl Default for GameType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The ball/strike count at the time of the play. Event files record `??`
/// when the count was not captured.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Count {
    pub balls: u8,
    pub strikes: u8,
}

impl Count {
    pub const INVALID: Self = Self {
        balls: u8::MAX,
        strikes: u8::MAX,
    };

    pub fn parse(count_str: &str) -> Self {
        let mut digits = count_str.chars().map(|c| c.to_digit(10));
        match (digits.next().flatten(), digits.next().flatten()) {
            (Some(balls), Some(strikes)) => Self {
                balls: balls as u8,
                strikes: strikes as u8,
            },
            _ => Self::INVALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
pub enum PitchType {
    #[strum(serialize = "U")]
    Unknown,
    #[strum(serialize = "B")]
    Ball,
    #[strum(serialize = "I")]
    BallIntentional,
    #[strum(serialize = "V")]
    BallCalled,
    #[strum(serialize = "K")]
    Strike,
    #[strum(serialize = "S")]
    StrikeSwinging,
    #[strum(serialize = "C")]
    StrikeCalled,
    #[strum(serialize = "F")]
    Foul,
    #[strum(serialize = "T")]
    FoulTip,
    #[strum(serialize = "H")]
    HitBatter,
    #[strum(serialize = "L")]
    BuntFoul,
    #[strum(serialize = "O")]
    BuntFoulTip,
    #[strum(serialize = "M")]
    BuntMissed,
    #[strum(serialize = "N")]
    NoPitch,
    #[strum(serialize = "P")]
    Pitchout,
    #[strum(serialize = "Q")]
    PitchoutSwinging,
    #[strum(serialize = "R")]
    PitchoutFoul,
    #[strum(serialize = "Y")]
    PitchoutInPlay,
    #[strum(serialize = "X")]
    InPlay,
}

impl Default for PitchType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A throw to a base between (or instead of) pitches.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Pickoff {
    pub base: Base,
    /// Pickoffs initiated by the catcher rather than the pitcher.
    pub by_catcher: bool,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Pitch {
    pub kind: PitchType,
    pub pickoff: Option<Pickoff>,
    pub runner_going: bool,
    pub blocked: bool,
}

#[derive(Debug, Eq, PartialEq, EnumString, Display, Copy, Clone, Serialize, Deserialize)]
pub enum Contact {
    #[strum(serialize = "G", serialize = "BG")]
    Grounder,
    #[strum(serialize = "L", serialize = "BL")]
    Liner,
    #[strum(serialize = "P", serialize = "BP")]
    Popup,
    #[strum(serialize = "F")]
    Fly,
    #[strum(serialize = "B")]
    Bunt,
    #[strum(serialize = "FL", serialize = "BF")]
    Foul,
    Unknown,
}

/// Where and how a ball was put in play, from the description flags of the
/// event string.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct BattedBall {
    pub contact: Option<Contact>,
    pub field_designation: ArrayString<6>,
}

impl BattedBall {
    pub fn in_play(&self) -> bool {
        self.contact.is_some() || !self.field_designation.is_empty()
    }

    pub fn set_designation(&mut self, loc: &str) {
        self.field_designation.clear();
        for c in loc.chars().take(self.field_designation.capacity()) {
            let _ = self.field_designation.try_push(c);
        }
    }
}

/// Runner movement for a single play, indexed by the source runner. Entries
/// only ever name successful advances; outs on the bases are recorded as
/// [`Out`] values instead.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Advance {
    destinations: [Option<Base>; 4],
}

impl Advance {
    pub fn get(&self, from: BaseRunner) -> Option<Base> {
        self.destinations[u8::from(from) as usize]
    }

    pub fn set(&mut self, from: BaseRunner, to: Base) {
        self.destinations[u8::from(from) as usize] = Some(to);
    }

    /// Merges another advance in; entries on `rhs` win over existing ones.
    pub fn merge(&mut self, rhs: &Advance) {
        for (i, dest) in rhs.destinations.iter().enumerate() {
            if dest.is_some() {
                self.destinations[i] = *dest;
            }
        }
    }

    /// The number of runs implied by these advances.
    pub fn runs(&self) -> u32 {
        self.destinations
            .iter()
            .filter(|d| **d == Some(Base::Home))
            .count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BaseRunner, Base)> + '_ {
        self.destinations.iter().enumerate().filter_map(|(i, d)| {
            d.map(|to| (BaseRunner::try_from(i as u8).expect("slot index is a runner"), to))
        })
    }
}

/// A fielding position together with the player occupying it at a given
/// moment in a game. The tag is absent when the lineup could not resolve the
/// position.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default, Serialize, Deserialize)]
pub struct PositionRef {
    pub position: FieldingPosition,
    pub tag: Option<Tag>,
}

/// One recorded out and the fielding credits behind it. A double play needs
/// two of these.
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Out {
    /// A tag was applied; never set for a batter retired at first.
    pub tag_out: bool,
    pub unassisted: bool,
    /// The runner recorded out, when the event string names one.
    pub runner: Option<BaseRunner>,
    /// The base the runner was advancing toward, for outs on the bases.
    pub at_base: Option<Base>,
    /// The fielder credited with the putout.
    pub fielder: Option<PositionRef>,
    pub assists: Vec<PositionRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_comparison_is_case_insensitive() {
        assert_eq!(Tag::player("BONDB001"), Tag::player("bondb001"));
        assert_ne!(Tag::player("bondb001"), Tag::player("bondb002"));
        assert_ne!(Tag::player("NYA"), Tag::team("NYA"));
    }

    #[test]
    fn tag_ordering_is_kind_first() {
        let player = Tag::player("aaaa0001");
        let team = Tag::team("AAA");
        assert!(player < team);
        assert!(Tag::team("BOS") < Tag::team("nya"));
    }

    #[test]
    fn tag_truncates_to_capacity() {
        let t = Tag::game("ABCDEFGHIJKLMNOP");
        assert_eq!(t.reference(), "ABCDEFGHIJKL");
    }

    #[test]
    fn league_falls_back_to_national() {
        assert_eq!(League::parse_lenient("AL"), League::American);
        assert_eq!(League::parse_lenient("FL"), League::Federal);
        assert_eq!(League::parse_lenient("XX"), League::National);
        assert_eq!(League::from_letter('A'), League::American);
        assert_eq!(League::from_letter('N'), League::National);
    }

    #[test]
    fn handedness_codes() {
        assert_eq!(Handedness::parse_lenient("B"), Handedness::Switch);
        assert_eq!(Handedness::parse_lenient("S"), Handedness::Switch);
        assert_eq!(Handedness::parse_lenient("L"), Handedness::Left);
        assert_eq!(Handedness::parse_lenient("R"), Handedness::Right);
        assert_eq!(Handedness::parse_lenient("?"), Handedness::Unknown);
    }

    #[test]
    fn count_parses_two_digits() {
        assert_eq!(Count::parse("31"), Count { balls: 3, strikes: 1 });
        assert_eq!(Count::parse("??"), Count::INVALID);
        assert_eq!(Count::parse("3"), Count::INVALID);
        assert!(!Count::parse("??").is_valid());
    }

    #[test]
    fn advance_merge_prefers_rhs() {
        let mut a = Advance::default();
        a.set(BaseRunner::Batter, Base::First);
        let mut b = Advance::default();
        b.set(BaseRunner::Batter, Base::Second);
        b.set(BaseRunner::Third, Base::Home);
        a.merge(&b);
        assert_eq!(a.get(BaseRunner::Batter), Some(Base::Second));
        assert_eq!(a.get(BaseRunner::Third), Some(Base::Home));
        assert_eq!(a.runs(), 1);
    }

    #[test]
    fn roster_position_codes() {
        assert_eq!(
            FieldingPosition::from_roster_code("1"),
            FieldingPosition::Pitcher
        );
        assert_eq!(
            FieldingPosition::from_roster_code("D"),
            FieldingPosition::DesignatedHitter
        );
        assert_eq!(
            FieldingPosition::from_roster_code("11"),
            FieldingPosition::PinchHitter
        );
        assert_eq!(
            FieldingPosition::from_roster_code("X"),
            FieldingPosition::Unknown
        );
    }
}
