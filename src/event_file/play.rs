//! Decoder for Retrosheet `play` records: the event grammar, the advance
//! clause, and the counter mutations both imply.
//!
//! The main event is matched left-anchored against an ordered pattern table;
//! the first hit consumes its prefix and the rest of the string becomes the
//! description list. Sub-parsers contribute event typing, outs, fielding
//! credits and *implicit* advances; the advance clause contributes explicit
//! ones, which win per-runner. The merged set is applied exactly once, and
//! that application is the single place runs, RBIs and earned runs are
//! credited.

use std::str::FromStr;

use anyhow::{Context, Result};
use csv::StringRecord;
use lazy_regex::{regex, Lazy};
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{Base, BaseRunner, Contact, Count, FieldingPosition, Out, PositionRef, Tag};
use crate::event_file::parser::{FileContext, GameCursor};
use crate::event_file::pitch_sequence::parse_pitch_sequence;
use crate::store::game::Instance;
use crate::store::player::{PlayerYear, TeamYearKey};
use crate::store::stat::{BaseRunning, Fielding, Pitching};
use crate::store::state::{BaseOut, EventKind, State, StateId, StateKind};
use crate::store::Store;
use crate::util::regex_split;

pub static STRIP_EVENT_CHARS: &Lazy<Regex> = regex!(r"[#! ]");
// Outs and hits must run to a modifier or the end of the main event, so that
// reached-on-error (6E3), stolen bases (SB2) and indifference (DI) fall
// through to their own patterns.
pub static OUT_EVENT: &Lazy<Regex> = regex!(r"^([1-9]{1,9}(\([B123]\))?){1,3}(/|$)");
pub static OUT_SEQUENCE: &Lazy<Regex> = regex!(r"[1-9]{1,9}(\([B123]\))?");
pub static OUT_RUNNER: &Lazy<Regex> = regex!(r"\((?P<runner>[B123])\)");
pub static HIT_EVENT: &Lazy<Regex> =
    regex!(r"^(DGR[1-9]?|[SDT][1-9?]*(/|$)|H[^P]R?(\([1-9]\))?|HR?$)");
pub static FC_EVENT: &Lazy<Regex> = regex!(r"^FC[1-9?]?");
pub static ERROR_EVENT: &Lazy<Regex> = regex!(r"^([1-9]{0,8}E[1-9]|FLE[1-9])");
pub static HIT_BATTER_EVENT: &Lazy<Regex> = regex!(r"^(HP|C$|C[^S])");
pub static STRIKEOUT_EVENT: &Lazy<Regex> = regex!(r"^K[0-9]*(\+.*)?");
pub static WALK_EVENT: &Lazy<Regex> = regex!(r"^(IW?|W)($|\+.*|/)");
pub static NO_PLAY_EVENT: &Lazy<Regex> = regex!(r"^NP");
pub static CAUGHT_STEALING_EVENT: &Lazy<Regex> =
    regex!(r"^(CS[23H](\([1-9]{0,8}(E[1-9](/TH)?|[1-9])\))?(\(UR\))?;?)+");
pub static BASERUNNING_MISC_EVENT: &Lazy<Regex> = regex!(r"^(BK|DI|OA|PB|WP)");
pub static PICKOFF_EVENT: &Lazy<Regex> = regex!(r"^PO[123]\([1-9]{0,8}(E[1-9](/TH)?|[1-9])\)");
pub static PICKOFF_CS_EVENT: &Lazy<Regex> =
    regex!(r"^POCS[123H]\([1-9]{0,8}(E[1-9](/TH)?|[1-9])\)");
pub static STOLEN_BASE_EVENT: &Lazy<Regex> = regex!(r"^((SB[23]|SBH(\(UR\))?);?)+");
pub static ADVANCE: &Lazy<Regex> =
    regex!(r"^(?P<from>[B123])(?P<op>[-X])(?P<to>[123H])(?P<mods>.*)$");
pub static BASERUNNING_ITEM: &Lazy<Regex> =
    regex!(r"^(?P<kind>POCS|PO|SB|CS|BK|DI|OA|PB|WP)(?P<base>[123H])?(\((?P<fielders>[0-9E/TH]*)\))?(\(UR\))?$");
pub static MODIFIER_DIVIDER: &Lazy<Regex> = regex!(r"[+\-0-9]");
pub static NUMERIC: &Lazy<Regex> = regex!(r"[0-9]");

/// One entry of an advance clause, or an advance implied by the main event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerAdvance {
    pub runner: BaseRunner,
    pub to: Base,
    /// The runner was put out at the destination.
    pub out: bool,
    pub modifiers: Vec<AdvanceModifier>,
}

impl RunnerAdvance {
    pub fn batter_to(to: Base) -> Self {
        Self {
            runner: BaseRunner::Batter,
            to,
            out: false,
            modifiers: Vec::new(),
        }
    }

    pub fn runner_to(to: Base) -> Self {
        Self {
            runner: BaseRunner::from_target_base(to),
            to,
            out: false,
            modifiers: Vec::new(),
        }
    }

    fn unearned(&self) -> bool {
        self.modifiers.iter().any(|m| {
            matches!(
                m,
                AdvanceModifier::UnearnedRun | AdvanceModifier::TeamUnearnedRun
            )
        })
    }

    fn no_rbi(&self) -> bool {
        self.modifiers.contains(&AdvanceModifier::NoRbi)
    }

    fn rbi_flagged(&self) -> bool {
        self.modifiers.contains(&AdvanceModifier::Rbi)
    }

    fn errored(&self) -> bool {
        self.modifiers
            .iter()
            .any(|m| matches!(m, AdvanceModifier::Error { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceModifier {
    UnearnedRun,
    TeamUnearnedRun,
    NoRbi,
    Rbi,
    WildPitch,
    PassedBall,
    ThrowTo(Option<Base>),
    /// An error let the runner take the base; assists may precede it.
    Error {
        assists: Vec<FieldingPosition>,
        errant: FieldingPosition,
    },
    /// Putout chain for a runner retired on the bases, e.g. `2X3(25)`.
    Fielders(Vec<FieldingPosition>),
    Unrecognized(String),
}

impl AdvanceModifier {
    fn parse_list(mods: &str) -> Vec<Self> {
        mods.split(')')
            .filter(|s| !s.is_empty())
            .map(Self::parse_single)
            .collect()
    }

    fn parse_single(value: &str) -> Self {
        match value {
            "(UR" => return Self::UnearnedRun,
            "(TUR" => return Self::TeamUnearnedRun,
            "(NR" | "(NORBI" => return Self::NoRbi,
            "(RBI" => return Self::Rbi,
            "(WP" => return Self::WildPitch,
            "(PB" => return Self::PassedBall,
            "(THH" => return Self::ThrowTo(Some(Base::Home)),
            "(TH" => return Self::ThrowTo(None),
            _ => {}
        }
        let (first, last) = regex_split(value, NUMERIC);
        let last = last.unwrap_or_default();
        match first {
            "(E" => Self::Error {
                assists: Vec::new(),
                errant: FieldingPosition::fielding_vec(last)
                    .first()
                    .copied()
                    .unwrap_or(FieldingPosition::Unknown),
            },
            "(TH" => Self::ThrowTo(Base::from_str(last).ok()),
            "(" if last.contains('E') => {
                let (assist_str, error_str) = last.split_at(last.find('E').unwrap_or_default());
                Self::Error {
                    assists: FieldingPosition::fielding_vec(assist_str),
                    errant: FieldingPosition::fielding_vec(error_str)
                        .first()
                        .copied()
                        .unwrap_or(FieldingPosition::Unknown),
                }
            }
            "(" => Self::Fielders(FieldingPosition::fielding_vec(last)),
            _ => Self::Unrecognized(value.into()),
        }
    }
}

const fn runner_slot(runner: BaseRunner) -> Option<usize> {
    match runner {
        BaseRunner::Batter => None,
        BaseRunner::First => Some(0),
        BaseRunner::Second => Some(1),
        BaseRunner::Third => Some(2),
    }
}

const fn base_slot(base: Base) -> Option<usize> {
    match base {
        Base::First => Some(0),
        Base::Second => Some(1),
        Base::Third => Some(2),
        Base::Home => None,
    }
}

/// Decodes one `play` record, threading a new state onto the game chain and
/// mutating the affected player-year counters.
pub fn parse_play(
    store: &mut Store,
    cursor: &mut GameCursor,
    record: &StringRecord,
    file: &FileContext,
) -> Result<()> {
    let fields = record.deserialize::<[&str; 7]>(None)?;
    let inning: u8 = fields[1].trim().parse().context("unparseable inning")?;
    // fields[2] is the batting side, which the batter's card already carries.
    let batter = Tag::player(fields[3]);
    let count = Count::parse(fields[4]);
    let pitches = parse_pitch_sequence(fields[5]);
    let event = fields[6].trim();

    let state_id = chain_state(store, cursor);
    cursor.instance.inning = inning;

    let game = store
        .games
        .get(&cursor.game)
        .context("play record outside of any game")?;
    let card = game.lineup.card(&batter);
    let visiting = card.visiting;
    let team_batting = game.batting_team(visiting);
    let team_fielding = game.fielding_team(visiting);
    let (runs_home, runs_visiting) = (game.runs_home, game.runs_visiting);

    let pre_base_out = store
        .states
        .get(state_id)
        .map(|s| s.kind.base_out())
        .unwrap_or_default();
    let pre_instance = Instance::new(pre_base_out, inning, runs_home + runs_visiting);

    let pitcher = store.games.get(&cursor.game).and_then(|g| {
        g.lineup
            .find_by_position(FieldingPosition::Pitcher, !visiting, &pre_instance)
    });

    let base_runners: Vec<PositionRef> = cursor
        .runners
        .iter()
        .flatten()
        .map(|tag| PositionRef {
            position: FieldingPosition::Unknown,
            tag: Some(*tag),
        })
        .collect();

    if let Some(state) = store.states.get_mut(state_id) {
        state.inning = inning;
        state.batter = PositionRef {
            position: card.position,
            tag: Some(batter),
        };
        state.visiting = visiting;
        state.count = count;
        state.pitches = pitches;
        state.game = Some(cursor.game);
        state.runs_home = runs_home;
        state.runs_visiting = runs_visiting;
        state.base_runners = base_runners;
    }

    {
        let mut parser = PlayParser {
            store: &mut *store,
            cursor: &mut *cursor,
            file,
            state_id,
            pre_instance,
            batter,
            visiting,
            team_batting,
            team_fielding,
            pitcher,
            implicit: Vec::new(),
            explicit: Vec::new(),
            sac_fly: false,
            sac_hit: false,
            double_play: false,
        };
        parser.parse_event(event)?;
    }

    // Pre-allocate the next state in the chain from the post-event situation
    // and thread the batter's chain forward.
    let next = store.states.create(cursor.instance.base_out.state());
    if let Some(state) = store.states.get_mut(state_id) {
        state.game_link = Some(next);
    }
    if let Some(previous) = cursor.batter_states.insert(batter, state_id) {
        if let Some(state) = store.states.get_mut(previous) {
            state.player_link = Some(state_id);
        }
    }
    cursor.last_state = Some(state_id);
    Ok(())
}

/// Finds or creates the state node for the play about to be decoded.
fn chain_state(store: &mut Store, cursor: &mut GameCursor) -> StateId {
    let prev_kind = cursor
        .last_state
        .and_then(|id| store.states.get(id))
        .map(|s| s.kind);
    match prev_kind {
        None | Some(StateKind::Null) | Some(StateKind::EndGame) => {
            let id = store.states.create(StateKind::InPlay(BaseOut::EMPTY));
            cursor.instance.base_out = BaseOut::EMPTY;
            if let Some(game) = store.games.get_mut(&cursor.game) {
                game.plays = Some(id);
            }
            id
        }
        Some(kind) if kind.end_of_inning() => {
            let id = store.states.create(StateKind::InPlay(BaseOut::EMPTY));
            cursor.instance.base_out = BaseOut::EMPTY;
            if let Some(prev) = cursor.last_state.and_then(|p| store.states.get_mut(p)) {
                prev.game_link = Some(id);
            }
            id
        }
        Some(_) => {
            let linked = cursor
                .last_state
                .and_then(|p| store.states.get(p))
                .and_then(|s| s.game_link);
            // The link was pre-allocated at the end of the previous play.
            linked.unwrap_or_else(|| store.states.create(cursor.instance.base_out.state()))
        }
    }
}

struct PlayParser<'a> {
    store: &'a mut Store,
    cursor: &'a mut GameCursor,
    file: &'a FileContext,
    state_id: StateId,
    pre_instance: Instance,
    batter: Tag,
    visiting: bool,
    team_batting: Option<Tag>,
    team_fielding: Option<Tag>,
    pitcher: Option<Tag>,
    implicit: Vec<RunnerAdvance>,
    explicit: Vec<RunnerAdvance>,
    sac_fly: bool,
    sac_hit: bool,
    double_play: bool,
}

impl<'a> PlayParser<'a> {
    fn parse_event(&mut self, event: &str) -> Result<()> {
        let cleaned = STRIP_EVENT_CHARS.replace_all(event, "");
        let (main, advance_clause) = match cleaned.split_once('.') {
            Some((main, clause)) => (main, Some(clause)),
            None => (&*cleaned, None),
        };

        let handlers: [(&Regex, fn(&mut Self, &str) -> Result<()>); 13] = [
            (OUT_EVENT, Self::on_out),
            (HIT_EVENT, Self::on_hit),
            (FC_EVENT, Self::on_fielders_choice),
            (ERROR_EVENT, Self::on_error),
            (HIT_BATTER_EVENT, Self::on_hit_batter),
            (STRIKEOUT_EVENT, Self::on_strikeout),
            (WALK_EVENT, Self::on_walk),
            (NO_PLAY_EVENT, Self::on_ignore),
            (CAUGHT_STEALING_EVENT, Self::on_baserunning),
            (BASERUNNING_MISC_EVENT, Self::on_baserunning),
            (PICKOFF_EVENT, Self::on_baserunning),
            (PICKOFF_CS_EVENT, Self::on_baserunning),
            (STOLEN_BASE_EVENT, Self::on_baserunning),
        ];

        let mut consumed = 0;
        for (pattern, handler) in handlers {
            // Patterns are anchored, so any match starts at 0.
            if let Some(m) = pattern.find(main) {
                consumed = m.end();
                handler(self, m.as_str())?;
                break;
            }
        }
        if consumed == 0 && !main.is_empty() {
            warn!(
                "{} [{}]: unmatched event {:?}",
                self.file.name, self.file.line, main
            );
        }
        self.parse_description(&main[consumed..]);

        if let Some(clause) = advance_clause {
            self.parse_advance_clause(clause);
        }
        self.apply_advances();
        self.finalize_batting();
        Ok(())
    }

    fn state_mut(&mut self) -> &mut State {
        self.store
            .states
            .get_mut(self.state_id)
            .expect("current play state is arena-owned")
    }

    fn kind(&self) -> EventKind {
        self.store
            .states
            .get(self.state_id)
            .map(|s| s.event.kind)
            .unwrap_or_default()
    }

    fn set_kind(&mut self, kind: EventKind) {
        self.state_mut().event.kind = kind;
    }

    /// Sets the event kind unless a prior sub-parser (e.g. a strikeout with
    /// a stolen-base rider) already typed the event.
    fn set_kind_first(&mut self, kind: EventKind) {
        if self.kind() == EventKind::NoPlay {
            self.set_kind(kind);
        }
    }

    fn batting_key(&self) -> Option<TeamYearKey> {
        self.team_batting
            .map(|t| TeamYearKey::TeamYear(t, self.cursor.year))
    }

    fn fielding_key(&self) -> Option<TeamYearKey> {
        self.team_fielding
            .map(|t| TeamYearKey::TeamYear(t, self.cursor.year))
    }

    fn with_batter<F: FnOnce(&mut PlayerYear)>(&mut self, f: F) {
        if let Some(key) = self.batting_key() {
            if let Some(player) = self.store.players.get_mut(&self.batter) {
                f(player.year_mut(key));
            }
        }
    }

    fn with_pitcher<F: FnOnce(&mut Pitching)>(&mut self, f: F) {
        if let (Some(key), Some(tag)) = (self.fielding_key(), self.pitcher) {
            if let Some(player) = self.store.players.get_mut(&tag) {
                f(&mut player.year_mut(key).pitching);
            }
        }
    }

    fn with_fielder<F: FnOnce(&mut Fielding)>(&mut self, tag: Option<Tag>, f: F) {
        if let (Some(key), Some(tag)) = (self.fielding_key(), tag) {
            if let Some(player) = self.store.players.get_mut(&tag) {
                f(&mut player.year_mut(key).fielding);
            }
        }
    }

    fn with_base_runner<F: FnOnce(&mut BaseRunning)>(&mut self, tag: Option<Tag>, f: F) {
        if let (Some(key), Some(tag)) = (self.batting_key(), tag) {
            if let Some(player) = self.store.players.get_mut(&tag) {
                f(&mut player.year_mut(key).base_running);
            }
        }
    }

    /// The player occupying `position` on defense when the play began.
    fn fielder_at(&self, position: FieldingPosition) -> PositionRef {
        let tag = self.store.games.get(&self.cursor.game).and_then(|g| {
            g.lineup
                .find_by_position(position, !self.visiting, &self.pre_instance)
        });
        PositionRef { position, tag }
    }

    /// The identity of the runner currently in a slot.
    fn runner_tag(&self, runner: BaseRunner) -> Option<Tag> {
        match runner_slot(runner) {
            None => Some(self.batter),
            Some(slot) => self.cursor.runners[slot],
        }
    }

    fn clear_runner(&mut self, runner: BaseRunner) {
        if let Some(slot) = runner_slot(runner) {
            self.cursor.runners[slot] = None;
        }
    }

    /// Records one out for the batting team; the third out resets the
    /// half-inning.
    fn increment_outs(&mut self) {
        self.cursor.instance.base_out.outs += 1;
        self.with_pitcher(|p| p.outs_recorded += 1);
        if self.cursor.instance.base_out.outs >= 3 {
            self.cursor.instance.base_out.reset();
            self.cursor.runners = [None; 3];
        }
    }

    fn on_out(&mut self, ev: &str) -> Result<()> {
        self.set_kind(EventKind::Out);
        self.with_pitcher(|p| p.batters_faced += 1);

        let mut putouts = 0usize;
        let mut runners_out = 0usize;
        let sequences: Vec<&str> = OUT_SEQUENCE.find_iter(ev).map(|m| m.as_str()).collect();
        for seq in sequences {
            let mut out = Out {
                unassisted: true,
                ..Out::default()
            };
            if let Some(caps) = OUT_RUNNER.captures(seq) {
                out.runner = BaseRunner::from_str(&caps["runner"]).ok();
            }
            let digits: Vec<u8> = seq
                .chars()
                .take_while(char::is_ascii_digit)
                .filter_map(|c| c.to_digit(10))
                .map(|d| d as u8)
                .collect();
            for (i, digit) in digits.iter().enumerate() {
                let position =
                    FieldingPosition::try_from(*digit).unwrap_or(FieldingPosition::Unknown);
                let fielder = self.fielder_at(position);
                if i + 1 == digits.len() {
                    // The rightmost fielder of a sequence records the putout.
                    self.with_fielder(fielder.tag, |f| f.putouts += 1);
                    out.fielder = Some(fielder);
                    self.increment_outs();
                    putouts += 1;
                } else {
                    self.with_fielder(fielder.tag, |f| f.assists += 1);
                    out.assists.push(fielder);
                    out.unassisted = false;
                }
            }
            if let Some(runner) = out.runner {
                runners_out += 1;
                if let Some(base) = runner.current_base() {
                    self.cursor.instance.base_out.runner(base, true);
                    self.clear_runner(runner);
                }
            }
            self.state_mut().event.outs.push(out);
        }
        // Every putout named a runner, so the batter reached on the play.
        if putouts > 0 && runners_out >= putouts {
            self.implicit.push(RunnerAdvance::batter_to(Base::First));
        }
        Ok(())
    }

    fn on_hit(&mut self, ev: &str) -> Result<()> {
        self.with_pitcher(|p| {
            p.batters_faced += 1;
            p.hits += 1;
        });
        let (kind, to) = if ev.starts_with("DGR") {
            self.with_batter(|y| y.batting.ground_rule_doubles += 1);
            (EventKind::GroundRuleDouble, Base::Second)
        } else {
            match ev.chars().next() {
                Some('S') => {
                    self.with_batter(|y| y.batting.singles += 1);
                    (EventKind::Single, Base::First)
                }
                Some('D') => {
                    self.with_batter(|y| y.batting.doubles += 1);
                    (EventKind::Double, Base::Second)
                }
                Some('T') => {
                    self.with_batter(|y| y.batting.triples += 1);
                    (EventKind::Triple, Base::Third)
                }
                _ => {
                    self.with_batter(|y| y.batting.home_runs += 1);
                    (EventKind::HomeRun, Base::Home)
                }
            }
        };
        self.set_kind(kind);
        self.implicit.push(RunnerAdvance::batter_to(to));
        Ok(())
    }

    fn on_fielders_choice(&mut self, _ev: &str) -> Result<()> {
        // The fielder named after FC made the choice, not an out; the runner
        // retired (if any) arrives through the advance clause.
        self.set_kind(EventKind::FieldersChoice);
        self.with_pitcher(|p| p.batters_faced += 1);
        self.with_batter(|y| y.batting.fielders_choices += 1);
        self.implicit.push(RunnerAdvance::batter_to(Base::First));
        Ok(())
    }

    fn on_error(&mut self, ev: &str) -> Result<()> {
        if let Some(rest) = ev.strip_prefix("FLE") {
            // Error on a foul fly; the at-bat continues.
            self.set_kind(EventKind::FoulError);
            if let Some(errant) = FieldingPosition::fielding_vec(rest).first().copied() {
                let fielder = self.fielder_at(errant);
                self.with_fielder(fielder.tag, |f| f.errors += 1);
            }
            return Ok(());
        }
        self.set_kind(EventKind::Error);
        self.with_pitcher(|p| p.batters_faced += 1);
        self.with_batter(|y| y.batting.reached_on_error += 1);
        let (assist_str, error_str) = ev.split_at(ev.find('E').unwrap_or_default());
        for position in FieldingPosition::fielding_vec(assist_str) {
            let fielder = self.fielder_at(position);
            self.with_fielder(fielder.tag, |f| f.assists += 1);
        }
        if let Some(errant) = FieldingPosition::fielding_vec(error_str).first().copied() {
            let fielder = self.fielder_at(errant);
            self.with_fielder(fielder.tag, |f| f.errors += 1);
        }
        self.implicit.push(RunnerAdvance::batter_to(Base::First));
        Ok(())
    }

    fn on_hit_batter(&mut self, ev: &str) -> Result<()> {
        if ev.starts_with("HP") {
            self.set_kind(EventKind::HitByPitch);
            self.with_batter(|y| y.batting.hit_by_pitch += 1);
        } else {
            self.set_kind(EventKind::Interference);
            self.with_batter(|y| y.batting.interference += 1);
        }
        self.with_pitcher(|p| p.batters_faced += 1);
        self.implicit.push(RunnerAdvance::batter_to(Base::First));
        Ok(())
    }

    fn on_strikeout(&mut self, ev: &str) -> Result<()> {
        self.set_kind(EventKind::Strikeout);
        self.increment_outs();
        self.with_pitcher(|p| {
            p.strikeouts += 1;
            p.batters_faced += 1;
        });
        self.with_batter(|y| y.batting.strikeouts += 1);

        let suffix = &ev[1..];
        let mut out = Out {
            unassisted: true,
            runner: Some(BaseRunner::Batter),
            ..Out::default()
        };
        let credits: Vec<u8> = suffix
            .chars()
            .take_while(char::is_ascii_digit)
            .filter_map(|c| c.to_digit(10))
            .map(|d| d as u8)
            .collect();
        if credits.is_empty() {
            // Conventional strikeout: the catcher records the putout.
            let catcher = self.fielder_at(FieldingPosition::Catcher);
            self.with_fielder(catcher.tag, |f| f.putouts += 1);
            out.fielder = Some(catcher);
        } else {
            // Dropped third strike, e.g. K23.
            for (i, digit) in credits.iter().enumerate() {
                let position =
                    FieldingPosition::try_from(*digit).unwrap_or(FieldingPosition::Unknown);
                let fielder = self.fielder_at(position);
                if i + 1 == credits.len() {
                    self.with_fielder(fielder.tag, |f| f.putouts += 1);
                    out.fielder = Some(fielder);
                } else {
                    self.with_fielder(fielder.tag, |f| f.assists += 1);
                    out.assists.push(fielder);
                    out.unassisted = false;
                }
            }
        }
        self.state_mut().event.outs.push(out);

        if let Some(pos) = suffix.find('+') {
            self.on_baserunning(&suffix[pos + 1..])?;
        }
        Ok(())
    }

    fn on_walk(&mut self, ev: &str) -> Result<()> {
        if ev.starts_with('I') {
            self.set_kind(EventKind::IntentionalWalk);
            self.with_batter(|y| y.batting.intentional_walks += 1);
        } else {
            self.set_kind(EventKind::Walk);
            self.with_batter(|y| y.batting.walks += 1);
        }
        self.with_pitcher(|p| {
            p.walks += 1;
            p.batters_faced += 1;
        });
        // Unless the advance clause places the batter, a walk puts him on
        // first; the merge step handles the precedence.
        self.implicit.push(RunnerAdvance::batter_to(Base::First));

        if let Some(pos) = ev.find('+') {
            self.on_baserunning(&ev[pos + 1..])?;
        }
        Ok(())
    }

    fn on_ignore(&mut self, _ev: &str) -> Result<()> {
        Ok(())
    }

    fn on_baserunning(&mut self, ev: &str) -> Result<()> {
        for item in ev.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.baserunning_item(item)?;
        }
        Ok(())
    }

    fn baserunning_item(&mut self, item: &str) -> Result<()> {
        let Some(caps) = BASERUNNING_ITEM.captures(item) else {
            debug!(
                "{} [{}]: unrecognized baserunning item {:?}",
                self.file.name, self.file.line, item
            );
            return Ok(());
        };
        let base = caps
            .name("base")
            .and_then(|m| Base::from_str(m.as_str()).ok());
        let fielders = caps.name("fielders").map_or("", |m| m.as_str());
        let errored = fielders.contains('E');
        let unearned = item.contains("(UR)");

        match &caps["kind"] {
            "SB" => {
                let Some(target) = base else { return Ok(()) };
                self.set_kind_first(EventKind::StolenBase);
                let runner = BaseRunner::from_target_base(target);
                let tag = self.runner_tag(runner);
                self.with_base_runner(tag, |br| br.stolen_bases += 1);
                let mut advance = RunnerAdvance::runner_to(target);
                if unearned {
                    advance.modifiers.push(AdvanceModifier::UnearnedRun);
                }
                self.implicit.push(advance);
            }
            kind @ ("CS" | "POCS") => {
                let Some(target) = base else { return Ok(()) };
                self.set_kind_first(if kind == "CS" {
                    EventKind::CaughtStealing
                } else {
                    EventKind::PickoffCaughtStealing
                });
                let runner = BaseRunner::from_target_base(target);
                if errored {
                    // Safe on the error; scores as an advance, not an out.
                    self.credit_fielding_string(fielders);
                    self.implicit.push(RunnerAdvance::runner_to(target));
                } else {
                    let tag = self.runner_tag(runner);
                    self.with_base_runner(tag, |br| br.caught_stealing += 1);
                    self.record_baserunning_out(runner, target, fielders);
                }
            }
            "PO" => {
                let Some(at) = base else { return Ok(()) };
                self.set_kind_first(EventKind::Pickoff);
                let runner = BaseRunner::from_current_base(at);
                if errored {
                    self.credit_fielding_string(fielders);
                } else {
                    self.record_baserunning_out(runner, at, fielders);
                }
            }
            "BK" => self.set_kind_first(EventKind::Balk),
            "DI" => self.set_kind_first(EventKind::DefensiveIndifference),
            "OA" => self.set_kind_first(EventKind::OtherAdvance),
            "PB" => self.set_kind_first(EventKind::PassedBall),
            "WP" => {
                self.set_kind_first(EventKind::WildPitch);
                self.with_pitcher(|p| p.wild_pitches += 1);
            }
            _ => {}
        }
        Ok(())
    }

    /// Credits a chain of fielding positions: every position but the last is
    /// an assist, the last records the putout.
    fn credit_positions(
        &mut self,
        positions: &[FieldingPosition],
    ) -> (Option<PositionRef>, Vec<PositionRef>) {
        let mut assists = Vec::new();
        let mut putout = None;
        for (i, position) in positions.iter().enumerate() {
            let fielder = self.fielder_at(*position);
            if i + 1 == positions.len() {
                self.with_fielder(fielder.tag, |f| f.putouts += 1);
                putout = Some(fielder);
            } else {
                self.with_fielder(fielder.tag, |f| f.assists += 1);
                assists.push(fielder);
            }
        }
        (putout, assists)
    }

    /// Credits the fielders named in a parenthesized string. A string
    /// containing an error credits the errant fielder and produces no putout.
    fn credit_fielding_string(
        &mut self,
        fielders: &str,
    ) -> (Option<PositionRef>, Vec<PositionRef>) {
        if let Some(err_at) = fielders.find('E') {
            let mut assists = Vec::new();
            for position in FieldingPosition::fielding_vec(&fielders[..err_at]) {
                let fielder = self.fielder_at(position);
                self.with_fielder(fielder.tag, |f| f.assists += 1);
                assists.push(fielder);
            }
            if let Some(errant) = FieldingPosition::fielding_vec(&fielders[err_at..])
                .first()
                .copied()
            {
                let fielder = self.fielder_at(errant);
                self.with_fielder(fielder.tag, |f| f.errors += 1);
            }
            return (None, assists);
        }
        let positions = FieldingPosition::fielding_vec(fielders);
        self.credit_positions(&positions)
    }

    fn record_baserunning_out(&mut self, runner: BaseRunner, at: Base, fielders: &str) {
        let (fielder, assists) = self.credit_fielding_string(fielders);
        let out = Out {
            tag_out: true,
            unassisted: assists.is_empty(),
            runner: Some(runner),
            at_base: Some(at),
            fielder,
            assists,
        };
        if let Some(occupied) = runner.current_base() {
            self.cursor.instance.base_out.runner(occupied, true);
            self.clear_runner(runner);
        }
        self.state_mut().event.outs.push(out);
        self.increment_outs();
    }

    fn parse_description(&mut self, desc: &str) {
        for flag in desc.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let (word, rest) = regex_split(flag, MODIFIER_DIVIDER);
            match word {
                "SF" => self.sac_fly = true,
                "SH" => self.sac_hit = true,
                "GDP" | "BGDP" => self.double_play = true,
                "E" => {
                    if let Some(errant) = FieldingPosition::fielding_vec(rest.unwrap_or_default())
                        .first()
                        .copied()
                    {
                        let fielder = self.fielder_at(errant);
                        self.with_fielder(fielder.tag, |f| f.errors += 1);
                    }
                }
                "" => {
                    // Bare location digits, e.g. the 9 of HR/9.
                    if !flag.is_empty() {
                        self.state_mut().batted_ball.set_designation(flag);
                    }
                }
                _ => {
                    if let Ok(contact) = Contact::from_str(word) {
                        let state = self.state_mut();
                        state.batted_ball.contact = Some(contact);
                        if let Some(location) = rest {
                            state.batted_ball.set_designation(location);
                        }
                    }
                    // Other modifiers (AP, FO, IF, ...) carry no counter
                    // effects.
                }
            }
        }
    }

    fn parse_advance_clause(&mut self, clause: &str) {
        for part in clause.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(caps) = ADVANCE.captures(part) else {
                debug!(
                    "{} [{}]: unrecognized advance {:?}",
                    self.file.name, self.file.line, part
                );
                continue;
            };
            let (Ok(runner), Ok(to)) = (
                BaseRunner::from_str(&caps["from"]),
                Base::from_str(&caps["to"]),
            ) else {
                continue;
            };
            self.explicit.push(RunnerAdvance {
                runner,
                to,
                out: &caps["op"] == "X",
                modifiers: AdvanceModifier::parse_list(caps.name("mods").map_or("", |m| m.as_str())),
            });
        }
    }

    /// Applies the merged advances once, lead runner first. Explicit entries
    /// win over implicit ones for the same runner.
    fn apply_advances(&mut self) {
        let mut combined = std::mem::take(&mut self.explicit);
        for advance in std::mem::take(&mut self.implicit) {
            if !combined.iter().any(|e| e.runner == advance.runner) {
                combined.push(advance);
            }
        }
        combined.sort_by(|a, b| b.runner.cmp(&a.runner));
        for advance in combined {
            self.apply_advance(advance);
        }
    }

    fn apply_advance(&mut self, advance: RunnerAdvance) {
        for modifier in &advance.modifiers {
            match modifier {
                AdvanceModifier::Error { errant, .. } => {
                    let fielder = self.fielder_at(*errant);
                    self.with_fielder(fielder.tag, |f| f.errors += 1);
                }
                AdvanceModifier::WildPitch => self.with_pitcher(|p| p.wild_pitches += 1),
                _ => {}
            }
        }

        if advance.out {
            let credit_chain = advance
                .modifiers
                .iter()
                .find_map(|m| match m {
                    AdvanceModifier::Fielders(positions) => Some(positions.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            let (fielder, assists) = self.credit_positions(&credit_chain);
            if let Some(occupied) = advance.runner.current_base() {
                self.cursor.instance.base_out.runner(occupied, true);
                self.clear_runner(advance.runner);
            }
            let out = Out {
                tag_out: true,
                unassisted: assists.is_empty(),
                runner: Some(advance.runner),
                at_base: Some(advance.to),
                fielder,
                assists,
            };
            self.state_mut().event.outs.push(out);
            self.increment_outs();
            return;
        }

        self.state_mut().event.advance.set(advance.runner, advance.to);
        if let Some(occupied) = advance.runner.current_base() {
            self.cursor.instance.base_out.runner(occupied, true);
        }
        let tag = match runner_slot(advance.runner) {
            None => Some(self.batter),
            Some(slot) => self.cursor.runners[slot].take(),
        };
        if advance.to == Base::Home {
            self.score_run(&advance);
        } else {
            self.cursor.instance.base_out.runner(advance.to, false);
            if let Some(slot) = base_slot(advance.to) {
                self.cursor.runners[slot] = tag;
            }
        }
    }

    /// All run/RBI/ER accounting lives here, once per run scored.
    fn score_run(&mut self, advance: &RunnerAdvance) {
        if advance.rbi_flagged() || (!advance.errored() && !advance.no_rbi()) {
            self.with_batter(|y| y.batting.rbi += 1);
        }
        let unearned = advance.unearned();
        self.with_pitcher(|p| {
            p.runs += 1;
            if !unearned {
                p.earned_runs += 1;
            }
        });
        let visiting = self.visiting;
        if let Some(game) = self.store.games.get_mut(&self.cursor.game) {
            if visiting {
                game.runs_visiting += 1;
            } else {
                game.runs_home += 1;
            }
        }
        self.cursor.instance.runs += 1;
        self.state_mut().event.runs_scored += 1;
    }

    /// Plate-appearance and at-bat accounting, after the event kind and the
    /// description flags are both known.
    fn finalize_batting(&mut self) {
        use EventKind::*;
        let kind = self.kind();
        let plate_appearance = matches!(
            kind,
            Out | Error
                | Strikeout
                | Walk
                | IntentionalWalk
                | HitByPitch
                | Interference
                | Single
                | Double
                | GroundRuleDouble
                | Triple
                | HomeRun
                | FieldersChoice
        );
        if !plate_appearance {
            return;
        }
        let sacrifice = self.sac_fly || self.sac_hit;
        let at_bat =
            !sacrifice && !matches!(kind, Walk | IntentionalWalk | HitByPitch | Interference);
        let (sac_fly, sac_hit, double_play) = (self.sac_fly, self.sac_hit, self.double_play);
        self.with_batter(|y| {
            y.batting.plate_appearances += 1;
            if at_bat {
                y.batting.at_bats += 1;
            }
            if sac_fly {
                y.batting.sac_flies += 1;
            }
            if sac_hit {
                y.batting.sac_hits += 1;
            }
            if double_play {
                y.batting.double_plays += 1;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_patterns_pick_the_right_subparser() {
        assert_eq!(OUT_EVENT.find("64(1)3/GDP").unwrap().end(), 7);
        assert_eq!(OUT_EVENT.find("63").unwrap().end(), 2);
        assert!(OUT_EVENT.find("6E3").is_none());
        assert_eq!(HIT_EVENT.find("S8/L").unwrap().end(), 3);
        assert_eq!(HIT_EVENT.find("HR/9").unwrap().end(), 2);
        assert_eq!(HIT_EVENT.find("DGR/9").unwrap().end(), 3);
        assert!(HIT_EVENT.find("HP").is_none());
        assert!(HIT_EVENT.find("SB2").is_none());
        assert!(HIT_EVENT.find("DI").is_none());
        assert!(WALK_EVENT.find("WP").is_none());
        assert_eq!(WALK_EVENT.find("W").unwrap().end(), 1);
        assert_eq!(WALK_EVENT.find("IW+SB2").unwrap().end(), 6);
        assert!(HIT_BATTER_EVENT.find("CS2(26)").is_none());
        assert_eq!(HIT_BATTER_EVENT.find("C/E2").unwrap().end(), 2);
        assert_eq!(STRIKEOUT_EVENT.find("K23").unwrap().end(), 3);
        assert_eq!(CAUGHT_STEALING_EVENT.find("CS2(24)").unwrap().end(), 7);
        assert_eq!(PICKOFF_EVENT.find("PO1(13)").unwrap().end(), 7);
        assert!(PICKOFF_EVENT.find("POCS2(1361)").is_none());
        assert_eq!(PICKOFF_CS_EVENT.find("POCS2(1361)").unwrap().end(), 11);
        assert_eq!(STOLEN_BASE_EVENT.find("SB2;SB3").unwrap().end(), 7);
        assert_eq!(ERROR_EVENT.find("E6/G").unwrap().end(), 2);
        assert_eq!(FC_EVENT.find("FC6").unwrap().end(), 3);
    }

    #[test]
    fn advance_clause_shapes() {
        let caps = ADVANCE.captures("2X3(25)").unwrap();
        assert_eq!(&caps["from"], "2");
        assert_eq!(&caps["op"], "X");
        assert_eq!(&caps["to"], "3");
        assert_eq!(&caps["mods"], "(25)");
        assert!(ADVANCE.captures("junk").is_none());
    }

    #[test]
    fn advance_modifiers_parse() {
        use AdvanceModifier::*;
        assert_eq!(
            AdvanceModifier::parse_list("(UR)(NR)"),
            vec![UnearnedRun, NoRbi]
        );
        assert_eq!(
            AdvanceModifier::parse_list("(E5)"),
            vec![Error {
                assists: vec![],
                errant: FieldingPosition::ThirdBaseman
            }]
        );
        assert_eq!(
            AdvanceModifier::parse_list("(2E4)"),
            vec![Error {
                assists: vec![FieldingPosition::Catcher],
                errant: FieldingPosition::SecondBaseman
            }]
        );
        assert_eq!(
            AdvanceModifier::parse_list("(25)"),
            vec![Fielders(vec![
                FieldingPosition::Catcher,
                FieldingPosition::ThirdBaseman
            ])]
        );
        assert_eq!(AdvanceModifier::parse_list("(TH)"), vec![ThrowTo(None)]);
        assert_eq!(
            AdvanceModifier::parse_list("(THH)"),
            vec![ThrowTo(Some(Base::Home))]
        );
    }

    #[test]
    fn chain_state_branches() {
        let mut store = Store::new();
        let game_tag = Tag::game("TES198700001");
        store.games.create(game_tag);
        let mut cursor = GameCursor::new(game_tag, 1987);

        // No previous state: a fresh node becomes the chain head.
        let head = chain_state(&mut store, &mut cursor);
        assert_eq!(store.games.get(&game_tag).unwrap().plays, Some(head));

        // A pre-allocated game link is picked up as the current state.
        let next = store
            .states
            .create(StateKind::InPlay(BaseOut::new(true, false, false, 1)));
        store.states.get_mut(head).unwrap().game_link = Some(next);
        cursor.last_state = Some(head);
        assert_eq!(chain_state(&mut store, &mut cursor), next);

        // An inning-end marker forces a fresh empty state linked behind it.
        let marker = store.states.create(StateKind::EndHalf);
        cursor.last_state = Some(marker);
        let fresh = chain_state(&mut store, &mut cursor);
        assert_eq!(store.states.get(marker).unwrap().game_link, Some(fresh));
        assert_eq!(
            store.states.get(fresh).unwrap().kind,
            StateKind::InPlay(BaseOut::EMPTY)
        );

        // End of game restarts the chain head.
        let done = store.states.create(StateKind::EndGame);
        cursor.last_state = Some(done);
        let restarted = chain_state(&mut store, &mut cursor);
        assert_eq!(store.games.get(&game_tag).unwrap().plays, Some(restarted));
    }
}
