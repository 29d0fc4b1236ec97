//! Line dispatcher for Retrosheet event files. The first comma field routes
//! each record; `play` lines hand off to the play decoder with the per-game
//! cursor.

use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use crate::domain::{
    FieldCondition, FieldingPosition, GameType, Precipitation, Sky, Tag, WindDirection,
};
use crate::event_file::play;
use crate::ingest::CancelToken;
use crate::store::game::Instance;
use crate::store::player::TeamYearKey;
use crate::store::state::StateId;
use crate::store::Store;
use crate::util::parse_positive_int;

/// Where the parser is in the current file, for diagnostics.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub name: String,
    /// 1-based line number of the record being parsed.
    pub line: u64,
}

/// Mutable per-game parse state, reset on every `id` record.
#[derive(Debug)]
pub struct GameCursor {
    pub game: Tag,
    pub year: u16,
    pub instance: Instance,
    pub last_state: Option<StateId>,
    /// The identity of the runner on each base, first through third.
    pub runners: [Option<Tag>; 3],
    /// Each batter's most recent state, for threading the player chain.
    pub batter_states: BTreeMap<Tag, StateId>,
}

impl GameCursor {
    pub fn new(game: Tag, year: u16) -> Self {
        Self {
            game,
            year,
            instance: Instance::STARTER,
            last_state: None,
            runners: [None; 3],
            batter_states: BTreeMap::new(),
        }
    }
}

enum Decision {
    Win,
    Loss,
    Save,
}

pub struct EventFileParser<'a> {
    store: &'a mut Store,
    year: u16,
    cursor: Option<GameCursor>,
    file: FileContext,
}

impl<'a> EventFileParser<'a> {
    pub fn new(store: &'a mut Store, year: u16, name: impl Into<String>) -> Self {
        Self {
            store,
            year,
            cursor: None,
            file: FileContext {
                name: name.into(),
                line: 0,
            },
        }
    }

    /// Parses a whole event file. Record-level failures are logged with the
    /// file name and line number and never abort the file.
    pub fn parse<R: Read>(mut self, input: R, cancel: &CancelToken) -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        let mut record = StringRecord::new();
        loop {
            if cancel.is_cancelled() {
                warn!("{}: ingestion cancelled", self.file.name);
                break;
            }
            match reader.read_record(&mut record) {
                Ok(true) => {
                    self.file.line += 1;
                    if let Err(e) = self.dispatch(&record) {
                        warn!("{} [{}]: {e:#}", self.file.name, self.file.line);
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    self.file.line += 1;
                    warn!("{} [{}]: unreadable record: {e}", self.file.name, self.file.line);
                }
            }
        }
        self.finish_game();
        Ok(())
    }

    fn dispatch(&mut self, record: &StringRecord) -> Result<()> {
        match record.get(0) {
            Some("id") => self.start_game(record),
            Some("info") => self.game_info(record),
            Some("start") | Some("sub") => self.substitute(record),
            Some("play") => self.play(record),
            Some("version") | Some("data") | Some("com") | Some("badj") | Some("padj")
            | Some("ladj") => Ok(()),
            other => {
                debug!(
                    "{} [{}]: skipping record type {:?}",
                    self.file.name, self.file.line, other
                );
                Ok(())
            }
        }
    }

    fn start_game(&mut self, record: &StringRecord) -> Result<()> {
        self.finish_game();
        let tag = Tag::game(record.get(1).context("id record without a tag")?);
        let game = self.store.games.create(tag);
        game.year = self.year;
        self.cursor = Some(GameCursor::new(tag, self.year));
        Ok(())
    }

    fn game_info(&mut self, record: &StringRecord) -> Result<()> {
        let cursor = self.cursor.as_ref().context("info record before id")?;
        let key = record.get(1).unwrap_or_default();
        let value = record.get(2).unwrap_or_default().trim();
        let game = self
            .store
            .games
            .get_mut(&cursor.game)
            .context("current game missing from table")?;
        match key {
            "visteam" => game.team_visiting = Some(Tag::team(value)),
            "hometeam" => game.team_home = Some(Tag::team(value)),
            "site" => game.ballpark = Some(Tag::ballpark(value)),
            "date" => game.date = NaiveDate::parse_from_str(value, "%Y/%m/%d").ok(),
            "number" => game.game_type = GameType::from_str(value).unwrap_or(GameType::Unknown),
            "starttime" => game.start_time = parse_game_time(value),
            "daynight" => game.night = value == "night",
            "usedh" => game.use_dh = value.eq_ignore_ascii_case("true"),
            "sky" => game.sky = Sky::from_str(value).unwrap_or_default(),
            "fieldcond" | "fieldcon" => {
                game.field_condition = FieldCondition::from_str(value).unwrap_or_default();
            }
            "precip" => game.precipitation = Precipitation::from_str(value).unwrap_or_default(),
            "winddir" => game.wind_direction = WindDirection::from_str(value).unwrap_or_default(),
            "windspeed" => game.wind_speed = parse_positive_int(value),
            "temp" => game.temperature = parse_positive_int(value),
            "attendance" => game.attendance = parse_positive_int(value),
            "timeofgame" => game.duration_minutes = parse_positive_int(value),
            "wp" => game.winning_pitcher = non_empty_player(value),
            "lp" => game.losing_pitcher = non_empty_player(value),
            "save" => game.save_pitcher = non_empty_player(value),
            other => debug!(
                "{} [{}]: ignoring info key {:?}",
                self.file.name, self.file.line, other
            ),
        }
        Ok(())
    }

    /// `start` and `sub` records share a shape; both go through the lineup.
    fn substitute(&mut self, record: &StringRecord) -> Result<()> {
        let cursor = self.cursor.as_ref().context("substitution before id")?;
        let fields = record.deserialize::<[&str; 6]>(None)?;
        let tag = Tag::player(fields[1]);
        // fields[2] is the player's name, which the master file already has
        let visiting = fields[3].trim() == "0";
        let order: u8 = fields[4].trim().parse().context("unparseable batting order")?;
        let position = FieldingPosition::from_roster_code(fields[5]);
        let instance = cursor.instance;
        let game_tag = cursor.game;
        let at_start = instance == Instance::STARTER;

        let game = self
            .store
            .games
            .get_mut(&game_tag)
            .context("current game missing from table")?;
        let first_appearance = game.lineup.substitute(tag, instance, position, order, visiting);
        let team = if visiting {
            game.team_visiting
        } else {
            game.team_home
        };

        // The player gets a team-year entry for this game if not already on
        // the roster.
        if let (Some(team), Some(player)) = (team, self.store.players.get_mut(&tag)) {
            let year = player.year_mut(TeamYearKey::TeamYear(team, self.year));
            year.validate();
            year.add_position(position);
            if first_appearance {
                year.general.games_played += 1;
                if at_start {
                    year.general.games_started += 1;
                }
            }
        }
        Ok(())
    }

    fn play(&mut self, record: &StringRecord) -> Result<()> {
        let cursor = self.cursor.as_mut().context("play record before id")?;
        play::parse_play(self.store, cursor, record, &self.file)
    }

    /// Wraps up the game in progress, crediting the pitcher decisions now
    /// that the full lineup is known.
    fn finish_game(&mut self) {
        let Some(cursor) = self.cursor.take() else {
            return;
        };
        let mut credits = Vec::new();
        if let Some(game) = self.store.games.get(&cursor.game) {
            for (tag, decision) in [
                (game.winning_pitcher, Decision::Win),
                (game.losing_pitcher, Decision::Loss),
                (game.save_pitcher, Decision::Save),
            ] {
                let Some(tag) = tag else { continue };
                let Some(card) = game.lineup.get(&tag) else {
                    continue;
                };
                let team = if card.visiting {
                    game.team_visiting
                } else {
                    game.team_home
                };
                if let Some(team) = team {
                    credits.push((tag, team, decision));
                }
            }
        }
        for (tag, team, decision) in credits {
            if let Some(player) = self.store.players.get_mut(&tag) {
                let pitching = &mut player
                    .year_mut(TeamYearKey::TeamYear(team, self.year))
                    .pitching;
                match decision {
                    Decision::Win => pitching.wins += 1,
                    Decision::Loss => pitching.losses += 1,
                    Decision::Save => pitching.saves += 1,
                }
            }
        }
    }
}

fn non_empty_player(value: &str) -> Option<Tag> {
    if value.is_empty() {
        None
    } else {
        Some(Tag::player(value))
    }
}

/// Start times come as bare clock digits, e.g. `0734` or `734`.
fn parse_game_time(value: &str) -> Option<NaiveTime> {
    let padded = format!("{value:0>4}");
    NaiveTime::parse_from_str(&padded, "%H%M").ok()
}
