//! The in-memory database: tag-keyed record tables plus the arena that owns
//! every play state. A [`Store`] is an explicit value owned by the ingestion
//! driver and threaded through the parsers; nothing here is process-global.

pub mod ballpark;
pub mod game;
pub mod player;
pub mod stat;
pub mod state;
pub mod table;
pub mod team;

use crate::store::ballpark::Ballpark;
use crate::store::game::Game;
use crate::store::player::Player;
use crate::store::state::StateArena;
use crate::store::table::Table;
use crate::store::team::Team;

#[derive(Debug, Default)]
pub struct Store {
    pub ballparks: Table<Ballpark>,
    pub players: Table<Player>,
    pub teams: Table<Team>,
    pub games: Table<Game>,
    pub states: StateArena,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
