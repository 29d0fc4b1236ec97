//! Parser for team roster files, `*.ROS`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::domain::{FieldingPosition, Handedness, Tag};
use crate::ingest::CancelToken;
use crate::store::player::TeamYearKey;
use crate::store::Store;

/// Reads a roster file, creating the `(team, year)` entry for each listed
/// player and recording handedness. Players missing from the master file are
/// warned and skipped.
pub fn parse(store: &mut Store, path: &Path, year: u16, cancel: &CancelToken) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    info!("processing {}", path.display());
    Ok(parse_reader(store, BufReader::new(file), year, cancel))
}

fn parse_reader<R: Read>(store: &mut Store, input: R, year: u16, cancel: &CancelToken) -> usize {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut admitted = 0;
    for record in reader.records() {
        if cancel.is_cancelled() {
            break;
        }
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping unreadable roster record: {e}");
                continue;
            }
        };
        // playerId,surname,given,bats,throws,teamId,position
        if record.len() != 7 {
            continue;
        }
        let tag = Tag::player(&record[0]);
        let Some(player) = store.players.get_mut(&tag) else {
            warn!("roster names unknown player {}", &record[0]);
            continue;
        };
        let key = TeamYearKey::TeamYear(Tag::team(&record[5]), year);
        let season = player.year_mut(key);
        season.validate();
        season.bats = Handedness::parse_lenient(&record[3]);
        season.throws = Handedness::parse_lenient(&record[4]);
        season.add_position(FieldingPosition::from_roster_code(&record[6]));
        admitted += 1;
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::player::PlayerYear;

    fn store_with_bonds() -> Store {
        let mut store = Store::new();
        let bonds = store.players.create(Tag::player("bondb001"));
        bonds.surname = "Bonds".to_string();
        store
    }

    #[test]
    fn roster_lines_validate_the_team_year() {
        let mut store = store_with_bonds();
        let admitted = parse_reader(
            &mut store,
            "bondb001,Bonds,Barry,L,L,PIT,7\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        assert_eq!(admitted, 1);
        let bonds = store.players.get(&Tag::player("bondb001")).unwrap();
        let key = TeamYearKey::TeamYear(Tag::team("PIT"), 1987);
        let season = bonds.year(&key).unwrap();
        assert!(season.is_valid());
        assert_eq!(season.bats, Handedness::Left);
        assert_eq!(season.throws, Handedness::Left);
        assert_eq!(season.positions, vec![FieldingPosition::LeftFielder]);
        assert_eq!(season.team, Some(Tag::team("PIT")));
    }

    #[test]
    fn switch_hitters_accept_both_codes() {
        let mut store = store_with_bonds();
        parse_reader(
            &mut store,
            "bondb001,Bonds,Barry,B,R,PIT,8\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        let bonds = store.players.get(&Tag::player("bondb001")).unwrap();
        let key = TeamYearKey::TeamYear(Tag::team("PIT"), 1987);
        assert_eq!(bonds.year(&key).unwrap().bats, Handedness::Switch);
    }

    #[test]
    fn unknown_players_are_skipped() {
        let mut store = store_with_bonds();
        let admitted = parse_reader(
            &mut store,
            "ghost001,Ghost,Gary,R,R,PIT,4\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        assert_eq!(admitted, 0);
        assert!(store.players.get(&Tag::player("ghost001")).is_none());
        // No season entry appears for anyone else either.
        let bonds = store.players.get(&Tag::player("bondb001")).unwrap();
        assert_eq!(bonds.filter_years(PlayerYear::is_valid).count(), 0);
    }
}
