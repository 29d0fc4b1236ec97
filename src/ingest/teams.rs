//! Parser for the yearly team list, `TEAM<yyyy>`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::domain::{League, Tag};
use crate::ingest::CancelToken;
use crate::store::Store;

/// Reads one season's team list, creating or updating each franchise's
/// season entry.
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
                warn!("skipping unreadable team record: {e}");
                continue;
            }
        };
        // teamId,leagueLetter,location,name
        if record.len() != 4 {
            continue;
        }
        let team = store.teams.create(Tag::team(&record[0]));
        let season = team.year_mut(year);
        season.validate();
        season.league = record[1]
            .trim()
            .chars()
            .next()
            .map_or(League::National, League::from_letter);
        season.location = record[2].to_string();
        season.name = record[3].to_string();
        admitted += 1;
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_entries_are_filled_in() {
        let mut store = Store::new();
        let admitted = parse_reader(
            &mut store,
            "BOS,A,Boston,Red Sox\nSLN,N,St. Louis,Cardinals\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        assert_eq!(admitted, 2);

        let bos = store.teams.get(&Tag::team("BOS")).unwrap();
        let season = bos.year(1987).unwrap();
        assert!(season.is_valid());
        assert_eq!(season.league, League::American);
        assert_eq!(season.location, "Boston");
        assert_eq!(season.name, "Red Sox");

        let sln = store.teams.get(&Tag::team("SLN")).unwrap();
        assert_eq!(sln.year(1987).unwrap().league, League::National);
    }

    #[test]
    fn reingesting_a_season_updates_in_place() {
        let mut store = Store::new();
        parse_reader(
            &mut store,
            "BOS,A,Boston,Red Sox\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        parse_reader(
            &mut store,
            "BOS,A,Boston,Americans\n".as_bytes(),
            1987,
            &CancelToken::default(),
        );
        assert_eq!(store.teams.count(), 1);
        let bos = store.teams.get(&Tag::team("BOS")).unwrap();
        assert_eq!(bos.year(1987).unwrap().name, "Americans");
    }
}
