//! Parser for the ballpark master file, `parks.dat`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use itertools::Itertools;
use tracing::{info, warn};

use crate::domain::{League, Tag};
use crate::ingest::CancelToken;
use crate::store::Store;
use crate::util::parse_american_date;

/// Reads the park master into the store, returning the number of records
/// admitted. Malformed lines are skipped; an unopenable file is an error.
pub fn parse(store: &mut Store, path: &Path, cancel: &CancelToken) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    info!("processing {}", path.display());
    let admitted = parse_reader(store, BufReader::new(file), cancel);
    info!("processed {} ballpark records", store.ballparks.count());
    Ok(admitted)
}

fn parse_reader<R: Read>(store: &mut Store, input: R, cancel: &CancelToken) -> usize {
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
                warn!("skipping unreadable park record: {e}");
                continue;
            }
        };
        // parkId,name,aka,city,state,open,close,league,notes...
        if record.len() < 9 {
            continue;
        }
        let park = store.ballparks.create(Tag::ballpark(&record[0]));
        park.name = record[1].to_string();
        park.nickname = record[2].to_string();
        park.city = record[3].to_string();
        park.state = record[4].to_string();
        park.opened = parse_american_date(&record[5]);
        park.closed = parse_american_date(&record[6]);
        park.league = League::parse_lenient(&record[7]);
        // The notes field owns everything from the eighth comma on.
        park.notes = record.iter().skip(8).join(",");
        admitted += 1;
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_absorb_trailing_commas() {
        let mut store = Store::new();
        let admitted = parse_reader(
            &mut store,
            "BOS07,Fenway Park,,Boston,MA,04/20/1912,,AL,notes,with,commas\n".as_bytes(),
            &CancelToken::default(),
        );
        assert_eq!(admitted, 1);
        let park = store.ballparks.get(&Tag::ballpark("BOS07")).unwrap();
        assert_eq!(park.name, "Fenway Park");
        assert_eq!(park.league, League::American);
        assert!(park.closed.is_none());
        assert!(park.is_active());
        assert_eq!(park.notes, "notes,with,commas");
        assert_eq!(park.opened, chrono::NaiveDate::from_ymd_opt(1912, 4, 20));
    }

    #[test]
    fn short_lines_are_skipped() {
        let mut store = Store::new();
        let admitted = parse_reader(
            &mut store,
            "BOS07,Fenway Park,Boston\n".as_bytes(),
            &CancelToken::default(),
        );
        assert_eq!(admitted, 0);
        assert_eq!(store.ballparks.count(), 0);
    }

    #[test]
    fn unknown_league_falls_back_to_national() {
        let mut store = Store::new();
        parse_reader(
            &mut store,
            "STL10,Busch Stadium,,St. Louis,MO,05/12/1966,10/02/2005,XX,\n".as_bytes(),
            &CancelToken::default(),
        );
        let park = store.ballparks.get(&Tag::ballpark("STL10")).unwrap();
        assert_eq!(park.league, League::National);
        assert!(!park.is_active());
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut store = Store::new();
        assert!(parse(
            &mut store,
            Path::new("/definitely/not/here/parks.dat"),
            &CancelToken::default()
        )
        .is_err());
    }
}
