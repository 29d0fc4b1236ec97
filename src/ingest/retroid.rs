//! Parser for the player identifier master, `retroid.dat`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::domain::Tag;
use crate::ingest::CancelToken;
use crate::store::Store;
use crate::util::parse_american_date;

/// Reads the retroid master into the player table.
///
/// A retroid is `llllfxnn`: four letters of the surname, the first letter of
/// the given name, a classifier, and a duplicate counter. The classifier
/// admits `0` (career reached past 1984) and `1` (ended before) as players;
/// `8` is a manager-only and `9` an umpire-only entry, both skipped until
/// those tables exist.
pub fn parse(store: &mut Store, path: &Path, cancel: &CancelToken) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    info!("processing {}", path.display());
    let admitted = parse_reader(store, BufReader::new(file), cancel);
    info!("processed {} player records", store.players.count());
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
                warn!("skipping unreadable retroid record: {e}");
                continue;
            }
        };
        // surname,given,retroid,debut
        if record.len() != 4 {
            continue;
        }
        let retroid = record[2].trim();
        match retroid.chars().nth(5) {
            Some('0') | Some('1') => {}
            _ => continue,
        }
        let player = store.players.create(Tag::player(retroid));
        player.surname = record[0].to_string();
        player.first_name = record[1].to_string();
        player.debut = parse_american_date(&record[3]);
        admitted += 1;
    }
    admitted
}
