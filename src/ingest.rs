//! The ingestion driver: walks a Retrosheet directory tree and fills a
//! [`Store`]. Park and player masters load first, then each admitted season
//! directory contributes its team file, rosters, and event files.

pub mod parks;
pub mod retroid;
pub mod rosters;
pub mod teams;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions};
use itertools::Itertools;
use tracing::{info, warn};

use crate::event_file::parser::EventFileParser;
use crate::store::Store;

/// Cooperative cancellation, checked at the granularity of one input line.
/// Clones share the flag, so a token handed to another thread can stop a
/// parse in progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a finished run looked like; this is the driver's completion signal.
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    pub ballparks: usize,
    pub players: usize,
    pub teams: usize,
    pub games: usize,
    pub states: usize,
    pub elapsed: Duration,
}

pub struct Ingest {
    root: PathBuf,
    /// Admitted seasons, sorted; empty means every season found.
    years: Vec<u16>,
    cancel: CancelToken,
}

impl Ingest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            years: Vec::new(),
            cancel: CancelToken::default(),
        }
    }

    /// Restricts the run to the given seasons. An empty list admits all.
    pub fn restrict_years(&mut self, years: &[u16]) {
        self.years = years.iter().copied().sorted().dedup().collect();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the whole pipeline. Individual files that fail to open or parse
    /// are logged and skipped; only an unusable root directory is fatal.
    pub fn parse(&self, store: &mut Store) -> Result<IngestSummary> {
        let started = Instant::now();

        if let Err(e) = parks::parse(store, &self.root.join("parks.dat"), &self.cancel) {
            warn!("ballpark master failed: {e:#}");
        }
        if let Err(e) = retroid::parse(store, &self.root.join("retroid.dat"), &self.cancel) {
            warn!("player master failed: {e:#}");
        }
        self.parse_yearly(store)?;

        let summary = IngestSummary {
            ballparks: store.ballparks.count(),
            players: store.players.count(),
            teams: store.teams.count(),
            games: store.games.count(),
            states: store.states.count(),
            elapsed: started.elapsed(),
        };
        info!(
            "ingested {} ballparks, {} players, {} teams, {} games, {} states in {:.2?}",
            summary.ballparks,
            summary.players,
            summary.teams,
            summary.games,
            summary.states,
            summary.elapsed
        );
        Ok(summary)
    }

    fn year_admitted(&self, year: u16) -> bool {
        self.years.is_empty() || self.years.binary_search(&year).is_ok()
    }

    /// Every subdirectory named like a four-digit year is a season.
    fn parse_yearly(&self, store: &mut Store) -> Result<()> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("unreadable database root {}", self.root.display()))?;
        let seasons: Vec<(u16, PathBuf)> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                (name.len() == 4)
                    .then(|| name.parse::<u16>().ok())
                    .flatten()
                    .map(|year| (year, e.path()))
            })
            .sorted_by_key(|(year, _)| *year)
            .collect();

        for (year, dir) in seasons {
            if self.cancel.is_cancelled() {
                break;
            }
            if !self.year_admitted(year) {
                continue;
            }
            info!("processing data files for {year}");
            let team_file = dir.join(format!("TEAM{year}"));
            if let Err(e) = teams::parse(store, &team_file, year, &self.cancel) {
                warn!("{}: {e:#}", team_file.display());
            }
            for roster in self.matching_files(&dir, "*.ros") {
                if let Err(e) = rosters::parse(store, &roster, year, &self.cancel) {
                    warn!("{}: {e:#}", roster.display());
                }
            }
            for event_file in self
                .matching_files(&dir, "*.eva")
                .into_iter()
                .chain(self.matching_files(&dir, "*.evn"))
                .sorted()
            {
                if self.cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = self.parse_event_file(store, &event_file, year) {
                    warn!("{}: {e:#}", event_file.display());
                }
            }
        }
        Ok(())
    }

    fn matching_files(&self, dir: &Path, pattern: &str) -> Vec<PathBuf> {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::default()
        };
        let full = dir.join(pattern).to_string_lossy().into_owned();
        match glob_with(&full, options) {
            Ok(paths) => paths.filter_map(std::result::Result::ok).collect(),
            Err(e) => {
                warn!("bad file pattern {full}: {e}");
                Vec::new()
            }
        }
    }

    fn parse_event_file(&self, store: &mut Store, path: &Path, year: u16) -> Result<()> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let name = path.display().to_string();
        EventFileParser::new(store, year, name).parse(BufReader::new(file), &self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_year_filter_admits_everything() {
        let ingest = Ingest::new("/nonexistent");
        assert!(ingest.year_admitted(1871));
        assert!(ingest.year_admitted(2024));
    }

    #[test]
    fn year_filter_restricts_and_dedupes() {
        let mut ingest = Ingest::new("/nonexistent");
        ingest.restrict_years(&[1988, 1987, 1987]);
        assert_eq!(ingest.years, vec![1987, 1988]);
        assert!(ingest.year_admitted(1987));
        assert!(!ingest.year_admitted(1989));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::default();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
