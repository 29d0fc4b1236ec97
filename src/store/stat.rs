//! Statistical counters. Every field is an unsigned bin that only ever moves
//! up during ingestion; the rate stats are derived on demand.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Batting {
    pub singles: u32,
    pub doubles: u32,
    pub ground_rule_doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub rbi: u32,
    pub hit_by_pitch: u32,
    pub strikeouts: u32,
    pub walks: u32,
    pub intentional_walks: u32,
    pub sac_flies: u32,
    pub sac_hits: u32,
    pub fielders_choices: u32,
    pub double_plays: u32,
    pub reached_on_error: u32,
    pub interference: u32,
    pub at_bats: u32,
    pub plate_appearances: u32,
}

impl Batting {
    pub fn hits(&self) -> u32 {
        self.singles + self.doubles + self.ground_rule_doubles + self.triples + self.home_runs
    }

    /// On-base percentage; 0.0 when the player has no qualifying appearances.
    pub fn obp(&self) -> f64 {
        let reached = self.hits() + self.walks + self.intentional_walks + self.hit_by_pitch;
        let chances =
            self.at_bats + self.walks + self.intentional_walks + self.hit_by_pitch + self.sac_flies;
        if chances == 0 {
            0.0
        } else {
            f64::from(reached) / f64::from(chances)
        }
    }

    /// Slugging percentage; 0.0 with no at-bats.
    pub fn slg(&self) -> f64 {
        if self.at_bats == 0 {
            return 0.0;
        }
        let singles = self.singles + self.ground_rule_doubles;
        let bases = singles + 2 * self.doubles + 3 * self.triples + 4 * self.home_runs;
        f64::from(bases) / f64::from(self.at_bats)
    }
}

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Fielding {
    pub assists: u32,
    pub errors: u32,
    pub putouts: u32,
}

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Pitching {
    /// Innings pitched, counted in outs.
    pub outs_recorded: u32,
    pub hits: u32,
    pub runs: u32,
    pub earned_runs: u32,
    pub walks: u32,
    pub strikeouts: u32,
    pub wild_pitches: u32,
    pub wins: u32,
    pub losses: u32,
    pub saves: u32,
    pub batters_faced: u32,
}

impl Pitching {
    pub fn innings_pitched(&self) -> f64 {
        f64::from(self.outs_recorded) / 3.0
    }
}

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct BaseRunning {
    pub stolen_bases: u32,
    pub caught_stealing: u32,
}

#[derive(Debug, Default, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct General {
    pub games_started: u32,
    pub games_played: u32,
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn rate_stats_are_zero_on_empty_denominators() {
        let batting = Batting::default();
        assert_eq!(batting.obp(), 0.0);
        assert_eq!(batting.slg(), 0.0);
    }

    #[test]
    fn rate_stats_match_their_definitions() {
        let batting = Batting {
            singles: 2,
            doubles: 1,
            home_runs: 1,
            walks: 1,
            hit_by_pitch: 1,
            sac_flies: 1,
            at_bats: 10,
            ..Batting::default()
        };
        assert_eq!(batting.hits(), 4);
        // (4 + 1 + 0 + 1) / (10 + 1 + 0 + 1 + 1)
        assert!(approx_eq!(f64, batting.obp(), 6.0 / 13.0, ulps = 2));
        // (2 + 2*1 + 4*1) / 10
        assert!(approx_eq!(f64, batting.slg(), 8.0 / 10.0, ulps = 2));
    }

    #[test]
    fn innings_pitched_counts_outs() {
        let pitching = Pitching {
            outs_recorded: 20,
            ..Pitching::default()
        };
        assert!(approx_eq!(f64, pitching.innings_pitched(), 20.0 / 3.0, ulps = 2));
    }
}
