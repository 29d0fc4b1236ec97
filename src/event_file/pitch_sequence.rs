//! Decoder for the pitch-sequence field of a play record.

use std::mem;
use std::str::FromStr;

use tracing::debug;

use crate::domain::{Base, Pickoff, Pitch, PitchType};

/// Expands a pitch-sequence string into typed pitches. The control tokens
/// `+`, `*` and `>` annotate the next throw; `.` separates action not
/// involving the batter and is dropped, as is any unrecognized token.
pub fn parse_pitch_sequence(sequence: &str) -> Vec<Pitch> {
    let mut pitches = Vec::with_capacity(sequence.len());
    let mut catcher_pickoff = false;
    let mut blocked = false;
    let mut runner_going = false;

    for token in sequence.chars() {
        match token {
            '+' => catcher_pickoff = true,
            '*' => blocked = true,
            '>' => runner_going = true,
            '.' => {}
            '1' | '2' | '3' => {
                let base = match token {
                    '1' => Base::First,
                    '2' => Base::Second,
                    _ => Base::Third,
                };
                pitches.push(Pitch {
                    kind: PitchType::Unknown,
                    pickoff: Some(Pickoff {
                        base,
                        by_catcher: mem::take(&mut catcher_pickoff),
                    }),
                    runner_going: mem::take(&mut runner_going),
                    blocked: mem::take(&mut blocked),
                });
            }
            c => match PitchType::from_str(&c.to_string()) {
                Ok(kind) => pitches.push(Pitch {
                    kind,
                    pickoff: None,
                    runner_going: mem::take(&mut runner_going),
                    blocked: mem::take(&mut blocked),
                }),
                Err(_) => debug!("dropping unrecognized pitch token {c:?}"),
            },
        }
    }
    pitches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_tokens_map_to_pitch_types() {
        let pitches = parse_pitch_sequence("BBCX");
        assert_eq!(
            pitches.iter().map(|p| p.kind).collect::<Vec<_>>(),
            vec![
                PitchType::Ball,
                PitchType::Ball,
                PitchType::StrikeCalled,
                PitchType::InPlay
            ]
        );
        assert!(pitches.iter().all(|p| p.pickoff.is_none()));
    }

    #[test]
    fn control_tokens_annotate_the_next_throw() {
        let pitches = parse_pitch_sequence("*BS.+1X");
        assert_eq!(pitches.len(), 4);
        assert!(pitches[0].blocked);
        assert_eq!(pitches[0].kind, PitchType::Ball);
        assert_eq!(pitches[1].kind, PitchType::StrikeSwinging);
        assert!(!pitches[1].blocked);
        assert_eq!(
            pitches[2].pickoff,
            Some(Pickoff {
                base: Base::First,
                by_catcher: true
            })
        );
        assert_eq!(pitches[3].kind, PitchType::InPlay);
    }

    #[test]
    fn bare_digits_are_pitcher_pickoffs() {
        let pitches = parse_pitch_sequence("B2S");
        assert_eq!(
            pitches[1].pickoff,
            Some(Pickoff {
                base: Base::Second,
                by_catcher: false
            })
        );
    }

    #[test]
    fn runner_going_marks_the_following_pitch() {
        let pitches = parse_pitch_sequence(">S");
        assert!(pitches[0].runner_going);
        assert_eq!(pitches[0].kind, PitchType::StrikeSwinging);
    }

    #[test]
    fn junk_tokens_are_dropped() {
        assert!(parse_pitch_sequence("zz!").is_empty());
        assert_eq!(parse_pitch_sequence("").len(), 0);
    }
}
