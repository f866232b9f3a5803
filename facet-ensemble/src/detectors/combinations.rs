//! FACS combination detection
//!
//! Recognizes well-known multi-AU expressions within a single record. Shared
//! by every action-unit adapter.

use crate::types::{ActionUnit, AuCode, FacsCombination};
use facet_common::numeric::{mean, round_to};
use std::collections::BTreeMap;

/// Both AU06 and AU12 must exceed this for a Duchenne smile
const DUCHENNE_MIN: f64 = 0.3;
/// AU12 alone must exceed this for a Pan Am smile
const PAN_AM_MIN: f64 = 0.4;
/// Both AU01 and AU02 must exceed this for a brow flash
const BROW_FLASH_MIN: f64 = 0.4;

fn combination(pattern: &str, members: &[&str], description: &str, intensity: f64) -> FacsCombination {
    FacsCombination {
        pattern: pattern.to_string(),
        member_aus: members.iter().map(|s| s.to_string()).collect(),
        description: description.to_string(),
        intensity,
    }
}

/// Mean of two intensities, rounded to two decimals
pub(crate) fn pair_mean(a: f64, b: f64) -> f64 {
    mean(&[a, b]).map_or(0.0, |m| round_to(m, 2))
}

/// Detect known AU combinations, in the fixed order Duchenne/Pan Am, Brow Flash, Frown
pub fn detect_combinations(action_units: &BTreeMap<AuCode, ActionUnit>) -> Vec<FacsCombination> {
    let intensity = |code: &str| action_units.get(code).map(|au| au.intensity);
    let mut found = Vec::new();

    match (intensity("AU06"), intensity("AU12")) {
        (Some(au06), Some(au12)) => {
            if au06 > DUCHENNE_MIN && au12 > DUCHENNE_MIN {
                found.push(combination(
                    "Duchenne Smile",
                    &["AU06", "AU12"],
                    "Genuine smile involving both cheek raiser and lip corner puller",
                    pair_mean(au06, au12),
                ));
            }
        }
        (None, Some(au12)) if au12 > PAN_AM_MIN => {
            found.push(combination(
                "Pan Am Smile",
                &["AU12"],
                "Social smile - lip corners only, no eye involvement",
                au12,
            ));
        }
        _ => {}
    }

    if let (Some(au01), Some(au02)) = (intensity("AU01"), intensity("AU02")) {
        if au01 > BROW_FLASH_MIN && au02 > BROW_FLASH_MIN {
            found.push(combination(
                "Brow Flash",
                &["AU01", "AU02"],
                "Eyebrow raise often used in greeting or emphasis",
                pair_mean(au01, au02),
            ));
        }
    }

    if let (Some(au15), Some(au04)) = (intensity("AU15"), intensity("AU04")) {
        found.push(combination(
            "Frown Pattern",
            &["AU15", "AU04"],
            "Downturned mouth with lowered brow",
            pair_mean(au15, au04),
        ));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(pairs: &[(&str, f64)]) -> BTreeMap<AuCode, ActionUnit> {
        pairs
            .iter()
            .map(|(code, intensity)| {
                (
                    code.to_string(),
                    ActionUnit {
                        intensity: *intensity,
                        description: String::new(),
                        muscle_group: String::new(),
                    },
                )
            })
            .collect()
    }

    fn patterns(found: &[FacsCombination]) -> Vec<&str> {
        found.iter().map(|c| c.pattern.as_str()).collect()
    }

    #[test]
    fn test_duchenne_smile() {
        let found = detect_combinations(&units(&[("AU06", 0.5), ("AU12", 0.7)]));
        assert_eq!(patterns(&found), vec!["Duchenne Smile"]);
        assert_eq!(found[0].intensity, 0.6);
        assert_eq!(found[0].member_aus, vec!["AU06", "AU12"]);
    }

    #[test]
    fn test_pair_mean_rounds_to_two_decimals() {
        assert_eq!(pair_mean(0.25, 0.5), 0.38);
        assert_eq!(pair_mean(0.4, 0.4), 0.4);
    }

    #[test]
    fn test_weak_duchenne_does_not_fall_through_to_pan_am() {
        // AU06 present but weak: neither smile is reported
        let found = detect_combinations(&units(&[("AU06", 0.2), ("AU12", 0.8)]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_pan_am_smile_uses_raw_au12() {
        let found = detect_combinations(&units(&[("AU12", 0.456)]));
        assert_eq!(patterns(&found), vec!["Pan Am Smile"]);
        assert_eq!(found[0].intensity, 0.456);
    }

    #[test]
    fn test_pan_am_requires_threshold() {
        assert!(detect_combinations(&units(&[("AU12", 0.4)])).is_empty());
    }

    #[test]
    fn test_brow_flash_and_frown() {
        let found = detect_combinations(&units(&[
            ("AU01", 0.5),
            ("AU02", 0.6),
            ("AU04", 0.1),
            ("AU15", 0.2),
        ]));
        assert_eq!(patterns(&found), vec!["Brow Flash", "Frown Pattern"]);
        assert_eq!(found[0].intensity, 0.55);
        // Frown has no intensity threshold
        assert_eq!(found[1].intensity, 0.15);
    }
}
