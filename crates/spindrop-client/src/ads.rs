//! Ad interleaving policy.
//!
//! Pure decision logic, applied once per spin before the selection engine
//! is consulted (and only on the first attempt of a spin):
//!
//! - never on the first real spin,
//! - never twice in a row: if the previous spin showed an ad, all ad logic
//!   is skipped this time, forced or not,
//! - forced on every 5th spin,
//! - otherwise a 1-in-5 chance.
//!
//! The constants are product tuning, not correctness requirements.

use spindrop_shared::constants::{AD_CHANCE, AD_FORCE_INTERVAL};

/// Decide whether spin number `spin_index` (1-based, tutorial excluded)
/// shows an ad. `chance_draw` is a fresh uniform draw in `[0, 1)`.
pub fn should_show_ad(spin_index: u64, last_spin_was_ad: bool, chance_draw: f64) -> bool {
    if spin_index <= 1 {
        return false;
    }
    if last_spin_was_ad {
        return false;
    }
    spin_index % AD_FORCE_INTERVAL == 0 || chance_draw < AD_CHANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    // Draws that sit on either side of AD_CHANCE.
    const NO: f64 = 0.99;
    const YES: f64 = 0.01;

    #[test]
    fn never_on_the_first_spin() {
        assert!(!should_show_ad(1, false, YES));
        assert!(!should_show_ad(1, false, 0.0));
    }

    #[test]
    fn never_two_in_a_row() {
        // Even a forced slot yields when the previous spin was an ad.
        assert!(!should_show_ad(5, true, YES));
        assert!(!should_show_ad(10, true, NO));
        assert!(!should_show_ad(3, true, YES));
    }

    #[test]
    fn every_fifth_spin_is_forced() {
        for index in [5, 10, 15, 100] {
            assert!(should_show_ad(index, false, NO), "spin {index}");
        }
    }

    #[test]
    fn ordinary_spins_follow_the_chance_draw() {
        assert!(should_show_ad(3, false, YES));
        assert!(!should_show_ad(3, false, NO));
        assert!(should_show_ad(7, false, 0.1999));
        assert!(!should_show_ad(7, false, 0.2));
    }

    #[test]
    fn sequence_respects_all_rules() {
        // Replay a fixed spin sequence and check the rules hold together:
        // spin 1 clean, forced 5th, no doubles.
        let draws = [NO, NO, NO, NO, NO, NO, NO, NO, NO, NO];
        let mut last_was_ad = false;
        let mut shown = Vec::new();
        for (i, draw) in draws.iter().enumerate() {
            let index = (i + 1) as u64;
            let ad = should_show_ad(index, last_was_ad, *draw);
            shown.push(ad);
            last_was_ad = ad;
        }
        // Only the forced slots fire with high draws: spins 5 and 10.
        assert_eq!(
            shown,
            vec![false, false, false, false, true, false, false, false, false, true]
        );
    }
}
