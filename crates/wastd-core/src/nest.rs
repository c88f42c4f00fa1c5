//! Nest excavation counts and the success figures derived from them.
//!
//! Counts follow Miller (1999), "Determining Clutch Size and Hatching
//! Success". Every count is optional on the data sheet; a missing count is
//! treated as zero. When the calculated clutch is empty both success figures
//! are `None` rather than zero, so "no data" stays distinct from "0 %".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestValue {
  #[serde(default)]
  pub eggs_laid:                       bool,
  pub egg_count:                       Option<u32>,
  /// Empty shells more than 50 % complete.
  pub no_egg_shells:                   Option<u32>,
  pub no_live_hatchlings_neck_of_nest: Option<u32>,
  /// Live hatchlings left among shells, excluding the neck of the nest.
  pub no_live_hatchlings:              Option<u32>,
  pub no_dead_hatchlings:              Option<u32>,
  pub no_undeveloped_eggs:             Option<u32>,
  /// Unhatched eggs with an obvious, not yet full-term embryo.
  pub no_unhatched_eggs:               Option<u32>,
  /// Unhatched, apparently full-term embryos.
  pub no_unhatched_term:               Option<u32>,
  /// Open, nearly complete shells containing egg residue.
  pub no_depredated_eggs:              Option<u32>,
  pub comments:                        Option<String>,
}

fn n(v: Option<u32>) -> i64 { i64::from(v.unwrap_or(0)) }

impl NestValue {
  /// Clutch size reconstructed from the excavation.
  pub fn egg_count_calculated(&self) -> i64 {
    n(self.no_egg_shells)
      + n(self.no_undeveloped_eggs)
      + n(self.no_unhatched_eggs)
      + n(self.no_unhatched_term)
      + n(self.no_depredated_eggs)
  }

  /// Hatchlings that left the nest: shells minus live and dead hatchlings.
  pub fn no_emerged(&self) -> i64 {
    n(self.no_egg_shells) - n(self.no_live_hatchlings) - n(self.no_dead_hatchlings)
  }

  /// `100 × shells / clutch`, rounded to one decimal, ties to even.
  pub fn hatching_success(&self) -> Option<f64> {
    percentage(n(self.no_egg_shells), self.egg_count_calculated())
  }

  /// `100 × (shells − live − dead) / clutch`, rounded to one decimal.
  pub fn emergence_success(&self) -> Option<f64> {
    percentage(self.no_emerged(), self.egg_count_calculated())
  }

  pub fn success(&self) -> NestSuccess {
    NestSuccess {
      egg_count_calculated: self.egg_count_calculated(),
      no_emerged:           self.no_emerged(),
      hatching_success:     self.hatching_success(),
      emergence_success:    self.emergence_success(),
    }
  }
}

/// The derived figures of one nest observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NestSuccess {
  pub egg_count_calculated: i64,
  pub no_emerged:           i64,
  pub hatching_success:     Option<f64>,
  pub emergence_success:    Option<f64>,
}

fn percentage(part: i64, total: i64) -> Option<f64> {
  if total == 0 {
    return None;
  }
  let pct = 100.0 * part as f64 / total as f64;
  Some((pct * 10.0).round_ties_even() / 10.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn excavation() -> NestValue {
    NestValue {
      no_egg_shells: Some(50),
      no_undeveloped_eggs: Some(5),
      no_unhatched_eggs: Some(3),
      no_unhatched_term: Some(2),
      no_depredated_eggs: Some(0),
      ..Default::default()
    }
  }

  #[test]
  fn hatching_success_of_sixty_egg_clutch() {
    let nest = excavation();
    assert_eq!(nest.egg_count_calculated(), 60);
    assert_eq!(nest.hatching_success(), Some(83.3));
  }

  #[test]
  fn emergence_success_subtracts_hatchlings_left_behind() {
    let nest = NestValue {
      no_live_hatchlings: Some(4),
      no_dead_hatchlings: Some(1),
      ..excavation()
    };
    assert_eq!(nest.no_emerged(), 45);
    assert_eq!(nest.emergence_success(), Some(75.0));
  }

  #[test]
  fn empty_clutch_is_undefined_not_zero() {
    let nest = NestValue::default();
    assert_eq!(nest.egg_count_calculated(), 0);
    assert_eq!(nest.hatching_success(), None);
    assert_eq!(nest.emergence_success(), None);
  }

  #[test]
  fn all_shells_depredated_is_zero_percent() {
    let nest = NestValue { no_depredated_eggs: Some(12), ..Default::default() };
    assert_eq!(nest.hatching_success(), Some(0.0));
  }

  #[test]
  fn halfway_percentages_round_to_even() {
    // 100 × 5 / 80 = 6.25
    let nest = NestValue {
      no_egg_shells: Some(5),
      no_undeveloped_eggs: Some(75),
      ..Default::default()
    };
    assert_eq!(nest.hatching_success(), Some(6.2));

    // 100 × 3 / 400 = 0.75
    let nest = NestValue {
      no_egg_shells: Some(3),
      no_undeveloped_eggs: Some(397),
      ..Default::default()
    };
    assert_eq!(nest.hatching_success(), Some(0.8));
  }

  #[test]
  fn missing_counts_read_as_zero() {
    let nest = NestValue { no_egg_shells: Some(10), ..Default::default() };
    assert_eq!(nest.hatching_success(), Some(100.0));
    assert_eq!(nest.emergence_success(), Some(100.0));
  }
}
