//! Selecting the winning roll instance.
//!
//! Advantage and disadvantage roll every group twice, best-of-three
//! rolls them three times. The tray delivers all instances as one flat
//! sequence; this module partitions that sequence back into instances,
//! asks the tray to evaluate each group, and keeps the instance the
//! roll type calls for.
//!
//! Tie-breaking: the first instance encountered wins ties. The scan is
//! a strict comparison against a running best, so later instances only
//! displace an earlier one by beating it outright.

use futures::future::try_join_all;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;
use tray::{DiceTray, ResultGroup, TrayError};

/// How many instances a roll dispatches and how the winner is picked.
///
/// Deserialization is lenient: an unknown roll-type string from a
/// persisted blob degrades to a normal roll instead of failing the
/// load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollType {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
    BestOfThree,
    Critical,
}

impl RollType {
    /// Number of parallel roll instances this type dispatches.
    pub fn instance_count(&self) -> usize {
        match self {
            RollType::Normal | RollType::Critical => 1,
            RollType::Advantage | RollType::Disadvantage => 2,
            RollType::BestOfThree => 3,
        }
    }

    /// Display suffix appended to group names on the final result.
    pub fn display_suffix(&self) -> Option<&'static str> {
        match self {
            RollType::Normal => None,
            RollType::Advantage => Some(" (adv.)"),
            RollType::Disadvantage => Some(" (dis.)"),
            RollType::BestOfThree => Some(" (Bo3)"),
            RollType::Critical => Some(" (Crit)"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RollType::Normal => "normal",
            RollType::Advantage => "advantage",
            RollType::Disadvantage => "disadvantage",
            RollType::BestOfThree => "best-of-three",
            RollType::Critical => "critical",
        }
    }

    /// Parse a roll-type string. Unknown values are treated as a
    /// normal roll rather than failing.
    pub fn parse(s: &str) -> RollType {
        match s.trim() {
            "" | "normal" => RollType::Normal,
            "advantage" => RollType::Advantage,
            "disadvantage" => RollType::Disadvantage,
            "best-of-three" => RollType::BestOfThree,
            "critical" => RollType::Critical,
            other => {
                warn!(roll_type = other, "Unrecognized roll type, using normal");
                RollType::Normal
            }
        }
    }
}

impl fmt::Display for RollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for RollType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RollType::parse(&s))
    }
}

/// Split a flat delivered sequence into per-instance slices.
///
/// If the sequence does not divide evenly into the roll type's
/// instance count, the whole sequence is returned as a single
/// pseudo-instance; the selector's count guard then passes it through
/// untouched rather than guessing a split.
pub fn partition_result_groups(groups: Vec<ResultGroup>, roll_type: RollType) -> Vec<Vec<ResultGroup>> {
    let instances = roll_type.instance_count();
    if instances <= 1 {
        return vec![groups];
    }
    if groups.is_empty() || groups.len() % instances != 0 {
        warn!(
            delivered = groups.len(),
            expected_instances = instances,
            "Result groups do not partition evenly, passing through"
        );
        return vec![groups];
    }

    let per_instance = groups.len() / instances;
    let mut out = Vec::with_capacity(instances);
    let mut rest = groups;
    while !rest.is_empty() {
        let tail = rest.split_off(per_instance.min(rest.len()));
        out.push(rest);
        rest = tail;
    }
    out
}

/// Reduce the delivered instances to the one the roll type keeps.
///
/// Instance sums are evaluated through the tray (summation order does
/// not matter, but every group of an instance is awaited before
/// comparison). If the instance count does not match the roll type's
/// expectation, the original sequence is returned unchanged.
pub async fn select_result_groups(
    tray: &dyn DiceTray,
    roll_type: RollType,
    instances: Vec<Vec<ResultGroup>>,
) -> Result<Vec<ResultGroup>, TrayError> {
    let expected = roll_type.instance_count();
    if instances.len() != expected {
        warn!(
            supplied = instances.len(),
            expected,
            roll_type = %roll_type,
            "Unexpected instance count, returning groups unpartitioned"
        );
        return Ok(instances.into_iter().flatten().collect());
    }

    if expected == 1 {
        return Ok(instances.into_iter().flatten().collect());
    }

    let mut sums = Vec::with_capacity(instances.len());
    for instance in &instances {
        let totals = try_join_all(
            instance
                .iter()
                .map(|group| tray.evaluate_dice_results_group(group)),
        )
        .await?;
        sums.push(totals.iter().sum::<i32>());
    }

    let keep_lowest = matches!(roll_type, RollType::Disadvantage);
    let mut best = 0;
    for (index, sum) in sums.iter().enumerate().skip(1) {
        let wins = if keep_lowest {
            *sum < sums[best]
        } else {
            *sum > sums[best]
        };
        if wins {
            best = index;
        }
    }

    let mut instances = instances;
    Ok(instances.swap_remove(best))
}
