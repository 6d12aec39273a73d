//! Dice groups: the unit a user configures and rolls.
//!
//! A group is a named set of per-die-kind counts plus a flat modifier.
//! Groups are transient - the panel rebuilds them from the UI on every
//! roll request - so the interesting parts here are validation and the
//! roll-string grammar the tray consumes.

use serde::{Deserialize, Serialize};
use std::fmt;
use tray::RollDescriptor;

/// The die kinds the panel can place in the tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieKind {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
}

impl DieKind {
    pub fn sides(&self) -> u32 {
        match self {
            DieKind::D4 => 4,
            DieKind::D6 => 6,
            DieKind::D8 => 8,
            DieKind::D10 => 10,
            DieKind::D12 => 12,
            DieKind::D20 => 20,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieKind> {
        match sides {
            4 => Some(DieKind::D4),
            6 => Some(DieKind::D6),
            8 => Some(DieKind::D8),
            10 => Some(DieKind::D10),
            12 => Some(DieKind::D12),
            20 => Some(DieKind::D20),
            _ => None,
        }
    }

    /// All kinds in the order the panel presents them.
    pub fn all() -> [DieKind; 6] {
        [
            DieKind::D4,
            DieKind::D6,
            DieKind::D8,
            DieKind::D10,
            DieKind::D12,
            DieKind::D20,
        ]
    }
}

impl fmt::Display for DieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A named set of dice counts plus a flat modifier.
///
/// Counts keep the order they were configured in, which is also the
/// order their terms appear in the roll string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceGroup {
    pub name: String,
    counts: Vec<(DieKind, u32)>,
    pub modifier: i32,
}

impl DiceGroup {
    /// Create an empty group with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counts: Vec::new(),
            modifier: 0,
        }
    }

    /// Builder-style count assignment.
    pub fn with_count(mut self, kind: DieKind, count: u32) -> Self {
        self.set_count(kind, count);
        self
    }

    /// Builder-style modifier assignment.
    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    /// Set the count for one die kind, preserving first-seen order.
    pub fn set_count(&mut self, kind: DieKind, count: u32) {
        if let Some(entry) = self.counts.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = count;
        } else {
            self.counts.push((kind, count));
        }
    }

    /// The configured count for one die kind (zero if never set).
    pub fn count(&self, kind: DieKind) -> u32 {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Die kinds with a non-zero count, in configured order.
    pub fn dice(&self) -> impl Iterator<Item = (DieKind, u32)> + '_ {
        self.counts.iter().copied().filter(|(_, c)| *c > 0)
    }

    /// True when every die count is zero.
    pub fn is_dice_empty(&self) -> bool {
        self.dice().next().is_none()
    }

    /// A group with no dice but a non-zero modifier cannot be rolled.
    pub fn is_modifier_only(&self) -> bool {
        self.is_dice_empty() && self.modifier != 0
    }

    /// A copy with every die count doubled. Used for the
    /// double-die-count crit behavior, which happens before dispatch
    /// so the tray rolls twice as many physical dice.
    pub fn doubled(&self) -> DiceGroup {
        DiceGroup {
            name: self.name.clone(),
            counts: self
                .counts
                .iter()
                .map(|(kind, count)| (*kind, count * 2))
                .collect(),
            modifier: self.modifier,
        }
    }

    /// Render this group in the tray's roll-string grammar, e.g.
    /// `"2d6+1d4-3"`. Returns `None` for a group with no dice.
    pub fn roll_string(&self) -> Option<String> {
        if self.is_dice_empty() {
            return None;
        }

        let mut roll = String::new();
        for (kind, count) in self.dice() {
            roll.push('+');
            roll.push_str(&format!("{count}{kind}"));
        }
        if self.modifier > 0 {
            roll.push_str(&format!("+{}", self.modifier));
        } else if self.modifier < 0 {
            roll.push_str(&format!("{}", self.modifier));
        }

        // The grammar has no leading operator.
        Some(roll.trim_start_matches('+').to_string())
    }

    /// The tray descriptor for this group, if it has any dice.
    pub fn descriptor(&self) -> Option<RollDescriptor> {
        self.roll_string().map(|roll| RollDescriptor {
            name: self.name.clone(),
            roll,
        })
    }
}
