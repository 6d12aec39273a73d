//! Critical-hit transforms over rolled result trees.
//!
//! A crit behavior rewrites the result tree the tray delivered: face
//! values, subtree totals, and sometimes flat modifiers. Transforms
//! never mutate their input; they rebuild the tree bottom-up so every
//! aggregate `total` is consistent with the rewritten children.
//!
//! `double-die-count` is the odd one out: it doubles the dice *before*
//! dispatch (see `DiceGroup::doubled`), so its post-roll transform is
//! the identity.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;
use tray::{DieResult, OperatorResult, ResultGroup, ResultNode, ValueResult};

/// Errors from crit transformation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CritError {
    /// A die node carried a kind tag with no parseable face count.
    /// This is a defect in the tray payload, not a recoverable state.
    #[error("Unrecognized die kind tag: {0:?}")]
    BadDieKind(String),
}

/// How a critical hit rewrites the roll.
///
/// Deserialization is lenient: behavior strings cross the settings
/// persistence boundary, and a blob written by a newer client may
/// carry a behavior this version does not know. Those fall back to
/// `None` instead of failing the whole settings load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CritBehavior {
    #[default]
    None,
    OnePointFiveTotal,
    DoubleTotal,
    TripleTotal,
    QuadrupleTotal,
    DoubleDieCount,
    DoubleDieResult,
    MaxDie,
    MaxPlus,
}

impl CritBehavior {
    /// The settings-blob string for this behavior.
    pub fn as_str(&self) -> &'static str {
        match self {
            CritBehavior::None => "none",
            CritBehavior::OnePointFiveTotal => "one-point-five-total",
            CritBehavior::DoubleTotal => "double-total",
            CritBehavior::TripleTotal => "triple-total",
            CritBehavior::QuadrupleTotal => "quadruple-total",
            CritBehavior::DoubleDieCount => "double-die-count",
            CritBehavior::DoubleDieResult => "double-die-result",
            CritBehavior::MaxDie => "max-die",
            CritBehavior::MaxPlus => "max-plus",
        }
    }

    /// Parse a settings-blob string. Unrecognized values fall back to
    /// `None` (identity transform) rather than failing the roll.
    pub fn parse(s: &str) -> CritBehavior {
        match s.trim() {
            "" | "none" => CritBehavior::None,
            "one-point-five-total" => CritBehavior::OnePointFiveTotal,
            "double-total" => CritBehavior::DoubleTotal,
            "triple-total" => CritBehavior::TripleTotal,
            "quadruple-total" => CritBehavior::QuadrupleTotal,
            "double-die-count" => CritBehavior::DoubleDieCount,
            "double-die-result" => CritBehavior::DoubleDieResult,
            "max-die" => CritBehavior::MaxDie,
            "max-plus" => CritBehavior::MaxPlus,
            other => {
                warn!(behavior = other, "Unrecognized crit behavior, using none");
                CritBehavior::None
            }
        }
    }

    /// True when this behavior doubles dice counts before dispatch
    /// instead of rewriting results afterwards.
    pub fn doubles_dice_before_roll(&self) -> bool {
        matches!(self, CritBehavior::DoubleDieCount)
    }
}

impl fmt::Display for CritBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for CritBehavior {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(CritBehavior::parse(&s))
    }
}

/// Apply a crit behavior to every group of a delivered roll.
///
/// Pure and non-mutating: the input groups are left untouched and a
/// rewritten copy is returned. `None` and `double-die-count` are the
/// identity here.
pub fn apply_crit(
    behavior: CritBehavior,
    groups: &[ResultGroup],
) -> Result<Vec<ResultGroup>, CritError> {
    groups
        .iter()
        .map(|group| {
            let result = match behavior {
                CritBehavior::None | CritBehavior::DoubleDieCount => group.result.clone(),
                CritBehavior::OnePointFiveTotal => scale_one_point_five(&group.result),
                CritBehavior::DoubleTotal => {
                    multiply(&group.result, 2, true, "Crit: total doubled")
                }
                CritBehavior::DoubleDieResult => {
                    multiply(&group.result, 2, false, "Crit: die results doubled")
                }
                CritBehavior::TripleTotal => {
                    multiply(&group.result, 3, true, "Crit: total tripled")
                }
                CritBehavior::QuadrupleTotal => {
                    multiply(&group.result, 4, true, "Crit: total quadrupled")
                }
                CritBehavior::MaxDie => maximize(&group.result)?,
                CritBehavior::MaxPlus => add_max_per_die(&group.result)?,
            };
            Ok(ResultGroup {
                name: group.name.clone(),
                result,
                description: group.description.clone(),
            })
        })
        .collect()
}

/// `floor(v * 1.5)` in integer arithmetic, correct for negatives.
fn floor_one_point_five(v: i32) -> i32 {
    (v * 3).div_euclid(2)
}

/// Parse the numeric suffix of a die kind tag, e.g. `"d8"` -> 8.
fn max_face(kind: &str) -> Result<i32, CritError> {
    let digits = kind.trim_start_matches(|c: char| !c.is_ascii_digit());
    digits
        .parse::<i32>()
        .ok()
        .filter(|sides| *sides > 0)
        .ok_or_else(|| CritError::BadDieKind(kind.to_string()))
}

/// Multiply every face value and total by `factor`. Flat modifiers are
/// scaled only when `scale_values` is set (total-multiplying behaviors
/// scale them, `double-die-result` leaves them alone).
fn multiply(node: &ResultNode, factor: i32, scale_values: bool, label: &str) -> ResultNode {
    match node {
        ResultNode::Die(die) => ResultNode::Die(DieResult {
            kind: die.kind.clone(),
            results: die.results.iter().map(|face| face * factor).collect(),
            total: die.total * factor,
            description: Some(label.to_string()),
        }),
        ResultNode::Operator(op) => ResultNode::Operator(OperatorResult {
            operator: op.operator.clone(),
            operands: op
                .operands
                .iter()
                .map(|child| multiply(child, factor, scale_values, label))
                .collect(),
            total: op.total * factor,
            description: Some(label.to_string()),
        }),
        ResultNode::Value(v) => ResultNode::Value(ValueResult {
            value: if scale_values {
                v.value * factor
            } else {
                v.value
            },
        }),
    }
}

/// Scale every node by 1.5, flooring each node's value independently.
fn scale_one_point_five(node: &ResultNode) -> ResultNode {
    const LABEL: &str = "Crit: x1.5, rounded down";
    match node {
        ResultNode::Die(die) => ResultNode::Die(DieResult {
            kind: die.kind.clone(),
            results: die
                .results
                .iter()
                .map(|face| floor_one_point_five(*face))
                .collect(),
            total: floor_one_point_five(die.total),
            description: Some(LABEL.to_string()),
        }),
        ResultNode::Operator(op) => ResultNode::Operator(OperatorResult {
            operator: op.operator.clone(),
            operands: op.operands.iter().map(scale_one_point_five).collect(),
            total: floor_one_point_five(op.total),
            description: Some(LABEL.to_string()),
        }),
        ResultNode::Value(v) => ResultNode::Value(ValueResult {
            value: floor_one_point_five(v.value),
        }),
    }
}

/// Replace every face with the die's maximum face value.
fn maximize(node: &ResultNode) -> Result<ResultNode, CritError> {
    const LABEL: &str = "Crit: dice maximized";
    match node {
        ResultNode::Die(die) => {
            let max = max_face(&die.kind)?;
            Ok(ResultNode::Die(DieResult {
                kind: die.kind.clone(),
                results: vec![max; die.results.len()],
                total: max * die.results.len() as i32,
                description: Some(LABEL.to_string()),
            }))
        }
        ResultNode::Operator(op) => {
            let operands = op
                .operands
                .iter()
                .map(maximize)
                .collect::<Result<Vec<_>, _>>()?;
            // Operator totals fall out of the rewritten children.
            let total = operands.iter().map(ResultNode::subtree_total).sum();
            Ok(ResultNode::Operator(OperatorResult {
                operator: op.operator.clone(),
                operands,
                total,
                description: Some(LABEL.to_string()),
            }))
        }
        ResultNode::Value(_) => Ok(node.clone()),
    }
}

/// Append one maximized face per rolled face, doubling the results
/// array length.
fn add_max_per_die(node: &ResultNode) -> Result<ResultNode, CritError> {
    const LABEL: &str = "Crit: added max die per die rolled";
    match node {
        ResultNode::Die(die) => {
            let max = max_face(&die.kind)?;
            let mut results = die.results.clone();
            results.extend(std::iter::repeat(max).take(die.results.len()));
            let total = results.iter().sum();
            Ok(ResultNode::Die(DieResult {
                kind: die.kind.clone(),
                results,
                total,
                description: Some(LABEL.to_string()),
            }))
        }
        ResultNode::Operator(op) => {
            let operands = op
                .operands
                .iter()
                .map(add_max_per_die)
                .collect::<Result<Vec<_>, _>>()?;
            let total = operands.iter().map(ResultNode::subtree_total).sum();
            Ok(ResultNode::Operator(OperatorResult {
                operator: op.operator.clone(),
                operands,
                total,
                description: Some(LABEL.to_string()),
            }))
        }
        ResultNode::Value(_) => Ok(node.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{die, named_group, sum, value};

    fn single(behavior: CritBehavior, node: ResultNode) -> ResultNode {
        let out = apply_crit(behavior, &[named_group("Damage", node)]).unwrap();
        out.into_iter().next().unwrap().result
    }

    #[test]
    fn test_behavior_strings_round_trip() {
        for behavior in [
            CritBehavior::None,
            CritBehavior::OnePointFiveTotal,
            CritBehavior::DoubleTotal,
            CritBehavior::TripleTotal,
            CritBehavior::QuadrupleTotal,
            CritBehavior::DoubleDieCount,
            CritBehavior::DoubleDieResult,
            CritBehavior::MaxDie,
            CritBehavior::MaxPlus,
        ] {
            assert_eq!(CritBehavior::parse(behavior.as_str()), behavior);
        }
    }

    #[test]
    fn test_unrecognized_behavior_parses_as_none() {
        assert_eq!(CritBehavior::parse("quintuple-total"), CritBehavior::None);
        assert_eq!(CritBehavior::parse(""), CritBehavior::None);
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&CritBehavior::MaxPlus).unwrap();
        assert_eq!(json, r#""max-plus""#);
        let back: CritBehavior = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CritBehavior::MaxPlus);
    }

    #[test]
    fn test_serde_deserialization_is_lenient() {
        let behavior: CritBehavior = serde_json::from_str(r#""quintuple-total""#).unwrap();
        assert_eq!(behavior, CritBehavior::None);
    }

    #[test]
    fn test_none_is_identity() {
        let groups = vec![named_group(
            "Damage",
            sum(vec![die("d6", &[3, 5]), value(2)]),
        )];
        let out = apply_crit(CritBehavior::None, &groups).unwrap();
        assert_eq!(out, groups);
    }

    #[test]
    fn test_double_die_count_is_identity_post_roll() {
        let groups = vec![named_group("Damage", die("d8", &[7]))];
        let out = apply_crit(CritBehavior::DoubleDieCount, &groups).unwrap();
        assert_eq!(out, groups);
    }

    #[test]
    fn test_double_die_result_doubles_faces_and_totals() {
        let out = single(CritBehavior::DoubleDieResult, die("d6", &[3, 5]));
        let ResultNode::Die(out) = out else {
            panic!("expected die node");
        };
        assert_eq!(out.results, vec![6, 10]);
        assert_eq!(out.total, 16);
        assert!(out.description.is_some());
    }

    #[test]
    fn test_double_die_result_leaves_modifiers_alone() {
        let out = single(
            CritBehavior::DoubleDieResult,
            sum(vec![die("d6", &[4]), value(3)]),
        );
        let ResultNode::Operator(op) = out else {
            panic!("expected operator node");
        };
        assert_eq!(op.operands[1], value(3));
        assert_eq!(op.operands[0].total(), 8);
        // Per the behavior's definition the operator total doubles
        // wholesale, modifier included.
        assert_eq!(op.total, 14);
    }

    #[test]
    fn test_double_total_doubles_modifiers_too() {
        let out = single(
            CritBehavior::DoubleTotal,
            sum(vec![die("d6", &[4]), value(3)]),
        );
        let ResultNode::Operator(op) = out else {
            panic!("expected operator node");
        };
        assert_eq!(op.operands[1], value(6));
        assert_eq!(op.total, 14);
    }

    #[test]
    fn test_triple_and_quadruple_scale_everything() {
        let tree = sum(vec![die("d4", &[2, 3]), value(1)]);

        let out = single(CritBehavior::TripleTotal, tree.clone());
        assert_eq!(out.total(), 18);
        assert_eq!(out.subtree_total(), 18);

        let out = single(CritBehavior::QuadrupleTotal, tree);
        assert_eq!(out.total(), 24);
        assert_eq!(out.subtree_total(), 24);
    }

    #[test]
    fn test_one_point_five_floors_values() {
        assert_eq!(
            single(CritBehavior::OnePointFiveTotal, value(7)),
            value(10)
        );
        assert_eq!(
            single(CritBehavior::OnePointFiveTotal, value(10)),
            value(15)
        );
    }

    #[test]
    fn test_one_point_five_floors_negative_values_downward() {
        assert_eq!(
            single(CritBehavior::OnePointFiveTotal, value(-7)),
            value(-11)
        );
    }

    #[test]
    fn test_one_point_five_floors_each_node_independently() {
        let out = single(
            CritBehavior::OnePointFiveTotal,
            sum(vec![die("d6", &[3, 4]), value(5)]),
        );
        let ResultNode::Operator(op) = out else {
            panic!("expected operator node");
        };
        let ResultNode::Die(d) = &op.operands[0] else {
            panic!("expected die node");
        };
        assert_eq!(d.results, vec![4, 6]);
        assert_eq!(d.total, 10); // floor(7 * 1.5)
        assert_eq!(op.operands[1], value(7)); // floor(5 * 1.5)
        assert_eq!(op.total, 18); // floor(12 * 1.5)
    }

    #[test]
    fn test_max_die_replaces_every_face_with_max() {
        let out = single(CritBehavior::MaxDie, die("d8", &[1, 3, 7]));
        let ResultNode::Die(out) = out else {
            panic!("expected die node");
        };
        assert!(out.results.iter().all(|face| *face == 8));
        assert_eq!(out.total, 24);
    }

    #[test]
    fn test_max_die_recomputes_operator_totals_from_children() {
        let out = single(
            CritBehavior::MaxDie,
            sum(vec![die("d8", &[2]), die("d4", &[1, 1]), value(3)]),
        );
        let ResultNode::Operator(op) = out else {
            panic!("expected operator node");
        };
        assert_eq!(op.operands[2], value(3));
        assert_eq!(op.total, 8 + 4 + 4 + 3);
    }

    #[test]
    fn test_max_plus_appends_one_max_face_per_face() {
        let out = single(CritBehavior::MaxPlus, die("d6", &[2, 5]));
        let ResultNode::Die(out) = out else {
            panic!("expected die node");
        };
        assert_eq!(out.results, vec![2, 5, 6, 6]);
        assert_eq!(out.total, 19);
    }

    #[test]
    fn test_max_plus_recomputes_operator_totals() {
        let out = single(
            CritBehavior::MaxPlus,
            sum(vec![die("d6", &[2, 5]), value(-1)]),
        );
        assert_eq!(out.total(), 18);
        assert_eq!(out.subtree_total(), 18);
    }

    #[test]
    fn test_unparseable_die_kind_fails_loudly() {
        let err = apply_crit(
            CritBehavior::MaxDie,
            &[named_group("Damage", die("weird", &[3]))],
        )
        .unwrap_err();
        assert_eq!(err, CritError::BadDieKind("weird".to_string()));

        let err = apply_crit(
            CritBehavior::MaxPlus,
            &[named_group("Damage", die("", &[3]))],
        )
        .unwrap_err();
        assert!(matches!(err, CritError::BadDieKind(_)));
    }

    #[test]
    fn test_input_groups_are_not_mutated() {
        let groups = vec![named_group("Damage", die("d6", &[3, 5]))];
        let before = groups.clone();
        let _ = apply_crit(CritBehavior::DoubleTotal, &groups).unwrap();
        assert_eq!(groups, before);
    }

    #[test]
    fn test_deeply_nested_trees_are_rewritten_bottom_up() {
        let tree = sum(vec![
            sum(vec![die("d6", &[3]), die("d6", &[4])]),
            value(2),
        ]);
        let out = single(CritBehavior::TripleTotal, tree);
        assert_eq!(out.total(), 27);
        let ResultNode::Operator(op) = out else {
            panic!("expected operator node");
        };
        assert_eq!(op.operands[0].total(), 21);
    }
}
