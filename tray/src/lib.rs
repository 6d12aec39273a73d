//! Minimal interface to the external dice-tray subsystem.
//!
//! The tray owns all randomness: the panel hands it textual roll
//! descriptors (`"2d6+1d4-3"`), and it delivers fully rolled result
//! trees back through an event stream. This crate provides:
//! - The wire-level result-tree model (`ResultNode`, `ResultGroup`)
//! - The `DiceTray` service trait used by the panel core
//! - The event stream payloads (`TrayEvent`)
//!
//! Nothing in here rolls dice. Result trees always arrive pre-rolled
//! from the tray, and the panel only rewrites and re-displays them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when talking to the tray.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Result display failed: {0}")]
    Display(String),
}

/// Opaque roll identifier assigned by the tray at dispatch time.
///
/// The panel never fabricates these; an id only exists once the tray
/// has accepted a dispatch, which is what precludes a result event
/// racing its own dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollId(String);

impl RollId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One textual dice expression to place in the tray.
///
/// The `roll` field uses the tray's expression grammar: `{count}{die}`
/// terms joined by `+`, optionally followed by a signed modifier,
/// e.g. `"2d6+1d4+3"` or `"1d20-2"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollDescriptor {
    pub name: String,
    pub roll: String,
}

/// Faces rolled for one die type, with their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DieResult {
    /// Die kind tag as the tray reports it, e.g. `"d8"`.
    pub kind: String,
    /// Individual face values.
    pub results: Vec<i32>,
    /// Sum of the face values.
    pub total: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An internal node combining child results (e.g. group addition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorResult {
    pub operator: String,
    pub operands: Vec<ResultNode>,
    pub total: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A fixed constant, such as a flat modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueResult {
    pub value: i32,
}

/// A node in a rolled result tree.
///
/// The wire format is untagged: a die node is recognized by its `kind`
/// field, an operator node by `operator`, and anything else is a plain
/// value. The variant order below matters for deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultNode {
    Die(DieResult),
    Operator(OperatorResult),
    Value(ValueResult),
}

impl ResultNode {
    /// The aggregate total this node reports for itself.
    pub fn total(&self) -> i32 {
        match self {
            ResultNode::Die(die) => die.total,
            ResultNode::Operator(op) => op.total,
            ResultNode::Value(v) => v.value,
        }
    }

    /// Recompute the total of this subtree from its leaves, ignoring
    /// any cached `total` on operator nodes.
    pub fn subtree_total(&self) -> i32 {
        match self {
            ResultNode::Die(die) => die.total,
            ResultNode::Operator(op) => op.operands.iter().map(ResultNode::subtree_total).sum(),
            ResultNode::Value(v) => v.value,
        }
    }
}

/// One named group's full result tree as delivered by the tray.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultGroup {
    pub name: String,
    pub result: ResultNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Events delivered by the tray's result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum TrayEvent {
    /// Results are available for a previously dispatched roll.
    RollResults {
        roll_id: RollId,
        results_groups: Vec<ResultGroup>,
    },
    /// A roll was removed from the tray before (or after) resolving.
    RollRemoved { roll_id: RollId },
}

/// The dice-tray service boundary.
///
/// Implemented over whatever transport the host client provides; the
/// panel core only ever sees this trait, which keeps it testable with
/// a scripted mock.
#[async_trait]
pub trait DiceTray: Send + Sync {
    /// Place one or more roll descriptors in the tray. Returns the
    /// tray-assigned identifier for the whole batch.
    async fn put_dice_in_tray(
        &self,
        descriptors: &[RollDescriptor],
        open_tray: bool,
    ) -> Result<RollId, TrayError>;

    /// Ask the tray for the evaluated numeric total of one result group.
    async fn evaluate_dice_results_group(&self, group: &ResultGroup) -> Result<i32, TrayError>;

    /// Deliver final (possibly transformed) results for display.
    async fn send_dice_result(
        &self,
        roll_id: &RollId,
        groups: &[ResultGroup],
    ) -> Result<(), TrayError>;
}
