//! Testing utilities for the dice panel.
//!
//! This module provides tools for deterministic tests without a real
//! tray:
//! - `MockTray` with scripted dispatch ids and recorded traffic
//! - Result-tree constructors (`die`, `value`, `sum`, `named_group`)
//! - `TestHarness` wiring a mock tray into an orchestrator
//! - Assertion helpers for verifying tray traffic

use crate::orchestrator::RollOrchestrator;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tray::{
    DiceTray, DieResult, OperatorResult, ResultGroup, ResultNode, RollDescriptor, RollId,
    TrayError, ValueResult,
};

/// Build a die-result leaf with its total computed from the faces.
pub fn die(kind: &str, faces: &[i32]) -> ResultNode {
    ResultNode::Die(DieResult {
        kind: kind.to_string(),
        results: faces.to_vec(),
        total: faces.iter().sum(),
        description: None,
    })
}

/// Build a fixed-value leaf (a flat modifier).
pub fn value(v: i32) -> ResultNode {
    ResultNode::Value(ValueResult { value: v })
}

/// Build an addition node with a consistent total.
pub fn sum(operands: Vec<ResultNode>) -> ResultNode {
    let total = operands.iter().map(ResultNode::subtree_total).sum();
    ResultNode::Operator(OperatorResult {
        operator: "+".to_string(),
        operands,
        total,
        description: None,
    })
}

/// Build a named result group around one tree.
pub fn named_group(name: &str, result: ResultNode) -> ResultGroup {
    ResultGroup {
        name: name.to_string(),
        result,
        description: None,
    }
}

#[derive(Default)]
struct MockState {
    next_id: u32,
    dispatched: Vec<Vec<RollDescriptor>>,
    displayed: Vec<(RollId, Vec<ResultGroup>)>,
    dispatch_failure: Option<String>,
}

/// A scripted tray for deterministic tests.
///
/// Dispatches are recorded and answered with sequential ids; group
/// evaluation sums the tree locally; displayed results are recorded
/// for inspection.
#[derive(Default)]
pub struct MockTray {
    state: Mutex<MockState>,
}

impl MockTray {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock tray state poisoned")
    }

    /// Make the next dispatch fail with the given message.
    pub fn fail_next_dispatch(&self, message: impl Into<String>) {
        self.state().dispatch_failure = Some(message.into());
    }

    /// Number of dispatch calls that reached the tray.
    pub fn dispatch_count(&self) -> usize {
        self.state().dispatched.len()
    }

    /// The descriptor batch of the most recent dispatch.
    pub fn last_dispatch(&self) -> Option<Vec<RollDescriptor>> {
        self.state().dispatched.last().cloned()
    }

    /// Everything sent for display, in order.
    pub fn displayed(&self) -> Vec<(RollId, Vec<ResultGroup>)> {
        self.state().displayed.clone()
    }
}

#[async_trait]
impl DiceTray for MockTray {
    async fn put_dice_in_tray(
        &self,
        descriptors: &[RollDescriptor],
        _open_tray: bool,
    ) -> Result<RollId, TrayError> {
        let mut state = self.state();
        if let Some(message) = state.dispatch_failure.take() {
            return Err(TrayError::Dispatch(message));
        }
        state.dispatched.push(descriptors.to_vec());
        state.next_id += 1;
        Ok(RollId::new(format!("roll-{}", state.next_id)))
    }

    async fn evaluate_dice_results_group(&self, group: &ResultGroup) -> Result<i32, TrayError> {
        Ok(group.result.subtree_total())
    }

    async fn send_dice_result(
        &self,
        roll_id: &RollId,
        groups: &[ResultGroup],
    ) -> Result<(), TrayError> {
        self.state()
            .displayed
            .push((roll_id.clone(), groups.to_vec()));
        Ok(())
    }
}

/// A mock tray wired into an orchestrator, for end-to-end scenarios.
pub struct TestHarness {
    pub tray: Arc<MockTray>,
    pub orchestrator: RollOrchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        let tray = Arc::new(MockTray::new());
        let orchestrator = RollOrchestrator::new(tray.clone());
        Self { tray, orchestrator }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that exactly `count` dispatch calls reached the tray.
#[track_caller]
pub fn assert_dispatch_count(tray: &MockTray, count: usize) {
    let actual = tray.dispatch_count();
    assert_eq!(actual, count, "Expected {count} dispatches, got {actual}");
}

/// Assert that nothing was ever dispatched.
#[track_caller]
pub fn assert_nothing_dispatched(tray: &MockTray) {
    assert_dispatch_count(tray, 0);
}

/// Assert that exactly `count` result sets were sent for display.
#[track_caller]
pub fn assert_displayed_count(tray: &MockTray, count: usize) {
    let actual = tray.displayed().len();
    assert_eq!(
        actual, count,
        "Expected {count} displayed result sets, got {actual}"
    );
}

/// Assert that the most recently displayed set carries these group
/// names, in order.
#[track_caller]
pub fn assert_last_displayed_names(tray: &MockTray, names: &[&str]) {
    let displayed = tray.displayed();
    let last = displayed.last().expect("nothing was displayed");
    let actual: Vec<&str> = last.1.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(actual, names, "Displayed group names mismatch");
}
