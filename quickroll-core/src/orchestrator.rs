//! End-to-end roll lifecycle.
//!
//! `RollOrchestrator` validates the configured groups, dispatches the
//! right number of roll instances to the tray, tracks in-flight rolls
//! by their tray-assigned id, and turns arriving result events into a
//! selected, crit-transformed, annotated display call back into the
//! tray.
//!
//! Every failure here is scoped to a single roll's lifecycle: a bad
//! event is logged and dropped, and the orchestrator stays usable for
//! the next roll.

use crate::crit::{apply_crit, CritBehavior, CritError};
use crate::groups::DiceGroup;
use crate::select::{partition_result_groups, select_result_groups, RollType};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use tray::{DiceTray, RollDescriptor, RollId, TrayError, TrayEvent};

/// Errors from roll initiation and event processing.
#[derive(Debug, Error)]
pub enum RollError {
    /// The named group has only a flat modifier and no dice.
    #[error("Group '{0}' has only a modifier and cannot be rolled")]
    ModifierOnlyGroup(String),

    /// Every configured group is empty of dice.
    #[error("No dice to roll")]
    NoDiceToRoll,

    /// A results event arrived with an unusable payload.
    #[error("Malformed results payload: {0}")]
    MalformedResults(String),

    #[error("Tray error: {0}")]
    Tray(#[from] TrayError),

    #[error("Crit transform failed: {0}")]
    Crit(#[from] CritError),
}

/// What the orchestrator remembers about one in-flight roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedRoll {
    pub roll_type: RollType,
    pub crit_behavior: CritBehavior,
}

/// Owned map of in-flight rolls keyed by tray-assigned id.
///
/// Injected into the orchestrator so tests can run several independent
/// trackers side by side; there is no ambient global state.
#[derive(Debug, Default)]
pub struct RollTracker {
    entries: HashMap<RollId, TrackedRoll>,
}

impl RollTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, roll_id: RollId, roll: TrackedRoll) {
        self.entries.insert(roll_id, roll);
    }

    pub fn lookup(&self, roll_id: &RollId) -> Option<TrackedRoll> {
        self.entries.get(roll_id).copied()
    }

    pub fn remove(&mut self, roll_id: &RollId) -> Option<TrackedRoll> {
        self.entries.remove(roll_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How an event was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event's roll id was not tracked here; it belongs to some
    /// other tray feature.
    Ignored,
    /// A tracked roll was removed from the tray before resolving.
    Removed,
    /// Results were processed and handed back to the tray for display.
    Displayed,
}

/// Drives the dispatch-and-display cycle against the tray.
pub struct RollOrchestrator {
    tray: Arc<dyn DiceTray>,
    tracker: RollTracker,
    crit_behavior: CritBehavior,
}

impl RollOrchestrator {
    pub fn new(tray: Arc<dyn DiceTray>) -> Self {
        Self::with_tracker(tray, RollTracker::new())
    }

    /// Build an orchestrator around an existing tracker.
    pub fn with_tracker(tray: Arc<dyn DiceTray>, tracker: RollTracker) -> Self {
        Self {
            tray,
            tracker,
            crit_behavior: CritBehavior::None,
        }
    }

    /// The crit behavior applied to critical rolls, as configured in
    /// the panel settings.
    pub fn crit_behavior(&self) -> CritBehavior {
        self.crit_behavior
    }

    pub fn set_crit_behavior(&mut self, behavior: CritBehavior) {
        self.crit_behavior = behavior;
    }

    pub fn tracker(&self) -> &RollTracker {
        &self.tracker
    }

    /// Validate the configured groups and dispatch one batch of roll
    /// instances to the tray. Returns the tray-assigned roll id.
    ///
    /// User errors (modifier-only group, nothing to roll) are reported
    /// before anything is dispatched; the tray is never touched and no
    /// state changes.
    pub async fn initiate_roll(
        &mut self,
        roll_type: RollType,
        groups: &[DiceGroup],
    ) -> Result<RollId, RollError> {
        if let Some(group) = groups.iter().find(|g| g.is_modifier_only()) {
            return Err(RollError::ModifierOnlyGroup(group.name.clone()));
        }
        if groups.iter().all(DiceGroup::is_dice_empty) {
            return Err(RollError::NoDiceToRoll);
        }

        let crit_behavior = if roll_type == RollType::Critical {
            self.crit_behavior
        } else {
            CritBehavior::None
        };

        // double-die-count happens before dispatch: the tray rolls
        // twice as many physical dice and no post-roll rewrite runs.
        let doubled;
        let effective: &[DiceGroup] = if crit_behavior.doubles_dice_before_roll() {
            doubled = groups.iter().map(DiceGroup::doubled).collect::<Vec<_>>();
            &doubled
        } else {
            groups
        };

        let descriptors: Vec<RollDescriptor> = effective
            .iter()
            .filter_map(DiceGroup::descriptor)
            .collect();

        let mut batch = Vec::with_capacity(descriptors.len() * roll_type.instance_count());
        for _ in 0..roll_type.instance_count() {
            batch.extend(descriptors.iter().cloned());
        }

        let roll_id = self.tray.put_dice_in_tray(&batch, true).await?;
        self.tracker.record(
            roll_id.clone(),
            TrackedRoll {
                roll_type,
                crit_behavior,
            },
        );
        debug!(%roll_id, roll_type = %roll_type, groups = descriptors.len(), "Roll dispatched");
        Ok(roll_id)
    }

    /// Process one event from the tray's result stream.
    ///
    /// Events for untracked ids are ignored (they belong to another
    /// tray feature). Malformed payloads and tray failures abort the
    /// processing of that single event; the tracked entry stays put so
    /// a redelivery can still succeed. A successfully displayed roll
    /// is forgotten immediately, bounding tracker memory.
    pub async fn on_roll_event(&mut self, event: TrayEvent) -> Result<EventOutcome, RollError> {
        match event {
            TrayEvent::RollRemoved { roll_id } => {
                if self.tracker.remove(&roll_id).is_some() {
                    debug!(%roll_id, "Tracked roll removed from tray");
                    Ok(EventOutcome::Removed)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
            TrayEvent::RollResults {
                roll_id,
                results_groups,
            } => {
                let Some(tracked) = self.tracker.lookup(&roll_id) else {
                    debug!(%roll_id, "Results for untracked roll id, ignoring");
                    return Ok(EventOutcome::Ignored);
                };

                if results_groups.is_empty() {
                    warn!(%roll_id, "Results event with no groups, dropping");
                    return Err(RollError::MalformedResults(
                        "empty resultsGroups".to_string(),
                    ));
                }

                let instances = partition_result_groups(results_groups, tracked.roll_type);
                let selected =
                    select_result_groups(self.tray.as_ref(), tracked.roll_type, instances).await?;
                let mut finals = apply_crit(tracked.crit_behavior, &selected)?;

                if let Some(suffix) = tracked.roll_type.display_suffix() {
                    for group in &mut finals {
                        if !group.name.ends_with(suffix) {
                            group.name.push_str(suffix);
                        }
                    }
                }

                self.tray.send_dice_result(&roll_id, &finals).await?;
                self.tracker.remove(&roll_id);
                debug!(%roll_id, "Roll results displayed");
                Ok(EventOutcome::Displayed)
            }
        }
    }
}
