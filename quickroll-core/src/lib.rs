//! Dice-panel core for a virtual tabletop client.
//!
//! This crate provides:
//! - Dice-group configuration and the tray's roll-string grammar
//! - Advantage / disadvantage / best-of-three instance selection
//! - Critical-hit transforms over delivered result trees
//! - Roll lifecycle orchestration against the external tray
//! - Versioned persistence for named roll presets and panel settings
//!
//! The panel never rolls dice itself. It describes rolls to the
//! external tray (see the `tray` crate), and post-processes the result
//! trees the tray delivers.
//!
//! # Quick Start
//!
//! ```ignore
//! use quickroll_core::{DiceGroup, DieKind, RollOrchestrator, RollType};
//! use std::sync::Arc;
//!
//! # async fn example(tray: Arc<dyn quickroll_core::DiceTray>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut orchestrator = RollOrchestrator::new(tray);
//!
//! let attack = DiceGroup::new("Attack")
//!     .with_count(DieKind::D20, 1)
//!     .with_modifier(5);
//!
//! let roll_id = orchestrator
//!     .initiate_roll(RollType::Advantage, &[attack])
//!     .await?;
//!
//! // Later, feed tray events back in:
//! // orchestrator.on_roll_event(event).await?;
//! # Ok(())
//! # }
//! ```

pub mod crit;
pub mod groups;
pub mod orchestrator;
pub mod persist;
pub mod select;
pub mod testing;

// Primary public API
pub use crit::{apply_crit, CritBehavior, CritError};
pub use groups::{DiceGroup, DieKind};
pub use orchestrator::{EventOutcome, RollError, RollOrchestrator, RollTracker, TrackedRoll};
pub use persist::{PanelSettings, PersistError, PresetLibrary, RollPreset, SortOrder};
pub use select::{partition_result_groups, select_result_groups, RollType};

// Re-export the tray boundary so hosts depend on one crate.
pub use tray::{
    DiceTray, DieResult, OperatorResult, ResultGroup, ResultNode, RollDescriptor, RollId,
    TrayError, TrayEvent, ValueResult,
};
