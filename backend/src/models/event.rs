//! Event logging for grasp runs.
//!
//! This module defines the Event enum which captures every significant step
//! of a policy run. Events enable:
//! - Determinism checks (two runs with the same inputs log the same events)
//! - Debugging (which attempt failed, and with how many contacts)
//! - Reporting (the run report carries the full log)
//!
//! # Event Types
//!
//! - **StateEntered**: the FSM started processing a state
//! - **TargetsComputed**: APPROACH derived pregrasp/grasp/lift points
//! - **GraspVerified**: VERIFY_GRASP contact check result
//! - **GraspAdjusted**: RECOVER lowered the grasp offset
//! - **RetriesExhausted**: RECOVER gave up
//! - **Finished**: terminal state reached
//!
//! # Example
//!
//! ```rust
//! use panda_grasp_core::models::{Event, EventLog};
//! use panda_grasp_core::GraspState;
//!
//! let mut log = EventLog::new();
//! log.log(Event::StateEntered { step: 0, state: GraspState::Reset });
//! log.log(Event::GraspVerified { step: 1200, contacts: 4, ok: true });
//!
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.events_of_type("GraspVerified").len(), 1);
//! ```

use super::state::GraspState;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Policy event, stamped with the simulation step at which it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// FSM began processing `state`
    StateEntered { step: u64, state: GraspState },

    /// Target triple computed from the object pose and current grasp offset
    TargetsComputed {
        step: u64,
        grasp_z: f64,
        pregrasp: Point3<f64>,
        grasp: Point3<f64>,
        lift: Point3<f64>,
    },

    /// DESCEND shifted the grasp point on purpose (recovery demo)
    GraspOffsetInjected { step: u64, dx: f64, dy: f64 },

    /// Contact check after closing the gripper
    GraspVerified { step: u64, contacts: usize, ok: bool },

    /// RECOVER lowered the grasp offset and will retry
    GraspAdjusted {
        step: u64,
        retry: u32,
        old_grasp_z: f64,
        new_grasp_z: f64,
    },

    /// RECOVER ran out of retries
    RetriesExhausted { step: u64, retries: u32 },

    /// Terminal state reached
    Finished { step: u64, outcome: GraspState },
}

impl Event {
    /// Simulation step at which the event was logged
    pub fn step(&self) -> u64 {
        match self {
            Event::StateEntered { step, .. }
            | Event::TargetsComputed { step, .. }
            | Event::GraspOffsetInjected { step, .. }
            | Event::GraspVerified { step, .. }
            | Event::GraspAdjusted { step, .. }
            | Event::RetriesExhausted { step, .. }
            | Event::Finished { step, .. } => *step,
        }
    }

    /// Variant name, for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::StateEntered { .. } => "StateEntered",
            Event::TargetsComputed { .. } => "TargetsComputed",
            Event::GraspOffsetInjected { .. } => "GraspOffsetInjected",
            Event::GraspVerified { .. } => "GraspVerified",
            Event::GraspAdjusted { .. } => "GraspAdjusted",
            Event::RetriesExhausted { .. } => "RetriesExhausted",
            Event::Finished { .. } => "Finished",
        }
    }
}

/// Append-only log of policy events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// States in the order the FSM processed them, including the terminal one
    pub fn visited_states(&self) -> Vec<GraspState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::StateEntered { state, .. } => Some(*state),
                Event::Finished { outcome, .. } => Some(*outcome),
                _ => None,
            })
            .collect()
    }

    /// Grasp offsets chosen by successive RECOVER visits
    pub fn grasp_z_history(&self) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::GraspAdjusted { new_grasp_z, .. } => Some(*new_grasp_z),
                _ => None,
            })
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
