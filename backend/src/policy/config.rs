//! Policy configuration
//!
//! Tunables of the grasp policy. Loaded from JSON with every field optional;
//! missing fields take the defaults below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("min_contacts must be >= 1")]
    ZeroMinContacts,

    #[error("grasp_z_min ({min}) must not exceed grasp_z_offset ({offset})")]
    FloorAboveOffset { min: f64, offset: f64 },

    #[error("grasp_z_step must be finite and >= 0, got {0}")]
    InvalidStep(f64),

    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

/// Grasp policy tunables
///
/// # Example
///
/// ```rust
/// use panda_grasp_core::PolicyConfig;
///
/// let cfg: PolicyConfig = serde_json::from_str(r#"{ "max_retries": 0 }"#).unwrap();
/// assert_eq!(cfg.max_retries, 0);
/// assert_eq!(cfg.min_contacts, 1);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// RECOVER visits allowed before giving up
    pub max_retries: u32,

    /// Initial grasp height above the object center (m)
    pub grasp_z_offset: f64,

    /// Lowest grasp height RECOVER may reach (m)
    pub grasp_z_min: f64,

    /// Amount RECOVER lowers the grasp height by (m)
    pub grasp_z_step: f64,

    /// Steps spent moving to the pregrasp point
    pub pregrasp_steps: u32,

    /// Steps spent descending to the grasp point
    pub descend_steps: u32,

    /// Steps spent closing the gripper
    pub close_steps: u32,

    /// Steps spent lifting
    pub lift_steps: u32,

    /// Steps spent holding before declaring success
    pub hold_steps: u32,

    /// Contact points required for a grasp to count
    pub min_contacts: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            grasp_z_offset: 0.03,
            grasp_z_min: 0.01,
            grasp_z_step: 0.005,
            pregrasp_steps: 240,
            descend_steps: 240,
            close_steps: 240,
            lift_steps: 480,
            hold_steps: 480,
            min_contacts: 1,
        }
    }
}

impl PolicyConfig {
    /// Check invariants the FSM relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_contacts == 0 {
            return Err(ConfigError::ZeroMinContacts);
        }
        if !self.grasp_z_offset.is_finite() {
            return Err(ConfigError::NonFinite("grasp_z_offset"));
        }
        if !self.grasp_z_min.is_finite() {
            return Err(ConfigError::NonFinite("grasp_z_min"));
        }
        if !self.grasp_z_step.is_finite() || self.grasp_z_step < 0.0 {
            return Err(ConfigError::InvalidStep(self.grasp_z_step));
        }
        if self.grasp_z_min > self.grasp_z_offset {
            return Err(ConfigError::FloorAboveOffset {
                min: self.grasp_z_min,
                offset: self.grasp_z_offset,
            });
        }
        Ok(())
    }
}
