//! Domain models for the grasp simulator

pub mod event;
pub mod pose;
pub mod robot;
pub mod state;

// Re-exports
pub use event::{Event, EventLog};
pub use pose::{BodyId, JointIndex, ObjectPose};
pub use robot::{ContactPoint, JointInfo, JointType, RobotIndices};
pub use state::{GraspAttemptState, GraspState};
