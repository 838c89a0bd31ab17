pub mod byzantine;
pub mod error;
pub mod health;
pub mod partition;
pub mod recovery;

pub use byzantine::{Accusation, ByzantineTracker, JailEvent, Offense};
pub use error::FaultError;
pub use health::HealthMonitor;
pub use partition::{check as check_partition, detect as detect_partition, elect_leader, PartitionStatus};
pub use recovery::{RecoveryAttempt, RecoveryOutcome};
