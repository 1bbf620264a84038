// DriverStage Engine - Core module structure
pub mod approval;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod fs;
pub mod journal;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod record;
pub mod repository;
pub mod rescan;
pub mod restore;
pub mod stage;
pub mod version;

pub use config::{Config, RunSettings};
pub use error::DriverError;
pub use orchestrator::{UpdateOrchestrator, VendorRun};
pub use record::{PromotionRecord, PromotionResult};
pub use version::Version;
