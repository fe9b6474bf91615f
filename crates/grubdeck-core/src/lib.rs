//! Shared types, configuration, and the installation pipeline building blocks
//! for GrubDeck.

pub mod boot_config;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod protocol;
pub mod regen;
pub mod util;

pub use boot_config::BootConfigDocument;
pub use config::*;
pub use error::InstallError;
pub use model::*;
pub use orchestrator::{InstallEvent, InstallHandle, Installer, ProcessInstaller};
pub use protocol::WorkerMessage;
pub use regen::Regenerator;
