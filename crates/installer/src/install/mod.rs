//! Installation module
//!
//! This module turns a staged archive into an installed title: installer or
//! portable base content, confirmation, and optional content.

pub mod batch;
pub mod confirm;
pub mod installer;
pub mod lib;
pub mod optional;
pub mod portable;


// Re-export commonly used types
pub use batch::{InstallerBatch, batch_exit_code};
pub use confirm::{CompletionEvidence, ConfirmationSignal, confirm_install};
pub use installer::{existing_install, installer_arguments};
pub use lib::Installer;
pub use optional::{OptionalContentReport, content_destination};
pub use portable::normalize_portable;
