//! Inspection of extracted trees and executables
//!
//! Everything here only reads from disk: architecture detection, installer
//! classification and launch executable resolution.

pub mod arch;
pub mod classify;
pub mod resolve;

pub use arch::{ExecutableArch, detect, detect_cached, penalty};
pub use classify::{classify, classify_with_fallback, find_setup_binary, is_known_installer_signature};
pub use resolve::{ExecutableResolution, resolve};
