//! Collaborator contracts consumed by the orchestrator
//!
//! Each external concern (extraction, destination lookup, operator dialogs,
//! the installed-application registry and process launching) sits behind a
//! trait so hosts can plug in their own implementations.

pub mod destination;
pub mod dialog;
pub mod extract;
pub mod launcher;
pub mod registry;

// Re-export main collaborator types
pub use destination::{ConfiguredDestinations, DestinationResolution, DestinationResolver, FolderPrompt};
pub use dialog::{AutoConfirm, ConfirmDialog};
pub use extract::{DirectoryExtractor, ExtractBehavior, Extractor, SevenZipExtractor};
pub use launcher::{InstallerLauncher, LaunchMode, ShellLauncher};
pub use registry::{InstalledApps, NoRegistry, system_registry};
