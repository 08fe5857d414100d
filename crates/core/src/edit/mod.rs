//! Edit Engine: fuzzy target resolution, splice application
//! with inverse-edit computation and backup retention, and undo/redo
//! history. `EditCoordinator` is the public facade; the other submodules
//! are usable independently for callers that only need one stage.

pub mod coordinator;
pub mod editor;
pub mod history;
pub mod resolver;

pub use coordinator::{EditCoordinator, EditRequest, TargetEdit};
pub use editor::Editor;
pub use history::History;
pub use resolver::{EditResolver, MatchKind, Normalization, ResolveOptions, ResolvedEdit};
