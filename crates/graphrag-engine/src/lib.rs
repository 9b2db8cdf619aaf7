pub mod console;
pub mod lifecycle;
pub mod session;

pub use console::ConsoleInput;
pub use lifecycle::{clear_artifacts, ArtifactState, IndexLifecycle, IndexOrigin, Indices};
pub use session::{ExitReason, InputSource, InteractiveSession, SessionInput, SessionState, SessionSummary};
