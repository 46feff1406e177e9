//! Session and token lifecycle for the hotelier back-office client
//!
//! - [`SessionRuntime`]: token store, session state, events and the idle timer
//! - [`RefreshCoordinator`] / [`RefreshStage`]: single-flight refresh and 401 replay
//! - [`AuthSession`]: login, registration, logout and session restore
//! - [`BackOffice`]: everything wired together from configuration

pub mod backend;
pub mod error;
pub mod events;
pub mod manager;
pub mod office;
pub mod refresh;
pub mod runtime;
pub mod timer;

pub use backend::AuthBackend;
pub use error::{SessionError, SessionResult};
pub use events::{ExpiryReason, Route, SessionEvent, SessionState};
pub use manager::AuthSession;
pub use office::BackOffice;
pub use refresh::{RefreshCoordinator, RefreshStage};
pub use runtime::SessionRuntime;
pub use timer::{ActivitySignal, SessionTimer, TimerPhase};
