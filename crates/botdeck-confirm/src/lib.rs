//! Confirmation workflow for dangerous operator actions.
//!
//! Guarded commands go through an explicit state machine:
//! `Idle -> Pending -> Confirming -> Idle`, or `Pending -> Idle` on dismiss.
//! In live mode, specs that require it are confirmed only after the exact
//! phrase has been typed.

pub mod error;
pub mod notifier;
pub mod presets;
pub mod spec;
pub mod workflow;

pub use error::{ConfirmError, ConfirmResult};
pub use notifier::{LogNotifier, MockNotifier, Notifier, Toast, ToastKind};
pub use spec::{action_fn, Action, ActionFuture, DangerousActionSpec, Severity};
pub use workflow::{ConfirmState, ConfirmationWorkflow, DialogView, DismissReason};
