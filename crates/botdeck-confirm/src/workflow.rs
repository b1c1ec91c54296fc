//! Confirmation state machine.

use crate::error::{ConfirmError, ConfirmResult};
use crate::notifier::{Notifier, Toast};
use crate::spec::{Action, DangerousActionSpec, Severity};
use botdeck_core::BotMode;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmState {
    Idle,
    Pending,
    Confirming,
}

/// How the operator closed the dialog without confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    Escape,
    Backdrop,
    Cancel,
}

/// What a dialog renders for the active spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub consequences: Vec<String>,
    pub confirm_label: String,
    pub severity: Severity,
    /// Phrase to type, when the current mode demands one.
    pub required_phrase: Option<String>,
    pub input: String,
    pub confirm_enabled: bool,
    pub confirming: bool,
    pub dismissable: bool,
}

struct Active {
    spec: DangerousActionSpec,
    input: String,
}

impl Active {
    fn phrase_required(&self, mode: BotMode) -> bool {
        self.spec.requires_typed_confirmation && mode.is_live()
    }

    fn can_confirm(&self, mode: BotMode) -> bool {
        !self.phrase_required(mode) || self.input == self.spec.confirmation_phrase
    }
}

struct Inner {
    state: ConfirmState,
    mode: BotMode,
    active: Option<Active>,
    /// Action taken out of the spec while it runs.
    running: Option<(String, Uuid)>,
}

/// Gates guarded commands behind an explicit confirmation.
///
/// At most one spec is active. A new request while pending replaces the
/// current spec; a request while confirming is rejected with
/// `ConfirmError::Busy`.
pub struct ConfirmationWorkflow {
    inner: Mutex<Inner>,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmationWorkflow {
    pub fn new(mode: BotMode, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConfirmState::Idle,
                mode,
                active: None,
                running: None,
            }),
            notifier,
        }
    }

    pub fn state(&self) -> ConfirmState {
        self.inner.lock().state
    }

    pub fn mode(&self) -> BotMode {
        self.inner.lock().mode
    }

    /// Track the bot's mode. Takes effect for the pending spec immediately.
    pub fn set_mode(&self, mode: BotMode) {
        self.inner.lock().mode = mode;
    }

    /// Open the dialog for `spec`. Returns the id of the now active spec.
    pub fn request(&self, spec: DangerousActionSpec) -> ConfirmResult<Uuid> {
        let mut inner = self.inner.lock();
        match inner.state {
            ConfirmState::Confirming => {
                warn!(title = %spec.title, "Confirmation busy, request rejected");
                return Err(ConfirmError::Busy);
            }
            ConfirmState::Pending => {
                if let Some(previous) = &inner.active {
                    info!(
                        replaced = %previous.spec.title,
                        title = %spec.title,
                        "Pending confirmation replaced"
                    );
                }
            }
            ConfirmState::Idle => {
                info!(title = %spec.title, "Confirmation requested");
            }
        }
        let id = spec.id;
        inner.active = Some(Active {
            spec,
            input: String::new(),
        });
        inner.state = ConfirmState::Pending;
        Ok(id)
    }

    /// Replace the typed confirmation input.
    pub fn set_input(&self, input: impl Into<String>) -> ConfirmResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != ConfirmState::Pending {
            return Err(ConfirmError::NoActiveRequest);
        }
        match inner.active.as_mut() {
            Some(active) => {
                active.input = input.into();
                Ok(())
            }
            None => Err(ConfirmError::NoActiveRequest),
        }
    }

    /// Whether the confirm control is enabled.
    pub fn can_confirm(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == ConfirmState::Pending
            && inner
                .active
                .as_ref()
                .is_some_and(|active| active.can_confirm(inner.mode))
    }

    /// Close the dialog without running the action.
    ///
    /// Ignored while confirming. Returns whether the dialog closed.
    pub fn dismiss(&self, reason: DismissReason) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            ConfirmState::Pending => {
                if let Some(active) = inner.active.take() {
                    info!(title = %active.spec.title, ?reason, "Confirmation dismissed");
                }
                inner.state = ConfirmState::Idle;
                true
            }
            ConfirmState::Confirming => {
                warn!(?reason, "Dismiss ignored while confirming");
                false
            }
            ConfirmState::Idle => false,
        }
    }

    /// Run the pending action.
    ///
    /// The workflow stays in `Confirming` until the action resolves, then
    /// returns to `Idle` and reports the outcome through the notifier,
    /// whether the action succeeded or failed. Dropping the returned future
    /// mid-action also returns to `Idle`, with an error toast since the
    /// outcome is unknown.
    pub async fn confirm(&self) -> ConfirmResult<Value> {
        let (title, action): (String, Action) = {
            let mut inner = self.inner.lock();
            if inner.state != ConfirmState::Pending {
                return Err(ConfirmError::NoActiveRequest);
            }
            let mode = inner.mode;
            match inner.active.as_ref() {
                Some(active) if active.can_confirm(mode) => {}
                Some(_) => return Err(ConfirmError::ConfirmationRequired),
                None => return Err(ConfirmError::NoActiveRequest),
            }
            let Some(active) = inner.active.take() else {
                return Err(ConfirmError::NoActiveRequest);
            };
            let DangerousActionSpec {
                id, title, action, ..
            } = active.spec;
            inner.running = Some((title.clone(), id));
            inner.state = ConfirmState::Confirming;
            (title, action)
        };

        info!(title = %title, "Confirmed, running action");
        let mut guard = ConfirmingGuard {
            workflow: self,
            title: title.clone(),
            resolved: false,
        };
        let result = action().await;
        guard.resolved = true;
        drop(guard);

        match result {
            Ok(value) => {
                info!(title = %title, "Action succeeded");
                self.notifier
                    .notify(Toast::success(title.clone(), format!("{title} completed")));
                Ok(value)
            }
            Err(message) => {
                warn!(title = %title, error = %message, "Action failed");
                self.notifier.notify(Toast::error(title, message.clone()));
                Err(ConfirmError::ActionFailed(message))
            }
        }
    }

    /// Dialog projection of the active spec, if any.
    pub fn view(&self) -> Option<DialogView> {
        let inner = self.inner.lock();
        match inner.state {
            ConfirmState::Idle => None,
            ConfirmState::Pending => inner.active.as_ref().map(|active| {
                let spec = &active.spec;
                DialogView {
                    id: spec.id,
                    title: spec.title.clone(),
                    description: spec.description.clone(),
                    consequences: spec.consequences.clone(),
                    confirm_label: spec.confirm_label.clone(),
                    severity: spec.severity,
                    required_phrase: active
                        .phrase_required(inner.mode)
                        .then(|| spec.confirmation_phrase.clone()),
                    input: active.input.clone(),
                    confirm_enabled: active.can_confirm(inner.mode),
                    confirming: false,
                    dismissable: true,
                }
            }),
            ConfirmState::Confirming => inner.running.as_ref().map(|(title, id)| DialogView {
                id: *id,
                title: title.clone(),
                description: String::new(),
                consequences: Vec::new(),
                confirm_label: String::new(),
                severity: Severity::default(),
                required_phrase: None,
                input: String::new(),
                confirm_enabled: false,
                confirming: true,
                dismissable: false,
            }),
        }
    }
}

/// Leaves `Confirming` when dropped, including when `confirm` is cancelled.
struct ConfirmingGuard<'a> {
    workflow: &'a ConfirmationWorkflow,
    title: String,
    resolved: bool,
}

impl Drop for ConfirmingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.workflow.inner.lock();
            inner.running = None;
            inner.state = ConfirmState::Idle;
        }
        if !self.resolved {
            warn!(title = %self.title, "Confirmation abandoned before the action resolved");
            self.workflow.notifier.notify(Toast::error(
                self.title.clone(),
                "Interrupted before completion, outcome unknown",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{MockNotifier, ToastKind};
    use crate::spec::action_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn flatten_spec(calls: Arc<AtomicUsize>) -> DangerousActionSpec {
        DangerousActionSpec::new(
            "Flatten Positions",
            action_fn(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"closed": 2}))
            }),
        )
        .typed_phrase("FLATTEN")
        .severity(Severity::Critical)
    }

    fn workflow(mode: BotMode) -> (ConfirmationWorkflow, Arc<MockNotifier>) {
        let notifier = Arc::new(MockNotifier::new());
        (ConfirmationWorkflow::new(mode, notifier.clone()), notifier)
    }

    #[test]
    fn test_live_requires_exact_phrase() {
        let (wf, _) = workflow(BotMode::Live);
        wf.request(flatten_spec(Arc::new(AtomicUsize::new(0)))).unwrap();

        for input in ["", "flatten", "FLATTEN ", "FLATTE", " FLATTEN"] {
            wf.set_input(input).unwrap();
            assert!(!wf.can_confirm(), "input {input:?} must not enable confirm");
        }
        wf.set_input("FLATTEN").unwrap();
        assert!(wf.can_confirm());
    }

    #[test]
    fn test_non_live_skips_phrase() {
        let (wf, _) = workflow(BotMode::DryRun);
        wf.request(flatten_spec(Arc::new(AtomicUsize::new(0)))).unwrap();
        assert!(wf.can_confirm());
        assert_eq!(wf.view().unwrap().required_phrase, None);
    }

    #[test]
    fn test_mode_change_applies_to_pending() {
        let (wf, _) = workflow(BotMode::Paused);
        wf.request(flatten_spec(Arc::new(AtomicUsize::new(0)))).unwrap();
        assert!(wf.can_confirm());
        wf.set_mode(BotMode::Live);
        assert!(!wf.can_confirm());
        assert_eq!(wf.view().unwrap().required_phrase.as_deref(), Some("FLATTEN"));
    }

    #[test]
    fn test_second_request_replaces_pending() {
        let (wf, _) = workflow(BotMode::Live);
        let first = wf.request(flatten_spec(Arc::new(AtomicUsize::new(0)))).unwrap();
        wf.set_input("FLATT").unwrap();
        let second_spec = DangerousActionSpec::new(
            "Cancel All Orders",
            action_fn(|| async { Ok(Value::Null) }),
        );
        let second = wf.request(second_spec).unwrap();

        assert_ne!(first, second);
        let view = wf.view().unwrap();
        assert_eq!(view.id, second);
        assert_eq!(view.title, "Cancel All Orders");
        assert_eq!(view.input, "");
        assert_eq!(wf.state(), ConfirmState::Pending);
    }

    #[test]
    fn test_dismiss_returns_to_idle() {
        let (wf, notifier) = workflow(BotMode::Live);
        let calls = Arc::new(AtomicUsize::new(0));
        wf.request(flatten_spec(calls.clone())).unwrap();
        assert!(wf.dismiss(DismissReason::Escape));
        assert_eq!(wf.state(), ConfirmState::Idle);
        assert!(wf.view().is_none());
        assert!(!wf.dismiss(DismissReason::Cancel));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(notifier.get_toasts().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_without_phrase_is_rejected() {
        let (wf, _) = workflow(BotMode::Live);
        let calls = Arc::new(AtomicUsize::new(0));
        wf.request(flatten_spec(calls.clone())).unwrap();
        assert_eq!(wf.confirm().await.unwrap_err(), ConfirmError::ConfirmationRequired);
        assert_eq!(wf.state(), ConfirmState::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirm_runs_action_once_and_notifies() {
        let (wf, notifier) = workflow(BotMode::Live);
        let calls = Arc::new(AtomicUsize::new(0));
        wf.request(flatten_spec(calls.clone())).unwrap();
        wf.set_input("FLATTEN").unwrap();

        let value = wf.confirm().await.unwrap();
        assert_eq!(value, json!({"closed": 2}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(wf.state(), ConfirmState::Idle);
        assert_eq!(wf.confirm().await.unwrap_err(), ConfirmError::NoActiveRequest);

        let toasts = notifier.get_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Success);
    }

    #[tokio::test]
    async fn test_failed_action_closes_dialog() {
        let (wf, notifier) = workflow(BotMode::DryRun);
        let spec = DangerousActionSpec::new(
            "Kill Switch",
            action_fn(|| async { Err("HTTP 500: engine offline".to_string()) }),
        );
        wf.request(spec).unwrap();

        let err = wf.confirm().await.unwrap_err();
        assert_eq!(err, ConfirmError::ActionFailed("HTTP 500: engine offline".to_string()));
        assert_eq!(wf.state(), ConfirmState::Idle);
        let toasts = notifier.get_toasts();
        assert_eq!(toasts[0].kind, ToastKind::Error);
        assert!(toasts[0].message.contains("engine offline"));
    }

    #[tokio::test]
    async fn test_confirming_rejects_requests_and_dismiss() {
        let (wf, _) = workflow(BotMode::DryRun);
        let wf = Arc::new(wf);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let spec = DangerousActionSpec::new(
            "Flatten Positions",
            action_fn(move || async move {
                let _ = release_rx.await;
                Ok(Value::Null)
            }),
        );
        wf.request(spec).unwrap();

        let runner = Arc::clone(&wf);
        let task = tokio::spawn(async move { runner.confirm().await });
        while wf.state() != ConfirmState::Confirming {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let view = wf.view().unwrap();
        assert!(view.confirming);
        assert!(!view.dismissable);
        assert!(!wf.dismiss(DismissReason::Backdrop));
        let other = DangerousActionSpec::new("Pause", action_fn(|| async { Ok(Value::Null) }));
        assert_eq!(wf.request(other).unwrap_err(), ConfirmError::Busy);

        release_tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(wf.state(), ConfirmState::Idle);
    }

    #[tokio::test]
    async fn test_aborted_confirm_returns_to_idle() {
        let (wf, notifier) = workflow(BotMode::DryRun);
        let wf = Arc::new(wf);
        let spec = DangerousActionSpec::new(
            "Kill Switch",
            action_fn(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }),
        );
        wf.request(spec).unwrap();

        let runner = Arc::clone(&wf);
        let task = tokio::spawn(async move { runner.confirm().await });
        while wf.state() != ConfirmState::Confirming {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(wf.state(), ConfirmState::Idle);
        assert!(wf.view().is_none());
        let toasts = notifier.get_toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Error);
        assert_eq!(toasts[0].title, "Kill Switch");

        let again = DangerousActionSpec::new("Kill Switch", action_fn(|| async { Ok(Value::Null) }));
        assert!(wf.request(again).is_ok());
        assert_eq!(wf.state(), ConfirmState::Pending);
    }
}
