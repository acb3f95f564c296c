//! Scriptable in-memory backend for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{Backend, BrowserKind, CommandValue, DialogHandle, DriverCommand, ElementHandle,
            WindowHandle};

// 1x1 transparent PNG, enough for screenshot-file tests.
const TINY_PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk\
YPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

type ScriptFn = Box<dyn Fn(&str) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct MockState {
    transient_failures: AtomicU32,
    fatal: AtomicBool,
    fail_on_quit: AtomicBool,
    no_dialog_polls: AtomicU32,
    dialog_id: Mutex<Option<String>>,
    element_id: Mutex<Option<String>>,
    windows: Mutex<Vec<String>>,
    element_text: Mutex<String>,
    title: Mutex<String>,
    page_source: Mutex<String>,
    script_fn: Mutex<Option<ScriptFn>>,
    calls: AtomicU32,
    commands: Mutex<Vec<DriverCommand>>,
}

/// Scriptable backend double.
///
/// Clones share state, so a test can keep a probe handle after moving
/// the backend into a proxy.
#[derive(Clone)]
pub(crate) struct MockBackend {
    kind: BrowserKind,
    state: Arc<MockState>,
}

impl MockBackend {
    pub(crate) fn new(kind: BrowserKind) -> Self {
        let state = MockState {
            title: Mutex::new("Untitled".to_string()),
            page_source: Mutex::new("<html></html>".to_string()),
            windows: Mutex::new(vec!["w1".to_string()]),
            ..MockState::default()
        };
        Self {
            kind,
            state: Arc::new(state),
        }
    }

    /// Next `n` executes fail with a transient element-not-found error.
    pub(crate) fn fail_transiently_times(&self, n: u32) {
        self.state.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Every execute fails with a fatal driver error.
    pub(crate) fn fail_fatally(&self) {
        self.state.fatal.store(true, Ordering::SeqCst);
    }

    /// Only `session.quit` fails.
    pub(crate) fn fail_on_quit(&self) {
        self.state.fail_on_quit.store(true, Ordering::SeqCst);
    }

    /// Element lookups resolve to this handle id.
    pub(crate) fn respond_with_element(&self, id: &str) {
        *self.state.element_id.lock() = Some(id.to_string());
    }

    /// Window enumeration returns these handles.
    pub(crate) fn respond_with_windows(&self, ids: Vec<&str>) {
        *self.state.windows.lock() = ids.into_iter().map(String::from).collect();
    }

    pub(crate) fn set_title(&self, title: &str) {
        *self.state.title.lock() = title.to_string();
    }

    pub(crate) fn set_page_source(&self, source: &str) {
        *self.state.page_source.lock() = source.to_string();
    }

    /// Every `element.text` read returns this value.
    pub(crate) fn set_element_text(&self, text: &str) {
        *self.state.element_text.lock() = text.to_string();
    }

    /// Scripted response for `session.executeScript`.
    pub(crate) fn on_script(&self, f: impl Fn(&str) -> Result<Value> + Send + Sync + 'static) {
        *self.state.script_fn.lock() = Some(Box::new(f));
    }

    /// Dialog switching yields `NoDialog` for the first `polls`
    /// attempts, then resolves to `id`.
    pub(crate) fn dialog_after_polls(&self, polls: u32, id: &str) {
        self.state.no_dialog_polls.store(polls, Ordering::SeqCst);
        *self.state.dialog_id.lock() = Some(id.to_string());
    }

    /// Number of commands the backend actually executed.
    pub(crate) fn calls(&self) -> u32 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Every command executed, in order.
    pub(crate) fn commands(&self) -> Vec<DriverCommand> {
        self.state.commands.lock().clone()
    }

    /// Methods of every command executed, in order.
    pub(crate) fn methods(&self) -> Vec<&'static str> {
        self.commands().iter().map(DriverCommand::method).collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn execute(&self, command: DriverCommand) -> Result<CommandValue> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.commands.lock().push(command.clone());

        if self.state.fatal.load(Ordering::SeqCst) {
            return Err(Error::driver("mock backend configured to fail"));
        }
        if self
            .state
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::element_not_found("mock"));
        }

        match command {
            DriverCommand::Navigate { .. }
            | DriverCommand::SwitchToWindow { .. }
            | DriverCommand::CloseWindow
            | DriverCommand::Click { .. }
            | DriverCommand::Clear { .. }
            | DriverCommand::SendKeys { .. }
            | DriverCommand::DismissDialog { .. } => Ok(CommandValue::Unit),

            DriverCommand::Quit => {
                if self.state.fail_on_quit.load(Ordering::SeqCst) {
                    Err(Error::driver("session termination failed"))
                } else {
                    Ok(CommandValue::Unit)
                }
            }

            DriverCommand::FindElement { locator }
            | DriverCommand::FindChildElement { locator, .. } => {
                match self.state.element_id.lock().clone() {
                    Some(id) => Ok(CommandValue::Element(ElementHandle::new(id))),
                    None => Err(Error::element_not_found(locator)),
                }
            }

            DriverCommand::WindowHandles => Ok(CommandValue::Windows(
                self.state
                    .windows
                    .lock()
                    .iter()
                    .map(WindowHandle::new)
                    .collect(),
            )),

            DriverCommand::Title => Ok(CommandValue::Text(self.state.title.lock().clone())),
            DriverCommand::PageSource => {
                Ok(CommandValue::Text(self.state.page_source.lock().clone()))
            }
            DriverCommand::ElementText { .. } => {
                Ok(CommandValue::Text(self.state.element_text.lock().clone()))
            }
            DriverCommand::DialogText { .. } => Ok(CommandValue::Text("alert!".into())),

            DriverCommand::CaptureScreenshot => {
                Ok(CommandValue::Data(TINY_PNG_BASE64.to_string()))
            }

            DriverCommand::ExecuteScript { code } => {
                let value = match &*self.state.script_fn.lock() {
                    Some(f) => f(&code)?,
                    None => Value::Null,
                };
                Ok(CommandValue::Json(value))
            }

            DriverCommand::SwitchToDialog => {
                let remaining = self
                    .state
                    .no_dialog_polls
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
                if remaining.is_ok() {
                    return Err(Error::NoDialog);
                }
                match self.state.dialog_id.lock().clone() {
                    Some(id) => Ok(CommandValue::Dialog(DialogHandle::new(id))),
                    None => Err(Error::NoDialog),
                }
            }
        }
    }

    fn kind(&self) -> BrowserKind {
        self.kind
    }
}
