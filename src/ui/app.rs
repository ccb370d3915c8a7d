use crate::identity::IdentityStatus;
use crate::models::EntryKind;
use crate::session::{LedgerSession, Outcome, SessionEvent};
use crate::ui::util::clamp_cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    AddPerson,
    Amount(EntryKind),
    Confirm,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::AddPerson => write!(f, "ADD"),
            Self::Amount(EntryKind::Income) => write!(f, "INCOME"),
            Self::Amount(EntryKind::Due) => write!(f, "DUE"),
            Self::Confirm => write!(f, "CONFIRM"),
        }
    }
}

/// Terminal-side state. Ledger data lives in the session; this only holds
/// what the session has no opinion about: cursor, scroll, typed input.
pub(crate) struct App {
    pub(crate) running: bool,
    pub(crate) input_mode: InputMode,
    pub(crate) input: String,
    pub(crate) status_message: String,
    pub(crate) show_help: bool,
    pub(crate) visible_rows: usize,

    pub(crate) person_index: usize,
    pub(crate) person_scroll: usize,
    pub(crate) history_scroll: usize,
}

impl App {
    pub(crate) fn new() -> Self {
        Self {
            running: true,
            input_mode: InputMode::Normal,
            input: String::new(),
            status_message: String::new(),
            show_help: false,
            visible_rows: 20,
            person_index: 0,
            person_scroll: 0,
            history_scroll: 0,
        }
    }

    pub(crate) fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    pub(crate) fn selected_person_id(&self, session: &LedgerSession) -> Option<String> {
        session
            .people()
            .get(self.person_index)
            .map(|p| p.id.clone())
    }

    pub(crate) fn enter(&mut self, mode: InputMode) {
        self.input_mode = mode;
        self.input.clear();
    }

    pub(crate) fn leave_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
    }

    /// Fold a session event into the view: status line, cursor bounds and
    /// modes whose subject disappeared.
    pub(crate) fn on_session_event(&mut self, event: &SessionEvent, session: &LedgerSession) {
        match event {
            SessionEvent::Identity(IdentityStatus::SigningIn) => self.set_status("Signing in..."),
            SessionEvent::Identity(IdentityStatus::SignedIn(_)) => self.set_status("Signed in"),
            SessionEvent::Identity(IdentityStatus::Failed(reason)) => {
                self.set_status(format!("Sign-in failed: {reason}"));
            }
            SessionEvent::Identity(IdentityStatus::Unknown) => {}
            SessionEvent::PeopleUpdated => {
                let len = session.people().len();
                clamp_cursor(
                    &mut self.person_index,
                    &mut self.person_scroll,
                    len,
                    self.visible_rows,
                );
            }
            SessionEvent::HistoryUpdated => {
                let len = session.history().len();
                if self.history_scroll >= len {
                    self.history_scroll = len.saturating_sub(1);
                }
            }
            SessionEvent::Completed(outcome) => {
                // Newest entries sort first; show the one just recorded.
                if let Outcome::Recorded { recorded, .. } = outcome {
                    if session.history_person() == Some(recorded.person_id.as_str()) {
                        self.history_scroll = 0;
                    }
                }
                self.set_status(outcome.to_string());
            }
        }

        match self.input_mode {
            InputMode::Amount(_) if session.draft().is_none() => self.leave_input(),
            InputMode::Confirm if session.pending_delete().is_none() => self.leave_input(),
            _ => {}
        }
    }
}
