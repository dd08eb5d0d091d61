//! Interaction controller
//!
//! Owns the conversation log, the task history and the input field, and runs
//! the single-flight request cycle:
//!
//! ```text
//! Idle --submit--> Pending{ticket} --settle(ticket)--> Idle
//!                          \--cancel----------------> Idle
//! ```
//!
//! The controller never touches the runtime. [`InteractionController::submit`]
//! hands back a [`Dispatch`] and the caller is responsible for running it and
//! feeding the outcome to [`InteractionController::settle`].

use tracing::{debug, info, warn};

use crate::analysis::{AnalysisError, AnalysisReport, AnalysisRequest};
use crate::conversation::ConversationLog;
use crate::history::{TaskFilter, TaskHistory, TaskId};
use crate::input::InputField;

/// Identifies one dispatched request so late answers can be recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

/// A request the caller must send to the analysis backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: AnalysisRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Pending { ticket: Ticket, query: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    EmptyInput,
    /// A request is already in flight
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Completed(TaskId),
    Failed(TaskId),
    /// No pending request carries this ticket
    Stale,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    log: ConversationLog,
    history: TaskHistory,
    input: InputField,
    phase: Phase,
    next_ticket: u64,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ConversationLog {
        &mut self.log
    }

    pub fn history(&self) -> &TaskHistory {
        &self.history
    }

    pub fn input(&self) -> &InputField {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputField {
        &mut self.input
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    /// Submit the current input.
    ///
    /// On success the user message and the pending placeholder are already in
    /// the log, the input is cleared, and the returned [`Dispatch`] must be
    /// sent exactly once.
    pub fn submit(&mut self) -> Result<Dispatch, SubmitRejected> {
        if self.is_pending() {
            debug!("submit ignored, request in flight");
            return Err(SubmitRejected::Busy);
        }

        let query = self.input.text().trim().to_string();
        if self.log.append_user(&query).is_none() {
            return Err(SubmitRejected::EmptyInput);
        }
        self.input.take();
        self.log.append_pending();

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.phase = Phase::Pending {
            ticket,
            query: query.clone(),
        };
        info!(ticket = ticket.0, %query, "analysis submitted");

        Ok(Dispatch {
            ticket,
            request: AnalysisRequest { query },
        })
    }

    /// Apply the backend's answer for `ticket`.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        outcome: Result<AnalysisReport, AnalysisError>,
    ) -> SettleOutcome {
        let query = match &self.phase {
            Phase::Pending { ticket: pending, query } if *pending == ticket => query.clone(),
            _ => {
                debug!(ticket = ticket.0, "dropping stale analysis result");
                return SettleOutcome::Stale;
            }
        };

        self.log.remove_pending();
        self.phase = Phase::Idle;

        match outcome {
            Ok(report) => {
                self.log.append_assistant(&report.narrative, report.chart);
                let id = self.history.record_completed(&query);
                info!(ticket = ticket.0, task_id = id.0, "analysis completed");
                SettleOutcome::Completed(id)
            }
            Err(err) => {
                self.log.append_failure(&query, &err.to_string());
                let id = self.history.record_failed(&query);
                warn!(ticket = ticket.0, task_id = id.0, error = %err, "analysis failed");
                SettleOutcome::Failed(id)
            }
        }
    }

    /// Abandon the in-flight request. Nothing is recorded for it.
    pub fn cancel(&mut self) -> Option<Ticket> {
        match std::mem::take(&mut self.phase) {
            Phase::Pending { ticket, .. } => {
                self.log.remove_pending();
                info!(ticket = ticket.0, "analysis cancelled");
                Some(ticket)
            }
            Phase::Idle => None,
        }
    }

    /// Put the last failed query back into the input and submit it again.
    pub fn retry_last_failure(&mut self) -> Result<Dispatch, SubmitRejected> {
        if self.is_pending() {
            return Err(SubmitRejected::Busy);
        }
        let query = self
            .log
            .last_failure()
            .map(|notice| notice.query.clone())
            .ok_or(SubmitRejected::EmptyInput)?;
        self.input.set(&query);
        self.submit()
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.history.set_filter(filter);
    }

    /// Copy a task's title into the input. Does not submit.
    pub fn rerun(&mut self, id: TaskId) -> bool {
        match self.history.rerun(id) {
            Some(title) => {
                let title = title.to_string();
                debug!(task_id = id.0, "re-run pre-filled input");
                self.input.set(&title);
                true
            }
            None => false,
        }
    }
}
