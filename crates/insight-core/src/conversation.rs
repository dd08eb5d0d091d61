//! Append-only conversation log
//!
//! Entries are kept in insertion order and never edited. The only entry that
//! can disappear is the pending placeholder, and there is at most one of it.

use tracing::debug;

use crate::chart::ChartSpec;
use crate::state::{Message, MessageId, Role};

/// Shown in place of an answer when a request fails or times out
#[derive(Debug, Clone, PartialEq)]
pub struct FailureNotice {
    pub query: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Message(Message),
    /// Placeholder shown while a request is in flight
    Pending,
    Failure(FailureNotice),
}

impl Entry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message(msg) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ConversationLog {
    entries: Vec<Entry>,
    next_id: u64,
    /// Rows scrolled up from the bottom; zero means pinned to the latest entry
    scroll_back: u16,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            scroll_back: 0,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::as_message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a user message. Whitespace-only text is ignored.
    pub fn append_user(&mut self, text: &str) -> Option<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(self.push_message(Role::User, text.to_string(), None))
    }

    /// Append the pending placeholder. Returns `false` if one already exists.
    pub fn append_pending(&mut self) -> bool {
        if self.has_pending() {
            debug!("pending placeholder already present");
            return false;
        }
        self.entries.push(Entry::Pending);
        self.pin_to_bottom();
        true
    }

    /// Remove the pending placeholder, if any.
    pub fn remove_pending(&mut self) -> bool {
        match self.entries.iter().position(|e| matches!(e, Entry::Pending)) {
            Some(idx) => {
                self.entries.remove(idx);
                self.pin_to_bottom();
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, Entry::Pending))
    }

    pub fn append_assistant(&mut self, text: &str, chart: Option<ChartSpec>) -> MessageId {
        self.push_message(Role::Assistant, text.to_string(), chart)
    }

    pub fn append_failure(&mut self, query: &str, reason: &str) {
        self.entries.push(Entry::Failure(FailureNotice {
            query: query.to_string(),
            reason: reason.to_string(),
        }));
        self.pin_to_bottom();
    }

    /// The most recent failure notice, used by the retry affordance
    pub fn last_failure(&self) -> Option<&FailureNotice> {
        self.entries.iter().rev().find_map(|e| match e {
            Entry::Failure(notice) => Some(notice),
            _ => None,
        })
    }

    /// The most recent message that carries a chart
    pub fn latest_chart(&self) -> Option<(MessageId, &ChartSpec)> {
        self.messages()
            .rev()
            .find_map(|msg| msg.chart.as_ref().map(|chart| (msg.id, chart)))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages().find(|msg| msg.id == id)
    }

    // Viewport

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn is_pinned(&self) -> bool {
        self.scroll_back == 0
    }

    pub fn pin_to_bottom(&mut self) {
        self.scroll_back = 0;
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    /// Clamp the scroll-back distance to the scrollable range of the view.
    pub fn clamp_scroll(&mut self, max_scroll: u16) {
        self.scroll_back = self.scroll_back.min(max_scroll);
    }

    fn push_message(&mut self, role: Role, text: String, chart: Option<ChartSpec>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry::Message(Message {
            id,
            role,
            text,
            chart,
        }));
        self.pin_to_bottom();
        id
    }
}
