//! UI-agnostic conversation types
//!
//! These are shared by every front end and don't depend on any specific UI
//! framework. A [`Message`] never changes after it has been appended.

use serde::{Deserialize, Serialize};

use crate::chart::ChartSpec;

/// Position of a message in the conversation, assigned on append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
        }
    }
}

/// A chat message, optionally carrying a chart to draw under its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub chart: Option<ChartSpec>,
}

impl Message {
    pub fn has_chart(&self) -> bool {
        self.chart.is_some()
    }
}
