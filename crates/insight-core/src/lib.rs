pub mod analysis;
pub mod backend;
pub mod chart;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod history;
pub mod input;
pub mod request;
pub mod state;

// Re-export main types for convenience
pub use analysis::{AnalysisError, AnalysisReport, AnalysisRequest, HttpAnalyst, MockAnalyst};
pub use backend::{Backend, BackendKind};
pub use chart::{ChartKind, ChartSpec};
pub use config::Config;
pub use controller::{Dispatch, InteractionController, Phase, SettleOutcome, SubmitRejected, Ticket};
pub use conversation::{ConversationLog, Entry, FailureNotice};
pub use history::{TaskFilter, TaskHistory, TaskId, TaskRecord, TaskStatus};
pub use input::InputField;
pub use request::InFlight;
pub use state::{Message, MessageId, Role};
