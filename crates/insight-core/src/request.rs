//! The one in-flight analysis request.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::analysis::{AnalysisError, AnalysisReport};
use crate::backend::Backend;
use crate::controller::{Dispatch, Ticket};

/// A spawned analysis request. Dropping it aborts the request, so the
/// settle callback only ever runs for requests that are still wanted.
#[derive(Debug)]
pub struct InFlight {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

impl InFlight {
    pub fn spawn<F>(backend: Backend, dispatch: Dispatch, limit: Duration, on_settle: F) -> Self
    where
        F: FnOnce(Ticket, Result<AnalysisReport, AnalysisError>) + Send + 'static,
    {
        let Dispatch { ticket, request } = dispatch;
        info!(ticket = ticket.0, backend = %backend.describe(), "dispatching analysis");

        let handle = tokio::spawn(async move {
            let outcome = backend.analyze_within(&request, limit).await;
            on_settle(ticket, outcome);
        });

        Self { ticket, handle }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(self) {
        debug!(ticket = self.ticket.0, "aborting analysis");
        // Drop does the work
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisRequest, MockAnalyst};
    use tokio::sync::oneshot;

    fn dispatch(ticket: u64) -> Dispatch {
        Dispatch {
            ticket: Ticket(ticket),
            request: AnalysisRequest::new("销量分析"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_with_ticket() {
        let (tx, rx) = oneshot::channel();
        let backend = Backend::Mock(MockAnalyst::default());
        let in_flight = InFlight::spawn(backend, dispatch(7), Duration::from_secs(30), move |t, r| {
            let _ = tx.send((t, r));
        });
        assert_eq!(in_flight.ticket(), Ticket(7));

        let (ticket, outcome) = rx.await.unwrap();
        assert_eq!(ticket, Ticket(7));
        assert!(outcome.unwrap().chart.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_prevents_settle() {
        let (tx, rx) = oneshot::channel::<()>();
        let backend = Backend::Mock(MockAnalyst::default());
        let in_flight = InFlight::spawn(backend, dispatch(1), Duration::from_secs(30), move |_, _| {
            let _ = tx.send(());
        });
        in_flight.abort();

        tokio::time::sleep(Duration::from_secs(5)).await;
        // The sender was dropped with the aborted task
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_to_callback() {
        let (tx, rx) = oneshot::channel();
        let backend = Backend::Mock(MockAnalyst::new(Duration::from_secs(60)));
        let _in_flight = InFlight::spawn(backend, dispatch(2), Duration::from_secs(3), move |_, r| {
            let _ = tx.send(r);
        });
        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap_err(), AnalysisError::Timeout(Duration::from_secs(3)));
    }
}
