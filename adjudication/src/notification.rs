//! Ticket event notifications.
//!
//! Events are dispatched after the transaction that produced them commits.
//! Delivery is best-effort: a failing sink is logged and never fails the
//! operation that raised the event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use registry::{GrievanceTicket, IndividualId, TicketId};

/// Something operators should hear about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TicketEvent {
    Created {
        ticket_id: TicketId,
        unicef_id: String,
        business_area: String,
        golden_record: Option<IndividualId>,
    },
    Closed {
        ticket_id: TicketId,
        unicef_id: String,
        business_area: String,
        closed_by: String,
    },
}

impl TicketEvent {
    pub fn created(ticket: &GrievanceTicket) -> Self {
        Self::Created {
            ticket_id: ticket.id.clone(),
            unicef_id: ticket.unicef_id.clone(),
            business_area: ticket.business_area.clone(),
            golden_record: ticket
                .details
                .as_ref()
                .map(|details| details.candidates.golden().clone()),
        }
    }

    pub fn closed(ticket: &GrievanceTicket, closed_by: &str) -> Self {
        Self::Closed {
            ticket_id: ticket.id.clone(),
            unicef_id: ticket.unicef_id.clone(),
            business_area: ticket.business_area.clone(),
            closed_by: closed_by.to_string(),
        }
    }

    pub fn ticket_id(&self) -> &TicketId {
        match self {
            Self::Created { ticket_id, .. } | Self::Closed { ticket_id, .. } => ticket_id,
        }
    }
}

/// Sink delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Receiver of ticket events.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name used in logs.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn notify(&self, event: &TicketEvent) -> Result<(), NotificationError>;
}

/// Writes events to the log.
pub struct LoggingSink;

#[async_trait::async_trait]
impl NotificationSink for LoggingSink {
    fn name(&self) -> &str {
        "logging"
    }

    async fn notify(&self, event: &TicketEvent) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;
        info!(ticket_id = %event.ticket_id(), payload = %payload, "Ticket notification");
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: RwLock<Vec<TicketEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub async fn events(&self) -> Vec<TicketEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &TicketEvent) -> Result<(), NotificationError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans events out to registered sinks.
#[derive(Default)]
pub struct NotificationHub {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub with a [`LoggingSink`] registered.
    pub fn with_logging() -> Self {
        Self {
            sinks: RwLock::new(vec![Arc::new(LoggingSink)]),
        }
    }

    pub async fn register(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().await.push(sink);
    }

    pub async fn sink_count(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Deliver each event to every sink.
    pub async fn dispatch(&self, events: &[TicketEvent]) -> DispatchReport {
        let sinks = self.sinks.read().await.clone();
        let mut report = DispatchReport::default();

        for event in events {
            for sink in &sinks {
                match sink.notify(event).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!(
                            sink = sink.name(),
                            ticket_id = %event.ticket_id(),
                            error = %e,
                            "Ticket notification failed"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait::async_trait]
    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn notify(&self, _event: &TicketEvent) -> Result<(), NotificationError> {
            Err(NotificationError::Delivery("mailbox full".to_string()))
        }
    }

    fn event(id: &str) -> TicketEvent {
        TicketEvent::Closed {
            ticket_id: id.into(),
            unicef_id: "GRV-0000001".to_string(),
            business_area: "afghanistan".to_string(),
            closed_by: "officer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_sink() {
        let hub = NotificationHub::with_logging();
        let recorder = Arc::new(RecordingSink::new());
        hub.register(recorder.clone()).await;
        assert_eq!(hub.sink_count().await, 2);

        let report = hub.dispatch(&[event("t-1"), event("t-2")]).await;
        assert_eq!(report, DispatchReport { delivered: 4, failed: 0 });
        assert_eq!(recorder.events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_stop_others() {
        let hub = NotificationHub::new();
        let recorder = Arc::new(RecordingSink::new());
        hub.register(Arc::new(FailingSink)).await;
        hub.register(recorder.clone()).await;

        let report = hub.dispatch(&[event("t-1")]).await;
        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(recorder.events().await[0].ticket_id(), &TicketId::from("t-1"));
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(event("t-1")).unwrap();
        assert_eq!(json["event"], "closed");
        assert_eq!(json["ticket_id"], "t-1");
    }
}
