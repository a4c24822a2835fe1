use std::future::Future;

use anyhow::Result;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error};

use crate::worklog::WorkLog;

/// Progress notifications emitted by [SyncManager](super::SyncManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Status(String),
    /// Classified worklogs, published once before anything is uploaded.
    Worklogs(Vec<WorkLog>),
}

/// Represents a consumer of sync events, for example a console printer.
pub trait EventProcessor {
    fn process_next(&mut self, event: SyncEvent) -> impl Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl Future<Output = Result<()>>;
}

/// Drains the event channel into an [EventProcessor] until every sender is dropped.
pub struct EventModule<Processor> {
    receiver: Receiver<SyncEvent>,
    processor: Processor,
}

impl<P: EventProcessor> EventModule<P> {
    pub fn new(receiver: Receiver<SyncEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<P> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            if let Err(e) = self.processor.process_next(event).await {
                error!("Error processing sync event: {e:?}")
            }
        }

        self.receiver.close();
        self.processor.finalize().await?;
        Ok(self.processor)
    }
}
