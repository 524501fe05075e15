use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};

use crate::capture::Packet;
use crate::session::Session;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Worker pool size must be at least 1")]
    NoWorkers,

    #[error("Dispatcher permits closed: {0}")]
    Closed(#[from] AcquireError),

    #[error("Packet worker failed: {0}")]
    Worker(#[from] JoinError),
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub packets: u64,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Feeds packets to a session with at most `workers` tasks in flight.
///
/// Every packet is processed exactly once. Packets may be processed in any
/// order relative to each other.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workers: usize,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self, DispatchError> {
        if workers == 0 {
            return Err(DispatchError::NoWorkers);
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run(
        &self,
        session: Arc<Session>,
        packets: Vec<Packet>,
    ) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let total = packets.len() as u64;
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        debug!("Dispatching {} packets across {} workers", total, self.workers);

        for packet in packets {
            // Waiting for a permit before spawning caps live tasks, not just
            // running ones.
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let session = Arc::clone(&session);

            tasks.spawn(async move {
                session.process(&packet);
                drop(permit);
            });

            while let Some(finished) = tasks.try_join_next() {
                finished?;
            }
        }

        while let Some(finished) = tasks.join_next().await {
            finished?;
        }

        let report = DispatchReport {
            packets: total,
            workers: self.workers,
            elapsed: started.elapsed(),
        };
        info!(
            "Processed {} packets with {} workers in {:?}",
            report.packets, report.workers, report.elapsed
        );
        Ok(report)
    }
}
