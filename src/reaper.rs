//! Background teardown of deleted subtrees.
//!
//! Deleting a key detaches it synchronously; dropping the detached nodes is
//! handed to a worker thread so large subtrees do not stall the caller.

use crate::key::KeyNode;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const WORKER_NAME: &str = "reg-file-reaper";

/// Worker that drops batches of detached key nodes.
///
/// The thread is spawned on the first submission. Dropping the reaper closes
/// the queue and waits for the pending batches.
#[derive(Debug, Default)]
pub(crate) struct Reaper {
    worker: Option<Worker>,
}

#[derive(Debug)]
struct Worker {
    sender: Sender<Vec<KeyNode>>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Queues nodes for teardown. The batch must be ordered children first.
    pub(crate) fn submit(&mut self, batch: Vec<KeyNode>) {
        if batch.is_empty() {
            return;
        }

        if self.worker.is_none() {
            self.worker = Self::spawn();
        }

        let sent = match &self.worker {
            Some(worker) => worker
                .sender
                .send(batch)
                .map_err(|mpsc::SendError(batch)| batch),
            None => Err(batch),
        };

        if let Err(batch) = sent {
            if self.worker.take().is_some() {
                warn!("teardown worker stopped, tearing down inline");
            }
            teardown(batch);
        }
    }

    fn spawn() -> Option<Worker> {
        let (sender, receiver) = mpsc::channel::<Vec<KeyNode>>();
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                for batch in receiver {
                    teardown(batch);
                }
            });

        match spawned {
            Ok(handle) => Some(Worker { sender, handle }),
            Err(e) => {
                warn!(error = %e, "cannot spawn teardown worker, tearing down inline");
                None
            }
        }
    }
}

fn teardown(batch: Vec<KeyNode>) {
    let keys = batch.len();
    for mut node in batch {
        node.values.clear();
        drop(node);
    }
    debug!(keys, "tore down deleted keys");
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some(Worker { sender, handle }) = self.worker.take() {
            drop(sender);
            if handle.join().is_err() {
                warn!("teardown worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hive::Hive;
    use crate::key::KeyId;

    #[test]
    fn test_submit_and_join() {
        let mut reaper = Reaper::default();
        reaper.submit(Vec::new());
        assert!(reaper.worker.is_none());

        let batch = (1..4)
            .map(|i| KeyNode::new(KeyId::from_raw(i), format!("k{}", i), Hive::CurrentUser, None))
            .collect();
        reaper.submit(batch);
        assert!(reaper.worker.is_some());
        drop(reaper);
    }
}
