use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use eframe::egui::Context;
use kb_graph::{KbError, Record, RecordCache};
use tracing::{debug, warn};

type Resolution = (String, Result<Record, KbError>);

/// Background worker that resolves full records for nodes the user looks at.
pub(super) struct Resolver {
    requests: Option<Sender<String>>,
    results: Receiver<Resolution>,
    pending: HashSet<String>,
    worker: Option<JoinHandle<()>>,
}

impl Resolver {
    pub(super) fn spawn(cache: Arc<RecordCache>, ctx: Context) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (result_tx, result_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            for id in request_rx {
                let result = cache.get_record(&id);
                if result_tx.send((id, result)).is_err() {
                    break;
                }
                ctx.request_repaint();
            }
            debug!("record resolver stopped");
        });

        Self {
            requests: Some(request_tx),
            results: result_rx,
            pending: HashSet::new(),
            worker: Some(worker),
        }
    }

    /// Queues `id` unless a request for it is already in flight.
    pub(super) fn request(&mut self, id: &str) {
        if self.pending.contains(id) {
            return;
        }
        let Some(requests) = &self.requests else {
            return;
        };
        if requests.send(id.to_owned()).is_err() {
            warn!(id, "record resolver is gone");
            return;
        }
        self.pending.insert(id.to_owned());
    }

    pub(super) fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub(super) fn drain(&mut self) -> Vec<Resolution> {
        let mut finished = Vec::new();
        loop {
            match self.results.try_recv() {
                Ok(resolution) => {
                    self.pending.remove(&resolution.0);
                    finished.push(resolution);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.pending.clear();
                    break;
                }
            }
        }
        finished
    }

    pub(super) fn shutdown(&mut self) {
        self.requests = None;
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("record resolver panicked");
        }
    }
}
