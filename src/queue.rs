//! A client on its own thread.
//!
//! [`ConnectionWorker`] feeds one [`TlsClient`] from a bounded queue so that
//! records, writes and key updates coming from different threads are handled
//! one at a time and in order.

use std::fmt;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use crate::client::TlsClient;
use crate::handler::Handler;
use crate::Error;

type Job<H> = Box<dyn FnOnce(&mut TlsClient<H>) + Send>;

enum Task<H> {
    Received(Vec<u8>),
    Write(Vec<u8>),
    UpdateKeys(bool),
    Call(Job<H>),
    End(Option<Error>),
}

impl<H> fmt::Debug for Task<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Received(b) => write!(f, "Received({} bytes)", b.len()),
            Task::Write(b) => write!(f, "Write({} bytes)", b.len()),
            Task::UpdateKeys(r) => write!(f, "UpdateKeys({})", r),
            Task::Call(_) => write!(f, "Call"),
            Task::End(e) => write!(f, "End({:?})", e),
        }
    }
}

/// Owns a [`TlsClient`] on a dedicated thread.
///
/// Producers block while the queue holds
/// [`Config::queue_capacity`](crate::Config::queue_capacity) tasks.
pub struct ConnectionWorker<H: Handler + Send + 'static> {
    sender: Option<SyncSender<Task<H>>>,
    thread: Option<JoinHandle<TlsClient<H>>>,
}

impl<H: Handler + Send + 'static> ConnectionWorker<H> {
    /// Move `client` to a new thread.
    pub fn spawn(client: TlsClient<H>) -> Result<Self, Error> {
        let (sender, receiver) = sync_channel(client.config().queue_capacity());
        let thread = thread::Builder::new()
            .name("tls-connection".to_string())
            .spawn(move || run(client, receiver))
            .map_err(|e| Error::ConfigError(format!("Failed to spawn worker: {}", e)))?;

        Ok(ConnectionWorker {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue bytes read from the transport.
    pub fn handle_received_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.send(Task::Received(bytes.into()))
    }

    /// Queue application data.
    ///
    /// Failures are only logged. Use [`call`](Self::call) when the result is
    /// needed.
    pub fn write(&self, data: impl Into<Vec<u8>>) -> Result<(), Error> {
        self.send(Task::Write(data.into()))
    }

    /// Queue a KeyUpdate.
    pub fn update_traffic_keys(&self, request_peer_update: bool) -> Result<(), Error> {
        self.send(Task::UpdateKeys(request_peer_update))
    }

    /// Run `f` on the worker after everything queued before it and wait for
    /// the result.
    pub fn call<R, F>(&self, f: F) -> Result<R, Error>
    where
        R: Send + 'static,
        F: FnOnce(&mut TlsClient<H>) -> R + Send + 'static,
    {
        let (tx, rx) = sync_channel(1);
        self.send(Task::Call(Box::new(move |client| {
            let _ = tx.send(f(client));
        })))?;
        rx.recv().map_err(|_| Error::WorkerGone)
    }

    /// Drain the queue, end the connection and stop the thread.
    ///
    /// Returns the client once [`Handler::on_tls_end`] has run.
    pub fn end(mut self, error: Option<Error>) -> Result<TlsClient<H>, Error> {
        self.send(Task::End(error))?;
        self.sender = None;
        self.join()
    }

    fn send(&self, task: Task<H>) -> Result<(), Error> {
        let sender = self.sender.as_ref().ok_or(Error::WorkerGone)?;
        trace!("Queue {:?}", task);
        sender.send(task).map_err(|_| Error::WorkerGone)
    }

    fn join(&mut self) -> Result<TlsClient<H>, Error> {
        let thread = self.thread.take().ok_or(Error::WorkerGone)?;
        thread.join().map_err(|_| Error::WorkerGone)
    }
}

impl<H: Handler + Send + 'static> Drop for ConnectionWorker<H> {
    fn drop(&mut self) {
        // Closing the queue ends the client once the backlog is handled.
        self.sender = None;
        if self.thread.is_some() {
            let _ = self.join();
        }
    }
}

fn run<H: Handler>(mut client: TlsClient<H>, receiver: Receiver<Task<H>>) -> TlsClient<H> {
    for task in receiver.iter() {
        trace!("Run {:?}", task);
        let res = match task {
            Task::Received(bytes) => client.handle_received_bytes(&bytes),
            Task::Write(data) => client.write(&data),
            Task::UpdateKeys(request) => client.update_traffic_keys(request),
            Task::Call(job) => {
                job(&mut client);
                Ok(())
            }
            Task::End(error) => {
                client.end(error);
                break;
            }
        };
        if let Err(e) = res {
            warn!("Queued task failed: {}", e);
        }
    }
    client.end(None);
    client
}

#[cfg(all(test, feature = "rust-crypto"))]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::client::HandshakeOptions;
    use crate::Config;

    #[derive(Clone, Default)]
    struct Shared {
        written: Arc<Mutex<Vec<u8>>>,
        ended: Arc<Mutex<Vec<Option<Error>>>>,
    }

    impl Handler for Shared {
        fn on_write(&mut self, data: &[u8]) {
            self.written.lock().unwrap().extend_from_slice(data);
        }

        fn on_tls_end(&mut self, error: Option<&Error>) {
            self.ended.lock().unwrap().push(error.cloned());
        }
    }

    fn worker(capacity: usize) -> (ConnectionWorker<Shared>, Shared) {
        let _ = env_logger::try_init();
        let config = Config::builder()
            .use_system_roots(false)
            .queue_capacity(capacity)
            .build()
            .unwrap();
        let shared = Shared::default();
        let client = TlsClient::new(Arc::new(config), shared.clone());
        (ConnectionWorker::spawn(client).unwrap(), shared)
    }

    #[test]
    fn call_sees_previous_tasks() {
        let (worker, shared) = worker(4);
        worker
            .call(|c| c.start_handshake(HandshakeOptions::new("example.com")))
            .unwrap()
            .unwrap();

        // Still handshaking, so the write fails and is only logged.
        worker.write(b"early".to_vec()).unwrap();
        let state = worker.call(|c| (c.is_ended(), c.is_handshake_done())).unwrap();
        assert_eq!(state, (false, false));
        assert!(shared.ended.lock().unwrap().is_empty());
        assert!(!shared.written.lock().unwrap().is_empty());
    }

    #[test]
    fn end_drains_and_calls_back_once() {
        let (worker, shared) = worker(1);
        worker
            .call(|c| c.start_handshake(HandshakeOptions::new("example.com")))
            .unwrap()
            .unwrap();
        for _ in 0..8 {
            // Warning alerts are ignored, each one a separate task.
            worker.handle_received_bytes(vec![21, 3, 3, 0, 2, 1, 112]).unwrap();
        }
        let client = worker.end(None).unwrap();
        assert!(client.is_ended());
        assert_eq!(shared.ended.lock().unwrap().clone(), vec![None]);
    }

    #[test]
    fn drop_ends_client() {
        let (worker, shared) = worker(2);
        drop(worker);
        assert_eq!(shared.ended.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_task_does_not_stop_queue() {
        let (worker, shared) = worker(2);
        worker.handle_received_bytes(vec![22, 3, 3, 0, 1, 0]).unwrap();
        let n = worker.call(|c| c.metadata()).unwrap();
        assert_eq!(n, Default::default());
        assert_eq!(shared.ended.lock().unwrap().len(), 1);
    }
}
