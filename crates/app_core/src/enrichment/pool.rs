//! Fixed-size worker pool with a purgeable queue

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    /// Kept to drain jobs that no worker has picked up yet
    receiver: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(name: &str, threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads.max(1));

        for i in 0..threads.max(1) {
            let rx = receiver.clone();
            let pool = name.to_string();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    for job in rx.iter() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::error!(pool = %pool, "Worker job panicked");
                        }
                    }
                })?;
            workers.push(handle);
        }

        tracing::debug!(pool = name, threads = workers.len(), "Worker pool started");
        Ok(Self {
            name: name.to_string(),
            sender: Some(sender),
            receiver,
            workers,
        })
    }

    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Drop every queued job that has not started. Returns how many.
    pub fn purge(&self) -> usize {
        let purged = self.receiver.try_iter().count();
        if purged > 0 {
            tracing::debug!(pool = %self.name, purged, "Queued jobs purged");
        }
        purged
    }

    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.purge();
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_purge_drops_queued_jobs_only() {
        let pool = WorkerPool::new("test", 1).unwrap();
        let (started_tx, started_rx) = bounded::<()>(1);
        let (release_tx, release_rx) = bounded::<()>(1);
        let ran = Arc::new(AtomicUsize::new(0));

        let r = ran.clone();
        pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            r.fetch_add(1, Ordering::SeqCst);
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        for _ in 0..3 {
            let r = ran.clone();
            pool.submit(move || {
                r.fetch_add(10, Ordering::SeqCst);
            });
        }
        assert_eq!(pool.queued(), 3);
        assert_eq!(pool.purge(), 3);

        let (done_tx, done_rx) = bounded::<()>(1);
        pool.submit(move || done_tx.send(()).unwrap());
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new("panic", 1).unwrap();
        pool.submit(|| panic!("boom"));
        let (tx, rx) = bounded::<()>(1);
        pool.submit(move || tx.send(()).unwrap());
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
