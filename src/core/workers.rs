//! Thread pool that runs tile fetches off the host thread.
//!
//! Uses work-stealing deques: new jobs go to a global injector every worker
//! polls, idle workers steal from each other.
//!
//! Jobs may be tagged with a generation (the load id of the session that
//! asked for them). Bumping the generation makes every queued job of an
//! older session a no-op when a worker picks it up.

use crossbeam::deque::{Injector, Worker};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    generation: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one)
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let locals: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<_> = locals.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::new();

        for (worker_id, local) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let spawned = thread::Builder::new()
                .name(format!("wxloop-fetch-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        if let Some(job) = local.pop() {
                            job();
                            continue;
                        }
                        if let Some(job) = injector.steal_batch_and_pop(&local).success() {
                            job();
                            continue;
                        }
                        if let Some(job) = stealers.iter().find_map(|s| s.steal().success()) {
                            job();
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(1));
                    }
                    trace!("Worker {} stopped", worker_id);
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("Failed to spawn fetch worker {}: {}", worker_id, e),
            }
        }

        trace!("Workers initialized: {} threads", handles.len());
        Self {
            injector,
            handles,
            generation: Arc::new(AtomicU64::new(0)),
            shutdown,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Raise the current generation. Lower values are ignored.
    pub fn advance_generation(&self, generation: u64) {
        let prev = self.generation.fetch_max(generation, Ordering::Relaxed);
        if generation > prev {
            trace!("Workers: generation {} -> {}", prev, generation);
        }
    }

    /// Run `f` only if `generation` is still current when a worker gets to it
    pub fn execute_for<F>(&self, generation: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current = Arc::clone(&self.generation);
        self.injector.push(Box::new(move || {
            if current.load(Ordering::Relaxed) == generation {
                f();
            }
        }));
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        // Threads still busy past the deadline die with the process
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Workers: shutdown timeout");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn wait_for(counter: &AtomicUsize, n: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if counter.load(Ordering::SeqCst) >= n {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_runs_jobs() {
        let workers = Workers::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let done = Arc::clone(&done);
            workers.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(wait_for(&done, 10));
    }

    #[test]
    fn test_stale_generation_skipped() {
        let workers = Workers::new(1);
        workers.advance_generation(5);
        let done = Arc::new(AtomicUsize::new(0));

        let d = Arc::clone(&done);
        workers.execute_for(4, move || {
            d.fetch_add(100, Ordering::SeqCst);
        });
        let d = Arc::clone(&done);
        workers.execute_for(5, move || {
            d.fetch_add(1, Ordering::SeqCst);
        });
        assert!(wait_for(&done, 1));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(done.load(Ordering::SeqCst), 1);

        workers.advance_generation(3);
        assert_eq!(workers.generation(), 5);
    }
}
