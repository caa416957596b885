//! Worker pool example exercising the tracer.
//!
//! Spawns a small thread pool, pushes arithmetic and greeting tasks through
//! it, and writes a Chrome trace viewer file covering the run. Open the
//! output in chrome://tracing or Perfetto to see one timed slice per task
//! spread across the worker threads.

use clap::Parser;
use scopetrace::{trace_scope, Phase};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "worker_pool")]
#[command(about = "Worker pool example writing a chrome trace file")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "trace.json",
        help = "output file for trace data"
    )]
    output: String,

    #[arg(short, long, default_value_t = 3, help = "number of worker threads")]
    workers: usize,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

struct WorkerPool {
    sender: Option<mpsc::Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || worker_loop(receiver))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    fn submit(&self, task: Task) {
        self.sender
            .as_ref()
            .expect("pool is shutting down")
            .send(task)
            .expect("worker threads are gone");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = receiver.lock().expect("receiver lock poisoned").recv();
        match task {
            Ok(task) => task(),
            // channel closed: pool is shutting down
            Err(_) => break,
        }
    }
}

fn compute_sum(start: i64, end: i64) -> i64 {
    trace_scope!("app", "compute_sum");
    let sum: i64 = (start..=end).sum();
    debug!(start, end, sum, "computed range sum");
    sum
}

fn greet(task_id: usize) {
    trace_scope!("app", "greet");
    info!(task_id, "hello from the pool");
}

fn run_tasks(pool: &WorkerPool) {
    scopetrace::log_event("PERF", "run_tasks", Phase::Begin);
    for i in 0..5i64 {
        pool.submit(Box::new(move || {
            compute_sum(i * 10, (i + 1) * 10 - 1);
        }));
    }
    for i in 0..5usize {
        pool.submit(Box::new(move || greet(i)));
    }
    scopetrace::log_event("PERF", "run_tasks", Phase::End);
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    scopetrace::start_session(&args.output)?;
    info!(output = %args.output, "trace session started");

    {
        let pool = WorkerPool::new(args.workers);
        run_tasks(&pool);
        // pool drop joins the workers, so every task finishes before stop
    }

    scopetrace::stop_session()?;
    info!(output = %args.output, "trace written");
    Ok(())
}
