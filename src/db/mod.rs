//! Durable partition engine.
//!
//! One SQLite connection lives on its own thread. Callers ship closures to it
//! and await the result on a oneshot channel; the connection itself never
//! leaves the thread.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod migrations;
pub mod repositories;

use migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Owns the connection thread; stopping it drains queued jobs first.
struct DurableWorker {
    jobs: Mutex<mpsc::Sender<Message>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DurableWorker {
    fn submit(&self, job: Job) -> Result<()> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(Message::Run(job))
            .map_err(|_| anyhow!("durable store thread is gone"))
    }
}

impl Drop for DurableWorker {
    fn drop(&mut self) {
        let Some(handle) = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let stop = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(Message::Stop);
        if stop.is_err() {
            warn!("durable store thread exited before shutdown");
        }
        if let Err(panic) = handle.join() {
            error!("durable store thread panicked: {panic:?}");
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("could not open durable store {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("WAL journal unavailable, keeping default journal: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("could not set busy timeout")?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

fn serve(mut conn: Connection, inbox: mpsc::Receiver<Message>) {
    for message in inbox {
        match message {
            Message::Run(job) => job(&mut conn),
            Message::Stop => break,
        }
    }
    info!("durable store thread stopped");
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<DurableWorker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the store at `path` and migrates it before
    /// returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }

        let (jobs, inbox) = mpsc::channel();
        let (opened_tx, opened_rx) = mpsc::channel();
        let thread_path = path.clone();
        let thread = thread::Builder::new()
            .name("docuflow-durable".into())
            .spawn(move || match open_connection(&thread_path) {
                Ok(conn) => {
                    if opened_tx.send(Ok(())).is_ok() {
                        serve(conn, inbox);
                    }
                }
                Err(err) => {
                    let _ = opened_tx.send(Err(err));
                }
            })
            .context("could not spawn durable store thread")?;

        opened_rx
            .recv()
            .context("durable store thread died during startup")??;
        info!("durable store ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(DurableWorker {
                jobs: Mutex::new(jobs),
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `task` on the connection thread and hands back its result.
    pub async fn with_connection<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.worker.submit(Box::new(move |conn| {
            let _ = reply.send(task(conn));
        }))?;
        result
            .await
            .map_err(|_| anyhow!("durable store thread dropped the request"))?
    }
}
