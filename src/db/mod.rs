use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{AttemptRecord, BestEntry, Bird};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u32) -> i64 {
    i64::from(value)
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("value {value} out of range"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

/// Single SQLite connection owned by a dedicated worker thread. Callers
/// submit closures and await the reply, so all database access stays off
/// the session task and is serialized.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("birdquiz-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_bird(&self, bird: &Bird) -> Result<()> {
        let record = bird.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO birds (name, image_location, category)
                 VALUES (?1, ?2, ?3)",
                params![record.name, record.image_ref, record.category],
            )
            .with_context(|| "failed to insert bird")?;
            Ok(())
        })
        .await
    }

    pub async fn list_birds(&self, category: &str) -> Result<Vec<Bird>> {
        let category = category.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT name, image_location, category
                 FROM birds
                 WHERE category = ?1",
            )?;

            let mut rows = stmt.query(params![category])?;
            let mut birds = Vec::new();
            while let Some(row) = rows.next()? {
                birds.push(Bird {
                    name: row.get(0)?,
                    image_ref: row.get(1)?,
                    category: row.get(2)?,
                });
            }

            Ok(birds)
        })
        .await
    }

    pub async fn list_categories(&self) -> Result<Vec<String>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT category FROM birds ORDER BY category")?;

            let mut rows = stmt.query([])?;
            let mut categories = Vec::new();
            while let Some(row) = rows.next()? {
                categories.push(row.get(0)?);
            }

            Ok(categories)
        })
        .await
    }

    pub async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        let record = attempt.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO quiz_attempts
                     (id, first_name, email, category, score, total_questions,
                      duration_seconds, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.first_name,
                    record.email,
                    record.category,
                    to_i64(record.score),
                    to_i64(record.total_questions),
                    to_i64(record.duration_seconds),
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert quiz attempt")?;
            Ok(())
        })
        .await
    }

    /// Best attempt for a category: highest score, ties broken by the
    /// faster run.
    pub async fn best_attempt(&self, category: &str) -> Result<Option<BestEntry>> {
        let category = category.to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT score, total_questions, duration_seconds
                     FROM quiz_attempts
                     WHERE category = ?1
                     ORDER BY score DESC, duration_seconds ASC, created_at ASC
                     LIMIT 1",
                    params![category],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()
                .with_context(|| "failed to query best attempt")?;

            row.map(|(score, total, duration)| {
                Ok(BestEntry {
                    score: to_u32(score)?,
                    total: to_u32(total)?,
                    duration_seconds: to_u32(duration)?,
                })
            })
            .transpose()
        })
        .await
    }

    pub async fn list_attempts(&self, category: &str) -> Result<Vec<AttemptRecord>> {
        let category = category.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, first_name, email, category, score, total_questions,
                        duration_seconds, created_at
                 FROM quiz_attempts
                 WHERE category = ?1
                 ORDER BY created_at DESC",
            )?;

            let mut rows = stmt.query(params![category])?;
            let mut attempts = Vec::new();
            while let Some(row) = rows.next()? {
                attempts.push(AttemptRecord {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    email: row.get(2)?,
                    category: row.get(3)?,
                    score: to_u32(row.get::<_, i64>(4)?)?,
                    total_questions: to_u32(row.get::<_, i64>(5)?)?,
                    duration_seconds: to_u32(row.get::<_, i64>(6)?)?,
                    created_at: parse_datetime(&row.get::<_, String>(7)?)?,
                });
            }

            Ok(attempts)
        })
        .await
    }
}
