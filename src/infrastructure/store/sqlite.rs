//! SQLite 存储实现
//!
//! 每个集合一张表：检索用的键单独成列，完整文档以 JSON 存在 `doc` 列

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::store::Store;
use crate::domain::{
    AnalysisRecord, ContentRecord, DiscordMessage, HarvestJob, JobOutcome, JobStatus, Snowflake,
};

/// 定长 RFC3339（微秒、Z 结尾），保证按字符串比较即按时间比较
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode<T: DeserializeOwned>(doc: &str) -> Result<T> {
    serde_json::from_str(doc).context("corrupted document in store")
}

/// SQLite 存储
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 创建新的 SQLite 存储
    ///
    /// 如果数据库文件不存在，会自动创建（包括父目录）
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// 创建内存数据库（用于测试）
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// 初始化数据库表结构
    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS discord_harvest_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS discord_messages (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis_results (
                id TEXT PRIMARY KEY,
                creator_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summary_results (
                id TEXT PRIMARY KEY,
                source_analysis_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                doc TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON discord_harvest_jobs(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_channel ON discord_messages(channel_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_summary_source ON summary_results(source_analysis_id);
            ",
        )?;

        Ok(())
    }

    /// 在阻塞线程池中执行数据库操作
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Task failed: {}", e))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_harvest_job(&self, job: &HarvestJob) -> Result<String> {
        let job = job.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO discord_harvest_jobs (id, status, created_at, doc) VALUES (?1, ?2, ?3, ?4)",
                params![
                    &job.id,
                    job.status.as_str(),
                    ts(&job.created_at),
                    serde_json::to_string(&job)?,
                ],
            )?;
            Ok(job.id)
        })
        .await
    }

    async fn get_harvest_job(&self, job_id: &str) -> Result<Option<HarvestJob>> {
        let job_id = job_id.to_string();
        self.execute(move |conn| {
            let doc: Option<String> = conn
                .query_row(
                    "SELECT doc FROM discord_harvest_jobs WHERE id = ?1",
                    params![job_id],
                    |row| row.get(0),
                )
                .optional()?;
            doc.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn claim_next_pending_job(&self) -> Result<Option<HarvestJob>> {
        self.execute(|conn| {
            let tx = conn.transaction()?;
            let doc: Option<String> = tx
                .query_row(
                    "SELECT doc FROM discord_harvest_jobs
                     WHERE status = ?1
                     ORDER BY created_at ASC
                     LIMIT 1",
                    params![JobStatus::Pending.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(doc) = doc else {
                return Ok(None);
            };

            let mut job: HarvestJob = decode(&doc)?;
            job.status = JobStatus::Running;
            tx.execute(
                "UPDATE discord_harvest_jobs SET status = ?1, doc = ?2 WHERE id = ?3",
                params![job.status.as_str(), serde_json::to_string(&job)?, &job.id],
            )?;
            tx.commit()?;
            Ok(Some(job))
        })
        .await
    }

    async fn finish_harvest_job(&self, job_id: &str, outcome: JobOutcome) -> Result<()> {
        let job_id = job_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let doc: String = tx
                .query_row(
                    "SELECT doc FROM discord_harvest_jobs WHERE id = ?1",
                    params![&job_id],
                    |row| row.get(0),
                )
                .optional()?
                .with_context(|| format!("harvest job {} not found", job_id))?;

            let mut job: HarvestJob = decode(&doc)?;
            job.finish(outcome);
            tx.execute(
                "UPDATE discord_harvest_jobs SET status = ?1, doc = ?2 WHERE id = ?3",
                params![job.status.as_str(), serde_json::to_string(&job)?, &job_id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn save_messages_if_new(&self, messages: &[DiscordMessage]) -> Result<u64> {
        let messages = messages.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0u64;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO discord_messages (id, channel_id, created_at, doc)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for msg in &messages {
                    inserted += stmt.execute(params![
                        msg.id.to_string(),
                        msg.channel_id.to_string(),
                        ts(&msg.created_at_by_discord),
                        serde_json::to_string(msg)?,
                    ])? as u64;
                }
            }
            tx.commit()?;
            debug!(received = messages.len(), inserted, "messages saved");
            Ok(inserted)
        })
        .await
    }

    async fn harvested_channels(&self, channel_ids: &[Snowflake]) -> Result<HashSet<Snowflake>> {
        if channel_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<String> = channel_ids.iter().map(|id| id.to_string()).collect();
        self.execute(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT DISTINCT channel_id FROM discord_messages WHERE channel_id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                row.get::<_, String>(0)
            })?;

            let mut found = HashSet::new();
            for row in rows {
                let id = row?;
                found.insert(id.parse().with_context(|| format!("bad channel id {}", id))?);
            }
            Ok(found)
        })
        .await
    }

    async fn messages_in_range(
        &self,
        channel_id: Snowflake,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DiscordMessage>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT doc FROM discord_messages
                 WHERE channel_id = ?1 AND created_at >= ?2 AND created_at <= ?3
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(
                params![channel_id.to_string(), ts(&from), ts(&to)],
                |row| row.get::<_, String>(0),
            )?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(decode(&row?)?);
            }
            Ok(messages)
        })
        .await
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<String> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO analysis_results (id, creator_id, created_at, doc) VALUES (?1, ?2, ?3, ?4)",
                params![
                    &record.id,
                    record.creator_id,
                    ts(&record.created_at),
                    serde_json::to_string(&record)?,
                ],
            )?;
            Ok(record.id)
        })
        .await
    }

    async fn get_analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>> {
        let analysis_id = analysis_id.to_string();
        self.execute(move |conn| {
            let doc: Option<String> = conn
                .query_row(
                    "SELECT doc FROM analysis_results WHERE id = ?1",
                    params![analysis_id],
                    |row| row.get(0),
                )
                .optional()?;
            doc.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn insert_content(&self, record: &ContentRecord) -> Result<String> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO summary_results (id, source_analysis_id, created_at, doc) VALUES (?1, ?2, ?3, ?4)",
                params![
                    &record.id,
                    &record.source_analysis_id,
                    ts(&record.created_at),
                    serde_json::to_string(&record)?,
                ],
            )?;
            Ok(record.id)
        })
        .await
    }
}
