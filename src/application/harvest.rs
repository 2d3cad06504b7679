//! 采集任务后台处理
//!
//! 轮询待处理任务，逐频道拉取消息并去重入库

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::core::collector::Collector;
use crate::core::store::Store;
use crate::domain::{HarvestJob, JobOutcome};
use crate::infrastructure::logger::Timer;

pub struct HarvestWorker {
    store: Arc<dyn Store>,
    collector: Arc<dyn Collector>,
    poll_interval: Duration,
}

impl HarvestWorker {
    pub fn new(store: Arc<dyn Store>, collector: Arc<dyn Collector>, poll_interval: Duration) -> Self {
        Self {
            store,
            collector,
            poll_interval,
        }
    }

    /// 持续处理任务；队列为空时按轮询间隔休眠
    pub async fn run(self) {
        info!(
            poll_secs = self.poll_interval.as_secs(),
            "harvest worker started"
        );

        loop {
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!("harvest worker iteration failed: {:#}", e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 处理一个任务；没有待处理任务时返回 `None`
    pub async fn run_once(&self) -> Result<Option<JobOutcome>> {
        let Some(job) = self.store.claim_next_pending_job().await? else {
            return Ok(None);
        };

        info!(
            job_id = %job.id,
            server_id = job.server_id,
            channels = job.channels.len(),
            "harvest job claimed"
        );
        let _timer = Timer::new("harvest.job").with_subject(job.id.clone());

        let outcome = match self.harvest(&job).await {
            Ok(inserted) => {
                info!(job_id = %job.id, inserted, "harvest job done");
                JobOutcome::Done { inserted }
            }
            Err(e) => {
                error!(job_id = %job.id, "harvest job failed: {:#}", e);
                JobOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        };

        self.store.finish_harvest_job(&job.id, outcome.clone()).await?;
        Ok(Some(outcome))
    }

    async fn harvest(&self, job: &HarvestJob) -> Result<u64> {
        let mut inserted = 0;

        for &channel_id in &job.channels {
            let channel = match self.collector.channel(channel_id).await {
                Ok(Some(channel)) if channel.is_text() => channel,
                Ok(Some(channel)) => {
                    warn!(channel_id, kind = channel.kind, "skipping non-text channel");
                    continue;
                }
                Ok(None) => {
                    warn!(channel_id, "channel not found or not readable, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(channel_id, "failed to load channel, skipping: {:#}", e);
                    continue;
                }
            };

            let mut messages = self
                .collector
                .fetch_messages(&channel, job.after.as_deref(), job.before.as_deref())
                .await?;
            for msg in messages.iter_mut().filter(|m| m.server_id.is_none()) {
                msg.server_id = Some(job.server_id);
            }

            let saved = self.store.save_messages_if_new(&messages).await?;
            info!(
                channel_id,
                fetched = messages.len(),
                inserted = saved,
                "channel harvested"
            );
            inserted += saved;
        }

        Ok(inserted)
    }
}
