//! Follow one or more jobs until they finish.
//!
//! Usage: `vguard-watch <job-id>...` with `VGUARD_API_URL`, `VGUARD_WS_URL`
//! and `VGUARD_ORG_ID` taken from the environment.

use futures_util::future::join_all;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vguard_client::{ConsumerConfig, JobWatch, ProgressConsumer};
use vguard_models::JobId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let job_ids: Vec<JobId> = std::env::args().skip(1).map(JobId::from_string).collect();
    if job_ids.is_empty() {
        anyhow::bail!("usage: vguard-watch <job-id>...");
    }

    let consumer = ProgressConsumer::from_config(ConsumerConfig::from_env())?;
    let mut watches = Vec::with_capacity(job_ids.len());
    for job_id in job_ids {
        watches.push(consumer.watch(job_id).await);
    }

    let results = join_all(watches.into_iter().map(follow)).await;
    consumer.shutdown().await;

    for result in results {
        result?;
    }
    Ok(())
}

async fn follow(mut watch: JobWatch) -> anyhow::Result<()> {
    loop {
        let view = watch.changed().await?;
        info!(
            job_id = %view.job_id,
            phase = %view.phase,
            progress = view.progress,
            frames = view.frames.len(),
            "{}",
            view.display_status.as_deref().unwrap_or(view.phase.as_str())
        );

        if view.is_terminal() {
            if let Some(verdict) = &view.verdict {
                info!(
                    job_id = %view.job_id,
                    status = verdict.status.as_str(),
                    confidence = verdict.confidence,
                    "Verdict: {}",
                    verdict.reasons.join("; ")
                );
            }
            return Ok(());
        }
    }
}
