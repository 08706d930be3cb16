use std::path::Path;

use vguard_media::{check_ffmpeg, check_ffprobe};
use vguard_moderation::{ContentClassifier, ModerationConfig};
use vguard_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = WorkerConfig::from_env();

    println!(
        "vguard-selfcheck: starting with work_dir={} derived_dir={}",
        config.work_dir.display(),
        config.derived_dir.display()
    );
    ensure_writable(&config.work_dir).await?;
    ensure_writable(&config.derived_dir).await?;

    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!("vguard-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    let classifier = ContentClassifier::from_config(&ModerationConfig::from_env());
    match classifier.backend_name() {
        Some(name) => println!("vguard-selfcheck: classification backend {}", name),
        None => println!("vguard-selfcheck: no classification backend, every job will be flagged for review"),
    }

    println!("vguard-selfcheck: ok");
    Ok(())
}

async fn ensure_writable(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", dir.display(), e))?;

    let probe = dir.join(".vguard-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("{} is not writable: {}", dir.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}
