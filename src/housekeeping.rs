//! Periodic removal of stale plan artifacts and expired plan records

use crate::lifecycle::is_artifact_name;
use crate::store::PlanStore;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn a task deleting artifacts older than `max_age` every `interval`
///
/// The task stops when `cancel` fires.
pub fn spawn_artifact_cleanup(
    dir: PathBuf,
    interval: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    info!(
        "Artifact cleanup enabled for {} (every {:?}, max age {:?})",
        dir.display(),
        interval,
        max_age
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Artifact cleanup stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match remove_stale_artifacts(&dir, max_age).await {
                        Ok(0) => {}
                        Ok(removed) => info!("Removed {} stale artifact(s)", removed),
                        Err(e) => warn!("Artifact cleanup failed: {}", e),
                    }
                }
            }
        }
    })
}

/// Spawn a task sweeping expired records out of `store` every `interval`
///
/// The task stops when `cancel` fires.
pub fn spawn_plan_purge(
    store: Arc<dyn PlanStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    info!("Expired plan purge enabled (every {:?})", interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Plan purge stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match store.purge_expired(Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => info!("Purged {} expired plan(s)", removed),
                        Err(e) => warn!("Plan purge failed: {:#}", e),
                    }
                }
            }
        }
    })
}

/// Delete plan artifacts in `dir` last modified more than `max_age` ago
///
/// Returns the number of files removed. A missing directory counts as empty.
pub async fn remove_stale_artifacts(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !is_artifact_name(&name.to_string_lossy()) {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("Removed stale artifact {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove {}: {}", entry.path().display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_removes_only_old_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plan_1_1000.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("plan_1_1000.md"), "# plan").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "other").unwrap();

        // Nothing is older than an hour
        assert_eq!(remove_stale_artifacts(dir.path(), Duration::from_secs(3600)).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let removed = remove_stale_artifacts(dir.path(), Duration::from_millis(10)).await.unwrap();
        assert_eq!(removed, 2);
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join("plan_1_1000.md").exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert_eq!(remove_stale_artifacts(&missing, Duration::ZERO).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_plan_purge_task_removes_expired_records() {
        use crate::models::{PlanArtifacts, PlanQuery, PlanRecord, TravelPlan, WeatherDay};
        use crate::store::InMemoryPlanStore;

        let store = Arc::new(InMemoryPlanStore::new());
        let now = Utc::now();
        let query = PlanQuery::new("上海", "虹桥", "外滩", "");
        let plan = TravelPlan {
            city: query.city.clone(),
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            weather_list: vec![WeatherDay::placeholder()],
            route_options: Default::default(),
            tickets: vec![],
        };
        let artifacts = PlanArtifacts {
            html_path: "plan_1_1000.html".to_string(),
            markdown_path: "plan_1_1000.md".to_string(),
            h5_url: String::new(),
            markdown_url: String::new(),
            download_url: String::new(),
        };
        let expired = PlanRecord::new(
            "stale",
            1,
            &query,
            plan,
            artifacts,
            now - chrono::Duration::hours(2),
            now - chrono::Duration::hours(1),
        );
        store.save_or_update(expired).await.unwrap();
        assert_eq!(store.len().await, 1);

        let cancel = CancellationToken::new();
        let handle = spawn_plan_purge(store.clone(), Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let handle = spawn_artifact_cleanup(
            dir.path().to_path_buf(),
            Duration::from_millis(10),
            Duration::from_secs(60),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
