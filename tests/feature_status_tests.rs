mod test_harness;

use spice_lite::config::WorkspaceConfig;
use spice_lite::scheduler::JobStatus;
use spice_lite::Workspace;
use tempfile::TempDir;
use test_harness::{move_job, place_job, TestWorkspace};

const FEATEXT: &str = "featext -r /fe --protein_features";

#[tokio::test]
async fn test_newer_done_overrides_older_error() {
    let tw = TestWorkspace::new();
    let handle = tw.project("p").await;
    let paths = handle.paths();
    place_job(paths, JobStatus::Error, "20230101_000000_000", &format!("{FEATEXT} aac"));
    place_job(paths, JobStatus::Done, "20230102_000000_000", &format!("{FEATEXT} aac"));

    assert_eq!(handle.feature_status().await.status("aac"), Some(JobStatus::Done));
}

#[tokio::test]
async fn test_newer_error_overrides_older_done() {
    let tw = TestWorkspace::new();
    let handle = tw.project("p").await;
    let paths = handle.paths();
    place_job(paths, JobStatus::Done, "20230101_000000_000", &format!("{FEATEXT} aac"));
    place_job(paths, JobStatus::Error, "20230102_000000_000", &format!("{FEATEXT} aac"));

    assert_eq!(handle.feature_status().await.status("aac"), Some(JobStatus::Error));
}

#[tokio::test]
async fn test_categories_from_multiple_jobs() {
    let tw = TestWorkspace::new();
    let handle = tw.project("p").await;
    let paths = handle.paths();
    place_job(paths, JobStatus::Done, "20230101_000000_000", &format!("{FEATEXT} aac dc"));
    place_job(paths, JobStatus::Running, "20230102_000000_000", &format!("{FEATEXT} dc ss"));
    place_job(paths, JobStatus::Waiting, "20230103_000000_000", "classification -c lda --features aac");

    let status = handle.feature_status().await;
    assert_eq!(status.len(), 3);
    assert_eq!(status.status("aac"), Some(JobStatus::Done));
    assert_eq!(status.status("dc"), Some(JobStatus::Running));
    assert_eq!(status.status("ss"), Some(JobStatus::Running));
    assert_eq!(status.categories_with(JobStatus::Running), vec!["dc", "ss"]);
}

#[tokio::test]
async fn test_enqueued_categories_follow_worker() {
    let tw = TestWorkspace::new();
    let handle = tw.project("p").await;

    let id = handle
        .jobs()
        .enqueue_feature_extraction(&["aac".to_string(), "sse".to_string()])
        .await
        .unwrap();
    assert_eq!(
        handle.feature_status().await.categories_with(JobStatus::Waiting),
        vec!["aac", "sse"]
    );

    move_job(handle.paths(), &id, JobStatus::Waiting, JobStatus::Error);
    let status = handle.feature_status().await;
    assert_eq!(status.status("aac"), Some(JobStatus::Error));
    assert_eq!(status.status("sse"), Some(JobStatus::Error));
}

#[tokio::test]
async fn test_empty_project_has_no_categories() {
    let tw = TestWorkspace::new();
    let handle = tw.project("p").await;
    assert!(handle.feature_status().await.is_empty());
}

#[tokio::test]
async fn test_path_style_feature_program_is_tracked() {
    let dir = TempDir::new().unwrap();
    let config = WorkspaceConfig::new(dir.path()).with_feature_program("/opt/spica/featext.py");
    let ws = Workspace::new(config).unwrap();
    let handle = ws.create_project("alice", "p").await.unwrap();

    handle
        .jobs()
        .enqueue_feature_extraction(&["aac".to_string()])
        .await
        .unwrap();

    assert_eq!(handle.jobs().list_jobs("featext").await.len(), 1);
    let status = handle.feature_status().await;
    assert_eq!(status.len(), 1);
    assert_eq!(status.status("aac"), Some(JobStatus::Waiting));
}
