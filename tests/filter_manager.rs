// Filter list lifecycle against a fake fetcher and a temporary directory.

mod helpers;

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use dns_control::error_handling::{FetchError, FilterError};
use dns_control::filtering::FilterManager;
use helpers::{filter_content, FakeFetcher};

const LIST_URL: &str = "https://lists.example.test/ads.txt";

fn manager(dir: &std::path::Path, fetcher: &Arc<FakeFetcher>) -> FilterManager {
    FilterManager::new(dir, fetcher.clone())
}

#[tokio::test]
async fn test_add_downloads_and_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 120));
    let filters = manager(tmp.path(), &fetcher);

    let list = filters.add(LIST_URL, None).await.unwrap();
    assert_eq!(list.rules_count, 120);
    assert_eq!(list.name, "Ad servers");
    assert!(list.enabled);
    assert!(list.last_updated.is_some());

    let stored = std::fs::read_to_string(list.content_path(tmp.path())).unwrap();
    assert_eq!(stored, filter_content("Ad servers", 120));
    assert_eq!(filters.lists().await, vec![list]);
}

#[tokio::test]
async fn test_add_name_overrides_title() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 3));
    let filters = manager(tmp.path(), &fetcher);

    let list = filters.add(LIST_URL, Some("  My list ")).await.unwrap();
    assert_eq!(list.name, "My list");
}

#[tokio::test]
async fn test_add_duplicate_is_rejected_without_download() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);

    filters.add(LIST_URL, None).await.unwrap();
    let err = filters.add(&format!(" {LIST_URL} "), None).await.unwrap_err();
    assert!(matches!(err, FilterError::Duplicate(ref url) if url == LIST_URL));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(filters.lists().await.len(), 1);
}

#[tokio::test]
async fn test_add_failures_leave_no_trace() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.fail("https://lists.example.test/gone.txt", 503);
    fetcher.serve("https://lists.example.test/blank.txt", "! only comments\n\n# here\n");
    fetcher.serve(
        "https://lists.example.test/page.html",
        "<!DOCTYPE html><html><body>Not found</body></html>",
    );
    let filters = manager(tmp.path(), &fetcher);

    let err = filters
        .add("https://lists.example.test/gone.txt", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FilterError::Fetch {
            source: FetchError::Status(503),
            ..
        }
    ));

    let err = filters
        .add("https://lists.example.test/blank.txt", None)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::NoRules(_)));

    let err = filters
        .add("https://lists.example.test/page.html", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FilterError::Fetch {
            source: FetchError::NotAFilter,
            ..
        }
    ));

    let err = filters.add("not a url", None).await.unwrap_err();
    assert!(matches!(err, FilterError::InvalidUrl(_)));

    assert!(filters.lists().await.is_empty());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_remove_deletes_content() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);

    let list = filters.add(LIST_URL, None).await.unwrap();
    let path = list.content_path(tmp.path());
    assert!(path.exists());

    assert_eq!(filters.remove(LIST_URL).await.unwrap(), 1);
    assert!(!path.exists());
    assert!(filters.lists().await.is_empty());

    let err = filters.remove(LIST_URL).await.unwrap_err();
    assert!(matches!(err, FilterError::UnknownUrl(_)));
}

#[tokio::test]
async fn test_remove_tolerates_missing_content() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);

    let list = filters.add(LIST_URL, None).await.unwrap();
    std::fs::remove_file(list.content_path(tmp.path())).unwrap();
    assert_eq!(filters.remove(LIST_URL).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_of_same_url_keep_one_list() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = Arc::new(manager(tmp.path(), &fetcher));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let filters = filters.clone();
            tokio::spawn(async move { filters.add(LIST_URL, None).await })
        })
        .collect();

    let mut added = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => added += 1,
            Err(e) => assert!(matches!(e, FilterError::Duplicate(_)), "unexpected error: {e}"),
        }
    }

    assert_eq!(added, 1);
    assert_eq!(filters.lists().await.len(), 1);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_adds_and_removes_match_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    for i in 0..6 {
        fetcher.serve(&url(i), filter_content("Mixed", i + 1));
    }
    let filters = Arc::new(manager(tmp.path(), &fetcher));
    for i in 0..3 {
        filters.add(&url(i), None).await.unwrap();
    }

    // Removes target the pre-added lists, adds target fresh ones
    let mut tasks = Vec::new();
    for i in 0..6 {
        let first = filters.clone();
        tasks.push(tokio::spawn(async move {
            if i < 3 {
                first.remove(&url(i)).await.map(|_| ())
            } else {
                first.add(&url(i), None).await.map(|_| ())
            }
        }));
        let second = filters.clone();
        tasks.push(tokio::spawn(async move {
            second.add(&url(i), None).await.map(|_| ())
        }));
    }
    for task in tasks {
        let _ = task.await.unwrap();
    }

    let lists = filters.lists().await;
    let ids: BTreeSet<i64> = lists.iter().map(|l| l.id).collect();
    assert_eq!(ids.len(), lists.len());
    let urls: BTreeSet<&str> = lists.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls.len(), lists.len());

    let expected: BTreeSet<std::path::PathBuf> =
        lists.iter().map(|l| l.content_path(tmp.path())).collect();
    let on_disk: BTreeSet<std::path::PathBuf> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(on_disk, expected);

    for list in &lists {
        let stored = std::fs::read_to_string(list.content_path(tmp.path())).unwrap();
        assert_eq!(stored.lines().filter(|l| l.starts_with("||")).count(), list.rules_count);
    }
}

#[tokio::test]
async fn test_enable_and_disable() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);
    filters.add(LIST_URL, None).await.unwrap();

    assert_eq!(filters.disable(LIST_URL).await.unwrap(), 1);
    assert!(!filters.lists().await[0].enabled);

    assert_eq!(filters.enable(LIST_URL).await.unwrap(), 1);
    assert!(filters.lists().await[0].enabled);
    // Fresh lists are not downloaded again
    assert_eq!(fetcher.calls(), 1);

    assert!(matches!(
        filters.disable("https://lists.example.test/other.txt").await,
        Err(FilterError::UnknownUrl(_))
    ));
}

#[tokio::test]
async fn test_refresh_detects_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);
    let list = filters.add(LIST_URL, None).await.unwrap();

    // Just downloaded, so only a forced refresh fetches it
    assert_eq!(filters.refresh(false).await, 0);
    assert_eq!(fetcher.calls(), 1);

    // Same content
    assert_eq!(filters.refresh(true).await, 0);
    assert_eq!(fetcher.calls(), 2);

    fetcher.serve(LIST_URL, filter_content("Ad servers", 8));
    assert_eq!(filters.refresh(true).await, 1);
    assert_eq!(filters.lists().await[0].rules_count, 8);
    let stored = std::fs::read_to_string(list.content_path(tmp.path())).unwrap();
    assert_eq!(stored, filter_content("Ad servers", 8));
}

#[tokio::test]
async fn test_refresh_keeps_content_on_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);
    let list = filters.add(LIST_URL, None).await.unwrap();

    fetcher.serve(LIST_URL, "! emptied\n");
    assert_eq!(filters.refresh(true).await, 0);
    fetcher.fail(LIST_URL, 500);
    assert_eq!(filters.refresh(true).await, 0);

    assert_eq!(filters.lists().await[0].rules_count, 5);
    let stored = std::fs::read_to_string(list.content_path(tmp.path())).unwrap();
    assert_eq!(stored, filter_content("Ad servers", 5));
}

#[tokio::test]
async fn test_refresh_skips_disabled_lists() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 5));
    let filters = manager(tmp.path(), &fetcher);
    filters.add(LIST_URL, None).await.unwrap();
    filters.disable(LIST_URL).await.unwrap();

    fetcher.serve(LIST_URL, filter_content("Ad servers", 9));
    assert_eq!(filters.refresh(true).await, 0);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_load_recomputes_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new();
    fetcher.serve(LIST_URL, filter_content("Ad servers", 7));
    fetcher.serve("https://lists.example.test/b.txt", filter_content("B", 2));

    let filters = manager(tmp.path(), &fetcher);
    filters.add(LIST_URL, None).await.unwrap();
    let b = filters
        .add("https://lists.example.test/b.txt", None)
        .await
        .unwrap();
    std::fs::remove_file(b.content_path(tmp.path())).unwrap();

    // Lists come back from the persisted configuration without their rule counts
    let json = serde_json::to_string(&filters.lists().await).unwrap();
    let mut persisted: Vec<dns_control::filtering::FilterList> =
        serde_json::from_str(&json).unwrap();
    for list in &mut persisted {
        list.rules_count = 0;
    }

    let reloaded = FilterManager::load(tmp.path(), fetcher.clone(), persisted).await;
    let lists = reloaded.lists().await;
    assert_eq!(lists[0].rules_count, 7);
    assert_eq!(lists[1].rules_count, 0);
    assert!(lists[1].last_updated.is_none());

    // The list without content is fetched again on the next refresh
    assert_eq!(reloaded.refresh(false).await, 1);
    assert_eq!(reloaded.lists().await[1].rules_count, 2);

    // New IDs continue after the loaded ones
    fetcher.serve("https://lists.example.test/c.txt", filter_content("C", 1));
    let c = reloaded
        .add("https://lists.example.test/c.txt", None)
        .await
        .unwrap();
    assert!(lists.iter().all(|l| l.id < c.id));
}

#[tokio::test]
async fn test_user_rules_split_per_line() {
    let tmp = tempfile::tempdir().unwrap();
    let filters = manager(tmp.path(), &FakeFetcher::new());
    filters
        .set_user_rules("||tracker.example.test^\r\n@@||ok.example.test^")
        .await;
    assert_eq!(
        filters.user_rules().await,
        vec!["||tracker.example.test^", "@@||ok.example.test^"]
    );
    assert!(filters.filtering_enabled());
    filters.set_filtering_enabled(false);
    assert!(!filters.status().await.enabled);
}

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![(0..4usize).prop_map(Op::Add), (0..4usize).prop_map(Op::Remove)]
}

fn url(i: usize) -> String {
    format!("https://lists.example.test/{i}.txt")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_add_remove_matches_model(ops in proptest::collection::vec(op(), 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let tmp = tempfile::tempdir().unwrap();
            let fetcher = FakeFetcher::new();
            for i in 0..4 {
                fetcher.serve(&url(i), filter_content("Prop", i + 1));
            }
            let filters = manager(tmp.path(), &fetcher);
            let mut model = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Add(i) => {
                        let result = filters.add(&url(i), None).await;
                        assert_eq!(result.is_ok(), model.insert(i));
                    }
                    Op::Remove(i) => {
                        let result = filters.remove(&url(i)).await;
                        assert_eq!(result.is_ok(), model.remove(&i));
                    }
                }
            }

            let lists = filters.lists().await;
            let urls: BTreeSet<String> = lists.iter().map(|l| l.url.clone()).collect();
            let expected: BTreeSet<String> = model.iter().map(|&i| url(i)).collect();
            assert_eq!(urls, expected);
            // One content file per managed list
            assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), lists.len());
        });
    }
}
