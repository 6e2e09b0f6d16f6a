//! Integration tests for the archiver
//!
//! These tests drive full runs against a scripted in-memory browser and a
//! manual clock, so no real browser or real delays are involved.

use forum_archiver::browser::scripted::ScriptedBrowser;
use forum_archiver::browser::BrowserError;
use forum_archiver::config::Config;
use forum_archiver::context::ManualClock;
use forum_archiver::crawler::RunSummary;
use forum_archiver::ledger::Ledger;
use forum_archiver::{Archiver, JobSpec, ProfileJob, RunContext, UrlListJob, UrlListMode};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const BASE: &str = "https://www.thetechgame.com/";
const POSTS_ROOT: &str = "https://www.thetechgame.com/Forums/search/search_author=bob.html";
const TOPICS_ROOT: &str =
    "https://www.thetechgame.com/Forums/search/search_id=startedtopics/user=bob.html";

fn create_test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.directory = output_dir.to_path_buf();
    config
}

fn test_context(clock: &Arc<ManualClock>) -> RunContext {
    RunContext::new().with_clock(clock.clone())
}

fn posts_only_job() -> ProfileJob {
    ProfileJob {
        username: "bob".to_string(),
        include_profile: false,
        topics_live: false,
        topics_arch: false,
        posts_live: true,
        posts_arch: false,
        posts_only: false,
        pause_for_login: false,
    }
}

fn search_page(n: u32) -> String {
    if n == 1 {
        POSTS_ROOT.to_string()
    } else {
        format!(
            "https://www.thetechgame.com/Forums/search/search_author=bob/start={}.html",
            (n - 1) * 25
        )
    }
}

fn post_url(n: u32) -> String {
    format!("https://www.thetechgame.com/Forums/p={}/reply.html", n)
}

fn topic_url(n: u32) -> String {
    format!("https://www.thetechgame.com/Forums/t={}/thread.html", n)
}

/// Three listing pages, each linking two topics, one post and the next page
fn script_three_listing_pages(browser: &ScriptedBrowser) {
    for n in 1..=3 {
        let mut body = format!(
            r#"<a href="{}">Topic A</a><a href="{}">Topic B</a><a href="{}">Reply</a>"#,
            topic_url(n * 10 + 1),
            topic_url(n * 10 + 2),
            post_url(n)
        );
        if n < 3 {
            body.push_str(&format!(r#"<a href="{}">Next</a>"#, search_page(n + 1)));
        }
        browser.add_page(&search_page(n), "Search Results", &body);

        browser.add_page(&topic_url(n * 10 + 1), &format!("Topic {}A", n), "<p>first</p>");
        browser.add_page(&topic_url(n * 10 + 2), &format!("Topic {}B", n), "<p>second</p>");
        browser.add_page(&post_url(n), &format!("Post {}", n), "<p>reply</p>");
    }
}

async fn run(config: &Config, browser: &ScriptedBrowser, ctx: RunContext, job: JobSpec) -> RunSummary {
    let mut archiver = Archiver::new(config.clone(), Box::new(browser.clone()), ctx);
    archiver.start(job).await.expect("run should succeed")
}

#[tokio::test]
async fn test_three_listing_pages_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    script_three_listing_pages(&browser);
    let clock = Arc::new(ManualClock::new());

    let summary = run(&config, &browser, test_context(&clock), JobSpec::Profile(posts_only_job())).await;

    assert_eq!(summary.attempts(), 9);
    assert_eq!(summary.archived, 9);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.done_total, 9);
    assert!(!summary.stopped);

    // base + 3 traversal + 3 scan + 9 targets
    assert_eq!(browser.navigations().len(), 16);
    assert_eq!(browser.screenshots().len(), 9);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    let posts = ledger.results("posts_live", "posts").unwrap().to_vec();
    let topics = ledger.results("posts_live", "topics").unwrap().to_vec();
    assert_eq!(posts.len(), 3);
    assert_eq!(topics.len(), 6);

    let indices: Vec<u32> = topics
        .iter()
        .filter_map(|r| r.as_snapshot())
        .map(|s| s.index)
        .collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);

    let first = posts[0].as_snapshot().unwrap();
    assert_eq!(first.url, post_url(1));
    assert_eq!(first.title, "Post 1");
    assert!(first.html.ends_with("html/posts_live/posts/00001__Post_1.html"));
    assert!(first.png.exists());
    assert!(std::fs::read_to_string(&first.html).unwrap().contains("reply"));

    // One politeness delay after every listing page and every target
    let delay = config.timing.request_delay();
    assert_eq!(clock.sleeps().iter().filter(|d| **d == delay).count(), 15);

    let runlog = std::fs::read_to_string(dir.path().join("meta/runlog.txt")).unwrap();
    assert!(runlog.contains("=== Complete! ==="));
    assert!(runlog.contains("Archived: 9 URLs"));
}

#[tokio::test]
async fn test_resume_skips_done_urls() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let clock = Arc::new(ManualClock::new());

    let first = ScriptedBrowser::new();
    script_three_listing_pages(&first);
    run(&config, &first, test_context(&clock), JobSpec::Profile(posts_only_job())).await;

    let second = ScriptedBrowser::new();
    script_three_listing_pages(&second);
    let summary = run(&config, &second, test_context(&clock), JobSpec::Profile(posts_only_job())).await;

    assert_eq!(summary.attempts(), 0);
    assert_eq!(summary.already_done, 9);
    assert_eq!(summary.done_total, 9);

    let runlog = std::fs::read_to_string(dir.path().join("meta/runlog.txt")).unwrap();
    assert!(runlog.contains("Resuming - already archived 9 URLs"));

    // Discovery runs again, but no target is navigated
    assert_eq!(second.navigations().len(), 7);
    assert!(second
        .navigations()
        .iter()
        .all(|url| !url.contains("/p=") && !url.contains("/t=")));

    let mut ledger = Ledger::open(dir.path()).unwrap();
    assert_eq!(ledger.results("posts_live", "topics").unwrap().len(), 6);
}

#[tokio::test]
async fn test_sequence_index_counts_only_successes() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let urls: Vec<String> = (1..=4).map(topic_url).collect();
    for (i, url) in urls.iter().enumerate() {
        browser.add_page(url, &format!("Page {}", i + 1), "<p>body</p>");
    }
    browser.fail_next(&urls[2], 3, BrowserError::Navigation("net::ERR_CONNECTION_RESET".into()));
    let clock = Arc::new(ManualClock::new());

    let job = UrlListJob {
        urls: urls.clone(),
        mode: UrlListMode::SinglePage,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job)).await;

    assert_eq!(summary.archived, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done_total, 4);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    let records = ledger.results("custom", "single_page").unwrap().to_vec();
    assert_eq!(records.len(), 4);

    let failure = records[2].as_failure().unwrap();
    assert_eq!(failure.url, urls[2]);
    assert!(failure.error.contains("ERR_CONNECTION_RESET"));

    let last = records[3].as_snapshot().unwrap();
    assert_eq!(last.index, 3);
    assert!(last
        .png
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("00003__"));

    // One delay per navigated URL, failures included
    let delay = config.timing.request_delay();
    assert_eq!(clock.sleeps().iter().filter(|d| **d == delay).count(), 4);

    let runlog = std::fs::read_to_string(dir.path().join("meta/runlog_custom.txt")).unwrap();
    assert!(runlog.contains("Total pages saved: 3"));
}

#[tokio::test]
async fn test_cyclic_pagination_terminates() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    for n in 1..=3 {
        let next = search_page(n % 3 + 1);
        let prev = search_page(if n == 1 { 3 } else { n - 1 });
        let body = format!(
            r#"<a href="{}">next</a><a href="{}">prev</a><a href="{}">reply</a>"#,
            next,
            prev,
            post_url(n)
        );
        browser.add_page(&search_page(n), "Search Results", &body);
    }
    let clock = Arc::new(ManualClock::new());

    let summary = run(&config, &browser, test_context(&clock), JobSpec::Profile(posts_only_job())).await;

    assert_eq!(summary.archived, 3);
    let listing_visits = browser
        .navigations()
        .iter()
        .filter(|url| url.contains("/search/"))
        .count();
    // Each page once for traversal and once for the content scan
    assert_eq!(listing_visits, 6);
}

#[tokio::test]
async fn test_closed_session_stops_run() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    script_three_listing_pages(&browser);
    // base + 3 traversal + 3 scan + first target, then the browser goes away
    browser.close_after(8);
    let clock = Arc::new(ManualClock::new());

    let mut archiver = Archiver::new(config.clone(), Box::new(browser.clone()), test_context(&clock));
    let err = archiver
        .start(JobSpec::Profile(posts_only_job()))
        .await
        .unwrap_err();

    assert!(err.is_session_closed());
    // No retries against a closed session
    assert_eq!(browser.navigations().len(), 9);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    assert_eq!(ledger.done_count(), 1);
    assert!(ledger.is_done(&post_url(1)));
    assert!(!ledger.is_done(&post_url(2)));
    assert_eq!(ledger.results("posts_live", "posts").unwrap().len(), 1);

    let runlog = std::fs::read_to_string(dir.path().join("meta/runlog.txt")).unwrap();
    assert!(runlog.contains("Browser was closed - archival stopped"));
}

#[tokio::test]
async fn test_stop_signal_leaves_current_target_pending() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let urls: Vec<String> = (1..=3).map(topic_url).collect();
    for url in &urls {
        browser.add_page(url, "Thread", "<p>body</p>");
    }
    let clock = Arc::new(ManualClock::new());

    let ctx = test_context(&clock);
    let handle = ctx.handle();
    let trigger = format!("Archiving: {}", urls[1]);
    let ctx = ctx.with_log_sink(move |line: &str| {
        if line.contains(&trigger) {
            handle.stop();
        }
    });

    let job = JobSpec::UrlList(UrlListJob {
        urls: urls.clone(),
        mode: UrlListMode::SinglePage,
        pause_for_login: false,
    });
    let summary = run(&config, &browser, ctx, job.clone()).await;

    assert!(summary.stopped);
    assert_eq!(summary.archived, 1);
    assert_eq!(browser.navigations(), vec![BASE.to_string(), urls[0].clone()]);

    let ledger = Ledger::open(dir.path()).unwrap();
    assert!(ledger.is_done(&urls[0]));
    assert!(!ledger.is_done(&urls[1]));

    let runlog = std::fs::read_to_string(dir.path().join("meta/runlog_custom.txt")).unwrap();
    assert!(runlog.contains("=== Stopped by User ==="));

    // A later run picks up where the stopped one left off
    let resumed = run(&config, &browser, test_context(&clock), job).await;
    assert_eq!(resumed.already_done, 1);
    assert_eq!(resumed.archived, 2);
}

#[tokio::test]
async fn test_login_gate_releases_run() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    browser.add_page(&topic_url(1), "Thread", "<p>body</p>");
    let clock = Arc::new(ManualClock::new());

    let ctx = test_context(&clock);
    let handle = ctx.handle();
    let ctx = ctx.with_log_sink(move |line: &str| {
        if line.contains("=== LOGIN TIME ===") {
            handle.continue_after_pause();
        }
    });

    let job = JobSpec::UrlList(UrlListJob {
        urls: vec![topic_url(1)],
        mode: UrlListMode::SinglePage,
        pause_for_login: true,
    });
    let summary = run(&config, &browser, ctx, job).await;

    assert_eq!(summary.archived, 1);
    assert!(!summary.stopped);
}

#[tokio::test]
async fn test_stop_during_login_gate_archives_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let clock = Arc::new(ManualClock::new());

    let ctx = test_context(&clock);
    let handle = ctx.handle();
    let ctx = ctx.with_log_sink(move |line: &str| {
        if line.contains("=== LOGIN TIME ===") {
            handle.stop();
        }
    });

    let job = JobSpec::UrlList(UrlListJob {
        urls: vec![topic_url(1)],
        mode: UrlListMode::SinglePage,
        pause_for_login: true,
    });
    let summary = run(&config, &browser, ctx, job).await;

    assert!(summary.stopped);
    assert_eq!(summary.attempts(), 0);
    assert_eq!(browser.navigations(), vec![BASE.to_string()]);
}

#[tokio::test]
async fn test_posts_only_mode() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    browser.add_page(
        TOPICS_ROOT,
        "Topics Started",
        &format!(
            r#"<a href="{}">a</a><a href="{}">b</a><a href="{}">reply</a>"#,
            topic_url(1),
            topic_url(2),
            post_url(1)
        ),
    );
    browser.add_page(
        POSTS_ROOT,
        "Posts",
        &format!(r#"<a href="{}">thread</a><a href="{}">reply</a>"#, topic_url(3), post_url(2)),
    );
    let clock = Arc::new(ManualClock::new());

    let job = ProfileJob {
        topics_live: true,
        posts_only: true,
        ..posts_only_job()
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::Profile(job)).await;

    assert_eq!(summary.archived, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.done_total, 4);

    let navigations = browser.navigations();
    assert!(!navigations.iter().any(|url| url.contains("/t=")));

    let mut ledger = Ledger::open(dir.path()).unwrap();
    // Policy skips are done but leave no record
    assert!(ledger.is_done(&topic_url(1)));
    assert!(ledger.results("topics_live", "topics").unwrap().is_empty());
    // Topics seen from a posts listing are not touched at all
    assert!(!ledger.is_done(&topic_url(3)));
    assert_eq!(ledger.results("posts_live", "posts").unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_views_wait_out_challenge() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let profile = format!("{}bob", BASE);
    browser.add_page(&profile, "bob - Profile", "<p>About bob</p>");
    browser.challenge(&profile, 2);
    let clock = Arc::new(ManualClock::new());

    let job = ProfileJob {
        include_profile: true,
        posts_live: false,
        ..posts_only_job()
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::Profile(job)).await;

    assert_eq!(summary.archived, 4);

    let poll = Duration::from_millis(config.timing.challenge_poll_ms);
    assert_eq!(clock.sleeps().iter().filter(|d| **d == poll).count(), 2);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    let records = ledger.results("extra", "profile").unwrap().to_vec();
    let snapshot = records[0].as_snapshot().unwrap();
    assert_eq!(snapshot.title, "bob - Profile");
    assert!(!std::fs::read_to_string(&snapshot.html)
        .unwrap()
        .contains("Verifying you are human"));

    for kind in ["wall", "friends", "reputation"] {
        assert_eq!(ledger.results("extra", kind).unwrap().len(), 1, "{}", kind);
    }
}

#[tokio::test]
async fn test_url_list_all_pages_mode() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let topic = topic_url(5);
    browser.add_page(
        &topic,
        "Long Thread",
        r#"<a href="https://www.thetechgame.com/Forums/t=5/thread/start=20.html">3</a>"#,
    );
    let clock = Arc::new(ManualClock::new());

    let job = UrlListJob {
        urls: vec!["https://example.com/elsewhere.html".to_string(), topic.clone()],
        mode: UrlListMode::AllPages,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job)).await;

    assert_eq!(summary.archived, 3);
    assert!(!browser
        .navigations()
        .iter()
        .any(|url| url.contains("example.com")));

    let mut ledger = Ledger::open(dir.path()).unwrap();
    let records = ledger.results("custom", "url2_pages").unwrap().to_vec();
    let urls: Vec<&str> = records.iter().map(|r| r.url()).collect();
    assert_eq!(
        urls,
        vec![
            topic.as_str(),
            "https://www.thetechgame.com/Forums/t=5/thread/start=10.html",
            "https://www.thetechgame.com/Forums/t=5/thread/start=20.html",
        ]
    );
    let indices: Vec<u32> = records
        .iter()
        .filter_map(|r| r.as_snapshot())
        .map(|s| s.index)
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);

    // Root load plus three pages; the off-site URL is never navigated
    let delay = config.timing.request_delay();
    assert_eq!(clock.sleeps().iter().filter(|d| **d == delay).count(), 4);
}

#[tokio::test]
async fn test_all_pages_root_load_is_followed_by_delay() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let topic = topic_url(6);
    browser.add_page(&topic, "Short Thread", "<p>one page</p>");
    let clock = Arc::new(ManualClock::new());
    let delay = config.timing.request_delay();

    // Delays already taken at each content read: site, root load, root
    // markup, then page 1
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (log, sleeps) = (seen.clone(), clock.clone());
    browser.on_content(move |_| {
        let taken = sleeps.sleeps().iter().filter(|d| **d == delay).count();
        log.lock().unwrap().push(taken);
    });

    let job = UrlListJob {
        urls: vec![topic.clone()],
        mode: UrlListMode::AllPages,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job)).await;

    assert_eq!(summary.archived, 1);
    assert_eq!(browser.navigations().iter().filter(|u| **u == topic).count(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![0, 0, 0, 1]);
    assert_eq!(clock.sleeps().iter().filter(|d| **d == delay).count(), 2);
}

#[tokio::test]
async fn test_redirected_target_keyed_on_scheduled_url() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    let renamed = "https://www.thetechgame.com/Forums/t=1/renamed.html";
    browser.add_page(&topic_url(1), "Renamed Thread", "<p>body</p>");
    browser.redirect(&topic_url(1), renamed);
    let clock = Arc::new(ManualClock::new());

    let job = UrlListJob {
        urls: vec![topic_url(1)],
        mode: UrlListMode::SinglePage,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job.clone())).await;
    assert_eq!(summary.archived, 1);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    assert!(ledger.is_done(&topic_url(1)));
    assert!(!ledger.is_done(renamed));

    let records = ledger.results("custom", "single_page").unwrap().to_vec();
    let snapshot = records[0].as_snapshot().unwrap();
    assert_eq!(snapshot.url, topic_url(1));
    assert_eq!(snapshot.final_url.as_deref(), Some(renamed));

    // Resuming with the same list does not capture the page again
    let again = ScriptedBrowser::new();
    again.add_page(&topic_url(1), "Renamed Thread", "<p>body</p>");
    again.redirect(&topic_url(1), renamed);
    let summary = run(&config, &again, test_context(&clock), JobSpec::UrlList(job)).await;
    assert_eq!(summary.already_done, 1);
    assert!(again.screenshots().is_empty());
}

#[tokio::test]
async fn test_corrupt_ledger_reported_in_run_log() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let meta = dir.path().join("meta");
    std::fs::create_dir_all(&meta).unwrap();
    std::fs::write(meta.join("done_urls.json"), "{\"done\": [").unwrap();
    std::fs::write(meta.join("custom__single_page__results.json"), "[{broken").unwrap();

    let browser = ScriptedBrowser::new();
    browser.add_page(&topic_url(1), "Thread", "<p>body</p>");
    let clock = Arc::new(ManualClock::new());

    let job = UrlListJob {
        urls: vec![topic_url(1)],
        mode: UrlListMode::SinglePage,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job)).await;
    assert_eq!(summary.archived, 1);

    let runlog = std::fs::read_to_string(meta.join("runlog_custom.txt")).unwrap();
    assert!(runlog.contains("done_urls.json.corrupt"), "{}", runlog);
    assert!(runlog.contains("custom__single_page__results.json.corrupt"), "{}", runlog);
    assert!(!runlog.contains("Resuming"));
}

#[tokio::test]
async fn test_partial_capture_is_recorded() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let browser = ScriptedBrowser::new();
    browser.add_page(&topic_url(1), "Thread", "<p>body</p>");
    browser.fail_screenshots();
    let clock = Arc::new(ManualClock::new());

    let job = UrlListJob {
        urls: vec![topic_url(1)],
        mode: UrlListMode::SinglePage,
        pause_for_login: false,
    };
    let summary = run(&config, &browser, test_context(&clock), JobSpec::UrlList(job)).await;
    assert_eq!(summary.archived, 1);

    let mut ledger = Ledger::open(dir.path()).unwrap();
    let records = ledger.results("custom", "single_page").unwrap().to_vec();
    let snapshot = records[0].as_snapshot().unwrap();
    assert!(snapshot.html_saved);
    assert!(!snapshot.png_saved);
    assert!(snapshot.html.exists());
    assert!(!snapshot.png.exists());
}
