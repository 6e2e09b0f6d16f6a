//! Crawler coordinator - main archive orchestration logic
//!
//! This module contains the sequential loops that tie the crawl together for
//! both run modes:
//! - Opening the site and pausing for login
//! - Profile archival (profile views, listing traversal, content archival)
//! - Archival of a user-supplied URL list
//! - Resumption through the ledger and cooperative stopping

use super::capture::{capture_snapshot, CaptureTarget};
use super::expand::expand_collapsed_content;
use super::navigator::{NavigationError, Navigator};
use super::pagination::{collect_content_links, collect_search_pages, extract_topic_pages};
use crate::browser::Browser;
use crate::config::Config;
use crate::context::{RunContext, RunHandle};
use crate::ledger::{self, Ledger};
use crate::url::{is_same_site, ContentKind};
use crate::Result;
use url::Url;

/// Group name for profile views
pub const PROFILE_GROUP: &str = "extra";

/// Group name for URL-list archival
pub const CUSTOM_GROUP: &str = "custom";

/// A search listing archived as its own group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchGroup {
    TopicsLive,
    TopicsArch,
    PostsLive,
    PostsArch,
}

impl SearchGroup {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TopicsLive => "topics_live",
            Self::TopicsArch => "topics_arch",
            Self::PostsLive => "posts_live",
            Self::PostsArch => "posts_arch",
        }
    }

    /// Groups listing the user's own posts rather than topics they started
    pub fn is_posts_group(&self) -> bool {
        matches!(self, Self::PostsLive | Self::PostsArch)
    }

    /// Root listing URL for `username`
    pub fn root_url(&self, base: &str, username: &str) -> String {
        let path = match self {
            Self::TopicsLive => format!("Forums/search/search_id=startedtopics/user={}.html", username),
            Self::TopicsArch => format!("Archives/search/search_id=startedtopics/user={}.html", username),
            Self::PostsLive => format!("Forums/search/search_author={}.html", username),
            Self::PostsArch => format!("Archives/search/search_author={}.html", username),
        };
        site_url(base, &path)
    }
}

/// Archive a user's profile, listings and content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileJob {
    pub username: String,
    pub include_profile: bool,
    pub topics_live: bool,
    pub topics_arch: bool,
    pub posts_live: bool,
    pub posts_arch: bool,
    /// Capture posts only; topic targets are skipped and marked done
    pub posts_only: bool,
    pub pause_for_login: bool,
}

impl ProfileJob {
    /// Everything selected, no login pause
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            include_profile: true,
            topics_live: true,
            topics_arch: true,
            posts_live: true,
            posts_arch: true,
            posts_only: false,
            pause_for_login: false,
        }
    }

    /// Selected search groups in archival order
    pub fn groups(&self) -> Vec<SearchGroup> {
        [
            (self.topics_live, SearchGroup::TopicsLive),
            (self.topics_arch, SearchGroup::TopicsArch),
            (self.posts_live, SearchGroup::PostsLive),
            (self.posts_arch, SearchGroup::PostsArch),
        ]
        .into_iter()
        .filter_map(|(selected, group)| selected.then_some(group))
        .collect()
    }

    /// `(kind, url)` of each profile view
    pub fn profile_urls(&self, base: &str) -> Vec<(&'static str, String)> {
        let profile = site_url(base, &self.username);
        vec![
            ("profile", profile.clone()),
            ("wall", format!("{}#wall", profile)),
            ("friends", format!("{}#friends", profile)),
            ("reputation", format!("{}#reputation", profile)),
        ]
    }
}

/// How each listed URL is archived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlListMode {
    /// Capture just the URL
    SinglePage,
    /// Treat the URL as a topic and capture every page of it
    AllPages,
}

impl UrlListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePage => "single_page",
            Self::AllPages => "all_pages",
        }
    }
}

/// Archive an explicit list of URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlListJob {
    pub urls: Vec<String>,
    pub mode: UrlListMode,
    pub pause_for_login: bool,
}

/// A unit of work for [`Archiver::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSpec {
    Profile(ProfileJob),
    UrlList(UrlListJob),
}

impl JobSpec {
    fn pause_for_login(&self) -> bool {
        match self {
            Self::Profile(job) => job.pause_for_login,
            Self::UrlList(job) => job.pause_for_login,
        }
    }

    fn run_log_name(&self) -> &'static str {
        match self {
            Self::Profile(_) => "runlog.txt",
            Self::UrlList(_) => "runlog_custom.txt",
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Snapshots recorded
    pub archived: usize,
    /// Failure records written
    pub failed: usize,
    /// Targets skipped by the posts-only policy
    pub skipped: usize,
    /// Targets skipped because an earlier run finished them
    pub already_done: usize,
    /// Size of the Done Set at the end of the run
    pub done_total: usize,
    /// The run ended on a stop request
    pub stopped: bool,
}

impl RunSummary {
    /// Targets that reached the browser
    pub fn attempts(&self) -> usize {
        self.archived + self.failed
    }
}

enum TargetOutcome {
    Archived,
    Failed,
    Stopped,
}

/// Sequential archiver over a single browsing session
pub struct Archiver {
    config: Config,
    navigator: Navigator,
    ctx: RunContext,
}

impl Archiver {
    /// Creates an archiver that drives `browser`
    pub fn new(config: Config, browser: Box<dyn Browser>, ctx: RunContext) -> Self {
        let navigator = Navigator::new(browser, config.timing.clone(), config.challenge.clone());
        Self {
            config,
            navigator,
            ctx,
        }
    }

    /// Control surface for stopping the run or releasing the login pause
    pub fn handle(&self) -> RunHandle {
        self.ctx.handle()
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.config.output.directory
    }

    /// Runs `job` to completion or until stopped
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The job finished or was stopped
    /// * `Err(ArchiveError)` - The browser session closed, or the ledger could not be written
    pub async fn start(&mut self, job: JobSpec) -> Result<RunSummary> {
        self.ctx.reset();
        let meta = ledger::meta_dir(&self.config.output.directory);
        std::fs::create_dir_all(&meta)?;
        self.ctx.set_run_log(Some(meta.join(job.run_log_name())));

        let mut ledger = Ledger::open(&self.config.output.directory)?;
        self.report_ledger(&mut ledger);
        let mut summary = RunSummary::default();

        let result = self.run_job(&job, &mut ledger, &mut summary).await;
        self.report_ledger(&mut ledger);
        summary.done_total = ledger.done_count();
        summary.stopped = self.ctx.is_cancelled();

        match result {
            Ok(()) if summary.stopped => self.ctx.log("=== Stopped by User ==="),
            Ok(()) => {
                self.ctx.log("=== Complete! ===");
                match job {
                    JobSpec::Profile(_) => {
                        self.ctx.log(format!("Archived: {} URLs", summary.done_total))
                    }
                    JobSpec::UrlList(_) => {
                        self.ctx.log(format!("Total pages saved: {}", summary.archived))
                    }
                }
            }
            Err(ref e) if e.is_session_closed() => {
                self.ctx.warn("Browser was closed - archival stopped");
            }
            Err(ref e) => self.ctx.warn(format!("ERROR: {}", e)),
        }

        result.map(|()| summary)
    }

    /// Copies resume and quarantine notices into the run log
    fn report_ledger(&self, ledger: &mut Ledger) {
        for notice in ledger.take_notices() {
            if notice.is_warning() {
                self.ctx.warn(notice.to_string());
            } else {
                self.ctx.log(notice.to_string());
            }
        }
    }

    /// Closes the browsing session
    pub async fn close(&mut self) -> Result<()> {
        self.navigator.close().await?;
        Ok(())
    }

    async fn run_job(
        &mut self,
        job: &JobSpec,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Result<()> {
        match job {
            JobSpec::Profile(profile) => {
                self.ctx.log(format!("Starting user archival for: {}", profile.username));
                self.ctx.log(format!(
                    "Output directory: {}",
                    self.config.output.directory.display()
                ));
                if profile.posts_only {
                    self.ctx.log(
                        "Posts-only mode: Will screenshot only user posts, not full topic pages",
                    );
                }
            }
            JobSpec::UrlList(list) => {
                self.ctx.log("Starting custom URL archival");
                self.ctx.log(format!("Mode: {}", list.mode.as_str()));
                self.ctx.log(format!("URLs to archive: {}", list.urls.len()));
            }
        }

        if !self.open_site(job.pause_for_login()).await? {
            return Ok(());
        }

        match job {
            JobSpec::Profile(profile) => self.run_profile(profile, ledger, summary).await,
            JobSpec::UrlList(list) => self.run_url_list(list, ledger, summary).await,
        }
    }

    /// Opens the site and waits at the login gate; false if stopped
    async fn open_site(&mut self, pause_for_login: bool) -> Result<bool> {
        self.ctx.log("Opening site...");
        let base = self.config.site.base_url.clone();
        match self.navigator.goto(&self.ctx, &base).await {
            Ok(_) => {}
            Err(NavigationError::Cancelled) => return Ok(false),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => self.ctx.warn(format!("Could not open site: {}", e)),
        }

        if pause_for_login {
            self.ctx.log("=== LOGIN TIME ===");
            self.ctx
                .log("Page is loaded - log in if needed, then continue");
            self.ctx.progress(0, 100, "Login if needed, then continue");

            if !self.ctx.await_continue().await {
                return Ok(false);
            }
            self.ctx.log("User ready - continuing...");
        }

        Ok(!self.ctx.is_cancelled())
    }

    async fn run_profile(
        &mut self,
        job: &ProfileJob,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let base = self.config.site.base_url.clone();
        let site = Url::parse(&base)?;

        if job.include_profile {
            self.ctx.log("=== Archiving Profile ===");
            for (kind, url) in job.profile_urls(&base) {
                if self.ctx.is_cancelled() {
                    break;
                }
                self.archive_targets(ledger, summary, PROFILE_GROUP, kind, &[url], false)
                    .await?;
            }
        }

        for group in job.groups() {
            if self.ctx.is_cancelled() {
                break;
            }
            self.ctx.log(format!("=== {} ===", group.name()));

            let root = group.root_url(&base, &job.username);
            let pages = collect_search_pages(
                &mut self.navigator,
                &self.ctx,
                &site,
                &root,
                &self.config.pagination,
            )
            .await?;
            let content = collect_content_links(&mut self.navigator, &self.ctx, &site, &pages).await?;

            let posts_kind = ContentKind::Post.as_str();
            let topics_kind = ContentKind::Topic.as_str();

            if !content.posts.is_empty() {
                self.archive_targets(ledger, summary, group.name(), posts_kind, &content.posts, false)
                    .await?;
            }

            if !content.topics.is_empty() && !(job.posts_only && group.is_posts_group()) {
                self.archive_targets(
                    ledger,
                    summary,
                    group.name(),
                    topics_kind,
                    &content.topics,
                    job.posts_only,
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn run_url_list(
        &mut self,
        job: &UrlListJob,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let site = Url::parse(&self.config.site.base_url)?;
        let total = job.urls.len();

        for (n, url) in job.urls.iter().enumerate() {
            let n = n + 1;
            if self.ctx.is_cancelled() {
                break;
            }

            self.ctx.log(format!("=== URL {}/{}: {} ===", n, total, url));
            self.ctx
                .progress(n, total, &format!("Processing URL {}/{}", n, total));

            if !is_same_site(url, &site) {
                self.ctx
                    .warn(format!("Skipping URL outside {}: {}", site, url));
                continue;
            }

            match job.mode {
                UrlListMode::SinglePage => {
                    self.archive_targets(
                        ledger,
                        summary,
                        CUSTOM_GROUP,
                        UrlListMode::SinglePage.as_str(),
                        std::slice::from_ref(url),
                        false,
                    )
                    .await?;
                }
                UrlListMode::AllPages => {
                    let Some(pages) = self.topic_pages(url).await? else {
                        continue;
                    };
                    let kind = format!("url{}_pages", n);
                    self.archive_targets(ledger, summary, CUSTOM_GROUP, &kind, &pages, false)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Loads a topic's first page and generates all of its page URLs
    ///
    /// The load is followed by the request delay, like every other navigation.
    async fn topic_pages(&mut self, url: &str) -> Result<Option<Vec<String>>> {
        let delay = self.config.timing.request_delay();
        match self.navigator.goto(&self.ctx, url).await {
            Ok(_) => {}
            Err(NavigationError::Cancelled) => return Ok(None),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                self.ctx.warn(format!("Skipping {}: {}", url, e));
                self.ctx.sleep(delay).await;
                return Ok(None);
            }
        }

        let html = match self.navigator.browser().content().await {
            Ok(html) => html,
            Err(e) if e.is_session_closed() => return Err(e.into()),
            Err(e) => {
                self.ctx
                    .warn(format!("Could not read {}, assuming one page: {}", url, e));
                String::new()
            }
        };
        self.ctx.sleep(delay).await;

        let pages = extract_topic_pages(&html, url, &self.config.pagination);
        self.ctx.log(format!("Detected {} total pages", pages.len()));
        Ok(Some(pages))
    }

    /// Archives `urls` under (group, kind), skipping anything already done
    ///
    /// With `skip_policy`, targets are marked done without being captured.
    async fn archive_targets(
        &mut self,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
        group: &str,
        kind: &str,
        urls: &[String],
        skip_policy: bool,
    ) -> Result<()> {
        let total = urls.len();
        let delay = self.config.timing.request_delay();

        for (i, url) in urls.iter().enumerate() {
            let pos = i + 1;
            if self.ctx.is_cancelled() {
                break;
            }
            if ledger.is_done(url) {
                summary.already_done += 1;
                continue;
            }

            self.ctx
                .progress(pos, total, &format!("Archiving {} {}/{}", kind, pos, total));

            if skip_policy {
                self.ctx.log(format!(
                    "[{}/{}] Skipping topic (posts-only mode): {}",
                    pos, total, url
                ));
                ledger.mark_done(url)?;
                summary.skipped += 1;
                continue;
            }

            self.ctx
                .log(format!("[{}/{}] Archiving: {}", pos, total, url));

            let outcome = self.archive_one(ledger, group, kind, url).await;
            self.report_ledger(ledger);
            match outcome? {
                TargetOutcome::Archived => summary.archived += 1,
                TargetOutcome::Failed => summary.failed += 1,
                TargetOutcome::Stopped => break,
            }

            self.ctx.sleep(delay).await;
        }

        Ok(())
    }

    /// navigate -> expand -> capture -> record -> mark done
    async fn archive_one(
        &mut self,
        ledger: &mut Ledger,
        group: &str,
        kind: &str,
        url: &str,
    ) -> Result<TargetOutcome> {
        let outcome = match self.navigator.goto(&self.ctx, url).await {
            Ok(outcome) => outcome,
            Err(NavigationError::Cancelled) => return Ok(TargetOutcome::Stopped),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                ledger.record_failure(group, kind, url, &e.to_string())?;
                ledger.mark_done(url)?;
                return Ok(TargetOutcome::Failed);
            }
        };

        let clicks = expand_collapsed_content(self.navigator.browser(), &self.config.expand).await?;
        if clicks > 0 {
            tracing::debug!("Expanded {} collapsed block(s) on {}", clicks, url);
        }

        if self.ctx.is_cancelled() {
            return Ok(TargetOutcome::Stopped);
        }

        let target = CaptureTarget {
            group,
            kind,
            index: ledger.next_index(group, kind)?,
            url,
            final_url: &outcome.final_url,
        };
        let output_dir = &self.config.output.directory;

        match capture_snapshot(self.navigator.browser(), &self.ctx, output_dir, target).await {
            Ok(snapshot) => {
                ledger.record_success(group, kind, snapshot)?;
                ledger.mark_done(url)?;
                Ok(TargetOutcome::Archived)
            }
            Err(e) if e.is_session_closed() => Err(e),
            Err(e) => {
                self.ctx.warn(format!("Capture failed for {}: {}", url, e));
                ledger.record_failure(group, kind, url, &e.to_string())?;
                ledger.mark_done(url)?;
                Ok(TargetOutcome::Failed)
            }
        }
    }
}

/// Joins a site-relative path onto the base URL
fn site_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
