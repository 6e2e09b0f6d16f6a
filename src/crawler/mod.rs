//! Crawler module for rendering, discovering and archiving forum pages
//!
//! This module contains the core archiving logic, including:
//! - Navigation with settle waits, challenge handling and retry logic
//! - HTML parsing and link extraction
//! - Listing traversal and topic page generation
//! - Snapshot capture and overall run coordination

mod capture;
mod coordinator;
mod expand;
mod navigator;
mod pagination;
mod parser;

pub use capture::{capture_snapshot, CaptureTarget, SnapshotPaths};
pub use coordinator::{
    Archiver, JobSpec, ProfileJob, RunSummary, SearchGroup, UrlListJob, UrlListMode,
    CUSTOM_GROUP, PROFILE_GROUP,
};
pub use expand::expand_collapsed_content;
pub use navigator::{
    looks_like_challenge, ChallengeStatus, NavigationError, NavigationOutcome, Navigator,
};
pub use pagination::{
    collect_content_links, collect_search_pages, extract_topic_pages, generate_topic_pages,
    infer_max_page, ContentLinks,
};
pub use parser::{extract_site_links, parse_html, Anchor, ParsedPage};
