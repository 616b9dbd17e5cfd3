use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{ReportError, ReportGenerator, ReportPayload};
use crate::bot::reply::Embed;
use crate::config::GithubConfig;
use crate::utils::format::{plural, truncate_first_line};
use crate::utils::time::{format_datetime, format_time, is_weekend, local_date, local_day_bounds};

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const REPORT_HEADER: &str = "📋 **Daily GitHub Activity Report**";
const MAX_LISTED_COMMITS: usize = 5;
const MESSAGE_LIMIT: usize = 100;

const COLOR_ORANGE: u32 = 0xffa500;
const COLOR_GREEN: u32 = 0x00ff00;

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub html_url: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub date: DateTime<Utc>,
}

impl Commit {
    fn message(&self) -> &str {
        self.commit.message.as_deref().unwrap_or("No message")
    }

    fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

pub struct GithubReporter {
    http: reqwest::Client,
    api_base: String,
    token: String,
    repo: String,
    /// GitHub author name -> Discord user id
    user_mapping: HashMap<String, String>,
    offset: FixedOffset,
}

impl GithubReporter {
    pub fn new(http: reqwest::Client, config: &GithubConfig, offset: FixedOffset) -> Self {
        Self {
            http,
            api_base: GITHUB_API_BASE.to_string(),
            token: config.token.clone(),
            repo: config.repo.clone(),
            user_mapping: config.user_mapping.clone(),
            offset,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn github_name(&self, discord_user_id: &str) -> Option<&str> {
        self.user_mapping
            .iter()
            .find(|(_, id)| id.as_str() == discord_user_id)
            .map(|(name, _)| name.as_str())
    }

    async fn fetch_commits(&self, now: DateTime<Utc>) -> Result<Vec<Commit>, ReportError> {
        let (since, until) = local_day_bounds(now, self.offset);

        let response = self
            .http
            .get(format!("{}/repos/{}/commits", self.api_base, self.repo))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .query(&[
                ("since", since.to_rfc3339()),
                ("until", until.to_rfc3339()),
                ("per_page", "100".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReportGenerator for GithubReporter {
    async fn generate_report(&self, user_id: &str) -> Result<ReportPayload, ReportError> {
        self.generate_report_at(user_id, Utc::now()).await
    }
}

impl GithubReporter {
    pub async fn generate_report_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReportPayload, ReportError> {
        if is_weekend(now, self.offset) {
            debug!("Weekend, no commit report");
            return Ok(ReportPayload::default());
        }

        let commits = filter_todays_commits(self.fetch_commits(now).await?, now, self.offset);
        info!(repo = %self.repo, commits = commits.len(), "Fetched today's commits");

        Ok(build_report(
            &commits,
            self.github_name(user_id),
            &self.repo,
            now,
            self.offset,
        ))
    }
}

/// Drops merge commits and commits from another local day, newest first.
pub fn filter_todays_commits(
    commits: Vec<Commit>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<Commit> {
    let today = local_date(now, offset);

    let mut commits: Vec<Commit> = commits
        .into_iter()
        .filter(|c| !c.message().to_lowercase().contains("merge"))
        .filter(|c| local_date(c.commit.author.date, offset) == today)
        .collect();

    commits.sort_by(|a, b| b.commit.author.date.cmp(&a.commit.author.date));
    commits
}

/// No commits at all gives the repository-wide "no commits" report. Otherwise
/// only `author`'s commits are reported, and nothing when they have none.
pub fn build_report(
    commits: &[Commit],
    author: Option<&str>,
    repo: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> ReportPayload {
    if commits.is_empty() {
        return no_commits_report(repo, now, offset);
    }

    let Some(author) = author else {
        return ReportPayload::default();
    };

    let own: Vec<&Commit> = commits
        .iter()
        .filter(|c| c.commit.author.name == author)
        .collect();
    if own.is_empty() {
        return ReportPayload::default();
    }

    ReportPayload::default().embed(author_embed(author, &own, now, offset))
}

fn no_commits_report(repo: &str, now: DateTime<Utc>, offset: FixedOffset) -> ReportPayload {
    let today = local_date(now, offset).format("%Y-%m-%d");

    let embed = Embed::new()
        .title(format!("📊 Daily Commit Report - {}", repo))
        .description(format!("No commits found for {}", today))
        .color(COLOR_ORANGE)
        .footer(format!(
            "Generated at {} (UTC{})",
            format_datetime(now, offset),
            offset_label(offset)
        ))
        .field(
            "😴 No commits today",
            "No commits were made today.\nTime to get coding! 💻",
            false,
        );

    ReportPayload::text(REPORT_HEADER).embed(embed)
}

fn author_embed(author: &str, commits: &[&Commit], now: DateTime<Utc>, offset: FixedOffset) -> Embed {
    let today = local_date(now, offset).format("%Y-%m-%d");

    let mut listed = String::new();
    for commit in commits.iter().take(MAX_LISTED_COMMITS) {
        listed.push_str(&format!(
            "**[{}]({})** - {}\n└ {}\n\n",
            commit.short_sha(),
            commit.html_url,
            format_time(commit.commit.author.date, offset),
            truncate_first_line(commit.message(), MESSAGE_LIMIT),
        ));
    }

    Embed::new()
        .title(format!("👤 {}'s Commits", author))
        .description(format!("{} on {}", plural(commits.len(), "commit"), today))
        .color(COLOR_GREEN)
        .timestamp(now)
        .field("📝 Commits", listed, false)
}

/// `+8`, `-5`, `+5:30`
fn offset_label(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    if minutes % 60 == 0 {
        format!("{}{}", sign, minutes / 60)
    } else {
        format!("{}{}:{:02}", sign, minutes / 60, minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::offset_from_hours;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn sgt() -> FixedOffset {
        offset_from_hours(8)
    }

    // Tuesday 10:00 at UTC+8
    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-03T02:00:00Z").unwrap().to_utc()
    }

    fn commit(sha: &str, author: &str, date: &str, message: &str) -> Commit {
        serde_json::from_value(json!({
            "sha": sha,
            "html_url": format!("https://github.com/acme/app/commit/{}", sha),
            "commit": {
                "message": message,
                "author": {"name": author, "email": "dev@example.com", "date": date}
            }
        }))
        .unwrap()
    }

    #[test]
    fn filters_merges_and_other_days_newest_first() {
        let commits = vec![
            commit("aaaaaaa1", "alice", "2026-03-02T17:00:00Z", "early"),
            commit("bbbbbbb2", "alice", "2026-03-03T01:00:00Z", "Merge branch 'main'"),
            commit("ccccccc3", "bob", "2026-03-03T01:30:00Z", "later"),
            // 23:30 on the 2nd at UTC+8
            commit("ddddddd4", "alice", "2026-03-02T15:30:00Z", "yesterday"),
        ];

        let kept = filter_todays_commits(commits, now(), sgt());
        let shas: Vec<&str> = kept.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["ccccccc3", "aaaaaaa1"]);
    }

    #[test]
    fn empty_day_gives_no_commits_report() {
        let report = build_report(&[], Some("alice"), "acme/app", now(), sgt());
        assert_eq!(report.content.as_deref(), Some(REPORT_HEADER));

        let embed = &report.embeds[0];
        assert_eq!(embed.title.as_deref(), Some("📊 Daily Commit Report - acme/app"));
        assert_eq!(embed.description.as_deref(), Some("No commits found for 2026-03-03"));
        assert_eq!(embed.color, Some(0xffa500));
        assert_eq!(
            embed.footer.as_ref().unwrap().text,
            "Generated at 2026-03-03 10:00:00 (UTC+8)"
        );
        assert_eq!(embed.fields[0].name, "😴 No commits today");
    }

    #[test]
    fn lists_only_the_mapped_authors_commits() {
        let commits: Vec<Commit> = (0..7)
            .map(|i| {
                commit(
                    &format!("{:07}abc", i),
                    "alice",
                    &format!("2026-03-03T01:{:02}:00Z", 50 - i),
                    &format!("change {}\n\nbody", i),
                )
            })
            .chain([commit("fffffff9", "bob", "2026-03-03T01:55:00Z", "bob's")])
            .collect();

        let report = build_report(&commits, Some("alice"), "acme/app", now(), sgt());
        assert!(report.content.is_none());

        let embed = &report.embeds[0];
        assert_eq!(embed.title.as_deref(), Some("👤 alice's Commits"));
        assert_eq!(embed.description.as_deref(), Some("7 commits on 2026-03-03"));
        assert_eq!(embed.color, Some(0x00ff00));

        let listed = &embed.fields[0].value;
        assert_eq!(listed.matches("└ ").count(), 5);
        assert!(listed.starts_with(
            "**[0000000](https://github.com/acme/app/commit/0000000abc)** - 09:50\n└ change 0\n\n"
        ));
        assert!(!listed.contains("bob"));
    }

    #[test]
    fn unmapped_or_idle_author_gets_nothing() {
        let commits = vec![commit("aaaaaaa1", "bob", "2026-03-03T01:00:00Z", "work")];
        assert!(build_report(&commits, None, "acme/app", now(), sgt()).is_empty());
        assert!(build_report(&commits, Some("alice"), "acme/app", now(), sgt()).is_empty());
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(150);
        let commits = vec![commit("aaaaaaa1", "alice", "2026-03-03T01:00:00Z", &long)];
        let report = build_report(&commits, Some("alice"), "acme/app", now(), sgt());
        let listed = &report.embeds[0].fields[0].value;
        assert!(listed.contains(&format!("└ {}...", "x".repeat(100))));
    }

    #[test]
    fn offset_labels() {
        assert_eq!(offset_label(sgt()), "+8");
        assert_eq!(offset_label(offset_from_hours(-5)), "-5");
        assert_eq!(offset_label(FixedOffset::east_opt(19_800).unwrap()), "+5:30");
    }

    type SeenRequests = Arc<Mutex<Vec<(HashMap<String, String>, HeaderMap)>>>;

    /// Serves `/repos/{owner}/{repo}/commits` with a canned answer.
    async fn commits_api(status: StatusCode, body: String) -> (String, SeenRequests) {
        let seen: SeenRequests = Arc::default();
        let recorded = seen.clone();
        let app = Router::new().route(
            "/repos/{owner}/{repo}/commits",
            get(move |Query(query): Query<HashMap<String, String>>, headers: HeaderMap| {
                let recorded = recorded.clone();
                let body = body.clone();
                async move {
                    recorded.lock().unwrap().push((query, headers));
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn reporter(api_base: &str) -> GithubReporter {
        let config = GithubConfig {
            token: "ghp_test".into(),
            repo: "acme/app".into(),
            user_mapping: HashMap::from([("alice".to_string(), "111".to_string())]),
        };
        GithubReporter::new(reqwest::Client::new(), &config, sgt()).with_api_base(api_base)
    }

    #[tokio::test]
    async fn fetches_the_local_day_window() {
        let body = json!([
            {
                "sha": "abc1234def",
                "html_url": "https://github.com/acme/app/commit/abc1234def",
                "commit": {"message": "add status command", "author": {"name": "alice", "date": "2026-03-03T01:15:00Z"}}
            },
            {
                "sha": "fed4321cba",
                "html_url": "https://github.com/acme/app/commit/fed4321cba",
                "commit": {"message": "Merge pull request #4", "author": {"name": "alice", "date": "2026-03-03T01:20:00Z"}}
            }
        ]);
        let (base, seen) = commits_api(StatusCode::OK, body.to_string()).await;

        let report = reporter(&base).generate_report_at("111", now()).await.unwrap();
        let embed = &report.embeds[0];
        assert_eq!(embed.title.as_deref(), Some("👤 alice's Commits"));
        assert_eq!(embed.description.as_deref(), Some("1 commit on 2026-03-03"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (query, headers) = &seen[0];
        assert_eq!(query["since"], "2026-03-02T16:00:00+00:00");
        assert_eq!(query["until"], "2026-03-03T15:59:59.999+00:00");
        assert_eq!(query["per_page"], "100");
        assert_eq!(headers["authorization"], "Bearer ghp_test");
        assert_eq!(headers["accept"], "application/vnd.github.v3+json");
        assert!(headers.contains_key("user-agent"));
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let (base, _seen) =
            commits_api(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()).await;

        let err = reporter(&base).generate_report_at("111", now()).await.unwrap_err();
        match err {
            ReportError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn weekends_skip_the_request() {
        // Saturday 10:00 at UTC+8; nothing listens on port 9
        let saturday = DateTime::parse_from_rfc3339("2026-03-07T02:00:00Z").unwrap().to_utc();
        let report = reporter("http://127.0.0.1:9")
            .generate_report_at("111", saturday)
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn mapping_resolves_github_name() {
        let config = GithubConfig {
            token: "t".into(),
            repo: "acme/app".into(),
            user_mapping: HashMap::from([("alice".to_string(), "111".to_string())]),
        };
        let reporter = GithubReporter::new(reqwest::Client::new(), &config, sgt());
        assert_eq!(reporter.github_name("111"), Some("alice"));
        assert_eq!(reporter.github_name("222"), None);
    }
}
