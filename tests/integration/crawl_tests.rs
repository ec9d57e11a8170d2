//! Integration tests for the crawl orchestrator
//!
//! These tests drive full profile and single-post crawls against the
//! scripted browser and store the results in an in-memory database.

use comment_sentry::browser::scripted::{ScriptedBrowser, ScriptedPage};
use comment_sentry::browser::DeviceProfile;
use comment_sentry::config::Config;
use comment_sentry::crawler::{CrawlOrchestrator, Politeness};
use comment_sentry::harvest::ITEM_SELECTORS;
use comment_sentry::scoring::{HttpToxicityModel, LexiconScorer, ScoringPipeline};
use comment_sentry::state::CrawlState;
use comment_sentry::storage::{CommentStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROFILE: &str = "https://example.com/user/alice";

/// Creates a test configuration writing snapshots to `debug_dir`
fn create_test_config(debug_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.debug_dir = debug_dir.display().to_string();
    config
}

fn create_orchestrator(
    browser: &Arc<ScriptedBrowser>,
    config: &Config,
    scoring: ScoringPipeline,
) -> CrawlOrchestrator<ScriptedBrowser> {
    CrawlOrchestrator::new(Arc::clone(browser), config, scoring)
        .expect("Failed to build orchestrator")
        .with_politeness(Politeness::none())
}

fn rules_only(config: &Config) -> ScoringPipeline {
    ScoringPipeline::new(Arc::new(LexiconScorer::default()), &config.scoring)
}

fn anchors(range: std::ops::Range<u32>) -> String {
    range
        .map(|i| format!(r#"<a href="/post/{i}">post {i}</a>"#))
        .collect()
}

fn post_page(comments: &[&str]) -> ScriptedPage {
    ScriptedPage::new()
        .title("A post")
        .elements(ITEM_SELECTORS[0], comments)
}

fn post_url(i: u32) -> String {
    format!("https://example.com/post/{i}")
}

fn files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            let mut names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            names
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_profile_falls_back_to_desktop_and_stores() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page(
        DeviceProfile::Mobile,
        PROFILE,
        ScriptedPage::new().frame("<div>Get the app to continue</div>"),
    );
    browser.add_page(
        DeviceProfile::Desktop,
        PROFILE,
        ScriptedPage::new().frame(&anchors(1..3)),
    );
    browser.add_page_all(&post_url(1), post_page(&["ann\nlove this", "bo\nyou pathetic loser, die"]));
    browser.add_page_all(&post_url(2), post_page(&["cy\nso pretty"]));

    let report = create_orchestrator(&browser, &config, rules_only(&config))
        .crawl_profile(PROFILE)
        .await
        .unwrap();

    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.total_comments(), 3);
    assert_eq!(report.flagged_count(), 1);
    assert!(report.trail.visited(CrawlState::ErrorFallback));
    assert_eq!(report.trail.current(), CrawlState::Done);
    assert_eq!(browser.opened_contexts()[..2], [DeviceProfile::Mobile, DeviceProfile::Desktop]);
    assert_eq!(browser.closed_contexts(), browser.opened_contexts().len());

    let mut store = SqliteStore::new_in_memory().unwrap();
    assert_eq!(store.upsert(&report.rows).unwrap(), 3);
    assert_eq!(store.count_flagged().unwrap(), 1);

    let flagged = report.rows.iter().find(|r| r.flagged).unwrap();
    assert_eq!(flagged.author, "bo");
    assert!(flagged.post_url.starts_with("https://example.com/post/1?region=US"));
}

#[tokio::test]
async fn test_max_posts_limits_visits() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.max_posts = 5;

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(PROFILE, ScriptedPage::new().frame(&anchors(1..9)));
    for i in 1..9 {
        browser.add_page_all(&post_url(i), post_page(&["x\nhello"]));
    }

    let report = create_orchestrator(&browser, &config, rules_only(&config))
        .crawl_profile(PROFILE)
        .await
        .unwrap();

    let visited: Vec<&str> = report.posts.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(visited.len(), 5);
    for (i, url) in visited.iter().enumerate() {
        assert!(url.starts_with(&post_url(i as u32 + 1)));
    }
    assert!(!browser
        .navigations()
        .iter()
        .any(|n| n.starts_with(&post_url(6))));
}

#[tokio::test]
async fn test_structured_data_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let block = serde_json::json!({
        "@type": "SocialMediaPosting",
        "comment": [
            {"author": {"name": "dee"}, "text": "first!"},
            {"author": "eli", "commentText": "second"}
        ]
    })
    .to_string();

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(
        &post_url(1),
        ScriptedPage::new().elements("script[type='application/ld+json']", &[&block]),
    );

    let report = create_orchestrator(&browser, &config, rules_only(&config))
        .crawl_single(&post_url(1))
        .await
        .unwrap();

    let authors: Vec<&str> = report.rows.iter().map(|r| r.author.as_str()).collect();
    assert_eq!(authors, vec!["dee", "eli"]);
    assert_eq!(report.posts[0].profile, Some(DeviceProfile::Mobile));
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_post_without_comments_snapshots_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(
        &post_url(1),
        ScriptedPage::new().frame("<main>Comments are only visible in the app</main>"),
    );

    let report = create_orchestrator(&browser, &config, rules_only(&config))
        .crawl_single(&post_url(1))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.posts[0].profile, None);
    assert_eq!(report.trail.current(), CrawlState::Failed);
    assert!(report.trail.is_consistent());

    let files = files_in(dir.path());
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.starts_with("no-comments-")));
    assert!(files[0].ends_with(".html"));
    assert!(files[1].ends_with(".png"));
}

#[tokio::test]
async fn test_recrawl_upserts_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(&post_url(7), post_page(&["fay\nhi", "gus\nhey"]));
    let orchestrator = create_orchestrator(&browser, &config, rules_only(&config));
    let mut store = SqliteStore::new_in_memory().unwrap();

    let first = orchestrator.crawl_single(&post_url(7)).await.unwrap();
    store.upsert(&first.rows).unwrap();
    let second = orchestrator.crawl_single(&post_url(7)).await.unwrap();
    store.upsert(&second.rows).unwrap();

    assert_eq!(first.rows[0].id, second.rows[0].id);
    assert_eq!(store.count_comments().unwrap(), 2);
    assert_eq!(store.comments_per_post().unwrap()[0].comments, 2);
}

#[tokio::test]
async fn test_profile_timeout_retries_with_region_hint() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(PROFILE, ScriptedPage::new().frame(&anchors(1..2)).fail_goto(1));
    browser.add_page_all(&post_url(1), post_page(&["hal\nok"]));

    let report = create_orchestrator(&browser, &config, rules_only(&config))
        .crawl_profile(PROFILE)
        .await
        .unwrap();

    let navigations = browser.navigations();
    assert_eq!(navigations[0], PROFILE);
    assert_eq!(navigations[1], format!("{}?region=US", PROFILE));
    assert_eq!(report.total_comments(), 1);
    assert!(!report.trail.visited(CrawlState::ErrorFallback));
    assert_eq!(browser.opened_contexts()[0], DeviceProfile::Mobile);
}

#[tokio::test]
async fn test_model_scores_flag_comments() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "toxicity": [0.92, 0.03],
            "insult": [0.40, 0.01]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let model = HttpToxicityModel::new(format!("{}/predict", mock_server.uri())).unwrap();
    let scoring = rules_only(&config).with_model(Arc::new(model));

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(&post_url(3), post_page(&["ivy\nsubtle venom", "jo\nnice"]));

    let report = create_orchestrator(&browser, &config, scoring)
        .crawl_single(&post_url(3))
        .await
        .unwrap();

    assert_eq!(report.total_comments(), 2);
    assert!(report.rows[0].flagged);
    assert!(!report.rows[1].flagged);
    let scores = report.rows[0].model_scores.as_ref().unwrap();
    assert_eq!(scores["toxicity"], 0.92);
    assert_eq!(scores["insult"], 0.40);
}

#[tokio::test]
async fn test_model_outage_degrades_to_rules() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let model = HttpToxicityModel::new(mock_server.uri()).unwrap();
    let scoring = rules_only(&config).with_model(Arc::new(model));

    let browser = Arc::new(ScriptedBrowser::new());
    browser.add_page_all(&post_url(4), post_page(&["kim\nworthless idiot", "lu\nnice"]));

    let report = create_orchestrator(&browser, &config, scoring)
        .crawl_single(&post_url(4))
        .await
        .unwrap();

    assert_eq!(report.total_comments(), 2);
    assert!(report.rows.iter().all(|r| r.model_scores.is_none()));
    assert_eq!(report.flagged_count(), 1);
}
