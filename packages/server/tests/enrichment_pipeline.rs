//! Integration tests for the enrichment pipeline against real Postgres.
//!
//! A single Postgres container is shared across tests; each test gets its
//! own freshly-migrated database so fan-out queries never see another
//! test's rows. All tests are #[ignore]-gated: run with
//! `cargo test -- --ignored` (requires Docker).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use server_core::common::{JobId, ListingId, VendorId};
use server_core::domains::enrichment::handlers::classify::ClassifyHandler;
use server_core::domains::enrichment::handlers::hero_photos::HeroPhotosHandler;
use server_core::domains::enrichment::handlers::vendor_names::VendorNamesHandler;
use server_core::domains::enrichment::{
    build_registry, EnrichmentHandler, EnrichmentJob, EnrichmentTask, JobKind, JobManager,
    JobStatus, TaskStatus,
};
use server_core::domains::listings::models::Listing;
use server_core::domains::vendors::models::Vendor;
use server_core::kernel::test_dependencies::{
    MemoryImageStore, MockWebScraper, ScriptedClassifier,
};
use server_core::kernel::ServerKernel;
use server_core::EnrichmentConfig;

struct SharedInfra {
    base_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedInfra> = OnceCell::const_new();

impl SharedInfra {
    async fn init() -> Result<Self> {
        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        Ok(Self {
            base_url: format!("postgresql://postgres:postgres@{}:{}", host, port),
            _postgres: postgres,
        })
    }
}

/// Fresh, migrated database for one test.
async fn test_pool() -> PgPool {
    let infra = SHARED_INFRA
        .get_or_init(|| async { SharedInfra::init().await.expect("test infra") })
        .await;

    let admin = PgPool::connect(&format!("{}/postgres", infra.base_url))
        .await
        .expect("admin pool");
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE DATABASE {}", db_name))
        .execute(&admin)
        .await
        .expect("create test database");

    let pool = PgPool::connect(&format!("{}/{}", infra.base_url, db_name))
        .await
        .expect("test pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

fn test_config() -> EnrichmentConfig {
    EnrichmentConfig {
        chunk_size: 2,
        concurrency: 1,
        scrape_timeout: Duration::from_secs(5),
        model: "test-model".to_string(),
        max_candidate_images: 4,
    }
}

fn kernel_with(
    pool: PgPool,
    scraper: MockWebScraper,
    classifier: ScriptedClassifier,
) -> Arc<ServerKernel> {
    Arc::new(ServerKernel::new(
        pool,
        Arc::new(scraper),
        Arc::new(classifier),
        Arc::new(MemoryImageStore::new()),
        test_config(),
    ))
}

async fn insert_listing(
    pool: &PgPool,
    name: &str,
    website: Option<&str>,
    is_touchless: Option<bool>,
) -> ListingId {
    let id = ListingId::new();
    sqlx::query(
        "INSERT INTO listings (id, name, city, state, website, is_touchless)
         VALUES ($1, $2, 'Duluth', 'MN', $3, $4)",
    )
    .bind(id)
    .bind(name)
    .bind(website)
    .bind(is_touchless)
    .execute(pool)
    .await
    .expect("insert listing");
    id
}

async fn wait_for_terminal(job_id: JobId, pool: &PgPool) -> EnrichmentJob {
    for _ in 0..100 {
        let job = EnrichmentJob::find_by_id(job_id, pool).await.expect("job");
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

// ---------------------------------------------------------------------------
// Task queue / job ledger
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore] // Requires Docker
async fn fan_out_is_exhaustive_and_idempotent() {
    let pool = test_pool().await;
    let job = EnrichmentJob::new(JobKind::Classification, 3)
        .insert(&pool)
        .await
        .unwrap();
    let targets: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();

    let inserted = EnrichmentTask::fan_out(job.id, &targets, &pool).await.unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(EnrichmentTask::count_pending(job.id, &pool).await.unwrap(), 3);

    // Re-running fan-out after a crash must not duplicate work
    let inserted_again = EnrichmentTask::fan_out(job.id, &targets, &pool).await.unwrap();
    assert_eq!(inserted_again, 0);
    assert_eq!(EnrichmentTask::count_pending(job.id, &pool).await.unwrap(), 3);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn claim_complete_fail_flow_and_counters() {
    let pool = test_pool().await;
    let job = EnrichmentJob::new(JobKind::AmenityBackfill, 2)
        .insert(&pool)
        .await
        .unwrap();
    let targets: Vec<Uuid> = (0..2).map(|_| Uuid::now_v7()).collect();
    EnrichmentTask::fan_out(job.id, &targets, &pool).await.unwrap();

    let claimed = EnrichmentTask::claim_batch(job.id, 10, &pool).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|t| t.status == TaskStatus::InProgress));

    // A second claimer gets nothing
    let claimed_again = EnrichmentTask::claim_batch(job.id, 10, &pool).await.unwrap();
    assert!(claimed_again.is_empty());

    EnrichmentTask::complete(
        claimed[0].id,
        true,
        Some(serde_json::json!({"is_touchless": true})),
        &pool,
    )
    .await
    .unwrap();
    EnrichmentTask::fail(claimed[1].id, "scrape timed out", &pool)
        .await
        .unwrap();
    EnrichmentJob::increment_counters(job.id, 2, 1, 1, &pool)
        .await
        .unwrap();

    let job = EnrichmentJob::find_by_id(job.id, &pool).await.unwrap();
    assert_eq!(job.processed, 2);
    assert_eq!(job.changed, 1);
    assert_eq!(job.failed, 1);
    assert!(job.processed <= job.total);

    let failures = EnrichmentTask::recent_failures(job.id, 10, &pool).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error_message.as_deref(), Some("scrape timed out"));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn cancel_flips_job_and_pending_tasks_only() {
    let pool = test_pool().await;
    let job = EnrichmentJob::new(JobKind::Classification, 8)
        .insert(&pool)
        .await
        .unwrap();
    let targets: Vec<Uuid> = (0..8).map(|_| Uuid::now_v7()).collect();
    EnrichmentTask::fan_out(job.id, &targets, &pool).await.unwrap();
    EnrichmentJob::mark_running(job.id, &pool).await.unwrap();

    // Two tasks reach a terminal state before the cancel arrives
    let claimed = EnrichmentTask::claim_batch(job.id, 2, &pool).await.unwrap();
    for task in &claimed {
        EnrichmentTask::complete(task.id, false, None, &pool).await.unwrap();
    }
    EnrichmentJob::increment_counters(job.id, 2, 0, 0, &pool).await.unwrap();

    assert!(EnrichmentJob::cancel(job.id, &pool).await.unwrap());

    let job = EnrichmentJob::find_by_id(job.id, &pool).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.processed, 2);

    let counts = EnrichmentTask::status_counts(job.id, &pool).await.unwrap();
    let count_of = |status: TaskStatus| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    };
    // The 6 still-pending tasks are cancelled, the 2 done tasks keep their state
    assert_eq!(count_of(TaskStatus::Cancelled), 6);
    assert_eq!(count_of(TaskStatus::Done), 2);
    assert_eq!(count_of(TaskStatus::Pending), 0);

    // Cancelling again is not a valid transition
    assert!(!EnrichmentJob::cancel(job.id, &pool).await.unwrap());
}

// ---------------------------------------------------------------------------
// End-to-end runs through the manager and runner
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore] // Requires Docker
async fn classification_run_applies_default_false_policy() {
    let pool = test_pool().await;

    // Run 1: touchless language present
    let touchless_id = insert_listing(
        &pool,
        "Laser Shine",
        Some("https://laser-shine.test"),
        None,
    )
    .await;
    let scraper = MockWebScraper::new().with_page(
        "https://laser-shine.test",
        "We offer a touchless automatic wash and a soft-touch option.",
    );
    let classifier = ScriptedClassifier::new().with_response(
        r#"{"is_touchless": true, "evidence": "touchless automatic wash", "amenities": ["touchless wash", "soft-touch option"]}"#,
    );
    let kernel = kernel_with(pool.clone(), scraper, classifier);
    let manager = JobManager::new(kernel, Arc::new(build_registry()));

    let job = manager.start(JobKind::Classification).await.unwrap();
    let job = wait_for_terminal(job.id, &pool).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.processed, 1);
    assert_eq!(job.changed, 1);
    assert_eq!(job.failed, 0);

    let listing = Listing::find_by_id(touchless_id, &pool).await.unwrap();
    assert_eq!(listing.is_touchless, Some(true));
    assert!(!listing.amenities.is_empty());

    // Run 2: wash services described without touchless language
    let friction_id = insert_listing(
        &pool,
        "Express Wash",
        Some("https://express-wash.test"),
        None,
    )
    .await;
    let scraper = MockWebScraper::new().with_page(
        "https://express-wash.test",
        "Our express wash uses triple-foam wax and tire shine.",
    );
    let classifier = ScriptedClassifier::new().with_response(
        r#"{"is_touchless": false, "evidence": "express tunnel, no touchless language", "amenities": ["tire shine"]}"#,
    );
    let kernel = kernel_with(pool.clone(), scraper, classifier);
    let manager = JobManager::new(kernel, Arc::new(build_registry()));

    let job = manager.start(JobKind::Classification).await.unwrap();
    let job = wait_for_terminal(job.id, &pool).await;
    assert_eq!(job.status, JobStatus::Done);

    let listing = Listing::find_by_id(friction_id, &pool).await.unwrap();
    assert_eq!(listing.is_touchless, Some(false));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn listing_without_website_completes_without_failure() {
    let pool = test_pool().await;
    let id = insert_listing(&pool, "No Site Wash", None, None).await;

    let kernel = kernel_with(pool.clone(), MockWebScraper::new(), ScriptedClassifier::new());
    let handler = ClassifyHandler;
    let outcome = handler.process(id.into_uuid(), &kernel).await.unwrap();
    assert!(!outcome.changed);

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    assert_eq!(listing.crawl_status.to_string(), "no_website");
    assert_eq!(listing.is_touchless, None);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn scrape_timeout_fails_the_task_and_sets_fetch_failed() {
    let pool = test_pool().await;
    let id = insert_listing(&pool, "Slow Wash", Some("https://slow.test"), None).await;

    let scraper = MockWebScraper::new().with_failure("https://slow.test", "timeout");
    let kernel = kernel_with(pool.clone(), scraper, ScriptedClassifier::new());
    let handler = ClassifyHandler;

    let result = handler.process(id.into_uuid(), &kernel).await;
    assert!(result.is_err());

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    assert_eq!(listing.crawl_status.to_string(), "fetch_failed");
    assert_eq!(listing.is_touchless, None);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn batch_run_never_flips_an_existing_verdict() {
    let pool = test_pool().await;
    let id = insert_listing(
        &pool,
        "Approved Wash",
        Some("https://approved.test"),
        Some(true),
    )
    .await;

    let scraper = MockWebScraper::new().with_page("https://approved.test", "Just an express wash.");
    let classifier = ScriptedClassifier::new()
        .with_response(r#"{"is_touchless": false, "evidence": "no touchless language"}"#);
    let kernel = kernel_with(pool.clone(), scraper, classifier);

    let handler = ClassifyHandler;
    handler.process(id.into_uuid(), &kernel).await.unwrap();

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    assert_eq!(listing.is_touchless, Some(true));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn only_one_active_job_per_kind() {
    let pool = test_pool().await;
    // A paused job still counts as active
    let job = EnrichmentJob::new(JobKind::DescriptionGeneration, 100)
        .insert(&pool)
        .await
        .unwrap();
    EnrichmentJob::mark_running(job.id, &pool).await.unwrap();
    EnrichmentJob::mark_paused(job.id, &pool).await.unwrap();

    let kernel = kernel_with(pool.clone(), MockWebScraper::new(), ScriptedClassifier::new());
    let manager = JobManager::new(kernel, Arc::new(build_registry()));

    let result = manager.start(JobKind::DescriptionGeneration).await;
    assert!(result.is_err());

    // Cleanup so other runs of this kind are possible
    EnrichmentJob::cancel(job.id, &pool).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Docker
async fn vendor_name_cleanup_propagates_to_listings() {
    let pool = test_pool().await;

    let vendor_id = VendorId::new();
    sqlx::query("INSERT INTO vendors (id, name, domain) VALUES ($1, 'Find Shell', 'find.shell.com')")
        .bind(vendor_id)
        .execute(&pool)
        .await
        .unwrap();
    let listing_id = insert_listing(&pool, "Find Shell Duluth", None, None).await;
    sqlx::query("UPDATE listings SET vendor_name = 'Find Shell' WHERE id = $1")
        .bind(listing_id)
        .execute(&pool)
        .await
        .unwrap();

    let classifier = ScriptedClassifier::new().with_response(r#"{"name": "Shell"}"#);
    let kernel = kernel_with(pool.clone(), MockWebScraper::new(), classifier);

    let handler = VendorNamesHandler;
    let outcome = handler.process(vendor_id.into_uuid(), &kernel).await.unwrap();
    assert!(outcome.changed);
    let result = outcome.result.unwrap();
    assert_eq!(result["old"], "Find Shell");
    assert_eq!(result["new"], "Shell");

    let vendor = Vendor::find_by_id(vendor_id, &pool).await.unwrap();
    assert_eq!(vendor.name, "Shell");
    let listing = Listing::find_by_id(listing_id, &pool).await.unwrap();
    assert_eq!(listing.vendor_name.as_deref(), Some("Shell"));

    // Rerun with the already-correct name: echoed back, not a change
    let classifier = ScriptedClassifier::new().with_response(r#"{"name": "Shell"}"#);
    let kernel = kernel_with(pool.clone(), MockWebScraper::new(), classifier);
    let outcome = handler.process(vendor_id.into_uuid(), &kernel).await.unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn hero_photo_approved_images_are_rehosted() {
    let pool = test_pool().await;
    let id = insert_listing(&pool, "Shiny Wash", Some("https://shiny.test"), None).await;

    let scraper = MockWebScraper::new()
        .with_images("https://shiny.test", "Our wash", vec!["https://shiny.test/hero.jpg"])
        .with_bytes("https://shiny.test/hero.jpg", b"hero-bytes", "image/jpeg");
    let classifier =
        ScriptedClassifier::new().with_response(r#"{"best_index": 0, "blocked": []}"#);
    let store = MemoryImageStore::new();
    let uploads = store.uploads.clone();
    let kernel = Arc::new(ServerKernel::new(
        pool.clone(),
        Arc::new(scraper),
        Arc::new(classifier),
        Arc::new(store),
        test_config(),
    ));

    let handler = HeroPhotosHandler;
    let outcome = handler.process(id.into_uuid(), &kernel).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(uploads.lock().unwrap().len(), 1);

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    let hero = listing.hero_image.expect("hero image set");
    assert!(hero.starts_with("https://cdn.test/photos/"));
    assert_eq!(listing.photos, vec![hero]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn hero_photo_rehost_failure_keeps_source_urls() {
    let pool = test_pool().await;
    let id = insert_listing(&pool, "Photo Wash", Some("https://photo.test"), None).await;

    let scraper = MockWebScraper::new()
        .with_images(
            "https://photo.test",
            "Gallery",
            vec![
                "https://photo.test/front.jpg",
                "https://photo.test/logo.png",
                "https://photo.test/tunnel.jpg",
            ],
        )
        .with_bytes("https://photo.test/front.jpg", b"front", "image/jpeg")
        .with_bytes("https://photo.test/logo.png", b"logo", "image/png")
        .with_bytes("https://photo.test/tunnel.jpg", b"tunnel", "image/jpeg");
    let classifier =
        ScriptedClassifier::new().with_response(r#"{"best_index": 0, "blocked": [1]}"#);
    let kernel = Arc::new(ServerKernel::new(
        pool.clone(),
        Arc::new(scraper),
        Arc::new(classifier),
        Arc::new(MemoryImageStore::failing()),
        test_config(),
    ));

    let handler = HeroPhotosHandler;
    let outcome = handler.process(id.into_uuid(), &kernel).await.unwrap();
    assert!(outcome.changed);

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    // Storage rejected every upload, so approved images keep their source URLs
    assert_eq!(
        listing.hero_image.as_deref(),
        Some("https://photo.test/front.jpg")
    );
    // Approved = not blocked: the unblocked tunnel shot is kept alongside the
    // hero, the blocked logo is dropped
    assert!(listing
        .photos
        .contains(&"https://photo.test/front.jpg".to_string()));
    assert!(listing
        .photos
        .contains(&"https://photo.test/tunnel.jpg".to_string()));
    assert!(!listing.photos.iter().any(|p| p.contains("logo")));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn fill_website_never_overwrites() {
    let pool = test_pool().await;
    let id = insert_listing(&pool, "Chain Wash", None, None).await;

    assert!(Listing::fill_website(id, "https://chain.test/duluth", &pool).await.unwrap());
    assert!(!Listing::fill_website(id, "https://other.test", &pool).await.unwrap());

    let listing = Listing::find_by_id(id, &pool).await.unwrap();
    assert_eq!(listing.website.as_deref(), Some("https://chain.test/duluth"));
}
