//! Integration tests for widgetry-registry

use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use widgetry::memory::{MemoryCheckout, MemoryDeclarations, MemoryPackager};
use widgetry::*;
use widgetry_registry::*;

const REPO: &str = "https://github.com/acme/clock";
const C1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const C2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const C3: &str = "cccccccccccccccccccccccccccccccccccccccc";

fn manifest_json(version: &str) -> String {
    json!({
        "name": "Clock",
        "version": version,
        "authors": ["Ada", {"name": "Grace", "email": "grace@example.com"}],
        "license": "MIT",
        "description": "A desktop clock",
        "homepage": "https://example.com/clock"
    })
    .to_string()
}

fn sources_yaml(commit: &str, version: &str) -> String {
    format!("clock:\n  repo: {REPO}\n  commit: {commit}\n  version: {version}\n")
}

fn upstream(checkout: &MemoryCheckout, commit: &str, version: &str) {
    checkout.insert(REPO, commit, "widgetry.widget.json", manifest_json(version));
    checkout.insert(REPO, commit, "README.md", format!("# Clock {version}"));
    checkout.insert(REPO, commit, "index.js", format!("export const version = '{version}';"));
}

fn acme() -> Vec<Slug> {
    vec![Slug::parse("acme").unwrap()]
}

fn widget_key() -> ItemKey {
    ItemKey::new(
        Collection::Widgets,
        Slug::parse("acme").unwrap(),
        Slug::parse("clock").unwrap(),
    )
}

async fn validate(
    checkout: Arc<MemoryCheckout>,
    declarations: MemoryDeclarations,
    base: &str,
    head: &str,
) -> PublishPlan {
    let validator = ChangeValidator::new(
        checkout,
        Arc::new(MemoryPackager::new()),
        Arc::new(NoLicenseDetection),
        LicensePolicy::default(),
    );
    let store = DeclarationStore::new(Arc::new(declarations));
    validator
        .validate(&store, &RevisionRange::new(base, head), &acme())
        .await
        .unwrap()
}

fn publisher(
    storage: Arc<FileSystemStorage>,
    checkout: Arc<MemoryCheckout>,
    packager: Arc<MemoryPackager>,
) -> RegistryPublisher<FileSystemStorage> {
    let mut options = PublishOptions::new("ghcr.io", "Widgetry", "v1");
    options.official_publishers.insert("acme".into());
    RegistryPublisher::new(
        ApiStore::new(storage),
        checkout,
        packager,
        Arc::new(SkipAttestation),
        options,
    )
}

#[tokio::test]
async fn test_new_publisher_end_to_end() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    upstream(&checkout, C1, "0.1.0");
    let declarations = MemoryDeclarations::new()
        .with_file("head", "publishers/acme.yaml", "user: 1\n")
        .with_file("head", "widgets/acme.yaml", &sources_yaml(C1, "0.1.0"));

    let plan = validate(checkout.clone(), declarations, "base", "head").await;
    assert_eq!(plan.len(), 1);

    // hand the plan over through a file, as the pipeline does
    let plan_path = dir.path().join("plan.json");
    plan.write(&plan_path).await.unwrap();
    let plan = PublishPlan::read(&plan_path).await.unwrap();

    let storage = Arc::new(FileSystemStorage::new(dir.path().join("api")).await.unwrap());
    let packager = Arc::new(MemoryPackager::new().with_created_at("2025-03-01T12:00:00Z"));
    let index = publisher(storage.clone(), checkout, packager.clone())
        .run(&plan)
        .await
        .unwrap();

    let widgets = index.get(Collection::Widgets).unwrap();
    assert_eq!(widgets.items.len(), 1);
    let entry = &widgets.items[0];
    assert_eq!(entry.version, "0.1.0");
    assert_eq!(entry.authors, vec!["Ada", "Grace"]);
    assert!(entry.official);
    assert!(!entry.hidden);

    let pushed = packager.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, "ghcr.io/widgetry/widgets/acme/clock:v0.1.0");

    let store = ApiStore::new(storage.clone());
    let meta = store.load_metadata(&widget_key()).await.unwrap().unwrap();
    assert_eq!(meta.digest, pushed[0].1);
    assert!(meta.readme);
    assert!(!meta.changelog);
    assert_eq!(meta.published_at, time::macros::datetime!(2025-03-01 12:00:00 UTC));

    let history = store.load_history(&widget_key()).await.unwrap();
    assert_eq!(history.items.len(), 1);
    assert_eq!(history.items[0].version, "0.1.0");

    let readme = storage.get("widgets/acme/clock/files/readme").await.unwrap();
    assert_eq!(readme, b"# Clock 0.1.0");
}

#[tokio::test]
async fn test_index_round_trips_through_storage() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    upstream(&checkout, C1, "0.1.0");
    let declarations =
        MemoryDeclarations::new().with_file("head", "widgets/acme.yaml", &sources_yaml(C1, "0.1.0"));
    let plan = validate(checkout.clone(), declarations, "base", "head").await;

    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());
    let written = publisher(storage.clone(), checkout, Arc::new(MemoryPackager::new()))
        .run(&plan)
        .await
        .unwrap();

    let reread = ApiStore::new(storage).load_index("v1").await.unwrap();
    assert_eq!(reread, written);
    let entry = reread.get(Collection::Widgets).unwrap().find("acme", "clock").unwrap();
    assert_eq!(entry.name, "Clock");
    assert_eq!(entry.description, "A desktop clock");
}

#[tokio::test]
async fn test_reapplying_plan_is_idempotent() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    upstream(&checkout, C1, "0.1.0");
    let declarations =
        MemoryDeclarations::new().with_file("head", "widgets/acme.yaml", &sources_yaml(C1, "0.1.0"));
    let plan = validate(checkout.clone(), declarations, "base", "head").await;

    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());
    let publisher = publisher(storage.clone(), checkout, Arc::new(MemoryPackager::new()));
    let first = publisher.run(&plan).await.unwrap();
    let second = publisher.run(&plan).await.unwrap();

    let first_items = &first.get(Collection::Widgets).unwrap().items;
    let second_items = &second.get(Collection::Widgets).unwrap().items;
    assert_eq!(first_items, second_items);
    assert_eq!(second_items.len(), 1);

    let history = ApiStore::new(storage).load_history(&widget_key()).await.unwrap();
    assert_eq!(history.items.len(), 1);
}

#[tokio::test]
async fn test_history_after_three_publishes() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());

    let releases = [(C1, "1.0.0"), (C2, "1.1.0"), (C3, "2.0.0")];
    let declarations = MemoryDeclarations::new();
    for (i, (commit, version)) in releases.iter().enumerate() {
        upstream(&checkout, commit, version);
        declarations.insert(&format!("rev{}", i + 1), "widgets/acme.yaml", &sources_yaml(commit, version));
    }
    let declarations = Arc::new(declarations);
    let store = DeclarationStore::new(declarations);
    let validator = ChangeValidator::new(
        checkout.clone(),
        Arc::new(MemoryPackager::new()),
        Arc::new(NoLicenseDetection),
        LicensePolicy::default(),
    );
    let publisher = publisher(storage.clone(), checkout, Arc::new(MemoryPackager::new()));

    for i in 0..releases.len() {
        let revisions = RevisionRange::new(format!("rev{i}"), format!("rev{}", i + 1));
        let plan = validator.validate(&store, &revisions, &acme()).await.unwrap();
        assert_eq!(plan.len(), 1);
        publisher.run(&plan).await.unwrap();
    }

    let api = ApiStore::new(storage);
    let history = api.load_history(&widget_key()).await.unwrap();
    let versions: Vec<_> = history.items.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(versions, vec!["2.0.0", "1.1.0", "1.0.0"]);

    let index = api.load_index("v1").await.unwrap();
    let widgets = index.get(Collection::Widgets).unwrap();
    assert_eq!(widgets.items.len(), 1);
    assert_eq!(widgets.items[0].version, "2.0.0");
}

#[tokio::test]
async fn test_plugins_are_skipped_when_publishing() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    checkout.insert(REPO, C1, "widgetry.plugin.json", manifest_json("0.1.0"));
    let declarations =
        MemoryDeclarations::new().with_file("head", "plugins/acme.yaml", &sources_yaml(C1, "0.1.0"));
    let plan = validate(checkout.clone(), declarations, "base", "head").await;
    assert_eq!(plan.len(), 1);

    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());
    let packager = Arc::new(MemoryPackager::new());
    let index = publisher(storage, checkout, packager.clone())
        .run(&plan)
        .await
        .unwrap();

    assert!(index.iter().all(|(_, doc)| doc.items.is_empty()));
    assert!(packager.pushed().is_empty());
}

#[tokio::test]
async fn test_api_version_mismatch_aborts_before_publishing() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.widgets.json"),
        json!({"api": "v0", "generatedAt": "2025-01-01T00:00:00Z", "items": []}).to_string(),
    )
    .unwrap();

    let checkout = Arc::new(MemoryCheckout::new());
    upstream(&checkout, C1, "0.1.0");
    let declarations =
        MemoryDeclarations::new().with_file("head", "widgets/acme.yaml", &sources_yaml(C1, "0.1.0"));
    let plan = validate(checkout.clone(), declarations, "base", "head").await;

    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());
    let packager = Arc::new(MemoryPackager::new());
    let err = publisher(storage, checkout, packager.clone())
        .run(&plan)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::ApiVersionMismatch { .. }));
    assert!(packager.pushed().is_empty());
}

#[tokio::test]
async fn test_required_readme_missing_is_fatal() {
    let dir = tempdir().unwrap();
    let checkout = Arc::new(MemoryCheckout::new());
    let mut manifest: serde_json::Value = serde_json::from_str(&manifest_json("0.1.0")).unwrap();
    manifest["readme"] = json!(true);
    checkout.insert(REPO, C1, "widgetry.widget.json", manifest.to_string());
    let declarations =
        MemoryDeclarations::new().with_file("head", "widgets/acme.yaml", &sources_yaml(C1, "0.1.0"));
    let plan = validate(checkout.clone(), declarations, "base", "head").await;

    let storage = Arc::new(FileSystemStorage::new(dir.path()).await.unwrap());
    let packager = Arc::new(MemoryPackager::new());
    let err = publisher(storage, checkout, packager.clone())
        .run(&plan)
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::SpecialFile { .. }));
    assert!(packager.pushed().is_empty());
}
