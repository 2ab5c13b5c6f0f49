use ladder_application::{StoreManager, StoreSettings};
use ladder_core::SchemaVersion;
use ladder_infrastructure::config::{MigrationConfig, StoreConfig};
use ladder_infrastructure::storage::json_store::journal_path;
use ladder_infrastructure::{DescriptorCache, JournalMode, JsonFileStore, LadderConfig, StoreOptions};
use serde_json::json;
use tempfile::TempDir;

fn config(temp_dir: &TempDir) -> LadderConfig {
    LadderConfig {
        store: StoreConfig {
            path: Some(temp_dir.path().join("posts.store")),
            journal_mode: JournalMode::Wal,
        },
        migration: MigrationConfig {
            scratch_dir: Some(temp_dir.path().join("scratch")),
            ..Default::default()
        },
    }
}

fn seed_v1(config: &LadderConfig, count: usize) {
    let descriptors = DescriptorCache::bundled();
    let mut handle = JsonFileStore::open(
        &config.store_path().unwrap(),
        descriptors.get(SchemaVersion::V1).unwrap(),
        StoreOptions {
            journal_mode: JournalMode::Wal,
            create_if_missing: true,
        },
    )
    .unwrap();
    for i in 0..count {
        let record = json!({
            "postID": format!("post-{}", i),
            "date": "2017-09-12T13:03:58Z",
            "hexColor": "259EB7",
            "content": "A post about migrations",
        });
        handle
            .insert("Post", record.as_object().unwrap().clone())
            .unwrap();
    }
    handle.close().unwrap();
}

#[tokio::test]
async fn test_setup_migrates_existing_store_to_latest() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);
    seed_v1(&config, 5);

    let manager = StoreManager::from_config(&config).unwrap();
    let mut handle = manager.setup().await.unwrap();

    assert_eq!(handle.count("Post"), 5);
    assert_eq!(handle.count("Section"), 10);
    assert_eq!(handle.count("Color"), 5);
    assert_eq!(handle.descriptor().model_name, "PostStore 4");

    // The migrated store accepts writes under the latest model.
    let color = handle
        .insert(
            "Color",
            json!({"colorID": "c-new", "hex": "000000"})
                .as_object()
                .unwrap()
                .clone(),
        )
        .unwrap();
    assert!(handle.get("Color", &color).is_some());

    let location = handle.location().to_path_buf();
    manager.teardown(handle).unwrap();
    assert!(!journal_path(&location).exists());
}

#[tokio::test]
async fn test_setup_creates_missing_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);

    let manager = StoreManager::from_config(&config).unwrap();
    let handle = manager.setup().await.unwrap();

    assert_eq!(handle.total_count(), 0);
    assert_eq!(handle.descriptor().version, SchemaVersion::latest().ordinal());
}

#[tokio::test]
async fn test_setup_respects_configured_target() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config(&temp_dir);
    config.migration.target_version = Some(2);
    seed_v1(&config, 2);

    let manager = StoreManager::from_config(&config).unwrap();
    assert_eq!(
        manager.settings(),
        &StoreSettings {
            location: temp_dir.path().join("posts.store"),
            target: SchemaVersion::V2,
            journal_mode: JournalMode::Wal,
        }
    );

    let handle = manager.setup().await.unwrap();
    assert_eq!(handle.count("Section"), 4);
    assert_eq!(handle.count("Color"), 0);
}

#[tokio::test]
async fn test_setup_reports_unknown_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);
    std::fs::write(
        config.store_path().unwrap(),
        r#"{"metadata":{"format":1,"store_id":"x","entity_hashes":{"Ghost":"0"}},"entities":{}}"#,
    )
    .unwrap();

    let manager = StoreManager::from_config(&config).unwrap();
    let err = manager.setup().await.unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown store version"));
}
