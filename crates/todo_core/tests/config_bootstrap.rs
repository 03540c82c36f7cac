use todo_core::{bootstrap, CoreConfig, ReadQuery, StorageConfig};

#[test]
fn bootstrap_memory_backend_starts_empty() {
    let model = bootstrap(&CoreConfig::default()).unwrap();

    assert!(model.read(&ReadQuery::All).unwrap().is_empty());
    let task = model.create("a", "Work").unwrap();
    assert_eq!(model.read(&ReadQuery::ById(task.id)).unwrap().len(), 1);
}

#[test]
fn bootstrap_sqlite_backend_persists_between_bootstraps() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        storage: StorageConfig::Sqlite {
            path: dir.path().join("todo.db"),
        },
        logging: None,
    };

    {
        let model = bootstrap(&config).unwrap();
        model.create("persisted", "Work").unwrap();
    }

    let model = bootstrap(&config).unwrap();
    let views = model.read(&ReadQuery::All).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].title, "persisted");
    assert_eq!(views[0].category_name.as_deref(), Some("Work"));

    // Warm index: the same name reuses the persisted category.
    let again = model.create("second", "Work").unwrap();
    assert_eq!(again.category_id, views[0].category_id);
}

#[test]
fn bootstrap_from_json_document() {
    let dir = tempfile::tempdir().unwrap();
    let document = serde_json::json!({
        "storage": {"backend": "sqlite", "path": dir.path().join("todo.db")},
    });
    let config = CoreConfig::from_json_str(&document.to_string()).unwrap();

    let model = bootstrap(&config).unwrap();
    model.create("a", "Home").unwrap();
    assert_eq!(model.get_count().unwrap().active, 1);
}

#[test]
fn bootstrap_rejects_unopenable_sqlite_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        storage: StorageConfig::Sqlite {
            path: dir.path().join("missing").join("nested").join("todo.db"),
        },
        logging: None,
    };

    let err = bootstrap(&config).err().unwrap();
    assert!(!err.to_string().is_empty());
}
