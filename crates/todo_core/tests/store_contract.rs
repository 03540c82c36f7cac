use serde_json::json;
use todo_core::{Fields, MemoryStore, RecordId, SqliteStore, Store};

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn backends() -> Vec<(&'static str, Box<dyn Store>)> {
    vec![
        ("memory", Box::new(MemoryStore::new("tasks"))),
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory("tasks").unwrap()),
        ),
    ]
}

#[test]
fn insert_returns_only_the_new_record_with_fresh_ids() {
    for (backend, store) in backends() {
        let first = store.save(fields(json!({"title": "a"})), None).unwrap();
        let second = store.save(fields(json!({"title": "b"})), None).unwrap();

        assert_eq!(first.len(), 1, "{backend}");
        assert_eq!(second.len(), 1, "{backend}");
        assert_ne!(first[0].id, second[0].id, "{backend}");
        assert_eq!(second[0].get("title"), Some(&json!("b")), "{backend}");
    }
}

#[test]
fn find_all_preserves_insertion_order() {
    for (backend, store) in backends() {
        for title in ["one", "two", "three"] {
            store.save(fields(json!({ "title": title })), None).unwrap();
        }

        let titles: Vec<_> = store
            .find_all()
            .unwrap()
            .iter()
            .map(|record| record.get("title").cloned().unwrap())
            .collect();
        assert_eq!(titles, vec![json!("one"), json!("two"), json!("three")], "{backend}");
    }
}

#[test]
fn find_matches_every_predicate_field() {
    for (backend, store) in backends() {
        store
            .save(fields(json!({"title": "a", "completed": true})), None)
            .unwrap();
        store
            .save(fields(json!({"title": "b", "completed": false})), None)
            .unwrap();
        store
            .save(fields(json!({"title": "a", "completed": false})), None)
            .unwrap();

        assert_eq!(store.find(&Fields::new()).unwrap().len(), 3, "{backend}");
        assert_eq!(
            store.find(&fields(json!({"title": "a"}))).unwrap().len(),
            2,
            "{backend}"
        );
        let exact = store
            .find(&fields(json!({"title": "a", "completed": false})))
            .unwrap();
        assert_eq!(exact.len(), 1, "{backend}");
        assert_eq!(exact[0].id, RecordId::new(3), "{backend}");
    }
}

#[test]
fn find_compares_values_by_json_type() {
    for (backend, store) in backends() {
        store.save(fields(json!({"tag": "1"})), None).unwrap();
        store.save(fields(json!({"tag": 1})), None).unwrap();
        store.save(fields(json!({"tag": true})), None).unwrap();
        store.save(fields(json!({"tag": 1.0})), None).unwrap();
        store.save(fields(json!({"tag": {"nested": 1}})), None).unwrap();
        store.save(fields(json!({"tag": null})), None).unwrap();

        let ids_for = |predicate: serde_json::Value| -> Vec<i64> {
            store
                .find(&fields(predicate))
                .unwrap()
                .iter()
                .map(|record| record.id.get())
                .collect()
        };

        assert_eq!(ids_for(json!({"tag": "1"})), vec![1], "{backend}");
        assert_eq!(ids_for(json!({"tag": 1})), vec![2], "{backend}");
        assert_eq!(ids_for(json!({"tag": true})), vec![3], "{backend}");
        assert_eq!(ids_for(json!({"tag": 1.0})), vec![4], "{backend}");
        assert_eq!(ids_for(json!({"tag": {"nested": 1}})), vec![5], "{backend}");
        assert_eq!(ids_for(json!({"tag": null})), vec![6], "{backend}");
        assert_eq!(ids_for(json!({"tag": 1, "id": "2"})), vec![2], "{backend}");
        assert!(ids_for(json!({"tag": 1, "id": 3})).is_empty(), "{backend}");
        assert!(ids_for(json!({"id": "two"})).is_empty(), "{backend}");
        assert!(ids_for(json!({"tag": "1", "missing": 1})).is_empty(), "{backend}");
    }
}

#[test]
fn sqlite_find_by_category_returns_matches_in_id_order() {
    let store = SqliteStore::open_in_memory("tasks").unwrap();
    for index in 0..50 {
        let task = json!({"title": format!("t{index}"), "categoryId": index % 5});
        store.save(fields(task), None).unwrap();
    }

    let matched = store.find(&fields(json!({"categoryId": 3}))).unwrap();
    assert_eq!(matched.len(), 10);
    assert!(matched
        .iter()
        .all(|record| record.get("categoryId") == Some(&json!(3))));
    assert!(matched.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[test]
fn find_by_id_returns_none_for_unknown_id() {
    for (backend, store) in backends() {
        let saved = store.save(fields(json!({"name": "Work"})), None).unwrap();
        assert_eq!(
            store.find_by_id(saved[0].id).unwrap().as_ref(),
            saved.first(),
            "{backend}"
        );
        assert!(store.find_by_id(RecordId::new(999)).unwrap().is_none(), "{backend}");
    }
}

#[test]
fn save_with_id_merges_and_returns_whole_collection() {
    for (backend, store) in backends() {
        let first = store
            .save(fields(json!({"title": "a", "completed": false})), None)
            .unwrap();
        store.save(fields(json!({"title": "b"})), None).unwrap();

        let all = store
            .save(fields(json!({"completed": true})), Some(first[0].id))
            .unwrap();
        assert_eq!(all.len(), 2, "{backend}");

        let merged = store.find_by_id(first[0].id).unwrap().unwrap();
        assert_eq!(merged.get("title"), Some(&json!("a")), "{backend}");
        assert_eq!(merged.get("completed"), Some(&json!(true)), "{backend}");
    }
}

#[test]
fn save_with_unknown_id_is_a_noop() {
    for (backend, store) in backends() {
        store.save(fields(json!({"title": "a"})), None).unwrap();
        let before = store.find_all().unwrap();

        let after = store
            .save(fields(json!({"title": "z"})), Some(RecordId::new(404)))
            .unwrap();
        assert_eq!(after, before, "{backend}");
    }
}

#[test]
fn remove_deletes_match_and_ignores_unknown_id() {
    for (backend, store) in backends() {
        let first = store.save(fields(json!({"title": "a"})), None).unwrap();
        store.save(fields(json!({"title": "b"})), None).unwrap();

        let remaining = store.remove(first[0].id).unwrap();
        assert_eq!(remaining.len(), 1, "{backend}");
        assert_eq!(remaining[0].get("title"), Some(&json!("b")), "{backend}");

        let unchanged = store.remove(RecordId::new(404)).unwrap();
        assert_eq!(unchanged, remaining, "{backend}");
    }
}

#[test]
fn drop_all_clears_and_ids_keep_increasing() {
    for (backend, store) in backends() {
        let before = store.save(fields(json!({"title": "a"})), None).unwrap();
        assert!(store.drop_all().unwrap().is_empty(), "{backend}");
        assert!(store.find_all().unwrap().is_empty(), "{backend}");

        let after = store.save(fields(json!({"title": "b"})), None).unwrap();
        assert!(after[0].id > before[0].id, "{backend}");
    }
}

#[test]
fn sqlite_collections_sharing_a_file_are_isolated_and_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo.db");

    {
        let tasks = SqliteStore::open(&path, "tasks").unwrap();
        let categories = SqliteStore::open(&path, "categories").unwrap();
        tasks.save(fields(json!({"title": "a"})), None).unwrap();
        categories.save(fields(json!({"name": "Work"})), None).unwrap();
        categories.drop_all().unwrap();
    }

    let tasks = SqliteStore::open(&path, "tasks").unwrap();
    let categories = SqliteStore::open(&path, "categories").unwrap();
    assert_eq!(tasks.find_all().unwrap().len(), 1);
    assert!(categories.find_all().unwrap().is_empty());
}

#[test]
fn sqlite_store_rejects_unmigrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    let err = SqliteStore::try_new(conn, "tasks").err().unwrap();
    assert!(err.to_string().contains("records"));
}
