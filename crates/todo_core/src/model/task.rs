//! Task and category projections.
//!
//! # Responsibility
//! - Map schemaless records to typed `Task`/`Category` values and back.
//! - Define the read/update/count shapes exposed by the model service.
//!
//! # Invariants
//! - Titles and category names are trimmed before they reach a store.
//! - `category_name` is a read-time join result and never a stored task field.
//! - Wire field names are camelCase (`categoryId`, `categoryName`).

use crate::model::record::{Fields, Record, RecordId, ID_FIELD};
use serde::Serialize;
use serde_json::Value;

pub const TITLE_FIELD: &str = "title";
pub const CATEGORY_ID_FIELD: &str = "categoryId";
pub const COMPLETED_FIELD: &str = "completed";
pub const NAME_FIELD: &str = "name";

/// Persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub category_id: RecordId,
    pub completed: bool,
}

impl Task {
    /// Field set for a new task; `completed` starts as `false`.
    pub fn new_fields(title: &str, category_id: RecordId) -> Fields {
        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.to_string(), Value::from(title.trim()));
        fields.insert(CATEGORY_ID_FIELD.to_string(), Value::from(category_id));
        fields.insert(COMPLETED_FIELD.to_string(), Value::Bool(false));
        fields
    }

    /// Reads a task from a stored record.
    ///
    /// A missing `completed` field reads as `false`.
    pub fn from_record(record: &Record) -> Result<Self, String> {
        let title = match record.get(TITLE_FIELD) {
            Some(Value::String(title)) => title.clone(),
            Some(other) => return Err(format!("`{TITLE_FIELD}` is not a string: {other}")),
            None => return Err(format!("missing `{TITLE_FIELD}`")),
        };
        let category_id = match record.get(CATEGORY_ID_FIELD).and_then(Value::as_i64) {
            Some(raw) => RecordId::new(raw),
            None => return Err(format!("missing or non-integer `{CATEGORY_ID_FIELD}`")),
        };
        let completed = match record.get(COMPLETED_FIELD) {
            Some(Value::Bool(completed)) => *completed,
            None => false,
            Some(other) => {
                return Err(format!("`{COMPLETED_FIELD}` is not a boolean: {other}"));
            }
        };

        Ok(Self {
            id: record.id,
            title,
            category_id,
            completed,
        })
    }

    /// Joins this task with its resolved category name.
    pub fn into_view(self, category_name: Option<String>) -> TaskView {
        TaskView {
            id: self.id,
            title: self.title,
            category_id: self.category_id,
            completed: self.completed,
            category_name,
        }
    }
}

/// Persisted category. `name` is the natural, case-sensitive key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
}

impl Category {
    pub fn new_fields(name: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert(NAME_FIELD.to_string(), Value::from(name.trim()));
        fields
    }

    /// Equality predicate selecting the category with this exact name.
    pub fn name_predicate(name: &str) -> Fields {
        Self::new_fields(name)
    }

    pub fn from_record(record: &Record) -> Result<Self, String> {
        match record.get(NAME_FIELD) {
            Some(Value::String(name)) => Ok(Self {
                id: record.id,
                name: name.clone(),
            }),
            Some(other) => Err(format!("`{NAME_FIELD}` is not a string: {other}")),
            None => Err(format!("missing `{NAME_FIELD}`")),
        }
    }
}

/// Task joined with its category name, as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: RecordId,
    pub title: String,
    pub category_id: RecordId,
    pub completed: bool,
    /// Unset when the referenced category no longer exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
}

/// Field-equality filter over tasks. Unset fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub id: Option<RecordId>,
    pub title: Option<String>,
    pub category_id: Option<RecordId>,
    pub completed: Option<bool>,
}

impl TaskFilter {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn in_category(category_id: RecordId) -> Self {
        Self {
            category_id: Some(category_id),
            ..Self::default()
        }
    }

    pub fn to_predicate(&self) -> Fields {
        let mut predicate = Fields::new();
        if let Some(id) = self.id {
            predicate.insert(ID_FIELD.to_string(), Value::from(id));
        }
        if let Some(title) = self.title.as_deref() {
            predicate.insert(TITLE_FIELD.to_string(), Value::from(title));
        }
        if let Some(category_id) = self.category_id {
            predicate.insert(CATEGORY_ID_FIELD.to_string(), Value::from(category_id));
        }
        if let Some(completed) = self.completed {
            predicate.insert(COMPLETED_FIELD.to_string(), Value::Bool(completed));
        }
        predicate
    }
}

/// Read shapes accepted by `TodoModel::read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadQuery {
    /// Every task.
    All,
    /// The single task with this id (zero or one result).
    ById(RecordId),
    /// Tasks matching every set filter field.
    Matching(TaskFilter),
}

/// Partial task update.
///
/// `category_name` reassigns the task to the named category (created on
/// demand); it is never stored on the task itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub category_name: Option<String>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn category_name(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }

    /// Stored fields carried by this patch, excluding `category_name`.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(title) = self.title.as_deref() {
            fields.insert(TITLE_FIELD.to_string(), Value::from(title.trim()));
        }
        if let Some(completed) = self.completed {
            fields.insert(COMPLETED_FIELD.to_string(), Value::Bool(completed));
        }
        fields
    }
}

/// Task totals by completion state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub active: usize,
    pub completed: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_task_fields_trim_title_and_start_incomplete() {
        let fields = Task::new_fields("  buy milk ", RecordId::new(3));
        assert_eq!(
            Value::Object(fields),
            json!({"title": "buy milk", "categoryId": 3, "completed": false})
        );
    }

    #[test]
    fn task_from_record_rejects_missing_category() {
        let fields = json!({"title": "x"}).as_object().cloned().unwrap();
        let record = Record::new(RecordId::new(1), fields);
        let err = Task::from_record(&record).unwrap_err();
        assert!(err.contains("categoryId"));
    }

    #[test]
    fn view_omits_unset_category_name() {
        let task = Task {
            id: RecordId::new(1),
            title: "a".to_string(),
            category_id: RecordId::new(9),
            completed: false,
        };
        let value = serde_json::to_value(task.into_view(None)).unwrap();
        assert_eq!(
            value,
            json!({"id": 1, "title": "a", "categoryId": 9, "completed": false})
        );
    }

    #[test]
    fn patch_fields_skip_category_name() {
        let patch = TaskPatch::default()
            .title(" renamed ")
            .completed(true)
            .category_name("Home");
        assert_eq!(
            Value::Object(patch.to_fields()),
            json!({"title": "renamed", "completed": true})
        );
    }

    #[test]
    fn filter_builds_equality_predicate() {
        let filter = TaskFilter {
            category_id: Some(RecordId::new(4)),
            completed: Some(true),
            ..TaskFilter::default()
        };
        assert_eq!(
            Value::Object(filter.to_predicate()),
            json!({"categoryId": 4, "completed": true})
        );
    }
}
