//! Task/category model service.
//!
//! # Responsibility
//! - Expose the task-centric operations (`create`, `read`, `update`,
//!   `remove`, `remove_all`, `get_count`) over two record stores.
//! - Create categories on demand, share them by name, and delete them once
//!   no task references them.
//! - Join category names into every task read.
//!
//! # Invariants
//! - This service is the only writer of both stores.
//! - At most one category exists per trimmed name.
//! - A task never references a category id that was not durably saved first.
//! - After any mutation returns, no category has zero referencing tasks.
//! - A task whose category is missing reads with `category_name = None`.

use crate::model::record::{Record, RecordId};
use crate::model::task::{
    Category, ReadQuery, Task, TaskCounts, TaskFilter, TaskPatch, TaskView, CATEGORY_ID_FIELD,
    COMPLETED_FIELD,
};
use crate::service::name_lock::{NameGuard, NameLocks};
use crate::store::{Store, StoreError};
use crate::{CATEGORIES_COLLECTION, TASKS_COLLECTION};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard};

pub type ModelResult<T> = Result<T, ModelError>;

/// Error for model operations. Missing tasks are not errors.
#[derive(Debug)]
pub enum ModelError {
    /// Backend failure.
    Store(StoreError),
    /// A stored record does not have the expected task/category shape.
    InvalidRecord {
        collection: &'static str,
        id: RecordId,
        message: String,
    },
    /// A thread panicked while holding a model lock.
    LockPoisoned(&'static str),
    /// Internal mismatch between a write and its result.
    InconsistentState(&'static str),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidRecord {
                collection,
                id,
                message,
            } => write!(f, "invalid {collection} record {id}: {message}"),
            Self::LockPoisoned(what) => write!(f, "model lock poisoned: {what}"),
            Self::InconsistentState(details) => write!(f, "inconsistent model state: {details}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ModelError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Task/category orchestration over two stores.
///
/// All methods take `&self`; the model can be shared across threads when
/// `S` is. Operations resolving or deleting a category hold that category
/// name's lock from lookup until the dependent task write is done.
pub struct TodoModel<S: Store> {
    tasks: S,
    categories: S,
    /// Trimmed name -> category id, for every live category.
    category_index: Mutex<HashMap<String, RecordId>>,
    name_locks: NameLocks,
    /// Shared by mutations, exclusive for `remove_all`.
    gate: RwLock<()>,
}

impl<S: Store> TodoModel<S> {
    /// Builds a model over a task store and a category store, warming the
    /// category name index from existing data.
    pub fn new(tasks: S, categories: S) -> ModelResult<Self> {
        let mut index = HashMap::new();
        for record in categories.find_all()? {
            let category = parse_category(&record)?;
            index.entry(category.name).or_insert(category.id);
        }
        info!(
            "event=model_open module=model status=ok categories={}",
            index.len()
        );

        Ok(Self {
            tasks,
            categories,
            category_index: Mutex::new(index),
            name_locks: NameLocks::default(),
            gate: RwLock::new(()),
        })
    }

    /// Creates a task in the named category, creating the category when no
    /// category has that trimmed name yet.
    pub fn create(&self, title: &str, category_name: &str) -> ModelResult<Task> {
        let category_name = category_name.trim();
        let _gate = self.gate_shared()?;
        let _names = self.lock_names(&[category_name])?;

        let (category_id, created) = self.resolve_category(category_name)?;
        let saved = match self.tasks.save(Task::new_fields(title, category_id), None) {
            Ok(saved) => saved,
            Err(err) => {
                if created {
                    self.discard_new_category(category_id, category_name);
                }
                return Err(err.into());
            }
        };
        let record = saved
            .first()
            .ok_or(ModelError::InconsistentState("task save returned no record"))?;
        let task = parse_task(record)?;

        info!(
            "event=task_create module=model status=ok task_id={} category_id={}",
            task.id, category_id
        );
        Ok(task)
    }

    /// Reads tasks joined with their category names.
    ///
    /// `ById` yields zero or one task. Bulk reads build the id -> name map
    /// once instead of looking up each task's category.
    pub fn read(&self, query: &ReadQuery) -> ModelResult<Vec<TaskView>> {
        match query {
            ReadQuery::All => self.join_all(self.tasks.find_all()?),
            ReadQuery::Matching(filter) => self.join_all(self.tasks.find(&filter.to_predicate())?),
            ReadQuery::ById(id) => Ok(self.read_one(*id)?.into_iter().collect()),
        }
    }

    /// Merges `patch` into the task. A `category_name` moves the task to
    /// that category and deletes the previous one if it is left empty.
    ///
    /// Returns the updated task, or `None` when no task has this id.
    pub fn update(&self, id: RecordId, patch: TaskPatch) -> ModelResult<Option<TaskView>> {
        let _gate = self.gate_shared()?;
        let fields = patch.to_fields();

        let Some(new_name) = patch.category_name.as_deref().map(str::trim) else {
            self.tasks.save(fields, Some(id))?;
            let updated = self.read_one(id)?;
            debug!(
                "event=task_update module=model status={} task_id={}",
                found_status(updated.is_some()),
                id
            );
            return Ok(updated);
        };

        loop {
            let Some(record) = self.tasks.find_by_id(id)? else {
                debug!("event=task_update module=model status=not_found task_id={id}");
                return Ok(None);
            };
            let current = parse_task(&record)?;
            let old_name = self.category_name_of(current.category_id)?;

            let mut names = vec![new_name];
            if let Some(old_name) = old_name.as_deref() {
                names.push(old_name);
            }
            let _names = self.lock_names(&names)?;

            // Another caller may have moved the task before the locks were held.
            if self.current_category_of(id)? != Some(current.category_id) {
                continue;
            }

            let (category_id, created) = self.resolve_category(new_name)?;
            let mut fields = fields.clone();
            fields.insert(CATEGORY_ID_FIELD.to_string(), Value::from(category_id));
            if let Err(err) = self.tasks.save(fields, Some(id)) {
                if created {
                    self.discard_new_category(category_id, new_name);
                }
                return Err(err.into());
            }

            if category_id != current.category_id {
                if let Some(old_name) = old_name.as_deref() {
                    self.delete_category_if_orphaned(current.category_id, old_name, Some(id))?;
                }
            }

            info!(
                "event=task_update module=model status=ok task_id={} category_id={}",
                id, category_id
            );
            return self.read_one(id);
        }
    }

    /// Deletes the task and, if it was the last one in its category, the
    /// category too.
    ///
    /// Returns the remaining tasks; an unknown id leaves them unchanged.
    pub fn remove(&self, id: RecordId) -> ModelResult<Vec<Task>> {
        let _gate = self.gate_shared()?;

        loop {
            let Some(record) = self.tasks.find_by_id(id)? else {
                debug!("event=task_remove module=model status=not_found task_id={id}");
                return parse_tasks(&self.tasks.find_all()?);
            };
            let current = parse_task(&record)?;
            let category_name = self.category_name_of(current.category_id)?;
            let _names = match category_name.as_deref() {
                Some(name) => Some(self.lock_names(&[name])?),
                None => None,
            };

            match self.current_category_of(id)? {
                None => return parse_tasks(&self.tasks.find_all()?),
                Some(category_id) if category_id != current.category_id => continue,
                Some(_) => {}
            }

            let remaining = self.tasks.remove(id)?;
            if let Some(name) = category_name.as_deref() {
                self.delete_category_if_orphaned(current.category_id, name, Some(id))?;
            }

            info!(
                "event=task_remove module=model status=ok task_id={} remaining={}",
                id,
                remaining.len()
            );
            return parse_tasks(&remaining);
        }
    }

    /// Clears both stores.
    pub fn remove_all(&self) -> ModelResult<()> {
        let _gate = self
            .gate
            .write()
            .map_err(|_| ModelError::LockPoisoned("model gate"))?;

        self.tasks.drop_all()?;
        self.categories.drop_all()?;
        self.index()?.clear();

        info!("event=model_clear module=model status=ok");
        Ok(())
    }

    /// Counts tasks by completion state.
    pub fn get_count(&self) -> ModelResult<TaskCounts> {
        let records = self.tasks.find_all()?;
        let completed = records
            .iter()
            .filter(|record| record.get(COMPLETED_FIELD) == Some(&Value::Bool(true)))
            .count();

        Ok(TaskCounts {
            active: records.len() - completed,
            completed,
            total: records.len(),
        })
    }

    fn read_one(&self, id: RecordId) -> ModelResult<Option<TaskView>> {
        let Some(record) = self.tasks.find_by_id(id)? else {
            return Ok(None);
        };
        let task = parse_task(&record)?;
        let category_name = self.category_name_of(task.category_id)?;
        Ok(Some(task.into_view(category_name)))
    }

    fn join_all(&self, records: Vec<Record>) -> ModelResult<Vec<TaskView>> {
        let mut names = HashMap::new();
        for record in self.categories.find_all()? {
            let category = parse_category(&record)?;
            names.insert(category.id, category.name);
        }

        records
            .iter()
            .map(|record| -> ModelResult<TaskView> {
                let task = parse_task(record)?;
                let category_name = names.get(&task.category_id).cloned();
                Ok(task.into_view(category_name))
            })
            .collect()
    }

    fn current_category_of(&self, task_id: RecordId) -> ModelResult<Option<RecordId>> {
        match self.tasks.find_by_id(task_id)? {
            Some(record) => Ok(Some(parse_task(&record)?.category_id)),
            None => Ok(None),
        }
    }

    fn category_name_of(&self, category_id: RecordId) -> ModelResult<Option<String>> {
        match self.categories.find_by_id(category_id)? {
            Some(record) => Ok(Some(parse_category(&record)?.name)),
            None => Ok(None),
        }
    }

    /// Find-or-create by exact trimmed name. Caller holds the name's lock.
    ///
    /// The flag is `true` when the category was created by this call.
    fn resolve_category(&self, name: &str) -> ModelResult<(RecordId, bool)> {
        if let Some(id) = self.index()?.get(name).copied() {
            return Ok((id, false));
        }

        if let Some(existing) = self.categories.find(&Category::name_predicate(name))?.first() {
            self.index()?.insert(name.to_string(), existing.id);
            return Ok((existing.id, false));
        }

        let saved = self.categories.save(Category::new_fields(name), None)?;
        let id = saved
            .first()
            .map(|record| record.id)
            .ok_or(ModelError::InconsistentState("category save returned no record"))?;
        self.index()?.insert(name.to_string(), id);

        info!("event=category_create module=model status=ok category_id={id}");
        Ok((id, true))
    }

    /// Drops a category created for a task write that then failed. The
    /// write error is what the caller reports, so cleanup failures are only
    /// logged.
    fn discard_new_category(&self, category_id: RecordId, name: &str) {
        if let Err(err) = self.delete_category_if_orphaned(category_id, name, None) {
            warn!(
                "event=category_rollback module=model status=error category_id={} error={}",
                category_id, err
            );
        }
    }

    /// Deletes the category when no task other than `excluding` references
    /// it. Caller holds the category name's lock.
    fn delete_category_if_orphaned(
        &self,
        category_id: RecordId,
        name: &str,
        excluding: Option<RecordId>,
    ) -> ModelResult<bool> {
        let predicate = TaskFilter::in_category(category_id).to_predicate();
        let referencing = self
            .tasks
            .find(&predicate)?
            .iter()
            .filter(|record| Some(record.id) != excluding)
            .count();
        if referencing > 0 {
            return Ok(false);
        }

        self.categories.remove(category_id)?;
        let mut index = self.index()?;
        if index.get(name) == Some(&category_id) {
            index.remove(name);
        }

        info!("event=category_delete module=model status=ok category_id={category_id}");
        Ok(true)
    }

    fn gate_shared(&self) -> ModelResult<RwLockReadGuard<'_, ()>> {
        self.gate
            .read()
            .map_err(|_| ModelError::LockPoisoned("model gate"))
    }

    fn lock_names(&self, names: &[&str]) -> ModelResult<NameGuard<'_>> {
        self.name_locks
            .acquire(names)
            .ok_or(ModelError::LockPoisoned("category name locks"))
    }

    fn index(&self) -> ModelResult<MutexGuard<'_, HashMap<String, RecordId>>> {
        self.category_index
            .lock()
            .map_err(|_| ModelError::LockPoisoned("category index"))
    }
}

fn parse_task(record: &Record) -> ModelResult<Task> {
    Task::from_record(record).map_err(|message| ModelError::InvalidRecord {
        collection: TASKS_COLLECTION,
        id: record.id,
        message,
    })
}

fn parse_tasks(records: &[Record]) -> ModelResult<Vec<Task>> {
    records.iter().map(parse_task).collect()
}

fn parse_category(record: &Record) -> ModelResult<Category> {
    Category::from_record(record).map_err(|message| ModelError::InvalidRecord {
        collection: CATEGORIES_COLLECTION,
        id: record.id,
        message,
    })
}

fn found_status(found: bool) -> &'static str {
    if found {
        "ok"
    } else {
        "not_found"
    }
}
