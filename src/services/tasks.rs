use crate::{
    entities::{
        project,
        task::{self, TaskStatus, TaskType},
    },
    errors::ServiceError,
    services::{customers::blank_to_none, projects, validation::not_blank},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TaskInput {
    pub project_id: Uuid,
    #[validate(
        length(max = 255, message = "Name may not exceed 255 characters"),
        custom = "not_blank"
    )]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `pending`
    pub status: Option<TaskStatus>,
    /// Defaults to `feature`
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectRef {
    pub id: Uuid,
    pub name: String,
}

/// A task with the project it belongs to
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: task::Model,
    pub project: Option<ProjectRef>,
}

impl TaskView {
    fn new(task: task::Model, project: Option<project::Model>) -> Self {
        Self {
            task,
            project: project.map(|p| ProjectRef {
                id: p.id,
                name: p.name,
            }),
        }
    }
}

#[derive(Clone)]
pub struct TaskService {
    db: Arc<DatabaseConnection>,
}

impl TaskService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(
        &self,
        owner_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<TaskView>, u64), ServiceError> {
        let paginator = task::Entity::find()
            .find_also_related(project::Entity)
            .filter(task::Column::OwnerId.eq(owner_id))
            .order_by_desc(task::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let tasks = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(|(task, project)| TaskView::new(task, project))
            .collect();

        Ok((tasks, total))
    }

    #[instrument(skip(self, input))]
    pub async fn create_task(
        &self,
        owner_id: Uuid,
        input: TaskInput,
    ) -> Result<task::Model, ServiceError> {
        input.validate()?;
        self.check_project(owner_id, input.project_id).await?;

        let now = Utc::now();
        let created = task::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            project_id: Set(input.project_id),
            name: Set(input.name.trim().to_string()),
            description: Set(blank_to_none(input.description)),
            status: Set(input.status.unwrap_or_default()),
            task_type: Set(input.task_type.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(task_id = %created.id, project_id = %created.project_id, "Task created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, owner_id: Uuid, task_id: Uuid) -> Result<TaskView, ServiceError> {
        let (task, project) = task::Entity::find_by_id(task_id)
            .find_also_related(project::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(task_id))?;

        if task.owner_id != owner_id {
            warn!(%owner_id, %task_id, "Rejected access to another owner's task");
            return Err(not_found(task_id));
        }

        Ok(TaskView::new(task, project))
    }

    /// Replaces the editable fields; omitted status and type keep their values.
    #[instrument(skip(self, input))]
    pub async fn update_task(
        &self,
        owner_id: Uuid,
        task_id: Uuid,
        input: TaskInput,
    ) -> Result<task::Model, ServiceError> {
        input.validate()?;

        let existing = find_owned(&*self.db, owner_id, task_id).await?;
        self.check_project(owner_id, input.project_id).await?;

        let mut model: task::ActiveModel = existing.into();
        model.project_id = Set(input.project_id);
        model.name = Set(input.name.trim().to_string());
        model.description = Set(blank_to_none(input.description));
        if let Some(status) = input.status {
            model.status = Set(status);
        }
        if let Some(task_type) = input.task_type {
            model.task_type = Set(task_type);
        }
        model.updated_at = Set(Utc::now());

        let updated = model.update(&*self.db).await?;
        info!(%task_id, "Task updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, owner_id: Uuid, task_id: Uuid) -> Result<(), ServiceError> {
        find_owned(&*self.db, owner_id, task_id).await?;
        task::Entity::delete_by_id(task_id).exec(&*self.db).await?;
        info!(%task_id, "Task deleted");
        Ok(())
    }

    async fn check_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<(), ServiceError> {
        match projects::find_owned(&*self.db, owner_id, project_id).await {
            Ok(_) => Ok(()),
            Err(ServiceError::NotFound(_)) => Err(ServiceError::field(
                "project_id",
                "The selected project is invalid",
            )),
            Err(e) => Err(e),
        }
    }
}

/// Loads a task owned by `owner_id`; foreign records read as missing.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    task_id: Uuid,
) -> Result<task::Model, ServiceError> {
    match task::Entity::find_by_id(task_id).one(conn).await? {
        Some(found) if found.owner_id == owner_id => Ok(found),
        Some(_) => {
            warn!(%owner_id, %task_id, "Rejected access to another owner's task");
            Err(not_found(task_id))
        }
        None => Err(not_found(task_id)),
    }
}

/// Marks the given owned tasks as paid. Unknown or foreign ids are skipped.
pub(crate) async fn mark_paid<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    task_ids: &[Uuid],
) -> Result<u64, ServiceError> {
    if task_ids.is_empty() {
        return Ok(0);
    }

    let result = task::Entity::update_many()
        .col_expr(
            task::Column::Status,
            sea_orm::sea_query::Expr::value(TaskStatus::Paid),
        )
        .col_expr(
            task::Column::UpdatedAt,
            sea_orm::sea_query::Expr::value(Utc::now()),
        )
        .filter(task::Column::OwnerId.eq(owner_id))
        .filter(task::Column::Id.is_in(task_ids.iter().copied()))
        .exec(conn)
        .await?;

    Ok(result.rows_affected)
}

fn not_found(task_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Task {} not found", task_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::projects::{ProjectInput, ProjectService};
    use assert_matches::assert_matches;

    struct Fixture {
        tasks: TaskService,
        owner: Uuid,
        other: Uuid,
        project_id: Uuid,
        db: Arc<DatabaseConnection>,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(test_pool().await);
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;
        let other = crate::test_support::insert_user(&db, "other@example.com").await;
        let project = ProjectService::new(db.clone())
            .create_project(
                owner,
                ProjectInput {
                    name: "Portal".into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        Fixture {
            tasks: TaskService::new(db.clone()),
            owner,
            other,
            project_id: project.id,
            db,
        }
    }

    fn input(project_id: Uuid, name: &str) -> TaskInput {
        TaskInput {
            project_id,
            name: name.into(),
            description: Some("".into()),
            status: None,
            task_type: Some(TaskType::BugFix),
        }
    }

    #[tokio::test]
    async fn create_defaults_status_and_includes_project_on_read() {
        let f = fixture().await;
        let task = f
            .tasks
            .create_task(f.owner, input(f.project_id, "Fix login"))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.task_type, TaskType::BugFix);
        assert_eq!(task.description, None);

        let view = f.tasks.get_task(f.owner, task.id).await.unwrap();
        assert_eq!(view.project.unwrap().name, "Portal");

        let (list, total) = f.tasks.list_tasks(f.owner, 1, 15).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(list[0].task.id, task.id);
    }

    #[tokio::test]
    async fn foreign_project_is_a_field_error() {
        let f = fixture().await;
        match f
            .tasks
            .create_task(f.other, input(f.project_id, "Sneaky"))
            .await
        {
            Err(ServiceError::FieldValidation(fields)) => {
                assert!(fields.contains_key("project_id"))
            }
            other => panic!("expected field error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn mark_paid_only_touches_owned_tasks() {
        let f = fixture().await;
        let task = f
            .tasks
            .create_task(f.owner, input(f.project_id, "Ship it"))
            .await
            .unwrap();

        let touched = mark_paid(&*f.db, f.other, &[task.id]).await.unwrap();
        assert_eq!(touched, 0);
        let touched = mark_paid(&*f.db, f.owner, &[task.id]).await.unwrap();
        assert_eq!(touched, 1);

        let view = f.tasks.get_task(f.owner, task.id).await.unwrap();
        assert_eq!(view.task.status, TaskStatus::Paid);
        assert_matches!(
            f.tasks.get_task(f.other, task.id).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
