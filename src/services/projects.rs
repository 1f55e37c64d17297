use crate::{
    entities::{project, task},
    errors::ServiceError,
    services::{customers::blank_to_none, validation::not_blank},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProjectInput {
    #[validate(
        length(max = 255, message = "Name may not exceed 255 characters"),
        custom = "not_blank"
    )]
    pub name: String,
    pub description: Option<String>,
}

/// A project together with its tasks
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: project::Model,
    pub tasks: Vec<task::Model>,
}

#[derive(Clone)]
pub struct ProjectService {
    db: Arc<DatabaseConnection>,
}

impl ProjectService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_projects(
        &self,
        owner_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<project::Model>, u64), ServiceError> {
        let paginator = project::Entity::find()
            .filter(project::Column::OwnerId.eq(owner_id))
            .order_by_desc(project::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let projects = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((projects, total))
    }

    #[instrument(skip(self, input))]
    pub async fn create_project(
        &self,
        owner_id: Uuid,
        input: ProjectInput,
    ) -> Result<project::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let created = project::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(input.name.trim().to_string()),
            description: Set(blank_to_none(input.description)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(project_id = %created.id, "Project created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_project(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
    ) -> Result<ProjectDetail, ServiceError> {
        let project = find_owned(&*self.db, owner_id, project_id).await?;
        let tasks = project
            .find_related(task::Entity)
            .order_by_desc(task::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(ProjectDetail { project, tasks })
    }

    /// Tasks of one project, newest first
    #[instrument(skip(self))]
    pub async fn list_project_tasks(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<task::Model>, ServiceError> {
        Ok(self.get_project(owner_id, project_id).await?.tasks)
    }

    #[instrument(skip(self, input))]
    pub async fn update_project(
        &self,
        owner_id: Uuid,
        project_id: Uuid,
        input: ProjectInput,
    ) -> Result<project::Model, ServiceError> {
        input.validate()?;

        let mut model: project::ActiveModel =
            find_owned(&*self.db, owner_id, project_id).await?.into();
        model.name = Set(input.name.trim().to_string());
        model.description = Set(blank_to_none(input.description));
        model.updated_at = Set(Utc::now());

        let updated = model.update(&*self.db).await?;
        info!(%project_id, "Project updated");
        Ok(updated)
    }

    /// Deletes a project and its tasks
    #[instrument(skip(self))]
    pub async fn delete_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        find_owned(&txn, owner_id, project_id).await?;

        let removed_tasks = task::Entity::delete_many()
            .filter(task::Column::ProjectId.eq(project_id))
            .exec(&txn)
            .await?
            .rows_affected;
        project::Entity::delete_by_id(project_id).exec(&txn).await?;

        txn.commit().await?;

        info!(%project_id, removed_tasks, "Project deleted");
        Ok(())
    }
}

/// Loads a project owned by `owner_id`; foreign records read as missing.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    project_id: Uuid,
) -> Result<project::Model, ServiceError> {
    match project::Entity::find_by_id(project_id).one(conn).await? {
        Some(found) if found.owner_id == owner_id => Ok(found),
        Some(_) => {
            warn!(%owner_id, %project_id, "Rejected access to another owner's project");
            Err(not_found(project_id))
        }
        None => Err(not_found(project_id)),
    }
}

fn not_found(project_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Project {} not found", project_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::tasks::{TaskInput, TaskService};
    use assert_matches::assert_matches;

    fn input(name: &str) -> ProjectInput {
        ProjectInput {
            name: name.into(),
            description: Some("Website rebuild".into()),
        }
    }

    #[tokio::test]
    async fn delete_cascades_to_tasks() {
        let db = Arc::new(test_pool().await);
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;
        let projects = ProjectService::new(db.clone());
        let tasks = TaskService::new(db.clone());

        let project = projects.create_project(owner, input("Site")).await.unwrap();
        let task = tasks
            .create_task(
                owner,
                TaskInput {
                    project_id: project.id,
                    name: "Landing page".into(),
                    description: None,
                    status: None,
                    task_type: None,
                },
            )
            .await
            .unwrap();

        let detail = projects.get_project(owner, project.id).await.unwrap();
        assert_eq!(detail.tasks.len(), 1);

        projects.delete_project(owner, project.id).await.unwrap();
        assert_matches!(
            tasks.get_task(owner, task.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn other_owner_sees_not_found() {
        let db = Arc::new(test_pool().await);
        let owner = crate::test_support::insert_user(&db, "owner@example.com").await;
        let intruder = crate::test_support::insert_user(&db, "intruder@example.com").await;
        let projects = ProjectService::new(db);

        let project = projects.create_project(owner, input("Site")).await.unwrap();
        assert_matches!(
            projects.get_project(intruder, project.id).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            projects.update_project(intruder, project.id, input("X")).await,
            Err(ServiceError::NotFound(_))
        );
        let (list, total) = projects.list_projects(intruder, 1, 15).await.unwrap();
        assert!(list.is_empty());
        assert_eq!(total, 0);
    }
}
