use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::{
        project_repo::{CreateProjectParams, ProjectRepository, UpdateProjectParams},
        sqlite::organization_repo::like_prefix,
    },
    ids::{OrgId, ProjectId},
    project::ProjectRecord,
};

const PROJECT_COLUMNS: &str =
    "id, org_id, name, slug, description, is_default, created_at, updated_at";

pub struct SqliteProjectRepository {
    pool: Pool<Sqlite>,
}

impl SqliteProjectRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_project_row(row: SqliteRow) -> ProjectRecord {
        ProjectRecord {
            id: ProjectId::from(row.get::<String, _>("id")),
            org_id: OrgId::from(row.get::<String, _>("org_id")),
            name: row.get("name"),
            slug: row.get("slug"),
            description: row.get("description"),
            is_default: row.get::<i64, _>("is_default") != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn list_slugs_with_prefix(&self, org_id: &str, prefix: &str) -> Result<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM projects WHERE org_id = ? AND slug LIKE ? ESCAPE '\\'",
        )
        .bind(org_id)
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await?;
        Ok(slugs)
    }

    async fn create_project(&self, params: CreateProjectParams) -> Result<ProjectRecord> {
        let CreateProjectParams {
            id,
            org_id,
            name,
            slug,
            description,
            creator_id,
            created_at,
        } = params;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO projects (id, org_id, name, slug, description, is_default, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id.as_str())
        .bind(org_id.as_str())
        .bind(&name)
        .bind(&slug)
        .bind(description.as_deref())
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role, created_at)
             VALUES (?, ?, 'owner', ?)",
        )
        .bind(id.as_str())
        .bind(creator_id.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProjectRecord {
            id,
            org_id,
            name,
            slug,
            description,
            is_default: false,
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_project(&self, org_id: &str, project_id: &str) -> Result<Option<ProjectRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE org_id = ? AND id = ?"
        ))
        .bind(org_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_project_row))
    }

    async fn list_projects(&self, org_id: &str) -> Result<Vec<ProjectRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE org_id = ?
             ORDER BY is_default DESC, created_at ASC, name ASC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_project_row).collect())
    }

    async fn update_project(&self, params: UpdateProjectParams) -> Result<bool> {
        let UpdateProjectParams {
            org_id,
            id,
            name,
            description,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE projects SET updated_at = ");
        builder.push_bind(updated_at);

        if let Some(name) = name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(description) = description {
            builder.push(", description = ");
            builder.push_bind(description);
        }

        builder.push(" WHERE org_id = ");
        builder.push_bind(org_id);
        builder.push(" AND id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_project(&self, org_id: &str, project_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM projects WHERE org_id = ? AND id = ? AND is_default = 0")
                .bind(org_id)
                .bind(project_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
