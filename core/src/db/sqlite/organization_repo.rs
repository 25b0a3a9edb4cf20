use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::organization_repo::{
        CreateOrganizationParams, OrganizationRepository, UpdateOrganizationParams,
    },
    ids::{OrgId, UserId},
    organization::{DEFAULT_PROJECT_NAME, DEFAULT_PROJECT_SLUG, OrganizationRecord, UserOrganization},
};

const ORGANIZATION_COLUMNS: &str =
    "o.id, o.name, o.slug, o.type, o.avatar_url, o.created_by, o.created_at, o.updated_at";

pub struct SqliteOrganizationRepository {
    pool: Pool<Sqlite>,
}

impl SqliteOrganizationRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_organization_row(row: &SqliteRow) -> Result<OrganizationRecord> {
        Ok(OrganizationRecord {
            id: OrgId::from(row.get::<String, _>("id")),
            name: row.get("name"),
            slug: row.get("slug"),
            org_type: row.get::<String, _>("type").parse()?,
            avatar_url: row.get("avatar_url"),
            created_by: UserId::from(row.get::<String, _>("created_by")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn fetch_one_where(&self, column: &str, value: &str) -> Result<Option<OrganizationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.{column} = ?"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_organization_row).transpose()
    }
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`
/// prefix match.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl OrganizationRepository for SqliteOrganizationRepository {
    async fn list_slugs_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM organizations WHERE slug LIKE ? ESCAPE '\\'",
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await?;
        Ok(slugs)
    }

    async fn create_organization(
        &self,
        params: CreateOrganizationParams,
    ) -> Result<OrganizationRecord> {
        let CreateOrganizationParams {
            id,
            name,
            slug,
            org_type,
            avatar_url,
            created_by,
            created_at,
            default_project_id,
        } = params;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO organizations (id, name, slug, type, avatar_url, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&name)
        .bind(&slug)
        .bind(org_type.as_str())
        .bind(avatar_url.as_deref())
        .bind(created_by.as_str())
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO organization_members (org_id, user_id, role, created_at)
             VALUES (?, ?, 'owner', ?)",
        )
        .bind(id.as_str())
        .bind(created_by.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO projects (id, org_id, name, slug, description, is_default, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, 1, ?, ?)",
        )
        .bind(default_project_id.as_str())
        .bind(id.as_str())
        .bind(DEFAULT_PROJECT_NAME)
        .bind(DEFAULT_PROJECT_SLUG)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrganizationRecord {
            id,
            name,
            slug,
            org_type,
            avatar_url,
            created_by,
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_organization(&self, id: &str) -> Result<Option<OrganizationRecord>> {
        self.fetch_one_where("id", id).await
    }

    async fn fetch_organization_by_slug(&self, slug: &str) -> Result<Option<OrganizationRecord>> {
        self.fetch_one_where("slug", slug).await
    }

    async fn find_personal_organization(
        &self,
        user_id: &str,
    ) -> Result<Option<OrganizationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o
             WHERE o.created_by = ? AND o.type = 'personal'"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_organization_row).transpose()
    }

    async fn list_organizations_for_user(&self, user_id: &str) -> Result<Vec<UserOrganization>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORGANIZATION_COLUMNS}, m.role AS member_role
             FROM organization_members m
             INNER JOIN organizations o ON o.id = m.org_id
             WHERE m.user_id = ?
             ORDER BY o.type = 'personal' DESC, o.created_at ASC, o.id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UserOrganization {
                    organization: Self::map_organization_row(row)?,
                    role: row.get::<String, _>("member_role").parse()?,
                })
            })
            .collect()
    }

    async fn update_organization(&self, params: UpdateOrganizationParams) -> Result<bool> {
        let UpdateOrganizationParams {
            id,
            name,
            avatar_url,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE organizations SET updated_at = ");
        builder.push_bind(updated_at);

        if let Some(name) = name {
            builder.push(", name = ");
            builder.push_bind(name);
        }
        if let Some(avatar_url) = avatar_url {
            builder.push(", avatar_url = ");
            builder.push_bind(avatar_url);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_organization(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
