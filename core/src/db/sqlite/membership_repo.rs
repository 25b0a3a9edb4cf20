use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::membership_repo::MembershipRepository,
    ids::{OrgId, ProjectId, UserId},
    membership::{
        MemberWithProfile, MembershipRecord, ProjectMemberRecord, ProjectMemberWithProfile,
    },
    rbac::Role,
};

pub struct SqliteMembershipRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMembershipRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_member_row(row: &SqliteRow) -> Result<MembershipRecord> {
        Ok(MembershipRecord {
            org_id: OrgId::from(row.get::<String, _>("org_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            created_at: row.get("created_at"),
        })
    }

    fn map_member_profile_row(row: &SqliteRow) -> Result<MemberWithProfile> {
        Ok(MemberWithProfile {
            org_id: OrgId::from(row.get::<String, _>("org_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            email: row.get("email"),
            full_name: row.get("full_name"),
            avatar_url: row.get("avatar_url"),
            joined_at: row.get("created_at"),
        })
    }

    fn map_project_member_row(row: &SqliteRow) -> Result<ProjectMemberRecord> {
        Ok(ProjectMemberRecord {
            project_id: ProjectId::from(row.get::<String, _>("project_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            created_at: row.get("created_at"),
        })
    }

    fn map_project_member_profile_row(row: &SqliteRow) -> Result<ProjectMemberWithProfile> {
        Ok(ProjectMemberWithProfile {
            project_id: ProjectId::from(row.get::<String, _>("project_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get::<String, _>("role").parse()?,
            email: row.get("email"),
            full_name: row.get("full_name"),
            joined_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn find_role(&self, org_id: &str, user_id: &str) -> Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM organization_members WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role.map(|role| role.parse::<Role>()).transpose()?)
    }

    async fn get_member(&self, org_id: &str, user_id: &str) -> Result<Option<MembershipRecord>> {
        let row = sqlx::query(
            "SELECT org_id, user_id, role, created_at
             FROM organization_members
             WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_member_row).transpose()
    }

    async fn list_members_with_profiles(&self, org_id: &str) -> Result<Vec<MemberWithProfile>> {
        let rows = sqlx::query(
            "SELECT m.org_id, m.user_id, m.role, m.created_at, u.email, u.full_name, u.avatar_url
             FROM organization_members m
             INNER JOIN users u ON u.id = m.user_id
             WHERE m.org_id = ?
             ORDER BY m.created_at ASC, u.email ASC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_member_profile_row).collect()
    }

    async fn update_member_role(&self, org_id: &str, user_id: &str, role: Role) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE organization_members SET role = ?
             WHERE org_id = ? AND user_id = ? AND role <> 'owner'",
        )
        .bind(role.as_str())
        .bind(org_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_member(&self, org_id: &str, user_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM organization_members
             WHERE org_id = ? AND user_id = ? AND role <> 'owner'",
        )
        .bind(org_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "DELETE FROM project_members
             WHERE user_id = ?
               AND project_id IN (SELECT id FROM projects WHERE org_id = ?)",
        )
        .bind(user_id)
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_project_member(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<ProjectMemberRecord>> {
        let row = sqlx::query(
            "SELECT project_id, user_id, role, created_at
             FROM project_members
             WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_project_member_row).transpose()
    }

    async fn list_project_members_with_profiles(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProjectMemberWithProfile>> {
        let rows = sqlx::query(
            "SELECT pm.project_id, pm.user_id, pm.role, pm.created_at, u.email, u.full_name
             FROM project_members pm
             INNER JOIN users u ON u.id = pm.user_id
             WHERE pm.project_id = ?
             ORDER BY pm.created_at ASC, u.email ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_project_member_profile_row).collect()
    }

    async fn update_project_member_role(
        &self,
        project_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE project_members SET role = ?
             WHERE project_id = ? AND user_id = ? AND role <> 'owner'",
        )
        .bind(role.as_str())
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_project_member(&self, project_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM project_members
             WHERE project_id = ? AND user_id = ? AND role <> 'owner'",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
