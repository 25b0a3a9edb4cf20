use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::invitation_repo::{AcceptInvitationParams, CreateInvitationParams, InvitationRepository},
    ids::{InvitationId, OrgId, ProjectId, UserId},
    invitation::{AcceptedInvitation, InvitationDetails, InvitationRecord},
    rbac::Role,
};

const INVITATION_COLUMNS: &str = "i.id, i.org_id, i.project_id, i.email, i.role, i.token, \
     i.invited_by, i.created_at, i.expires_at, i.accepted_at";

const DETAILS_FROM: &str = "FROM invitations i
     INNER JOIN organizations o ON o.id = i.org_id
     LEFT JOIN projects p ON p.id = i.project_id
     LEFT JOIN users u ON u.id = i.invited_by";

pub struct SqliteInvitationRepository {
    pool: Pool<Sqlite>,
}

impl SqliteInvitationRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_invitation_row(row: &SqliteRow) -> Result<InvitationRecord> {
        Ok(InvitationRecord {
            id: InvitationId::from(row.get::<String, _>("id")),
            org_id: OrgId::from(row.get::<String, _>("org_id")),
            project_id: row
                .get::<Option<String>, _>("project_id")
                .map(ProjectId::from),
            email: row.get("email"),
            role: row.get::<String, _>("role").parse()?,
            token: row.get("token"),
            invited_by: row.get::<Option<String>, _>("invited_by").map(UserId::from),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            accepted_at: row.get("accepted_at"),
        })
    }

    fn map_details_row(row: &SqliteRow) -> Result<InvitationDetails> {
        Ok(InvitationDetails {
            invitation: Self::map_invitation_row(row)?,
            org_name: row.get("org_name"),
            org_slug: row.get("org_slug"),
            project_name: row.get("project_name"),
            inviter_full_name: row.get("inviter_full_name"),
            inviter_email: row.get("inviter_email"),
        })
    }

    async fn fetch_details_where(
        &self,
        condition: &str,
        binds: &[&str],
    ) -> Result<Option<InvitationDetails>> {
        let sql = format!(
            "SELECT {INVITATION_COLUMNS},
                    o.name AS org_name, o.slug AS org_slug, p.name AS project_name,
                    u.full_name AS inviter_full_name, u.email AS inviter_email
             {DETAILS_FROM}
             WHERE {condition}"
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::map_details_row).transpose()
    }
}

#[async_trait]
impl InvitationRepository for SqliteInvitationRepository {
    async fn find_unaccepted_for_email(
        &self,
        org_id: &str,
        email: &str,
    ) -> Result<Option<InvitationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i
             WHERE i.org_id = ? AND i.email = ? AND i.accepted_at IS NULL"
        ))
        .bind(org_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_invitation_row).transpose()
    }

    async fn create_invitation(&self, params: CreateInvitationParams) -> Result<InvitationRecord> {
        let CreateInvitationParams {
            id,
            org_id,
            project_id,
            email,
            role,
            token,
            invited_by,
            created_at,
            expires_at,
            supersedes,
        } = params;

        let mut tx = self.pool.begin().await?;

        if let Some(stale_id) = &supersedes {
            // Only a record that is still unaccepted and past its deadline
            // may be replaced.
            sqlx::query(
                "DELETE FROM invitations
                 WHERE id = ? AND org_id = ? AND accepted_at IS NULL AND expires_at <= ?",
            )
            .bind(stale_id.as_str())
            .bind(org_id.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO invitations (
                 id, org_id, project_id, email, role, token, invited_by, created_at, expires_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(org_id.as_str())
        .bind(project_id.as_ref().map(ProjectId::as_str))
        .bind(&email)
        .bind(role.as_str())
        .bind(&token)
        .bind(invited_by.as_str())
        .bind(created_at)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(InvitationRecord {
            id,
            org_id,
            project_id,
            email,
            role,
            token,
            invited_by: Some(invited_by),
            created_at,
            expires_at,
            accepted_at: None,
        })
    }

    async fn fetch_invitation(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i WHERE i.org_id = ? AND i.id = ?"
        ))
        .bind(org_id)
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_invitation_row).transpose()
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<InvitationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i WHERE i.token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_invitation_row).transpose()
    }

    async fn fetch_details(
        &self,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Option<InvitationDetails>> {
        self.fetch_details_where("i.org_id = ? AND i.id = ?", &[org_id, invitation_id])
            .await
    }

    async fn fetch_details_by_token(&self, token: &str) -> Result<Option<InvitationDetails>> {
        self.fetch_details_where("i.token = ?", &[token]).await
    }

    async fn list_unaccepted(&self, org_id: &str) -> Result<Vec<InvitationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i
             WHERE i.org_id = ? AND i.accepted_at IS NULL
             ORDER BY i.created_at DESC, i.id ASC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_invitation_row).collect()
    }

    async fn delete_unaccepted(&self, org_id: &str, invitation_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM invitations WHERE org_id = ? AND id = ? AND accepted_at IS NULL",
        )
        .bind(org_id)
        .bind(invitation_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn accept_invitation(
        &self,
        params: AcceptInvitationParams<'_>,
    ) -> Result<Option<AcceptedInvitation>> {
        let AcceptInvitationParams {
            token,
            user_id,
            email,
            accepted_at,
        } = params;

        let mut tx = self.pool.begin().await?;

        // The conditional stamp is the first write of the transaction, so
        // concurrent acceptors serialize on it and only one matches.
        let claimed = sqlx::query(
            "UPDATE invitations SET accepted_at = ?
             WHERE token = ? AND accepted_at IS NULL AND expires_at > ? AND email = ?
             RETURNING id, org_id, project_id, role",
        )
        .bind(accepted_at)
        .bind(token)
        .bind(accepted_at)
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(claimed) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };

        let invitation_id = InvitationId::from(claimed.get::<String, _>("id"));
        let org_id = OrgId::from(claimed.get::<String, _>("org_id"));
        let project_id = claimed
            .get::<Option<String>, _>("project_id")
            .map(ProjectId::from);
        let invited_role: Role = claimed.get::<String, _>("role").parse()?;

        sqlx::query(
            "INSERT INTO organization_members (org_id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(org_id, user_id) DO UPDATE SET role = excluded.role
             WHERE organization_members.role <> 'owner'",
        )
        .bind(org_id.as_str())
        .bind(user_id)
        .bind(invited_role.as_str())
        .bind(accepted_at)
        .execute(&mut *tx)
        .await?;

        if let Some(project_id) = &project_id {
            sqlx::query(
                "INSERT INTO project_members (project_id, user_id, role, created_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(project_id, user_id) DO UPDATE SET role = excluded.role
                 WHERE project_members.role <> 'owner'",
            )
            .bind(project_id.as_str())
            .bind(user_id)
            .bind(invited_role.as_str())
            .bind(accepted_at)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query(
            "SELECT o.slug, m.role
             FROM organizations o
             INNER JOIN organization_members m ON m.org_id = o.id AND m.user_id = ?
             WHERE o.id = ?",
        )
        .bind(user_id)
        .bind(org_id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let org_slug: String = row.get("slug");
        let role: Role = row.get::<String, _>("role").parse()?;

        tx.commit().await?;

        Ok(Some(AcceptedInvitation {
            invitation_id,
            org_id,
            org_slug,
            project_id,
            role,
        }))
    }
}
