use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use pairplan_core::{
    Couple, CoupleStatus, Invitation, InvitationStatus, LinkageStore, NewCouple, NewInvitation,
    PairError, PairResult, UserProfile,
};

use crate::db::{connect_pool, format_datetime, is_unique_violation, parse_datetime, storage_err};

#[derive(Clone)]
pub struct SqliteLinkageStore {
    pool: SqlitePool,
}

const INVITATION_SELECT: &str = r#"
    SELECT id, code, from_user_id, status, verified_by, created_at, expires_at
    FROM invitation
"#;

const COUPLE_SELECT: &str = r#"
    SELECT c.id, c.user1_id, c.user2_id, c.status, c.created_at
    FROM couple_member m
    INNER JOIN couple c ON c.id = m.couple_id
"#;

fn row_to_invitation(row: &sqlx::sqlite::SqliteRow) -> PairResult<Invitation> {
    let status: String = row.try_get("status").map_err(storage_err)?;
    let created_at: String = row.try_get("created_at").map_err(storage_err)?;
    let expires_at: String = row.try_get("expires_at").map_err(storage_err)?;

    Ok(Invitation {
        id: row.try_get("id").map_err(storage_err)?,
        code: row.try_get("code").map_err(storage_err)?,
        from_user_id: row.try_get("from_user_id").map_err(storage_err)?,
        status: InvitationStatus::parse(&status)
            .ok_or_else(|| PairError::Storage(format!("unknown invitation status: {status}")))?,
        verified_by: row.try_get("verified_by").map_err(storage_err)?,
        created_at: parse_datetime(&created_at)?,
        expires_at: parse_datetime(&expires_at)?,
    })
}

fn row_to_couple(row: &sqlx::sqlite::SqliteRow) -> PairResult<Couple> {
    let status: String = row.try_get("status").map_err(storage_err)?;
    let created_at: String = row.try_get("created_at").map_err(storage_err)?;

    Ok(Couple {
        id: row.try_get("id").map_err(storage_err)?,
        user1_id: row.try_get("user1_id").map_err(storage_err)?,
        user2_id: row.try_get("user2_id").map_err(storage_err)?,
        status: CoupleStatus::parse(&status)
            .ok_or_else(|| PairError::Storage(format!("unknown couple status: {status}")))?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Work out why the conditional consume in `create_couple_from_invitation`
/// matched no row.
fn classify_unconsumable(
    invitation: Option<Invitation>,
    input: &NewCouple,
    now: DateTime<Utc>,
) -> PairError {
    let Some(invitation) = invitation else {
        return PairError::NotFound("invitation".to_string());
    };
    match invitation.status {
        InvitationStatus::Consumed => PairError::InvitationAlreadyConsumed,
        InvitationStatus::Expired => PairError::Expired,
        InvitationStatus::Pending => {
            PairError::InvalidState("invitation has not been verified".to_string())
        }
        InvitationStatus::Verified if invitation.is_expired_at(now) => PairError::Expired,
        InvitationStatus::Verified if invitation.from_user_id != input.from_user_id => {
            PairError::InvalidState("invitation was not issued by this user".to_string())
        }
        InvitationStatus::Verified => {
            PairError::InvalidState("invitation was verified by a different user".to_string())
        }
    }
}

impl SqliteLinkageStore {
    pub async fn connect(url: &str) -> PairResult<Self> {
        Ok(Self::from_pool(connect_pool(url).await?))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_invitation_where(
        &self,
        where_clause: &str,
        bind_value: &str,
    ) -> PairResult<Option<Invitation>> {
        let sql = format!("{INVITATION_SELECT} WHERE {where_clause}");
        let row = sqlx::query(&sql)
            .bind(bind_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_invitation).transpose()
    }
}

#[async_trait]
impl LinkageStore for SqliteLinkageStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> PairResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profile (user_id, name, email, avatar_url) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                avatar_url = excluded.avatar_url,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> PairResult<Option<UserProfile>> {
        let row = sqlx::query("SELECT user_id, name, email, avatar_url FROM profile WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(ref r) => Ok(Some(UserProfile {
                user_id: r.try_get("user_id").map_err(storage_err)?,
                name: r.try_get("name").map_err(storage_err)?,
                email: r.try_get("email").map_err(storage_err)?,
                avatar_url: r.try_get("avatar_url").map_err(storage_err)?,
            })),
            None => Ok(None),
        }
    }

    async fn create_invitation(&self, input: &NewInvitation) -> PairResult<Invitation> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Supersede whatever the inviter still had open. Writing first also
        // takes the write lock before anything is read.
        let superseded = sqlx::query(
            "UPDATE invitation SET status = 'EXPIRED' WHERE from_user_id = ? AND status IN ('PENDING', 'VERIFIED')",
        )
        .bind(&input.from_user_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .rows_affected();

        let inserted = sqlx::query(
            "INSERT INTO invitation (id, code, from_user_id, status, created_at, expires_at) VALUES (?, ?, ?, 'PENDING', ?, ?)",
        )
        .bind(&input.id)
        .bind(&input.code)
        .bind(&input.from_user_id)
        .bind(format_datetime(&input.created_at))
        .bind(format_datetime(&input.expires_at))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(ref e) if is_unique_violation(e) => return Err(PairError::CodeCollision),
            Err(e) => return Err(storage_err(e)),
        }

        tx.commit().await.map_err(storage_err)?;

        if superseded > 0 {
            tracing::debug!(
                from_user_id = %input.from_user_id,
                superseded,
                "superseded open invitations"
            );
        }

        self.get_invitation(&input.id)
            .await?
            .ok_or_else(|| PairError::Storage("failed to retrieve invitation after creation".to_string()))
    }

    async fn code_exists(&self, code: &str) -> PairResult<bool> {
        let row = sqlx::query("SELECT 1 FROM invitation WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.is_some())
    }

    async fn get_invitation(&self, id: &str) -> PairResult<Option<Invitation>> {
        self.get_invitation_where("id = ?", id).await
    }

    async fn get_invitation_by_code(&self, code: &str) -> PairResult<Option<Invitation>> {
        self.get_invitation_where("code = ?", code).await
    }

    async fn latest_invitation_from(&self, from_user_id: &str) -> PairResult<Option<Invitation>> {
        self.get_invitation_where(
            "from_user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            from_user_id,
        )
        .await
    }

    async fn transition_invitation(
        &self,
        id: &str,
        from: &[InvitationStatus],
        to: InvitationStatus,
        verified_by: Option<&str>,
    ) -> PairResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE invitation SET status = ?, verified_by = COALESCE(?, verified_by) WHERE id = ? AND status IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(to.as_str()).bind(verified_by).bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query.execute(&self.pool).await.map_err(storage_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_active_couple_for_user(&self, user_id: &str) -> PairResult<Option<Couple>> {
        let sql = format!("{COUPLE_SELECT} WHERE m.user_id = ? AND c.status = 'ACTIVE'");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_couple).transpose()
    }

    async fn create_couple_from_invitation(
        &self,
        input: &NewCouple,
        now: DateTime<Utc>,
    ) -> PairResult<Couple> {
        if input.from_user_id == input.to_user_id {
            return Err(PairError::SelfInvite);
        }

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // The consume is expressed against the row as it is now; zero rows
        // affected means another request got there first or the
        // preconditions no longer hold.
        let consumed = sqlx::query(
            r#"
            UPDATE invitation SET status = 'CONSUMED'
            WHERE id = ?
              AND status = 'VERIFIED'
              AND from_user_id = ?
              AND verified_by = ?
              AND expires_at >= ?
            "#,
        )
        .bind(&input.invitation_id)
        .bind(&input.from_user_id)
        .bind(&input.to_user_id)
        .bind(format_datetime(&now))
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .rows_affected();

        if consumed == 0 {
            let sql = format!("{INVITATION_SELECT} WHERE id = ?");
            let current = sqlx::query(&sql)
                .bind(&input.invitation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_err)?;
            let current = current.as_ref().map(row_to_invitation).transpose()?;
            return Err(classify_unconsumable(current, input, now));
        }

        sqlx::query(
            "INSERT INTO couple (id, user1_id, user2_id, invitation_id, status, created_at) VALUES (?, ?, ?, ?, 'ACTIVE', ?)",
        )
        .bind(&input.id)
        .bind(&input.from_user_id)
        .bind(&input.to_user_id)
        .bind(&input.invitation_id)
        .bind(format_datetime(&input.created_at))
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        for user_id in [&input.from_user_id, &input.to_user_id] {
            let joined = sqlx::query("INSERT INTO couple_member (user_id, couple_id) VALUES (?, ?)")
                .bind(user_id)
                .bind(&input.id)
                .execute(&mut *tx)
                .await;
            match joined {
                Ok(_) => {}
                // Dropping the transaction rolls back the consume and the couple row.
                Err(ref e) if is_unique_violation(e) => return Err(PairError::AlreadyLinked),
                Err(e) => return Err(storage_err(e)),
            }
        }

        tx.commit().await.map_err(storage_err)?;

        Ok(Couple {
            id: input.id.clone(),
            user1_id: input.from_user_id.clone(),
            user2_id: input.to_user_id.clone(),
            status: CoupleStatus::Active,
            created_at: input.created_at,
        })
    }
}
