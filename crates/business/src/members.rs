//! Member management - invitations and the member picker

use crate::error::{LedgerError, LedgerResult};
use crate::services::{ServiceContext, TenantContext};
use expensebook_core::{is_valid_email, normalize_email, User};
use expensebook_persistence::UserRepo;
use serde::Serialize;
use tracing::info;

/// Entry of the member picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: String,
    pub name: String,
}

/// Member Service
pub struct MemberService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MemberService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Pre-provision a user in the caller's organization. Admins only.
    ///
    /// Inviting an email that is already a member is a no-op.
    pub async fn invite(&self, tenant: &TenantContext, email: &str) -> LedgerResult<User> {
        if !tenant.is_admin() {
            return Err(LedgerError::Forbidden(
                "only admins can invite members".to_string(),
            ));
        }

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(LedgerError::InvalidInput("Email is required".to_string()));
        }
        if !is_valid_email(&email) {
            return Err(LedgerError::InvalidInput(
                "Please enter a valid email".to_string(),
            ));
        }

        let pool = self.ctx.pool();
        if let Some(row) = UserRepo::get_by_email(pool, &email).await? {
            return same_organization(User::try_from(row)?, tenant);
        }

        let invited = User::invited(&email, tenant.organization_id());
        match UserRepo::insert(pool, &invited).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                // invited concurrently
                let row = UserRepo::get_by_email(pool, &email)
                    .await?
                    .ok_or_else(|| LedgerError::not_found("User", &email))?;
                return same_organization(User::try_from(row)?, tenant);
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            org_id = tenant.organization_id(),
            invited_by = tenant.user_id(),
            %email,
            "member invited"
        );
        Ok(invited)
    }

    /// Active members of the caller's organization, by name
    pub async fn list_members(&self, tenant: &TenantContext) -> LedgerResult<Vec<Member>> {
        let rows = UserRepo::list_active_by_org(self.ctx.pool(), tenant.organization_id()).await?;

        rows.into_iter()
            .map(|row| -> LedgerResult<Member> {
                let user = User::try_from(row)?;
                Ok(Member {
                    name: user.display_name().to_string(),
                    id: user.id,
                })
            })
            .collect()
    }
}

fn same_organization(user: User, tenant: &TenantContext) -> LedgerResult<User> {
    if user.membership.organization_id() == Some(tenant.organization_id()) {
        Ok(user)
    } else {
        Err(LedgerError::InvalidInput(format!(
            "{} already belongs to another organization",
            user.email
        )))
    }
}
