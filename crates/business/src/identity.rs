//! Identity resolution - principal to tenant
//!
//! Maps an authenticated principal onto exactly one organization membership:
//!
//! 1. already linked by external id: return it
//! 2. invited by email: link the external id, role `user`
//! 3. never seen: bootstrap an organization, its counter and an admin user
//!
//! Steps 2 and 3 run in one transaction. A concurrent resolution of the same
//! principal surfaces as a unique violation or a busy database and is
//! resolved by looking up again.

use crate::error::{LedgerError, LedgerResult};
use crate::services::{backoff, ServiceContext, TenantContext};
use expensebook_core::{is_valid_email, Membership, Organization, Principal, Role, User};
use expensebook_persistence::{
    OrganizationRepo, PersistenceError, SequenceRepo, UserRepo,
};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Reason given to strangers in invite-only mode
pub const INVITE_ONLY_REASON: &str = "Contact admin for invitation";

/// Whether an email may create an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignupDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SignupDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Identity Resolver
pub struct IdentityResolver<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Resolve the caller's organization, creating it on first sign-in
    pub async fn resolve(&self, principal: Option<&Principal>) -> LedgerResult<TenantContext> {
        let principal = principal
            .ok_or_else(|| LedgerError::NotAuthenticated("no authenticated principal".to_string()))?;

        if principal.external_id.trim().is_empty() {
            return Err(LedgerError::NotAuthenticated(
                "principal has no external id".to_string(),
            ));
        }
        if !is_valid_email(&principal.normalized_email()) {
            return Err(LedgerError::NotAuthenticated(
                "principal has no usable email".to_string(),
            ));
        }

        let max_attempts = self.ctx.config().identity_max_attempts;
        for attempt in 1..=max_attempts {
            let outcome = self
                .ctx
                .with_write_timeout("identity resolution", self.resolve_once(principal))
                .await;
            match outcome {
                Ok(tenant) => return Ok(tenant),
                Err(LedgerError::Persistence(e)) if e.is_busy() || e.is_unique_violation() => {
                    debug!(
                        external_id = %principal.external_id,
                        attempt,
                        error = %e,
                        "concurrent identity resolution, looking up again"
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::Contention {
            operation: "identity resolution",
            attempts: max_attempts,
        })
    }

    /// Signup gate for the registration screen
    pub async fn can_sign_up(&self, email: &str) -> LedgerResult<SignupDecision> {
        let pool = self.ctx.pool();

        if self.ctx.config().open_signup || UserRepo::count_active(pool).await? == 0 {
            return Ok(SignupDecision::allow());
        }

        if UserRepo::get_by_email(pool, email).await?.is_some() {
            return Ok(SignupDecision::allow());
        }

        Ok(SignupDecision::deny(INVITE_ONLY_REASON))
    }

    async fn resolve_once(&self, principal: &Principal) -> LedgerResult<TenantContext> {
        let pool = self.ctx.pool();

        if let Some(row) = UserRepo::get_by_external_id(pool, &principal.external_id).await? {
            if let Some(tenant) = active_tenant(User::try_from(row)?, principal) {
                return Ok(tenant);
            }
        }

        let mut tx = pool.begin().await?;
        let email = principal.normalized_email();

        let tenant = match UserRepo::get_by_email(&mut *tx, &email).await? {
            Some(row) => {
                let user = User::try_from(row)?;
                match user.membership.clone() {
                    Membership::Active { .. } => {
                        // linked by a concurrent resolution of the same principal,
                        // or owned by someone else
                        return active_tenant(user, principal).ok_or_else(|| {
                            LedgerError::NotAuthenticated(
                                "email is linked to another identity".to_string(),
                            )
                        });
                    }
                    Membership::Invited {
                        organization_id: Some(org_id),
                    } => {
                        self.link(&mut tx, &user, principal, &org_id, Role::User).await?;
                        info!(
                            org_id = %org_id,
                            user_id = %user.id,
                            "invited user linked"
                        );
                        TenantContext::new(&org_id, &user.id, Role::User)
                    }
                    Membership::Invited {
                        organization_id: None,
                    } => {
                        let org = self.bootstrap_organization(&mut tx, principal).await?;
                        self.link(&mut tx, &user, principal, &org.id, Role::Admin).await?;
                        info!(
                            org_id = %org.id,
                            user_id = %user.id,
                            "invitation without organization, bootstrapped one"
                        );
                        TenantContext::new(&org.id, &user.id, Role::Admin)
                    }
                }
            }
            None => {
                if !self.ctx.config().open_signup && UserRepo::count_active(&mut *tx).await? > 0 {
                    return Err(LedgerError::NotAuthenticated(INVITE_ONLY_REASON.to_string()));
                }
                let org = self.bootstrap_organization(&mut tx, principal).await?;
                let user = User::founder(principal, &org.id);
                UserRepo::insert(&mut *tx, &user).await?;
                info!(
                    org_id = %org.id,
                    user_id = %user.id,
                    organization = %org.name,
                    "organization bootstrapped"
                );
                TenantContext::new(&org.id, &user.id, Role::Admin)
            }
        };

        tx.commit().await?;
        Ok(tenant)
    }

    async fn link(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
        principal: &Principal,
        org_id: &str,
        role: Role,
    ) -> LedgerResult<()> {
        let linked = UserRepo::activate(
            &mut *conn,
            &user.id,
            &principal.external_id,
            org_id,
            role,
            principal.display_name.as_deref(),
        )
        .await?;
        if !linked {
            // lost the race to another sign-in
            return Err(PersistenceError::already_exists("User", &user.id).into());
        }
        Ok(())
    }

    async fn bootstrap_organization(
        &self,
        conn: &mut SqliteConnection,
        principal: &Principal,
    ) -> LedgerResult<Organization> {
        let config = self.ctx.config();
        let name = principal
            .organization_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&config.default_organization_name);

        let org = Organization::new(name);
        OrganizationRepo::insert(&mut *conn, &org).await?;
        SequenceRepo::create(&mut *conn, &org.id, config.sequence_floor).await?;
        Ok(org)
    }
}

fn active_tenant(user: User, principal: &Principal) -> Option<TenantContext> {
    match &user.membership {
        Membership::Active {
            external_id,
            organization_id,
        } if *external_id == principal.external_id => {
            Some(TenantContext::new(organization_id, &user.id, user.role))
        }
        _ => None,
    }
}
