//! Integration tests for identity resolution and member management

mod common;

use common::Harness;
use expensebook_business::{
    ErrorKind, IdentityResolver, LedgerConfig, MemberService, INVITE_ONLY_REASON,
};
use expensebook_core::{Principal, Role};
use expensebook_persistence::{OrganizationRepo, SequenceRepo};

#[tokio::test]
async fn test_first_sign_in_bootstraps_organization() {
    let h = Harness::new().await;
    let principal = Principal::new("auth-alice", "Alice@Example.com")
        .with_name("Alice")
        .with_organization_name("Acme Builders");

    let tenant = IdentityResolver::new(&h.ctx)
        .resolve(Some(&principal))
        .await
        .unwrap();

    assert_eq!(tenant.role(), Role::Admin);
    let org = OrganizationRepo::get_by_id(h.db.pool(), tenant.organization_id())
        .await
        .unwrap();
    assert_eq!(org.name, "Acme Builders");
    assert_eq!(
        SequenceRepo::current(h.db.pool(), tenant.organization_id())
            .await
            .unwrap(),
        Some(1000)
    );

    let stats = h.db.stats().await.unwrap();
    assert_eq!(stats.organizations, 1);
    assert_eq!(stats.users, 1);
}

#[tokio::test]
async fn test_default_organization_name() {
    let h = Harness::new().await;
    let tenant = h.sign_in("auth-1", "a@example.com").await;
    let org = OrganizationRepo::get_by_id(h.db.pool(), tenant.organization_id())
        .await
        .unwrap();
    assert_eq!(org.name, "My Organization");
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let h = Harness::new().await;
    let first = h.sign_in("auth-1", "a@example.com").await;
    let second = h.sign_in("auth-1", "A@EXAMPLE.COM").await;

    assert_eq!(first, second);
    let stats = h.db.stats().await.unwrap();
    assert_eq!(stats.organizations, 1);
    assert_eq!(stats.users, 1);
}

#[tokio::test]
async fn test_missing_principal() {
    let h = Harness::new().await;
    let err = IdentityResolver::new(&h.ctx).resolve(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);

    let blank = Principal::new("  ", "a@example.com");
    let err = IdentityResolver::new(&h.ctx)
        .resolve(Some(&blank))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
}

#[tokio::test]
async fn test_invitee_is_linked_as_user() {
    let h = Harness::new().await;
    let admin = h.sign_in("auth-admin", "boss@example.com").await;

    let invited = MemberService::new(&h.ctx)
        .invite(&admin, "  Bob@Example.com ")
        .await
        .unwrap();
    assert_eq!(invited.email, "bob@example.com");
    assert!(!invited.membership.is_active());

    let principal = Principal::new("auth-bob", "BOB@example.com").with_name("Bob");
    let bob = IdentityResolver::new(&h.ctx)
        .resolve(Some(&principal))
        .await
        .unwrap();

    assert_eq!(bob.organization_id(), admin.organization_id());
    assert_eq!(bob.user_id(), invited.id);
    assert_eq!(bob.role(), Role::User);

    // no second organization
    assert_eq!(h.db.stats().await.unwrap().organizations, 1);
}

#[tokio::test]
async fn test_email_owned_by_another_identity() {
    let h = Harness::new().await;
    h.sign_in("auth-1", "shared@example.com").await;

    let impostor = Principal::new("auth-2", "shared@example.com");
    let err = IdentityResolver::new(&h.ctx)
        .resolve(Some(&impostor))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
}

#[tokio::test]
async fn test_invite_only_mode() {
    let config = LedgerConfig {
        open_signup: false,
        ..LedgerConfig::default()
    };
    let h = Harness::with_config(config).await;
    let resolver = IdentityResolver::new(&h.ctx);

    // the very first user may always bootstrap
    assert!(resolver.can_sign_up("first@example.com").await.unwrap().allowed);
    let admin = h.sign_in("auth-first", "first@example.com").await;

    let decision = resolver.can_sign_up("stranger@example.com").await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.reason.as_deref(), Some(INVITE_ONLY_REASON));

    let stranger = Principal::new("auth-stranger", "stranger@example.com");
    let err = resolver.resolve(Some(&stranger)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthenticated);
    assert!(err.to_string().contains(INVITE_ONLY_REASON));

    MemberService::new(&h.ctx)
        .invite(&admin, "stranger@example.com")
        .await
        .unwrap();
    assert!(resolver.can_sign_up("Stranger@Example.com").await.unwrap().allowed);
    let tenant = resolver.resolve(Some(&stranger)).await.unwrap();
    assert_eq!(tenant.organization_id(), admin.organization_id());
}

#[tokio::test]
async fn test_open_signup_allows_anyone() {
    let h = Harness::new().await;
    h.sign_in("auth-1", "a@example.com").await;
    let decision = IdentityResolver::new(&h.ctx)
        .can_sign_up("b@example.com")
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.reason, None);
}

#[tokio::test]
async fn test_invite_rules() {
    let h = Harness::new().await;
    let admin = h.sign_in("auth-admin", "boss@example.com").await;
    let members = MemberService::new(&h.ctx);

    let err = members.invite(&admin, "   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(err.to_string().contains("Email is required"));

    let err = members.invite(&admin, "not-an-email").await.unwrap_err();
    assert!(err.to_string().contains("Please enter a valid email"));

    // re-inviting is a no-op
    let first = members.invite(&admin, "bob@example.com").await.unwrap();
    let again = members.invite(&admin, "BOB@example.com").await.unwrap();
    assert_eq!(first.id, again.id);

    // invitees cannot invite
    let bob = h.sign_in("auth-bob", "bob@example.com").await;
    let err = members.invite(&bob, "carol@example.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // an email owned by another organization
    let other_admin = h.sign_in("auth-other", "other@example.org").await;
    let err = members
        .invite(&other_admin, "bob@example.com")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_list_members_by_name() {
    let h = Harness::new().await;
    let resolver = IdentityResolver::new(&h.ctx);
    let admin = resolver
        .resolve(Some(&Principal::new("auth-z", "zed@example.com").with_name("Zed")))
        .await
        .unwrap();

    let members = MemberService::new(&h.ctx);
    members.invite(&admin, "amy@example.com").await.unwrap();
    members.invite(&admin, "pending@example.com").await.unwrap();
    resolver
        .resolve(Some(&Principal::new("auth-a", "amy@example.com").with_name("Amy")))
        .await
        .unwrap();

    // someone else's organization stays out of the list
    h.sign_in("auth-x", "x@elsewhere.com").await;

    let listed = members.list_members(&admin).await.unwrap();
    let names: Vec<_> = listed.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Amy", "Zed"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_sign_in_creates_one_organization() {
    let h = Harness::new().await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let ctx = h.ctx.clone();
        handles.push(tokio::spawn(async move {
            IdentityResolver::new(&ctx)
                .resolve(Some(&Principal::new("auth-race", "race@example.com")))
                .await
        }));
    }

    let mut orgs = Vec::new();
    for handle in handles {
        orgs.push(handle.await.unwrap().unwrap().organization_id().to_string());
    }
    orgs.dedup();
    assert_eq!(orgs.len(), 1);

    let stats = h.db.stats().await.unwrap();
    assert_eq!(stats.organizations, 1);
    assert_eq!(stats.users, 1);
}
