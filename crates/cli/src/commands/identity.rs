//! Identity commands: whoami, signup check, invitations, members

use anyhow::Result;
use expensebook_business::{IdentityResolver, MemberService};

use crate::db::App;

/// Resolve and print the caller's tenant
pub async fn whoami(app: &App) -> Result<()> {
    let tenant = app.tenant().await?;

    if app.json {
        return app.print_json(&tenant);
    }

    println!("👤 Signed in");
    println!("   Organization: {}", tenant.organization_id());
    println!("   User ID:      {}", tenant.user_id());
    println!("   Role:         {}", tenant.role());
    Ok(())
}

/// Whether an email may sign up
pub async fn signup_check(app: &App, email: &str) -> Result<()> {
    let decision = IdentityResolver::new(&app.ctx).can_sign_up(email).await?;

    if app.json {
        return app.print_json(&decision);
    }

    if decision.allowed {
        println!("✅ {} may sign up", email);
    } else {
        println!(
            "❌ {} may not sign up: {}",
            email,
            decision.reason.as_deref().unwrap_or("not allowed")
        );
    }
    Ok(())
}

/// Invite a member
pub async fn invite(app: &App, email: &str) -> Result<()> {
    let tenant = app.tenant().await?;
    let user = MemberService::new(&app.ctx).invite(&tenant, email).await?;

    if app.json {
        return app.print_json(&user);
    }

    println!("✉️  Invited {}", user.email);
    println!("   User ID: {}", user.id);
    Ok(())
}

/// List active members
pub async fn members(app: &App) -> Result<()> {
    let tenant = app.tenant().await?;
    let members = MemberService::new(&app.ctx).list_members(&tenant).await?;

    if app.json {
        return app.print_json(&members);
    }

    if members.is_empty() {
        println!("No members found.");
        return Ok(());
    }

    println!("{:<38} {:<30}", "ID", "NAME");
    println!("{}", "-".repeat(68));
    for member in members {
        println!("{:<38} {:<30}", member.id, member.name);
    }
    Ok(())
}
