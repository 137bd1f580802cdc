//! Administration commands

use crate::{RoleCommand, UserCommand};
use pyrite_core::{AdminCredentials, Application, HistoryQuery, ADMIN_USER_ID};
use pyrite_foundation::{Grant, HookContext, PyriteConfig, RequestInfo, SessionUser};
use tracing::debug;

/// 관리 명령 실행기
///
/// 변경은 관리자(user 1) 이름으로 감사 로그에 남는다.
pub struct Admin {
    app: Application,
    ctx: HookContext,
}

impl Admin {
    pub fn open(config: PyriteConfig) -> anyhow::Result<Self> {
        let app = Application::builder(config).build()?;

        let session = app.sessions().create();
        session.identify(SessionUser::new(ADMIN_USER_ID));
        let ctx = app
            .context(&session)
            .with_request(RequestInfo::new("cli").with_remote_addr("cli"));
        debug!(session_id = %session.id(), "Admin context ready");

        Ok(Self { app, ctx })
    }

    pub async fn install(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> anyhow::Result<()> {
        let admin = match (email, password) {
            (Some(email), Some(password)) => Some(AdminCredentials::new(email, password)),
            _ => None,
        };
        self.app.install(admin).await?;

        let db = self
            .app
            .database()
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(memory)".to_string());
        println!("✓ Installed ({})", db);
        Ok(())
    }

    pub async fn role(&self, command: RoleCommand) -> anyhow::Result<()> {
        let acl = self.app.acl();
        let hooks = self.app.hooks();

        match command {
            RoleCommand::Grant {
                role,
                action,
                object_type,
                object_id,
            } => {
                let grant = Grant::from_row(action, object_type, object_id);
                let changed = acl.grant_role(hooks, &self.ctx, &role, &grant).await?;
                report(changed, &format!("{} granted to role {}", grant, role));
            }
            RoleCommand::Revoke {
                role,
                action,
                object_type,
                object_id,
            } => {
                let grant = Grant::from_row(action, object_type, object_id);
                let changed = acl.revoke_role(hooks, &self.ctx, &role, &grant).await?;
                report(changed, &format!("{} revoked from role {}", grant, role));
            }
            RoleCommand::List { role } => {
                let grants = acl.role_grants(&role).await?;
                if grants.is_empty() {
                    println!("Role {} has no grants.", role);
                }
                for grant in grants {
                    println!("{}", grant);
                }
            }
        }
        Ok(())
    }

    pub async fn user(&self, command: UserCommand) -> anyhow::Result<()> {
        let acl = self.app.acl();
        let hooks = self.app.hooks();

        match command {
            UserCommand::Grant {
                user,
                action,
                object_type,
                object_id,
            } => {
                let grant = Grant::from_row(action, object_type, object_id);
                let changed = acl.grant_user(hooks, &self.ctx, user, &grant).await?;
                report(changed, &format!("{} granted to user {}", grant, user));
            }
            UserCommand::Revoke {
                user,
                action,
                object_type,
                object_id,
            } => {
                let grant = Grant::from_row(action, object_type, object_id);
                let changed = acl.revoke_user(hooks, &self.ctx, user, &grant).await?;
                report(changed, &format!("{} revoked from user {}", grant, user));
            }
            UserCommand::AddRole { user, role } => {
                let changed = acl.add_user_role(hooks, &self.ctx, user, &role).await?;
                report(changed, &format!("user {} added to role {}", user, role));
            }
            UserCommand::RemoveRole { user, role } => {
                let changed = acl.remove_user_role(hooks, &self.ctx, user, &role).await?;
                report(changed, &format!("user {} removed from role {}", user, role));
            }
            UserCommand::Roles { user } => {
                let roles = acl.user_roles(user).await?;
                if roles.is_empty() {
                    println!("User {} has no roles.", user);
                } else {
                    println!("{}", roles.join(", "));
                }
            }
        }
        Ok(())
    }

    pub async fn can(
        &self,
        user: i64,
        action: &str,
        object_type: Option<&str>,
        object_id: Option<i64>,
    ) -> anyhow::Result<()> {
        let allowed = self
            .app
            .acl()
            .user_can(user, action, object_type, object_id)
            .await?;
        println!("{}", if allowed { "allowed" } else { "denied" });
        Ok(())
    }

    pub async fn history(&self, query: &HistoryQuery) -> anyhow::Result<()> {
        if !query.has_filters() {
            anyhow::bail!("history needs at least one filter (--user, --object-type, --object-id, --action)");
        }

        let entries = self.app.audit().history(query).await?;
        if entries.is_empty() {
            println!("No entries found.");
            return Ok(());
        }

        println!(
            "{:<6} {:<20} {:<6} {:<14} {:<14} {:<12} {}",
            "ID", "Time", "User", "Action", "Object", "Field", "Value"
        );
        println!("{}", "-".repeat(90));

        for entry in entries {
            let object = match (&entry.object_type, entry.object_id) {
                (Some(t), Some(id)) => format!("{}#{}", t, id),
                (Some(t), None) => t.clone(),
                _ => "-".to_string(),
            };
            let value = match (&entry.old_value, &entry.new_value) {
                (Some(old), Some(new)) => format!("{} → {}", old, new),
                (None, Some(new)) => new.clone(),
                (Some(old), None) => format!("{} → (none)", old),
                (None, None) => String::new(),
            };

            println!(
                "{:<6} {:<20} {:<6} {:<14} {:<14} {:<12} {}",
                entry.id,
                entry.local_timestamp,
                entry.user_id,
                entry.action,
                object,
                entry.field_name.as_deref().unwrap_or("-"),
                value
            );
        }
        Ok(())
    }
}

fn report(changed: bool, message: &str) {
    if changed {
        println!("✓ {}", message);
    } else {
        println!("· unchanged: {}", message);
    }
}
