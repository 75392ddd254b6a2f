use chrono::Duration;
use tlx_core::ids::secure_token;
use tlx_core::{time, Role, TlxError, TlxResult};
use tracing::info;

use super::{oldest_first, ManagementStore, DEFAULT_TENANT_SLUG};
use crate::models::*;

/// Where a newly registered user lands.
#[derive(Debug, Clone)]
pub struct TenantChoice {
    pub slug: String,
    pub name: String,
}

impl ManagementStore {
    // ─── Tenants ───────────────────────────────────────────────────────────

    pub fn tenant(&self, id: i64) -> Option<Tenant> {
        self.tenants.get(&id).map(|r| r.value().clone())
    }

    pub fn tenant_by_slug(&self, slug: &str) -> Option<Tenant> {
        self.tenants
            .iter()
            .find(|r| r.value().slug == slug)
            .map(|r| r.value().clone())
    }

    fn insert_tenant(&self, name: &str, slug: &str) -> Tenant {
        let id = self.ids.tenant.next();
        let tenant = Tenant {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: time::now(),
        };
        self.tenants.insert(id, tenant.clone());
        info!(tenant_id = id, slug = slug, "Tenant created");
        tenant
    }

    /// Create a tenant and make `creator` its admin.
    pub fn create_tenant(&self, name: &str, slug: &str, creator: i64) -> TlxResult<Tenant> {
        let _guard = self.unique_lock.lock();
        if self.tenant_by_slug(slug).is_some() {
            return Err(TlxError::conflict("Tenant slug already exists"));
        }
        let tenant = self.insert_tenant(name, slug);
        self.insert_membership(tenant.id, creator, Role::Admin);
        Ok(tenant)
    }

    // ─── Users ─────────────────────────────────────────────────────────────

    pub fn user(&self, id: i64) -> Option<User> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|r| r.value().email == email)
            .map(|r| r.value().clone())
    }

    fn insert_user(&self, email: &str, password_hash: String) -> User {
        let id = self.ids.user.next();
        let user = User {
            id,
            email: email.to_string(),
            password_hash,
            created_at: time::now(),
        };
        self.users.insert(id, user.clone());
        user
    }

    /// Create a user and make them admin of the chosen tenant, creating it
    /// when the slug is new. Without a choice the default tenant is used.
    pub fn register(
        &self,
        email: &str,
        password_hash: String,
        choice: Option<TenantChoice>,
    ) -> TlxResult<(User, Tenant)> {
        let _guard = self.unique_lock.lock();
        if self.user_by_email(email).is_some() {
            return Err(TlxError::conflict("Email already registered"));
        }
        let tenant = match choice {
            Some(choice) => match self.tenant_by_slug(&choice.slug) {
                Some(existing) => existing,
                None => self.insert_tenant(&choice.name, &choice.slug),
            },
            None => self
                .tenant_by_slug(DEFAULT_TENANT_SLUG)
                .ok_or_else(|| TlxError::Internal(anyhow::anyhow!("default tenant missing")))?,
        };
        let user = self.insert_user(email, password_hash);
        if self.find_membership(tenant.id, user.id).is_none() {
            self.insert_membership(tenant.id, user.id, Role::Admin);
        }
        Ok((user, tenant))
    }

    pub fn set_password(&self, user_id: i64, password_hash: String) -> TlxResult<()> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| TlxError::not_found("User not found"))?;
        user.password_hash = password_hash;
        Ok(())
    }

    // ─── Memberships ───────────────────────────────────────────────────────

    fn find_membership(&self, tenant_id: i64, user_id: i64) -> Option<Membership> {
        self.memberships
            .iter()
            .find(|r| r.value().tenant_id == tenant_id && r.value().user_id == user_id)
            .map(|r| r.value().clone())
    }

    fn insert_membership(&self, tenant_id: i64, user_id: i64, role: Role) -> Membership {
        let id = self.ids.membership.next();
        let membership = Membership {
            id,
            tenant_id,
            user_id,
            role,
            created_at: time::now(),
        };
        self.memberships.insert(id, membership.clone());
        membership
    }

    pub fn membership(&self, tenant_id: i64, user_id: i64) -> Option<Membership> {
        self.find_membership(tenant_id, user_id)
    }

    /// Members of a tenant in join order.
    pub fn members(&self, tenant_id: i64) -> Vec<MemberOut> {
        oldest_first(&self.memberships, |m| m.tenant_id == tenant_id)
            .into_iter()
            .filter_map(|m| {
                self.user(m.user_id).map(|u| MemberOut {
                    user_id: u.id,
                    email: u.email,
                    role: m.role,
                    created_at: m.created_at,
                })
            })
            .collect()
    }

    pub fn set_member_role(&self, tenant_id: i64, user_id: i64, role: Role) -> TlxResult<Membership> {
        let id = self
            .find_membership(tenant_id, user_id)
            .map(|m| m.id)
            .ok_or_else(|| TlxError::not_found("Member not found"))?;
        let mut row = self
            .memberships
            .get_mut(&id)
            .ok_or_else(|| TlxError::not_found("Member not found"))?;
        row.role = role;
        Ok(row.clone())
    }

    // ─── Invites ───────────────────────────────────────────────────────────

    /// Issue an invite. Only one unused, unexpired invite per email and
    /// tenant may exist.
    pub fn create_invite(
        &self,
        tenant_id: i64,
        email: &str,
        role: Role,
        created_by: i64,
        ttl: Duration,
    ) -> TlxResult<InviteToken> {
        let _guard = self.unique_lock.lock();
        let now = time::now();
        let active = self.invites.iter().any(|r| {
            let inv = r.value();
            inv.tenant_id == tenant_id && inv.email == email && inv.used_at.is_none() && inv.expires_at > now
        });
        if active {
            return Err(TlxError::conflict("Invite already active"));
        }
        let id = self.ids.invite.next();
        let invite = InviteToken {
            id,
            tenant_id,
            email: email.to_string(),
            role,
            token: secure_token(32),
            expires_at: now + ttl,
            used_at: None,
            created_by,
            created_at: now,
        };
        self.invites.insert(id, invite.clone());
        Ok(invite)
    }

    /// Redeem an invite: create the user (or reset their password), add the
    /// membership and mark the token used.
    pub fn accept_invite(&self, token: &str, password_hash: String) -> TlxResult<(User, InviteToken)> {
        let _guard = self.unique_lock.lock();
        let now = time::now();
        let invite = self
            .invites
            .iter()
            .find(|r| r.value().token == token)
            .map(|r| r.value().clone())
            .ok_or_else(|| TlxError::not_found("Invalid token"))?;
        if invite.used_at.is_some() {
            return Err(TlxError::conflict("Token already used"));
        }
        if invite.expires_at <= now {
            return Err(TlxError::Gone("Token expired".into()));
        }

        let user = match self.user_by_email(&invite.email) {
            Some(existing) => {
                if self.find_membership(invite.tenant_id, existing.id).is_some() {
                    return Err(TlxError::conflict("Already a member"));
                }
                self.set_password(existing.id, password_hash)?;
                existing
            }
            None => self.insert_user(&invite.email, password_hash),
        };
        self.insert_membership(invite.tenant_id, user.id, invite.role);

        if let Some(mut row) = self.invites.get_mut(&invite.id) {
            row.used_at = Some(now);
        }
        Ok((user, invite))
    }

    // ─── Password reset ────────────────────────────────────────────────────

    pub fn create_reset(&self, user_id: i64, ttl: Duration) -> ResetToken {
        let now = time::now();
        let id = self.ids.reset.next();
        let reset = ResetToken {
            id,
            user_id,
            token: secure_token(32),
            expires_at: now + ttl,
            used_at: None,
            created_at: now,
        };
        self.resets.insert(id, reset.clone());
        reset
    }

    /// Set a new password through a reset token. Returns the user id.
    pub fn confirm_reset(&self, token: &str, password_hash: String) -> TlxResult<i64> {
        let _guard = self.unique_lock.lock();
        let now = time::now();
        let reset = self
            .resets
            .iter()
            .find(|r| r.value().token == token)
            .map(|r| r.value().clone())
            .ok_or_else(|| TlxError::not_found("Invalid token"))?;
        if reset.used_at.is_some() {
            return Err(TlxError::conflict("Token already used"));
        }
        if reset.expires_at <= now {
            return Err(TlxError::Gone("Token expired".into()));
        }
        self.set_password(reset.user_id, password_hash)?;
        if let Some(mut row) = self.resets.get_mut(&reset.id) {
            row.used_at = Some(now);
        }
        Ok(reset.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_TENANT_ID;

    fn choice(slug: &str) -> Option<TenantChoice> {
        Some(TenantChoice {
            slug: slug.to_string(),
            name: "Acme".to_string(),
        })
    }

    #[test]
    fn register_defaults_and_duplicates() {
        let store = ManagementStore::new();
        let (user, tenant) = store.register("a@x.io", "h".into(), None).unwrap();
        assert_eq!(tenant.id, DEFAULT_TENANT_ID);
        assert_eq!(store.membership(tenant.id, user.id).unwrap().role, Role::Admin);

        let err = store.register("a@x.io", "h".into(), None).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn register_creates_tenant_from_slug() {
        let store = ManagementStore::new();
        let (_, tenant) = store.register("b@x.io", "h".into(), choice("acme")).unwrap();
        assert_ne!(tenant.id, DEFAULT_TENANT_ID);
        assert_eq!(store.tenant_by_slug("acme").unwrap().name, "Acme");

        let (_, again) = store.register("c@x.io", "h".into(), choice("acme")).unwrap();
        assert_eq!(again.id, tenant.id);
    }

    #[test]
    fn tenant_slug_conflict() {
        let store = ManagementStore::new();
        let (user, _) = store.register("a@x.io", "h".into(), None).unwrap();
        store.create_tenant("Shop", "shop", user.id).unwrap();
        assert_eq!(store.create_tenant("Shop", "shop", user.id).unwrap_err().status_code(), 409);
    }

    #[test]
    fn members_in_join_order_and_role_update() {
        let store = ManagementStore::new();
        let (a, t) = store.register("a@x.io", "h".into(), None).unwrap();
        let (b, _) = store.register("b@x.io", "h".into(), None).unwrap();
        let members = store.members(t.id);
        assert_eq!(members.iter().map(|m| m.user_id).collect::<Vec<_>>(), vec![a.id, b.id]);

        store.set_member_role(t.id, b.id, Role::Viewer).unwrap();
        assert_eq!(store.membership(t.id, b.id).unwrap().role, Role::Viewer);
        assert_eq!(store.set_member_role(t.id, 999, Role::Viewer).unwrap_err().status_code(), 404);
    }

    #[test]
    fn invite_lifecycle() {
        let store = ManagementStore::new();
        let (admin, t) = store.register("a@x.io", "h".into(), None).unwrap();
        let invite = store
            .create_invite(t.id, "new@x.io", Role::Editor, admin.id, Duration::hours(48))
            .unwrap();
        let dup = store.create_invite(t.id, "new@x.io", Role::Editor, admin.id, Duration::hours(48));
        assert_eq!(dup.unwrap_err().status_code(), 409);

        let (user, _) = store.accept_invite(&invite.token, "pw".into()).unwrap();
        assert_eq!(store.membership(t.id, user.id).unwrap().role, Role::Editor);

        let again = store.accept_invite(&invite.token, "pw".into()).unwrap_err();
        assert_eq!(again.status_code(), 409);
        assert_eq!(store.accept_invite("missing-token", "pw".into()).unwrap_err().status_code(), 404);
    }

    #[test]
    fn expired_invite_is_gone() {
        let store = ManagementStore::new();
        let invite = store
            .create_invite(1, "late@x.io", Role::Viewer, 1, Duration::seconds(-1))
            .unwrap();
        assert_eq!(store.accept_invite(&invite.token, "pw".into()).unwrap_err().status_code(), 410);
    }

    #[test]
    fn invite_for_existing_member_conflicts() {
        let store = ManagementStore::new();
        let (user, t) = store.register("a@x.io", "old".into(), None).unwrap();
        let invite = store
            .create_invite(t.id, "a@x.io", Role::Viewer, user.id, Duration::hours(1))
            .unwrap();
        let err = store.accept_invite(&invite.token, "new".into()).unwrap_err();
        assert_eq!(err.to_string(), "Already a member");
        assert_eq!(store.user(user.id).unwrap().password_hash, "old");
    }

    #[test]
    fn reset_is_single_use() {
        let store = ManagementStore::new();
        let (user, _) = store.register("a@x.io", "old".into(), None).unwrap();
        let reset = store.create_reset(user.id, Duration::hours(2));
        assert_eq!(store.confirm_reset(&reset.token, "new".into()).unwrap(), user.id);
        assert_eq!(store.user(user.id).unwrap().password_hash, "new");
        assert_eq!(store.confirm_reset(&reset.token, "x".into()).unwrap_err().status_code(), 409);
    }
}
