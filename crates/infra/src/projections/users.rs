//! User directory read model.
//!
//! Login does not read from here; it loads the `User` aggregate directly so a
//! just-registered account can sign in immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_auth::{Role, UserEvent, UserId, UserStatus};
use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};

use super::{decode, in_order};
use crate::read_model::ReadStore;

// ─────────────────────────────────────────────────────────────────────────────
// Read Model
// ─────────────────────────────────────────────────────────────────────────────

/// Account as shown to administrators. No credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: UserId,
    pub full_name: String,
    pub ci: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

pub struct UsersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: ReadStore<UserId, UserRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    fn apply_event(&self, event: UserEvent) {
        match event {
            UserEvent::Registered(e) => {
                self.store.upsert(
                    e.user_id,
                    UserRow {
                        user_id: e.user_id,
                        full_name: e.full_name,
                        ci: e.ci,
                        email: e.email,
                        phone: e.phone,
                        role: e.role,
                        status: UserStatus::Active,
                        registered_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::ProfileUpdated(e) => self.touch(e.user_id, e.occurred_at, |row| {
                row.full_name = e.full_name;
                row.phone = e.phone;
            }),
            UserEvent::PasswordChanged(e) => self.touch(e.user_id, e.occurred_at, |_| {}),
            UserEvent::Suspended(e) => self.touch(e.user_id, e.occurred_at, |row| row.status = UserStatus::Suspended),
            UserEvent::Reactivated(e) => self.touch(e.user_id, e.occurred_at, |row| row.status = UserStatus::Active),
        }
    }

    fn touch(&self, user_id: UserId, at: DateTime<Utc>, f: impl FnOnce(&mut UserRow)) {
        if let Some(mut row) = self.store.get(&user_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(user_id, row);
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<UserRow> {
        self.store.get(&user_id)
    }

    /// Users ordered by full name.
    pub fn list(&self) -> Vec<UserRow> {
        let mut rows = self.store.list();
        rows.sort_by_key(|u| u.full_name.to_lowercase());
        rows
    }

    /// Display name for history screens, falling back to the id.
    pub fn display_name(&self, user_id: UserId) -> String {
        self.get(user_id).map(|u| u.full_name).unwrap_or_else(|| user_id.to_string())
    }
}

impl<S> Projection for UsersProjection<S>
where
    S: ReadStore<UserId, UserRow>,
{
    fn name(&self) -> &'static str {
        "auth.users"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        aggregate_type == "auth.user"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            self.apply_event(decode(envelope)?);
            Ok(())
        })
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::testing::Sequencer;
    use crate::read_model::InMemoryReadStore;

    use arkpos_auth::{ProfileUpdated, UserRegistered, UserSuspended};

    fn registered(user_id: UserId, name: &str) -> UserEvent {
        UserEvent::Registered(UserRegistered {
            user_id,
            full_name: name.to_string(),
            ci: "4567890".to_string(),
            email: format!("{}@tienda.bo", name.to_lowercase()),
            phone: None,
            password_hash: "$2b$04$hash".to_string(),
            role: Role::cashier(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn tracks_profile_and_status() {
        let projection = UsersProjection::new(InMemoryReadStore::new());
        let mut seq = Sequencer::default();
        let id = UserId::generate();

        for event in [
            registered(id, "Lucia"),
            UserEvent::ProfileUpdated(ProfileUpdated {
                user_id: id,
                full_name: "Lucía Condori".to_string(),
                phone: Some("70012345".to_string()),
                occurred_at: Utc::now(),
            }),
            UserEvent::Suspended(UserSuspended {
                user_id: id,
                reason: None,
                occurred_at: Utc::now(),
            }),
        ] {
            projection.apply_envelope(&seq.next(id.aggregate_id(), "auth.user", &event)).unwrap();
        }

        let row = projection.get(id).unwrap();
        assert_eq!(row.full_name, "Lucía Condori");
        assert_eq!(row.phone.as_deref(), Some("70012345"));
        assert_eq!(row.status, UserStatus::Suspended);
        assert_eq!(projection.display_name(id), "Lucía Condori");
    }

    #[test]
    fn list_is_sorted_by_name() {
        let projection = UsersProjection::new(InMemoryReadStore::new());
        let mut seq = Sequencer::default();
        for name in ["marco", "Ana", "Beto"] {
            let id = UserId::generate();
            projection.apply_envelope(&seq.next(id.aggregate_id(), "auth.user", &registered(id, name))).unwrap();
        }

        let names: Vec<_> = projection.list().into_iter().map(|u| u.full_name).collect();
        assert_eq!(names, vec!["Ana", "Beto", "marco"]);
    }

    #[test]
    fn unknown_user_displays_as_id() {
        let projection = UsersProjection::new(InMemoryReadStore::new());
        let id = UserId::generate();
        assert_eq!(projection.display_name(id), id.to_string());
    }
}
