//! In-process uniqueness claims for values that aggregates cannot check on their own
//! (product codes, user emails and CIs).
//!
//! A claim is taken before dispatch and released if the command fails. On startup the
//! table is rebuilt from the event log, so it never needs its own storage.

use std::collections::HashMap;
use std::sync::RwLock;

use arkpos_core::{AggregateId, DomainError};
use arkpos_events::ProjectionError;
use tracing::debug;

use crate::event_store::StoredEvent;

pub const PRODUCT_CODE: &str = "product.code";
pub const USER_EMAIL: &str = "user.email";
pub const USER_CI: &str = "user.ci";

type Key = (&'static str, String);

#[derive(Debug, Default)]
struct Inner {
    claims: HashMap<Key, AggregateId>,
}

#[derive(Debug, Default)]
pub struct UniqueIndex {
    inner: RwLock<Inner>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn poisoned() -> DomainError {
    DomainError::invariant("unique index lock poisoned")
}

impl UniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `value` for `owner`. Re-claiming a value the owner already holds is a no-op.
    pub fn claim(&self, namespace: &'static str, value: &str, owner: AggregateId) -> Result<(), DomainError> {
        let key = (namespace, normalize(value));
        if key.1.is_empty() {
            return Err(DomainError::validation(format!("{namespace} cannot be empty")));
        }

        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        match inner.claims.get(&key) {
            Some(holder) if *holder != owner => {
                Err(DomainError::conflict(format!("{namespace} '{}' is already in use", value.trim())))
            }
            Some(_) => Ok(()),
            None => {
                inner.claims.insert(key, owner);
                Ok(())
            }
        }
    }

    /// Release `value` if `owner` holds it. Releasing someone else's claim does nothing.
    pub fn release(&self, namespace: &'static str, value: &str, owner: AggregateId) {
        let key = (namespace, normalize(value));
        if let Ok(mut inner) = self.inner.write() {
            if inner.claims.get(&key) == Some(&owner) {
                inner.claims.remove(&key);
            }
        }
    }

    pub fn lookup(&self, namespace: &'static str, value: &str) -> Option<AggregateId> {
        let key = (namespace, normalize(value));
        self.inner.read().ok().and_then(|inner| inner.claims.get(&key).copied())
    }

    pub fn count(&self, namespace: &'static str) -> usize {
        self.inner
            .read()
            .map(|inner| inner.claims.keys().filter(|(ns, _)| *ns == namespace).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.claims.clear();
        }
    }

    /// Recreate every claim from the event log (global append order).
    pub fn rebuild(&self, events: &[StoredEvent]) -> Result<(), ProjectionError> {
        self.clear();
        for stored in events {
            match stored.aggregate_type.as_str() {
                "catalog.product" => self.replay_product(stored)?,
                "auth.user" => self.replay_user(stored)?,
                _ => {}
            }
        }
        debug!(
            product_codes = self.count(PRODUCT_CODE),
            user_emails = self.count(USER_EMAIL),
            "unique index rebuilt"
        );
        Ok(())
    }

    fn replay_product(&self, stored: &StoredEvent) -> Result<(), ProjectionError> {
        use arkpos_catalog::ProductEvent;

        let event: ProductEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| ProjectionError::deserialize(&stored.aggregate_type, e))?;
        let owner = stored.aggregate_id;

        let code = match &event {
            ProductEvent::Registered(e) => &e.details.code,
            ProductEvent::Updated(e) => &e.details.code,
            _ => return Ok(()),
        };
        self.move_claim(PRODUCT_CODE, owner, code);
        Ok(())
    }

    fn replay_user(&self, stored: &StoredEvent) -> Result<(), ProjectionError> {
        use arkpos_auth::UserEvent;

        let event: UserEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| ProjectionError::deserialize(&stored.aggregate_type, e))?;
        if let UserEvent::Registered(e) = event {
            self.move_claim(USER_EMAIL, stored.aggregate_id, &e.email);
            self.move_claim(USER_CI, stored.aggregate_id, &e.ci);
        }
        Ok(())
    }

    /// Point `owner`'s claim in `namespace` at `value`, dropping any previous one.
    /// The log already went through `claim`, so it is trusted here.
    fn move_claim(&self, namespace: &'static str, owner: AggregateId, value: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.claims.retain(|(ns, _), holder| !(*ns == namespace && *holder == owner));
            inner.claims.insert((namespace, normalize(value)), owner);
        }
    }
}
