use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use arkpos_auth::{
    ChangePassword, ReactivateUser, RegisterUser, Role, SuspendUser, UpdateProfile, User, UserCommand, UserId,
    hash_password, validate_new_password, verify_password,
};
use arkpos_core::DomainError;
use arkpos_events::{EventBus, EventEnvelope};

use super::{WorkflowError, WorkflowResult, Workflows};
use crate::event_store::EventStore;
use crate::streams;
use crate::unique_index::{USER_CI, USER_EMAIL};

/// Self-registration input. The password is plain text here and hashed before dispatch.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub ci: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Registers an account. The first account ever registered is an admin; every
    /// later one is a cashier.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub fn register_user(&self, input: NewUser) -> WorkflowResult<User> {
        validate_new_password(&input.password)?;
        let user_id = UserId::generate();
        let owner = user_id.aggregate_id();

        let _guard = self
            .registration
            .lock()
            .map_err(|_| DomainError::invariant("registration lock poisoned"))?;

        let role = if self.index.count(USER_EMAIL) == 0 {
            Role::admin()
        } else {
            Role::cashier()
        };

        self.index.claim(USER_EMAIL, &input.email, owner)?;
        if let Err(e) = self.index.claim(USER_CI, &input.ci, owner) {
            self.index.release(USER_EMAIL, &input.email, owner);
            return Err(e.into());
        }

        let result = hash_password(&input.password, self.bcrypt_cost)
            .map_err(WorkflowError::from)
            .and_then(|password_hash| {
                let command = UserCommand::Register(RegisterUser {
                    user_id,
                    full_name: input.full_name.clone(),
                    ci: input.ci.clone(),
                    email: input.email.clone(),
                    phone: input.phone.clone(),
                    password_hash,
                    role: role.clone(),
                    occurred_at: Utc::now(),
                });
                self.dispatcher
                    .dispatch(owner, streams::USER, command, |id| User::empty(UserId::new(id)))
                    .map_err(WorkflowError::from)
            });

        if let Err(e) = result {
            self.index.release(USER_EMAIL, &input.email, owner);
            self.index.release(USER_CI, &input.ci, owner);
            return Err(e);
        }

        info!(%user_id, role = %role, "user registered");
        self.user(user_id)
    }

    /// Authenticates by email (case-insensitive) or CI.
    #[instrument(skip(self, password))]
    pub fn login(&self, identifier: &str, password: &str) -> WorkflowResult<User> {
        let owner = self
            .index
            .lookup(USER_EMAIL, identifier)
            .or_else(|| self.index.lookup(USER_CI, identifier))
            .ok_or(WorkflowError::UserNotFound)?;
        let user = self.user(UserId::new(owner))?;

        if !verify_password(password, user.password_hash())? {
            return Err(WorkflowError::InvalidPassword);
        }
        if !user.can_log_in() {
            return Err(WorkflowError::Suspended);
        }

        info!(user_id = %user.id_typed(), "login succeeded");
        Ok(user)
    }

    #[instrument(skip(self, full_name, phone))]
    pub fn update_profile(&self, user_id: UserId, full_name: &str, phone: Option<String>) -> WorkflowResult<User> {
        self.user(user_id)?;
        self.dispatcher.dispatch(
            user_id.aggregate_id(),
            streams::USER,
            UserCommand::UpdateProfile(UpdateProfile {
                user_id,
                full_name: full_name.to_string(),
                phone,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(UserId::new(id)),
        )?;
        info!(%user_id, "profile updated");
        self.user(user_id)
    }

    /// Requires the current password. The caller checks that the new password was confirmed.
    #[instrument(skip(self, current, new_password))]
    pub fn change_password(&self, user_id: UserId, current: &str, new_password: &str) -> WorkflowResult<()> {
        let user = self.user(user_id)?;
        if !verify_password(current, user.password_hash())? {
            return Err(WorkflowError::InvalidPassword);
        }
        validate_new_password(new_password)?;

        let new_password_hash = hash_password(new_password, self.bcrypt_cost)?;
        self.dispatcher.dispatch(
            user_id.aggregate_id(),
            streams::USER,
            UserCommand::ChangePassword(ChangePassword {
                user_id,
                new_password_hash,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(UserId::new(id)),
        )?;
        info!(%user_id, "password changed");
        Ok(())
    }

    #[instrument(skip(self, reason))]
    pub fn suspend_user(&self, actor: UserId, user_id: UserId, reason: Option<String>) -> WorkflowResult<()> {
        if actor == user_id {
            return Err(DomainError::validation("you cannot suspend your own account").into());
        }
        self.user(user_id)?;
        self.dispatcher.dispatch(
            user_id.aggregate_id(),
            streams::USER,
            UserCommand::Suspend(SuspendUser {
                user_id,
                reason,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(UserId::new(id)),
        )?;
        info!(%user_id, %actor, "user suspended");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn reactivate_user(&self, user_id: UserId) -> WorkflowResult<()> {
        self.user(user_id)?;
        self.dispatcher.dispatch(
            user_id.aggregate_id(),
            streams::USER,
            UserCommand::Reactivate(ReactivateUser {
                user_id,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(UserId::new(id)),
        )?;
        info!(%user_id, "user reactivated");
        Ok(())
    }
}
