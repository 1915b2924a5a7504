//! User aggregate: the people who log in and ring up sales (event-sourced).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_core::{Aggregate, AggregateRoot, DomainError, rules};
use arkpos_events::Event;

use crate::Role;

arkpos_core::typed_id!(
    /// Identifier of a user account.
    UserId
);

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    /// Cannot log in.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Suspended => write!(f, "suspended"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User aggregate.
///
/// # Invariants
/// - Name, CI, email and password hash are always present.
/// - CI is 7 or 8 digits; a phone, when present, is digits only.
/// - Email is stored trimmed and lower-cased.
/// - Uniqueness of email and CI is enforced outside the aggregate (unique index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    full_name: String,
    ci: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
    role: Role,
    status: UserStatus,
    version: u64,
    created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            full_name: String::new(),
            ci: String::new(),
            email: String::new(),
            phone: None,
            password_hash: String::new(),
            role: Role::cashier(),
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> UserId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn ci(&self) -> &str {
        &self.ci
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn can_log_in(&self) -> bool {
        self.created && self.status == UserStatus::Active
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// CI (cédula de identidad): 7 or 8 ASCII digits.
pub fn validate_ci(ci: &str) -> Result<String, DomainError> {
    let ci = rules::required("CI", ci)?;
    if !rules::is_digits(&ci) || !(7..=8).contains(&ci.len()) {
        return Err(DomainError::validation("CI must be 7 or 8 digits"));
    }
    Ok(ci)
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub full_name: String,
    pub ci: String,
    pub email: String,
    pub phone: Option<String>,
    /// Already hashed; plain passwords never reach the aggregate.
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub user_id: UserId,
    pub full_name: String,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub new_password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendUser {
    pub user_id: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    UpdateProfile(UpdateProfile),
    ChangePassword(ChangePassword),
    Suspend(SuspendUser),
    Reactivate(ReactivateUser),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub full_name: String,
    pub ci: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub full_name: String,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSuspended {
    pub user_id: UserId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReactivated {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    ProfileUpdated(ProfileUpdated),
    PasswordChanged(PasswordChanged),
    Suspended(UserSuspended),
    Reactivated(UserReactivated),
}

impl UserEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            UserEvent::Registered(e) => e.user_id,
            UserEvent::ProfileUpdated(e) => e.user_id,
            UserEvent::PasswordChanged(e) => e.user_id,
            UserEvent::Suspended(e) => e.user_id,
            UserEvent::Reactivated(e) => e.user_id,
        }
    }
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::ProfileUpdated(_) => "auth.user.profile_updated",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Reactivated(_) => "auth.user.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Reactivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.full_name = e.full_name.clone();
                self.ci = e.ci.clone();
                self.email = e.email.clone();
                self.phone = e.phone.clone();
                self.password_hash = e.password_hash.clone();
                self.role = e.role.clone();
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::ProfileUpdated(e) => {
                self.full_name = e.full_name.clone();
                self.phone = e.phone.clone();
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
            }
            UserEvent::Suspended(_) => self.status = UserStatus::Suspended,
            UserEvent::Reactivated(_) => self.status = UserStatus::Active,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl User {
    fn ensure_exists(&self, user_id: UserId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        let full_name = rules::required("full name", &cmd.full_name)?;
        let ci = validate_ci(&cmd.ci)?;
        let email = rules::email("email", &cmd.email)?;
        let phone = rules::optional_phone("phone", cmd.phone.as_deref())?;
        if cmd.password_hash.trim().is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            full_name,
            ci,
            email,
            phone,
            password_hash: cmd.password_hash.clone(),
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;

        let full_name = rules::required("full name", &cmd.full_name)?;
        let phone = rules::optional_phone("phone", cmd.phone.as_deref())?;

        if full_name == self.full_name && phone == self.phone {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: cmd.user_id,
            full_name,
            phone,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;

        if cmd.new_password_hash.trim().is_empty() {
            return Err(DomainError::validation("password is required"));
        }

        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: cmd.user_id,
            password_hash: cmd.new_password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            user_id: cmd.user_id,
            reason: rules::optional(cmd.reason.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.user_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Reactivated(UserReactivated {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
