//! Product categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_core::{Aggregate, AggregateRoot, DomainError, rules};
use arkpos_events::Event;

arkpos_core::typed_id!(CategoryId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    name: String,
    removed: bool,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            name: String::new(),
            removed: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Exists and has not been removed.
    pub fn is_live(&self) -> bool {
        self.created && !self.removed
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCategory {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    Create(CreateCategory),
    Rename(RenameCategory),
    Remove(RemoveCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRenamed {
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRemoved {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    Created(CategoryCreated),
    Renamed(CategoryRenamed),
    Removed(CategoryRemoved),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::Created(_) => "catalog.category.created",
            CategoryEvent::Renamed(_) => "catalog.category.renamed",
            CategoryEvent::Removed(_) => "catalog.category.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::Created(e) => e.occurred_at,
            CategoryEvent::Renamed(e) => e.occurred_at,
            CategoryEvent::Removed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::Created(e) => {
                self.id = e.category_id;
                self.name = e.name.clone();
                self.created = true;
            }
            CategoryEvent::Renamed(e) => self.name = e.name.clone(),
            CategoryEvent::Removed(_) => self.removed = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                Ok(vec![CategoryEvent::Created(CategoryCreated {
                    category_id: cmd.category_id,
                    name: rules::required("category name", &cmd.name)?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Rename(cmd) => {
                self.ensure_live()?;
                let name = rules::required("category name", &cmd.name)?;
                if name == self.name {
                    return Ok(vec![]);
                }
                Ok(vec![CategoryEvent::Renamed(CategoryRenamed {
                    category_id: cmd.category_id,
                    name,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Remove(cmd) => {
                self.ensure_live()?;
                Ok(vec![CategoryEvent::Removed(CategoryRemoved {
                    category_id: cmd.category_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Category {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.removed {
            return Err(DomainError::invariant("category has been removed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(name: &str) -> Category {
        let id = CategoryId::generate();
        let mut category = Category::empty(id);
        let events = category
            .handle(&CategoryCommand::Create(CreateCategory {
                category_id: id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        category.apply(&events[0]);
        category
    }

    #[test]
    fn create_trims_and_rejects_blank() {
        assert_eq!(created("  Poleras ").name(), "Poleras");

        let id = CategoryId::generate();
        let err = Category::empty(id)
            .handle(&CategoryCommand::Create(CreateCategory {
                category_id: id,
                name: " ".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn removed_category_is_frozen() {
        let mut category = created("Pantalones");
        let id = *category.id();
        let events = category
            .handle(&CategoryCommand::Remove(RemoveCategory {
                category_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        category.apply(&events[0]);
        assert!(!category.is_live());

        let rename = category.handle(&CategoryCommand::Rename(RenameCategory {
            category_id: id,
            name: "Jeans".to_string(),
            occurred_at: Utc::now(),
        }));
        assert!(matches!(rename, Err(DomainError::InvariantViolation(_))));

        let remove = category.handle(&CategoryCommand::Remove(RemoveCategory {
            category_id: id,
            occurred_at: Utc::now(),
        }));
        assert!(remove.is_err());
    }

    #[test]
    fn rename_to_same_name_emits_nothing() {
        let category = created("Gorras");
        let events = category
            .handle(&CategoryCommand::Rename(RenameCategory {
                category_id: *category.id(),
                name: "Gorras ".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }
}
