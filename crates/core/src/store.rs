//! Store model.

use chrono::{DateTime, Utc};

use crate::{AccountId, Entity, StoreId};

/// A persisted store. `owner` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub owner: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> StoreId {
        self.id
    }
}

/// A validated store candidate.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub owner: AccountId,
}

impl NewStore {
    pub fn into_store(self, id: StoreId, created_at: DateTime<Utc>) -> Store {
        Store {
            id,
            name: self.name,
            owner: self.owner,
            created_at,
        }
    }
}
