//! Budget model
//!
//! A named spending envelope with a planned amount, owned by a user.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::PicsouResult;

use super::amount::Amount;
use super::entity::{parse_record, to_record, EntityKind, EntityMeta, JsonEntity, ModelEntity, Named};
use super::ids::BudgetId;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BudgetRecord {
    id: BudgetId,
    name: String,
    amount: Amount,
    #[serde(default)]
    description: String,
}

/// A budget line
#[derive(Debug)]
pub struct Budget {
    meta: EntityMeta,
    amount: Amount,
    name: String,
    description: String,
}

impl Budget {
    pub(crate) fn new(
        parent: &EntityMeta,
        amount: Amount,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::Budget, Some(parent)),
            amount,
            name: name.into(),
            description: description.into(),
        }
    }

    pub(crate) fn for_read(parent: &EntityMeta) -> Self {
        Self {
            meta: EntityMeta::for_read(EntityKind::Budget, Some(parent)),
            amount: Amount::zero(),
            name: String::new(),
            description: String::new(),
        }
    }

    pub fn id(&self) -> BudgetId {
        BudgetId::from_uuid(self.meta.id())
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace every field and notify; sibling-name checks belong to the owner
    pub(crate) fn update(
        &mut self,
        amount: Amount,
        name: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.amount = amount;
        self.name = name.into();
        self.description = description.into();
        self.meta.emit_modified();
    }
}

impl ModelEntity for Budget {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for Budget {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for Budget {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let record: BudgetRecord = parse_record(json, "budget")?;
        self.meta.set_id(record.id.into());
        self.amount = record.amount;
        self.name = record.name;
        self.description = record.description;
        self.meta.set_valid(true);
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        to_record(&BudgetRecord {
            id: self.id(),
            name: self.name.clone(),
            amount: self.amount,
            description: self.description.clone(),
        })
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.amount)
    }
}
