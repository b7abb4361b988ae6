//! Payment method model (card, cash, transfer...), scoped to one account

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PicsouResult;

use super::entity::{parse_record, to_record, EntityKind, EntityMeta, JsonEntity, ModelEntity, Named};
use super::ids::PaymentMethodId;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PaymentMethodRecord {
    id: PaymentMethodId,
    name: String,
}

#[derive(Debug)]
pub struct PaymentMethod {
    meta: EntityMeta,
    name: String,
}

impl PaymentMethod {
    pub(crate) fn new(parent: &EntityMeta, name: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::PaymentMethod, Some(parent)),
            name: name.into(),
        }
    }

    pub(crate) fn for_read(parent: &EntityMeta) -> Self {
        Self {
            meta: EntityMeta::for_read(EntityKind::PaymentMethod, Some(parent)),
            name: String::new(),
        }
    }

    pub fn id(&self) -> PaymentMethodId {
        PaymentMethodId::from_uuid(self.meta.id())
    }

    pub(crate) fn update(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.meta.emit_modified();
    }
}

impl ModelEntity for PaymentMethod {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for PaymentMethod {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for PaymentMethod {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let record: PaymentMethodRecord = parse_record(json, "payment method")?;
        self.meta.set_id(record.id.into());
        self.name = record.name;
        self.meta.set_valid(true);
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        to_record(&PaymentMethodRecord {
            id: self.id(),
            name: self.name.clone(),
        })
    }
}
