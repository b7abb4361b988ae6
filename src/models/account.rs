//! Account model
//!
//! An account owns its payment methods, scheduled operations and operations.
//! While archived, every mutation of those collections fails with
//! `PicsouError::Archived` and nothing is emitted.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{PicsouError, PicsouResult};

use super::amount::Amount;
use super::entity::{
    clean_name, ensure_unique_names, name_taken, parse_record, read_children, snapshot, to_record,
    write_children, EntityKind, EntityMeta, JsonEntity, ModelEntity, Named,
};
use super::ids::{AccountId, OperationId, PaymentMethodId, ScheduledOperationId};
use super::operation::{Operation, OperationFields, Schedule, ScheduledOperation};
use super::payment_method::PaymentMethod;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccountRecord {
    id: AccountId,
    name: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    init_amount: Amount,
    #[serde(default)]
    payment_methods: Vec<Value>,
    #[serde(default)]
    scheduled_ops: Vec<Value>,
    #[serde(default)]
    ops: Vec<Value>,
}

#[derive(Debug)]
pub struct Account {
    meta: EntityMeta,
    name: String,
    notes: String,
    archived: bool,
    initial_amount: Amount,
    payment_methods: HashMap<PaymentMethodId, PaymentMethod>,
    scheduled_ops: HashMap<ScheduledOperationId, ScheduledOperation>,
    ops: HashMap<OperationId, Operation>,
}

impl Account {
    pub(crate) fn new(
        parent: &EntityMeta,
        name: impl Into<String>,
        notes: impl Into<String>,
        archived: bool,
        initial_amount: Amount,
    ) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::Account, Some(parent)),
            name: name.into(),
            notes: notes.into(),
            archived,
            initial_amount,
            payment_methods: HashMap::new(),
            scheduled_ops: HashMap::new(),
            ops: HashMap::new(),
        }
    }

    pub(crate) fn for_read(parent: &EntityMeta) -> Self {
        Self {
            meta: EntityMeta::for_read(EntityKind::Account, Some(parent)),
            name: String::new(),
            notes: String::new(),
            archived: false,
            initial_amount: Amount::zero(),
            payment_methods: HashMap::new(),
            scheduled_ops: HashMap::new(),
            ops: HashMap::new(),
        }
    }

    pub fn id(&self) -> AccountId {
        AccountId::from_uuid(self.meta.id())
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn initial_amount(&self) -> Amount {
        self.initial_amount
    }

    /// Replace the account's own fields; renames are checked by the owning user
    pub(crate) fn update(
        &mut self,
        name: impl Into<String>,
        notes: impl Into<String>,
        archived: bool,
        initial_amount: Amount,
    ) {
        self.name = name.into();
        self.notes = notes.into();
        self.archived = archived;
        self.initial_amount = initial_amount;
        self.meta.emit_modified();
    }

    pub fn archive(&mut self) {
        if !self.archived {
            self.archived = true;
            self.meta.emit_modified();
        }
    }

    pub fn unarchive(&mut self) {
        if self.archived {
            self.archived = false;
            self.meta.emit_modified();
        }
    }

    fn ensure_writable(&self) -> PicsouResult<()> {
        if self.archived {
            Err(PicsouError::Archived(self.name.clone()))
        } else {
            Ok(())
        }
    }

    // Payment methods

    pub fn add_payment_method(&mut self, name: &str) -> PicsouResult<PaymentMethodId> {
        self.ensure_writable()?;
        let name = clean_name("Payment method", name)?;
        if name_taken(self.payment_methods.values(), &name, None) {
            return Err(PicsouError::duplicate("Payment method", name));
        }
        let pm = PaymentMethod::new(&self.meta, name);
        let id = pm.id();
        self.payment_methods.insert(id, pm);
        self.meta.emit_modified();
        Ok(id)
    }

    pub fn remove_payment_method(&mut self, id: PaymentMethodId) -> PicsouResult<()> {
        self.ensure_writable()?;
        self.payment_methods
            .remove(&id)
            .ok_or_else(|| PicsouError::payment_method_not_found(id.to_string()))?;
        self.meta.emit_modified();
        Ok(())
    }

    pub fn update_payment_method(&mut self, id: PaymentMethodId, name: &str) -> PicsouResult<()> {
        self.ensure_writable()?;
        if !self.payment_methods.contains_key(&id) {
            return Err(PicsouError::payment_method_not_found(id.to_string()));
        }
        let name = clean_name("Payment method", name)?;
        if name_taken(self.payment_methods.values(), &name, Some(id.into())) {
            return Err(PicsouError::duplicate("Payment method", name));
        }
        self.payment_methods
            .get_mut(&id)
            .ok_or_else(|| PicsouError::payment_method_not_found(id.to_string()))?
            .update(name);
        Ok(())
    }

    pub fn find_payment_method(&self, id: PaymentMethodId) -> Option<&PaymentMethod> {
        self.payment_methods.get(&id)
    }

    pub fn find_payment_method_by_name(&self, name: &str) -> Option<&PaymentMethod> {
        self.payment_methods.values().find(|pm| pm.name() == name)
    }

    pub fn payment_methods(&self, sorted: bool) -> Vec<&PaymentMethod> {
        snapshot(self.payment_methods.values(), sorted)
    }

    pub fn payment_method_names(&self, sorted: bool) -> Vec<String> {
        self.payment_methods(sorted)
            .into_iter()
            .map(|pm| pm.name().to_string())
            .collect()
    }

    // Scheduled operations

    pub fn add_scheduled_operation(
        &mut self,
        fields: OperationFields,
        name: &str,
        schedule: Schedule,
    ) -> PicsouResult<ScheduledOperationId> {
        self.ensure_writable()?;
        let name = clean_name("Scheduled operation", name)?;
        if name_taken(self.scheduled_ops.values(), &name, None) {
            return Err(PicsouError::duplicate("Scheduled operation", name));
        }
        let sop = ScheduledOperation::new(&self.meta, fields, name, schedule);
        let id = sop.id();
        self.scheduled_ops.insert(id, sop);
        self.meta.emit_modified();
        Ok(id)
    }

    pub fn remove_scheduled_operation(&mut self, id: ScheduledOperationId) -> PicsouResult<()> {
        self.ensure_writable()?;
        self.scheduled_ops
            .remove(&id)
            .ok_or_else(|| PicsouError::scheduled_operation_not_found(id.to_string()))?;
        self.meta.emit_modified();
        Ok(())
    }

    pub fn update_scheduled_operation(
        &mut self,
        id: ScheduledOperationId,
        fields: OperationFields,
        name: &str,
        schedule: Schedule,
    ) -> PicsouResult<()> {
        self.ensure_writable()?;
        if !self.scheduled_ops.contains_key(&id) {
            return Err(PicsouError::scheduled_operation_not_found(id.to_string()));
        }
        let name = clean_name("Scheduled operation", name)?;
        if name_taken(self.scheduled_ops.values(), &name, Some(id.into())) {
            return Err(PicsouError::duplicate("Scheduled operation", name));
        }
        self.scheduled_ops
            .get_mut(&id)
            .ok_or_else(|| PicsouError::scheduled_operation_not_found(id.to_string()))?
            .update(fields, name, schedule);
        Ok(())
    }

    pub fn find_scheduled_operation(&self, id: ScheduledOperationId) -> Option<&ScheduledOperation> {
        self.scheduled_ops.get(&id)
    }

    pub fn scheduled_operations(&self, sorted: bool) -> Vec<&ScheduledOperation> {
        snapshot(self.scheduled_ops.values(), sorted)
    }

    // Operations

    pub fn add_operation(&mut self, fields: OperationFields) -> PicsouResult<OperationId> {
        self.ensure_writable()?;
        let op = Operation::new_in(&self.meta, fields);
        let id = op.id();
        self.ops.insert(id, op);
        self.meta.emit_modified();
        Ok(id)
    }

    /// Adopt a batch of detached operations, emitting a single notification
    pub fn add_operations(&mut self, ops: Vec<Operation>) -> PicsouResult<usize> {
        self.ensure_writable()?;
        if ops.is_empty() {
            return Err(PicsouError::Validation(
                "No operations to add".into(),
            ));
        }
        let count = ops.len();
        for mut op in ops {
            op.attach(&self.meta);
            self.ops.insert(op.id(), op);
        }
        self.meta.emit_modified();
        Ok(count)
    }

    pub fn remove_operation(&mut self, id: OperationId) -> PicsouResult<()> {
        self.ensure_writable()?;
        self.ops
            .remove(&id)
            .ok_or_else(|| PicsouError::operation_not_found(id.to_string()))?;
        self.meta.emit_modified();
        Ok(())
    }

    pub fn update_operation(&mut self, id: OperationId, fields: OperationFields) -> PicsouResult<()> {
        self.ensure_writable()?;
        self.ops
            .get_mut(&id)
            .ok_or_else(|| PicsouError::operation_not_found(id.to_string()))?
            .update(fields);
        Ok(())
    }

    pub fn find_operation(&self, id: OperationId) -> Option<&Operation> {
        self.ops.get(&id)
    }

    /// Operations, optionally in date order
    pub fn operations(&self, sorted: bool) -> Vec<&Operation> {
        let mut ops: Vec<&Operation> = self.ops.values().collect();
        if sorted {
            ops.sort_by_key(|op| (op.date(), op.id()));
        }
        ops
    }

    /// Operations of one year, or of one month of that year, in date order
    pub fn operations_in(&self, year: i32, month: Option<u32>) -> Vec<&Operation> {
        self.operations(true)
            .into_iter()
            .filter(|op| op.date().year() == year)
            .filter(|op| month.map_or(true, |m| op.date().month() == m))
            .collect()
    }

    /// Earliest year among operations and schedule starts
    pub fn min_year(&self) -> Option<i32> {
        let op_years = self.ops.values().map(|op| op.date().year());
        let sop_years = self
            .scheduled_ops
            .values()
            .map(|sop| sop.schedule().start().year());
        op_years.chain(sop_years).min()
    }

    /// Distinct recipients/sources used by operations and schedules
    pub fn srcdst(&self) -> Vec<String> {
        let ops = self.ops.values().map(|op| op.fields().srcdst.as_str());
        let sops = self
            .scheduled_ops
            .values()
            .map(|sop| sop.fields().srcdst.as_str());
        ops.chain(sops)
            .filter(|s| !s.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Initial amount plus every operation
    pub fn balance(&self) -> Amount {
        self.initial_amount + self.ops.values().map(Operation::amount).sum::<Amount>()
    }

    /// Like [`balance`](Self::balance), counting verified operations only
    pub fn verified_balance(&self) -> Amount {
        self.initial_amount
            + self
                .ops
                .values()
                .filter(|op| op.is_verified())
                .map(Operation::amount)
                .sum::<Amount>()
    }

    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }
}

impl ModelEntity for Account {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for Account {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for Account {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let r: AccountRecord = parse_record(json, "account")?;
        self.meta.set_id(r.id.into());

        let payment_methods = read_children(
            &r.payment_methods,
            || PaymentMethod::for_read(&self.meta),
            PaymentMethod::id,
        )?;
        ensure_unique_names(payment_methods.values())?;
        let scheduled_ops = read_children(
            &r.scheduled_ops,
            || ScheduledOperation::for_read(&self.meta),
            ScheduledOperation::id,
        )?;
        ensure_unique_names(scheduled_ops.values())?;
        let ops = read_children(&r.ops, || Operation::for_read(Some(&self.meta)), Operation::id)?;

        self.name = r.name;
        self.notes = r.notes;
        self.archived = r.archived;
        self.initial_amount = r.init_amount;
        self.payment_methods = payment_methods;
        self.scheduled_ops = scheduled_ops;
        self.ops = ops;
        self.meta.set_valid(true);
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        to_record(&AccountRecord {
            id: self.id(),
            name: self.name.clone(),
            notes: self.notes.clone(),
            archived: self.archived,
            init_amount: self.initial_amount,
            payment_methods: write_children(self.payment_methods.values())?,
            scheduled_ops: write_children(self.scheduled_ops.values())?,
            ops: write_children(self.ops.values())?,
        })
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.archived {
            write!(f, " [archived]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (EntityMeta, Account, Rc<Cell<usize>>) {
        let user = EntityMeta::new(EntityKind::User, None);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        user.signal().subscribe(move |_| c.set(c.get() + 1));
        let account = Account::new(&user, "Checking", "", false, Amount::from_cents(10000));
        (user, account, count)
    }

    fn groceries(cents: i64, day: u32) -> OperationFields {
        OperationFields::new(Amount::from_cents(cents), date(2024, 3, day))
            .with_budget("Food")
            .with_srcdst("Market")
    }

    #[test]
    fn test_add_and_find_operation() {
        let (_user, mut account, count) = setup();
        let id = account.add_operation(groceries(-2000, 1)).unwrap();

        let op = account.find_operation(id).unwrap();
        assert_eq!(op.amount().cents(), -2000);
        assert_eq!(op.parent_id(), Some(account.uuid()));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_archived_rejects_mutations_without_emitting() {
        let (_user, mut account, count) = setup();
        let op = account.add_operation(groceries(-100, 1)).unwrap();
        account.archive();
        let before = count.get();

        let err = account.add_operation(groceries(-2000, 2)).unwrap_err();
        assert!(matches!(err, PicsouError::Archived(_)));
        assert!(account.remove_operation(op).is_err());
        assert!(account.add_payment_method("Card").is_err());
        assert!(account
            .add_operations(vec![Operation::new(groceries(-1, 3))])
            .is_err());
        assert_eq!(count.get(), before);
        assert_eq!(account.operation_count(), 1);

        account.unarchive();
        assert!(account.add_payment_method("Card").is_ok());
    }

    #[test]
    fn test_duplicate_payment_method() {
        let (_user, mut account, _) = setup();
        account.add_payment_method("Card").unwrap();
        let err = account.add_payment_method("Card").unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(account.payment_methods(false).len(), 1);
    }

    #[test]
    fn test_update_unknown_child_is_not_found() {
        let (_user, mut account, count) = setup();
        account.add_payment_method("Card").unwrap();
        let rent = groceries(-80000, 1);
        account
            .add_scheduled_operation(rent.clone(), "Rent", Schedule::monthly(date(2024, 3, 1)))
            .unwrap();
        let before = count.get();

        assert!(account
            .update_payment_method(PaymentMethodId::new(), "Card")
            .unwrap_err()
            .is_not_found());
        assert!(account
            .update_scheduled_operation(
                ScheduledOperationId::new(),
                rent,
                "Rent",
                Schedule::monthly(date(2024, 3, 1)),
            )
            .unwrap_err()
            .is_not_found());
        assert_eq!(count.get(), before);
    }

    #[test]
    fn test_rename_payment_method_checks_siblings() {
        let (_user, mut account, _) = setup();
        let card = account.add_payment_method("Card").unwrap();
        account.add_payment_method("Cash").unwrap();

        assert!(account.update_payment_method(card, "Cash").unwrap_err().is_duplicate());
        account.update_payment_method(card, "Card").unwrap();
        account.update_payment_method(card, "Visa").unwrap();
        assert_eq!(account.payment_method_names(true), vec!["Cash", "Visa"]);
    }

    #[test]
    fn test_add_operations_emits_once_and_reparents() {
        let (_user, mut account, count) = setup();
        let batch = vec![
            Operation::new(groceries(-100, 1)),
            Operation::new(groceries(-200, 2)),
            Operation::new(groceries(-300, 3)),
        ];

        assert_eq!(account.add_operations(batch).unwrap(), 3);
        assert_eq!(count.get(), 1);
        assert!(account
            .operations(false)
            .iter()
            .all(|op| op.parent_id() == Some(account.uuid())));

        let id = account.operations(true)[0].id();
        account.update_operation(id, groceries(-150, 1)).unwrap();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_add_operations_empty_batch() {
        let (_user, mut account, count) = setup();
        assert!(account.add_operations(Vec::new()).unwrap_err().is_validation());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_remove_missing_operation() {
        let (_user, mut account, _) = setup();
        assert!(account.remove_operation(OperationId::new()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_aggregates() {
        let (_user, mut account, _) = setup();
        assert_eq!(account.min_year(), None);

        account.add_operation(groceries(-2500, 4).verified(true)).unwrap();
        account
            .add_operation(OperationFields::new(Amount::from_cents(50000), date(2023, 12, 28)).with_srcdst("Employer"))
            .unwrap();
        account
            .add_scheduled_operation(groceries(-100, 1), "Weekly", Schedule::monthly(date(2022, 6, 1)))
            .unwrap();

        assert_eq!(account.min_year(), Some(2022));
        assert_eq!(account.srcdst(), vec!["Employer", "Market"]);
        assert_eq!(account.balance().cents(), 10000 - 2500 + 50000);
        assert_eq!(account.verified_balance().cents(), 10000 - 2500);
        assert_eq!(account.operations_in(2024, Some(3)).len(), 1);
        assert_eq!(account.operations_in(2023, None).len(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let (user, mut account, _) = setup();
        account.add_payment_method("Card").unwrap();
        account.add_operation(groceries(-2000, 1)).unwrap();
        account
            .add_scheduled_operation(groceries(-500, 1), "Rent", Schedule::monthly(date(2024, 1, 1)))
            .unwrap();

        let json = account.write().unwrap();
        let mut loaded = Account::for_read(&user);
        loaded.read(&json).unwrap();

        assert_eq!(loaded.id(), account.id());
        assert_eq!(loaded.name(), "Checking");
        assert_eq!(loaded.initial_amount().cents(), 10000);
        assert_eq!(loaded.payment_method_names(true), vec!["Card"]);
        assert_eq!(loaded.scheduled_operations(true).len(), 1);
        assert_eq!(loaded.balance(), account.balance());
        assert_eq!(loaded.write().unwrap(), json);
    }

    #[test]
    fn test_read_defaults_and_rejects_unknown() {
        let user = EntityMeta::new(EntityKind::User, None);
        let mut account = Account::for_read(&user);
        account
            .read(&json!({
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "name": "Savings"
            }))
            .unwrap();
        assert!(!account.is_archived());
        assert_eq!(account.initial_amount(), Amount::zero());

        let mut bad = Account::for_read(&user);
        assert!(bad
            .read(&json!({
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "name": "Savings",
                "overdraft": 100
            }))
            .is_err());
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_read_fails_on_bad_child() {
        let user = EntityMeta::new(EntityKind::User, None);
        let mut account = Account::for_read(&user);
        let result = account.read(&json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Savings",
            "ops": [{ "id": "550e8400-e29b-41d4-a716-446655440001", "amount": "lots" }]
        }));
        assert!(matches!(result, Err(PicsouError::CorruptData(_))));
        assert_eq!(account.operation_count(), 0);
    }
}
