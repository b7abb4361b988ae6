//! User model
//!
//! A user is persisted in two halves. The plaintext half holds the id, the
//! name and the wrapped master key. The protected half (budgets and
//! accounts) is serialized to JSON and sealed under the master key. A user
//! loaded from disk starts locked and exposes no budgets or accounts until
//! [`User::unlock`] succeeds.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

use crate::crypto::{open_payload, seal_payload, EncryptedData, KdfCost, KeyWrap, SecureBuffer};
use crate::error::{PicsouError, PicsouResult};

use super::account::Account;
use super::amount::Amount;
use super::budget::Budget;
use super::entity::{
    clean_name, ensure_unique_names, name_taken, parse_record, read_children, snapshot, to_record,
    write_children, EntityKind, EntityMeta, JsonEntity, ModelEntity, Named,
};
use super::ids::{AccountId, BudgetId, UserId};

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserRecord {
    id: UserId,
    name: String,
    wkey: KeyWrap,
    wrapped: EncryptedData,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PayloadRecord {
    #[serde(default)]
    budgets: Vec<Value>,
    #[serde(default)]
    accounts: Vec<Value>,
}

/// Plaintext subtree, present only while unlocked
#[derive(Debug)]
struct Unlocked {
    master_key: SecureBuffer,
    budgets: HashMap<BudgetId, Budget>,
    accounts: HashMap<AccountId, Account>,
}

impl Unlocked {
    fn to_json(&self) -> PicsouResult<Value> {
        to_record(&PayloadRecord {
            budgets: write_children(self.budgets.values())?,
            accounts: write_children(self.accounts.values())?,
        })
    }

    fn seal(&self) -> PicsouResult<EncryptedData> {
        let plaintext = SecureBuffer::from_vec(serde_json::to_vec(&self.to_json()?)?);
        seal_payload(plaintext.as_slice(), &self.master_key)
    }
}

#[derive(Debug)]
pub struct User {
    meta: EntityMeta,
    name: String,
    key_wrap: Option<KeyWrap>,
    /// Last sealed payload, as read from disk or produced by `seal`
    sealed: Option<EncryptedData>,
    unlocked: Option<Unlocked>,
    /// Set when the protected subtree changed since `sealed` was produced
    dirty: Rc<Cell<bool>>,
}

fn locked(name: &str) -> PicsouError {
    PicsouError::Locked(name.to_string())
}

impl User {
    /// Create a user with a fresh master key; the new user is unlocked
    pub fn new(name: &str, password: &str, cost: &KdfCost) -> PicsouResult<Self> {
        let name = clean_name("User", name)?;
        let (key_wrap, master_key) = KeyWrap::init_with_password(password, cost)?;
        let mut user = Self::with_meta(EntityMeta::new(EntityKind::User, None));
        user.name = name;
        user.key_wrap = Some(key_wrap);
        user.unlocked = Some(Unlocked {
            master_key,
            budgets: HashMap::new(),
            accounts: HashMap::new(),
        });
        user.dirty.set(true);
        info!(user = %user.name, "created user");
        Ok(user)
    }

    pub(crate) fn for_read(parent: &EntityMeta) -> Self {
        Self::with_meta(EntityMeta::for_read(EntityKind::User, Some(parent)))
    }

    fn with_meta(meta: EntityMeta) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dirty);
        // Anything below the user lives in the protected payload
        meta.signal().subscribe(move |m| {
            if m.kind != EntityKind::User {
                flag.set(true);
            }
        });
        Self {
            meta,
            name: String::new(),
            key_wrap: None,
            sealed: None,
            unlocked: None,
            dirty,
        }
    }

    pub(crate) fn attach(&mut self, parent: &EntityMeta) {
        self.meta.attach(parent);
    }

    pub fn id(&self) -> UserId {
        UserId::from_uuid(self.meta.id())
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.is_some()
    }

    /// Whether the protected subtree changed since it was last sealed
    pub fn has_unsealed_changes(&self) -> bool {
        self.dirty.get()
    }

    pub fn key_wrap(&self) -> Option<&KeyWrap> {
        self.key_wrap.as_ref()
    }

    pub fn sealed_payload(&self) -> Option<&EncryptedData> {
        self.sealed.as_ref()
    }

    fn touch_payload(&self) {
        self.dirty.set(true);
        self.meta.emit_modified();
    }

    // Lifecycle

    /// Check `password` and decrypt the protected subtree
    ///
    /// Wrong password: `InvalidCredential`, nothing changes. Already unlocked:
    /// the password is still checked.
    pub fn unlock(&mut self, password: &str) -> PicsouResult<()> {
        let key_wrap = self
            .key_wrap
            .as_ref()
            .ok_or_else(|| PicsouError::Validation(format!("User {} has no key", self.name)))?;
        let master_key = key_wrap.unwrap(password)?;
        if self.unlocked.is_some() {
            return Ok(());
        }

        let sealed = self
            .sealed
            .as_ref()
            .ok_or_else(|| PicsouError::CorruptData(format!("User {} has no payload", self.name)))?;
        let plaintext = open_payload(sealed, &master_key)?;
        let json: Value = serde_json::from_slice(plaintext.as_slice())
            .map_err(|e| PicsouError::CorruptData(format!("payload is not JSON: {}", e)))?;

        self.read_unwrapped(&json, master_key)?;
        info!(user = %self.name, "user unlocked");
        Ok(())
    }

    fn read_unwrapped(&mut self, json: &Value, master_key: SecureBuffer) -> PicsouResult<()> {
        let r: PayloadRecord = parse_record(json, "user payload")?;
        let budgets = read_children(&r.budgets, || Budget::for_read(&self.meta), Budget::id)?;
        ensure_unique_names(budgets.values())?;
        let accounts = read_children(&r.accounts, || Account::for_read(&self.meta), Account::id)?;
        ensure_unique_names(accounts.values())?;

        self.unlocked = Some(Unlocked {
            master_key,
            budgets,
            accounts,
        });
        self.dirty.set(false);
        Ok(())
    }

    /// Plaintext JSON of the protected subtree
    pub fn write_unwrapped(&self) -> PicsouResult<Value> {
        self.unlocked
            .as_ref()
            .ok_or_else(|| locked(&self.name))?
            .to_json()
    }

    /// Re-encrypt the protected subtree if it changed since the last seal
    pub fn seal(&mut self) -> PicsouResult<()> {
        let Some(unlocked) = &self.unlocked else {
            return Ok(());
        };
        if !self.dirty.get() && self.sealed.is_some() {
            return Ok(());
        }
        self.sealed = Some(unlocked.seal()?);
        self.dirty.set(false);
        debug!(user = %self.name, "payload sealed");
        Ok(())
    }

    /// Seal pending changes, then forget the plaintext subtree and master key
    pub fn lock(&mut self) -> PicsouResult<()> {
        self.seal()?;
        if self.unlocked.take().is_some() {
            info!(user = %self.name, "user locked");
        }
        Ok(())
    }

    /// Re-wrap the master key under a new password; the payload is untouched
    pub fn rewrap(&mut self, old_password: &str, new_password: &str) -> PicsouResult<()> {
        self.key_wrap
            .as_mut()
            .ok_or_else(|| PicsouError::Validation(format!("User {} has no key", self.name)))?
            .rewrap(old_password, new_password)?;
        self.meta.emit_modified();
        Ok(())
    }

    /// Rename, and change the password when both passwords are given
    ///
    /// Sibling-name checks belong to the document.
    pub(crate) fn update(
        &mut self,
        name: String,
        old_password: &str,
        new_password: &str,
    ) -> PicsouResult<()> {
        if !old_password.is_empty() && !new_password.is_empty() {
            self.key_wrap
                .as_mut()
                .ok_or_else(|| PicsouError::Validation(format!("User {} has no key", self.name)))?
                .rewrap(old_password, new_password)?;
        }
        self.name = name;
        self.meta.emit_modified();
        Ok(())
    }

    // Budgets

    pub fn add_budget(
        &mut self,
        amount: Amount,
        name: &str,
        description: &str,
    ) -> PicsouResult<BudgetId> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        let name = clean_name("Budget", name)?;
        if name_taken(unlocked.budgets.values(), &name, None) {
            return Err(PicsouError::duplicate("Budget", name));
        }
        let budget = Budget::new(&self.meta, amount, name, description);
        let id = budget.id();
        unlocked.budgets.insert(id, budget);
        self.touch_payload();
        Ok(id)
    }

    pub fn remove_budget(&mut self, id: BudgetId) -> PicsouResult<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        unlocked
            .budgets
            .remove(&id)
            .ok_or_else(|| PicsouError::budget_not_found(id.to_string()))?;
        self.touch_payload();
        Ok(())
    }

    pub fn update_budget(
        &mut self,
        id: BudgetId,
        amount: Amount,
        name: &str,
        description: &str,
    ) -> PicsouResult<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        if !unlocked.budgets.contains_key(&id) {
            return Err(PicsouError::budget_not_found(id.to_string()));
        }
        let name = clean_name("Budget", name)?;
        if name_taken(unlocked.budgets.values(), &name, Some(id.into())) {
            return Err(PicsouError::duplicate("Budget", name));
        }
        unlocked
            .budgets
            .get_mut(&id)
            .ok_or_else(|| PicsouError::budget_not_found(id.to_string()))?
            .update(amount, name, description);
        Ok(())
    }

    pub fn find_budget(&self, id: BudgetId) -> Option<&Budget> {
        self.unlocked.as_ref()?.budgets.get(&id)
    }

    pub fn find_budget_by_name(&self, name: &str) -> Option<&Budget> {
        self.unlocked
            .as_ref()?
            .budgets
            .values()
            .find(|b| b.name() == name)
    }

    /// Budgets of an unlocked user; empty while locked
    pub fn budgets(&self, sorted: bool) -> Vec<&Budget> {
        match &self.unlocked {
            Some(unlocked) => snapshot(unlocked.budgets.values(), sorted),
            None => Vec::new(),
        }
    }

    pub fn budget_names(&self, sorted: bool) -> Vec<String> {
        self.budgets(sorted)
            .into_iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    // Accounts

    pub fn add_account(
        &mut self,
        name: &str,
        notes: &str,
        archived: bool,
        initial_amount: Amount,
    ) -> PicsouResult<AccountId> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        let name = clean_name("Account", name)?;
        if name_taken(unlocked.accounts.values(), &name, None) {
            return Err(PicsouError::duplicate("Account", name));
        }
        let account = Account::new(&self.meta, name, notes, archived, initial_amount);
        let id = account.id();
        unlocked.accounts.insert(id, account);
        self.touch_payload();
        Ok(id)
    }

    pub fn remove_account(&mut self, id: AccountId) -> PicsouResult<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        unlocked
            .accounts
            .remove(&id)
            .ok_or_else(|| PicsouError::account_not_found(id.to_string()))?;
        self.touch_payload();
        Ok(())
    }

    pub fn update_account(
        &mut self,
        id: AccountId,
        name: &str,
        notes: &str,
        archived: bool,
        initial_amount: Amount,
    ) -> PicsouResult<()> {
        let unlocked = self.unlocked.as_mut().ok_or_else(|| locked(&self.name))?;
        if !unlocked.accounts.contains_key(&id) {
            return Err(PicsouError::account_not_found(id.to_string()));
        }
        let name = clean_name("Account", name)?;
        if name_taken(unlocked.accounts.values(), &name, Some(id.into())) {
            return Err(PicsouError::duplicate("Account", name));
        }
        unlocked
            .accounts
            .get_mut(&id)
            .ok_or_else(|| PicsouError::account_not_found(id.to_string()))?
            .update(name, notes, archived, initial_amount);
        Ok(())
    }

    pub fn find_account(&self, id: AccountId) -> Option<&Account> {
        self.unlocked.as_ref()?.accounts.get(&id)
    }

    pub fn find_account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.unlocked.as_mut()?.accounts.get_mut(&id)
    }

    pub fn find_account_by_name(&self, name: &str) -> Option<&Account> {
        self.unlocked
            .as_ref()?
            .accounts
            .values()
            .find(|a| a.name() == name)
    }

    /// Accounts of an unlocked user; empty while locked
    pub fn accounts(&self, sorted: bool) -> Vec<&Account> {
        match &self.unlocked {
            Some(unlocked) => snapshot(unlocked.accounts.values(), sorted),
            None => Vec::new(),
        }
    }
}

impl ModelEntity for User {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for User {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for User {
    /// Reads the plaintext half only; the user is locked afterwards
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let r: UserRecord = parse_record(json, "user")?;
        self.meta.set_id(r.id.into());
        self.name = r.name;
        self.key_wrap = Some(r.wkey);
        self.sealed = Some(r.wrapped);
        self.unlocked = None;
        self.dirty.set(false);
        self.meta.set_valid(true);
        Ok(())
    }

    /// Uses the cached sealed payload when the subtree is unchanged,
    /// otherwise encrypts the current subtree without caching it
    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        let wkey = self
            .key_wrap
            .clone()
            .ok_or_else(|| PicsouError::Validation(format!("User {} has no key", self.name)))?;
        let wrapped = match (&self.unlocked, &self.sealed) {
            (Some(unlocked), _) if self.dirty.get() => unlocked.seal()?,
            (Some(unlocked), None) => unlocked.seal()?,
            (_, Some(sealed)) => sealed.clone(),
            (None, None) => {
                return Err(PicsouError::CorruptData(format!(
                    "User {} has no payload",
                    self.name
                )))
            }
        };
        to_record(&UserRecord {
            id: self.id(),
            name: self.name.clone(),
            wkey,
            wrapped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> User {
        User::new("alice", "pw1", &KdfCost::minimal()).unwrap()
    }

    fn reload(user: &User) -> User {
        let root = EntityMeta::new(EntityKind::Document, None);
        let mut loaded = User::for_read(&root);
        loaded.read(&user.write().unwrap()).unwrap();
        loaded
    }

    #[test]
    fn test_new_user_is_unlocked_and_empty() {
        let user = alice();
        assert!(user.is_unlocked());
        assert!(user.budgets(false).is_empty());
        assert!(user.accounts(false).is_empty());
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(User::new("  ", "pw", &KdfCost::minimal()).unwrap_err().is_validation());
    }

    #[test]
    fn test_loaded_user_is_locked_until_unlock() {
        let mut user = alice();
        user.add_budget(Amount::from_cents(1000), "Food", "").unwrap();

        let mut loaded = reload(&user);
        assert!(!loaded.is_unlocked());
        assert!(loaded.budgets(false).is_empty());
        assert!(matches!(
            loaded.add_budget(Amount::zero(), "Other", ""),
            Err(PicsouError::Locked(_))
        ));

        loaded.unlock("pw1").unwrap();
        assert_eq!(loaded.budget_names(true), vec!["Food"]);
    }

    #[test]
    fn test_wrong_password_leaves_user_locked() {
        let mut loaded = reload(&alice());
        let err = loaded.unlock("wrong").unwrap_err();
        assert!(err.is_invalid_credential());
        assert!(!loaded.is_unlocked());
    }

    #[test]
    fn test_plaintext_half_has_exact_keys() {
        let json = alice().write().unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["id", "name", "wkey", "wrapped"]);
    }

    #[test]
    fn test_duplicate_budget_name() {
        let mut user = alice();
        user.add_budget(Amount::zero(), "Food", "").unwrap();
        let err = user.add_budget(Amount::zero(), "Food", "again").unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(user.budgets(false).len(), 1);
    }

    #[test]
    fn test_update_budget_checks_siblings() {
        let mut user = alice();
        let food = user.add_budget(Amount::zero(), "Food", "").unwrap();
        user.add_budget(Amount::zero(), "Rent", "").unwrap();

        assert!(user
            .update_budget(food, Amount::zero(), "Rent", "")
            .unwrap_err()
            .is_duplicate());
        user.update_budget(food, Amount::from_cents(4200), "Groceries", "weekly")
            .unwrap();
        let budget = user.find_budget(food).unwrap();
        assert_eq!(budget.name(), "Groceries");
        assert_eq!(budget.amount().cents(), 4200);
    }

    #[test]
    fn test_update_unknown_child_is_not_found() {
        let mut user = alice();
        user.add_budget(Amount::zero(), "Food", "").unwrap();
        user.add_account("Checking", "", false, Amount::zero()).unwrap();

        let err = user
            .update_budget(BudgetId::new(), Amount::zero(), "Food", "")
            .unwrap_err();
        assert!(err.is_not_found());
        let err = user
            .update_account(AccountId::new(), "Checking", "", false, Amount::zero())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_seal_only_when_dirty() {
        let mut user = alice();
        user.seal().unwrap();
        let first = user.sealed_payload().cloned().unwrap();

        user.seal().unwrap();
        assert_eq!(user.sealed_payload(), Some(&first));

        let account = user.add_account("Checking", "", false, Amount::zero()).unwrap();
        assert!(user.has_unsealed_changes());
        user.seal().unwrap();
        assert_ne!(user.sealed_payload(), Some(&first));

        let sealed = user.sealed_payload().cloned();
        user.find_account_mut(account).unwrap().add_payment_method("Card").unwrap();
        assert!(user.has_unsealed_changes());
        user.seal().unwrap();
        assert_ne!(user.sealed_payload().cloned(), sealed);
    }

    #[test]
    fn test_rename_does_not_dirty_payload() {
        let mut user = alice();
        user.seal().unwrap();
        user.update("alicia".into(), "", "").unwrap();
        assert!(!user.has_unsealed_changes());
        assert_eq!(user.name(), "alicia");
    }

    #[test]
    fn test_update_with_passwords_rewraps() {
        let mut user = alice();
        user.seal().unwrap();
        let payload = user.sealed_payload().cloned();

        user.update("alice".into(), "pw1", "pw2").unwrap();

        assert_eq!(user.sealed_payload().cloned(), payload);
        let mut loaded = reload(&user);
        assert!(loaded.unlock("pw1").is_err());
        loaded.unlock("pw2").unwrap();
    }

    #[test]
    fn test_update_with_wrong_password_changes_nothing() {
        let mut user = alice();
        let wrap = user.key_wrap().cloned();
        assert!(user.update("bob".into(), "nope", "pw2").is_err());
        assert_eq!(user.name(), "alice");
        assert_eq!(user.key_wrap().cloned(), wrap);
    }

    #[test]
    fn test_lock_keeps_changes() {
        let mut user = alice();
        user.add_account("Checking", "", false, Amount::zero()).unwrap();
        user.lock().unwrap();
        assert!(!user.is_unlocked());
        assert!(user.write_unwrapped().is_err());

        user.unlock("pw1").unwrap();
        assert!(user.find_account_by_name("Checking").is_some());
    }

    #[test]
    fn test_unchanged_user_writes_cached_payload() {
        let mut user = alice();
        user.seal().unwrap();
        let first = user.write().unwrap();
        let second = user.write().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_rejects_unknown_key() {
        let mut json = alice().write().unwrap();
        json["email"] = json!("alice@example.com");
        let root = EntityMeta::new(EntityKind::Document, None);
        let mut loaded = User::for_read(&root);
        assert!(matches!(loaded.read(&json), Err(PicsouError::CorruptData(_))));
        assert!(!loaded.is_valid());
    }
}
