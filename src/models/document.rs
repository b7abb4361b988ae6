//! Document: the root of the domain tree
//!
//! The document holds format version, name, description and its users. Every
//! modification anywhere in the tree reaches the observers registered with
//! [`Document::subscribe`] exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{PicsouError, PicsouResult};

use super::account::Account;
use super::entity::{
    clean_name, ensure_unique_names, name_taken, parse_record, read_children, snapshot, to_record,
    write_children, EntityKind, EntityMeta, JsonEntity, Modification, ModelEntity, Named,
    ObserverId,
};
use super::ids::{AccountId, UserId};
use super::user::User;

/// Document format written by this version
pub const FORMAT_MAJOR: u32 = 1;
pub const FORMAT_MINOR: u32 = 0;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentRecord {
    major: u32,
    minor: u32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    users: Vec<Value>,
}

#[derive(Debug)]
pub struct Document {
    meta: EntityMeta,
    major: u32,
    minor: u32,
    name: String,
    description: String,
    users: HashMap<UserId, User>,
}

impl Document {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::Document, None),
            major: FORMAT_MAJOR,
            minor: FORMAT_MINOR,
            name: name.into(),
            description: description.into(),
            users: HashMap::new(),
        }
    }

    /// Build a document from its JSON form; users come back locked
    pub fn from_json(json: &Value) -> PicsouResult<Self> {
        let mut doc = Self {
            meta: EntityMeta::for_read(EntityKind::Document, None),
            major: FORMAT_MAJOR,
            minor: FORMAT_MINOR,
            name: String::new(),
            description: String::new(),
            users: HashMap::new(),
        };
        doc.read(json)?;
        Ok(doc)
    }

    pub fn version(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Observe every modification in the tree
    pub fn subscribe(&self, observer: impl Fn(&Modification) + 'static) -> ObserverId {
        self.meta.signal().subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.meta.signal().unsubscribe(id)
    }

    pub fn update(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.name = name.into();
        self.description = description.into();
        self.meta.emit_modified();
    }

    /// Take ownership of a user created with [`User::new`]
    pub fn add_user(&mut self, mut user: User) -> PicsouResult<UserId> {
        if name_taken(self.users.values(), user.name(), None) {
            return Err(PicsouError::duplicate("User", user.name()));
        }
        user.attach(&self.meta);
        let id = user.id();
        self.users.insert(id, user);
        self.meta.emit_modified();
        Ok(id)
    }

    pub fn remove_user(&mut self, id: UserId) -> PicsouResult<()> {
        self.users
            .remove(&id)
            .ok_or_else(|| PicsouError::user_not_found(id.to_string()))?;
        self.meta.emit_modified();
        Ok(())
    }

    /// Rename a user, changing the password when both passwords are given
    pub fn update_user(
        &mut self,
        id: UserId,
        name: &str,
        old_password: &str,
        new_password: &str,
    ) -> PicsouResult<()> {
        if !self.users.contains_key(&id) {
            return Err(PicsouError::user_not_found(id.to_string()));
        }
        let name = clean_name("User", name)?;
        if name_taken(self.users.values(), &name, Some(id.into())) {
            return Err(PicsouError::duplicate("User", name));
        }
        self.users
            .get_mut(&id)
            .ok_or_else(|| PicsouError::user_not_found(id.to_string()))?
            .update(name, old_password, new_password)
    }

    pub fn find_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn find_user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn find_user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.name() == name)
    }

    pub fn find_user_by_name_mut(&mut self, name: &str) -> Option<&mut User> {
        self.users.values_mut().find(|u| u.name() == name)
    }

    pub fn users(&self, sorted: bool) -> Vec<&User> {
        snapshot(self.users.values(), sorted)
    }

    /// Look an account up across every unlocked user
    pub fn find_account(&self, id: AccountId) -> Option<&Account> {
        self.users.values().find_map(|u| u.find_account(id))
    }

    /// Seal every unlocked user's pending changes
    pub fn seal(&mut self) -> PicsouResult<()> {
        for user in self.users.values_mut() {
            user.seal()?;
        }
        Ok(())
    }
}

impl ModelEntity for Document {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for Document {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for Document {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let r: DocumentRecord = parse_record(json, "document")?;
        if r.major > FORMAT_MAJOR {
            return Err(PicsouError::CorruptData(format!(
                "document format {}.{} is newer than supported {}.{}",
                r.major, r.minor, FORMAT_MAJOR, FORMAT_MINOR
            )));
        }
        let users = read_children(&r.users, || User::for_read(&self.meta), User::id)?;
        ensure_unique_names(users.values())?;

        self.major = r.major;
        self.minor = r.minor;
        self.name = r.name;
        self.description = r.description;
        self.users = users;
        self.meta.set_valid(true);
        debug!(users = self.users.len(), "document read");
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        to_record(&DocumentRecord {
            major: FORMAT_MAJOR,
            minor: FORMAT_MINOR,
            name: self.name.clone(),
            description: self.description.clone(),
            users: write_children(self.users.values())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfCost;
    use crate::models::amount::Amount;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn user(name: &str) -> User {
        User::new(name, "pw", &KdfCost::minimal()).unwrap()
    }

    #[test]
    fn test_add_user_and_duplicate() {
        let mut doc = Document::new("Home", "");
        let id = doc.add_user(user("alice")).unwrap();
        assert_eq!(doc.find_user(id).unwrap().parent_id(), Some(doc.uuid()));
        assert!(doc.add_user(user("alice")).unwrap_err().is_duplicate());
        assert_eq!(doc.users(true).len(), 1);
    }

    #[test]
    fn test_deep_modification_reaches_root_once() {
        let mut doc = Document::new("Home", "");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        doc.subscribe(move |m| s.borrow_mut().push(*m));

        let uid = doc.add_user(user("alice")).unwrap();
        let u = doc.find_user_mut(uid).unwrap();
        let aid = u.add_account("Checking", "", false, Amount::zero()).unwrap();
        seen.borrow_mut().clear();

        let account = u.find_account_mut(aid).unwrap();
        let pm = account.add_payment_method("Card").unwrap();
        account.update_payment_method(pm, "Visa").unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, EntityKind::Account);
        assert_eq!(seen[1].kind, EntityKind::PaymentMethod);
        assert_eq!(seen[1].id, *pm.as_uuid());
    }

    #[test]
    fn test_removed_user_stops_notifying() {
        let mut doc = Document::new("Home", "");
        let uid = doc.add_user(user("alice")).unwrap();
        doc.remove_user(uid).unwrap();
        assert!(doc.remove_user(uid).unwrap_err().is_not_found());
    }

    #[test]
    fn test_round_trip_users_locked() {
        let mut doc = Document::new("Home", "family budget");
        doc.add_user(user("alice")).unwrap();
        doc.add_user(user("bob")).unwrap();

        let loaded = Document::from_json(&doc.write().unwrap()).unwrap();
        assert_eq!(loaded.name(), "Home");
        assert_eq!(loaded.description(), "family budget");
        let names: Vec<&str> = loaded.users(true).iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(loaded.users(false).iter().all(|u| !u.is_unlocked()));
    }

    #[test]
    fn test_newer_major_rejected() {
        let err = Document::from_json(&json!({
            "major": FORMAT_MAJOR + 1, "minor": 0, "name": "x"
        }))
        .unwrap_err();
        assert!(matches!(err, PicsouError::CorruptData(_)));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let result = Document::from_json(&json!({
            "major": 1, "minor": 0, "name": "x", "theme": "dark"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_user_renames_with_checks() {
        let mut doc = Document::new("Home", "");
        let alice = doc.add_user(user("alice")).unwrap();
        doc.add_user(user("bob")).unwrap();

        assert!(doc.update_user(alice, "bob", "", "").unwrap_err().is_duplicate());
        doc.update_user(alice, "alicia", "", "").unwrap();
        assert!(doc.find_user_by_name("alicia").is_some());
        assert!(doc
            .update_user(UserId::new(), "bob", "", "")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_from_json_keeps_stored_ids() {
        let mut doc = Document::new("Home", "shared");
        let alice = doc.add_user(user("alice")).unwrap();
        let loaded = Document::from_json(&doc.write().unwrap()).unwrap();
        assert_eq!(loaded.name(), "Home");
        assert_eq!(loaded.description(), "shared");
        assert_eq!(loaded.version(), (FORMAT_MAJOR, FORMAT_MINOR));
        assert!(loaded.find_user(alice).is_some());
    }
}
