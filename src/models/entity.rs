//! Entity identity, validity and modification propagation
//!
//! Every node of the domain tree carries an [`EntityMeta`]: a UUID fixed at
//! construction, a validity flag and a [`ModifiedSignal`]. When a child is
//! attached to its parent, the child's signal gets a weak link to the
//! parent's signal, so one emission at a leaf reaches every ancestor up to
//! the document root, synchronously and exactly once per ancestor.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{PicsouError, PicsouResult};

/// Which kind of entity raised a modification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Document,
    User,
    Budget,
    Account,
    PaymentMethod,
    Operation,
    ScheduledOperation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Document => "Document",
            Self::User => "User",
            Self::Budget => "Budget",
            Self::Account => "Account",
            Self::PaymentMethod => "Payment method",
            Self::Operation => "Operation",
            Self::ScheduledOperation => "Scheduled operation",
        };
        write!(f, "{}", label)
    }
}

/// Payload of a modification notification: the entity that changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modification {
    pub kind: EntityKind,
    pub id: Uuid,
}

/// Handle returned by [`ModifiedSignal::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Rc<dyn Fn(&Modification)>;

struct SignalNode {
    parent: RefCell<Weak<SignalNode>>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    next_observer: Cell<u64>,
}

/// A "modified" notification point that forwards to its parent's
#[derive(Clone)]
pub struct ModifiedSignal(Rc<SignalNode>);

impl ModifiedSignal {
    pub fn new() -> Self {
        Self(Rc::new(SignalNode {
            parent: RefCell::new(Weak::new()),
            observers: RefCell::new(Vec::new()),
            next_observer: Cell::new(0),
        }))
    }

    /// Forward every future emission of `self` to `parent`
    fn forward_to(&self, parent: &ModifiedSignal) {
        *self.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
    }

    /// Register a callback run on every emission at or below this node
    pub fn subscribe(&self, observer: impl Fn(&Modification) + 'static) -> ObserverId {
        let id = ObserverId(self.0.next_observer.get());
        self.0.next_observer.set(id.0 + 1);
        self.0.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Remove a callback; returns whether it was registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.0.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Run local observers, then forward to the parent chain
    pub fn emit(&self, modification: &Modification) {
        // Snapshot so observers may subscribe/unsubscribe re-entrantly
        let observers: Vec<Observer> = self
            .0
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(modification);
        }

        let parent = self.0.parent.borrow().upgrade();
        if let Some(parent) = parent {
            ModifiedSignal(parent).emit(modification);
        }
    }
}

impl Default for ModifiedSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity, validity and ownership link shared by every entity
pub struct EntityMeta {
    id: Uuid,
    kind: EntityKind,
    valid: bool,
    parent: Option<Uuid>,
    signal: ModifiedSignal,
}

impl EntityMeta {
    /// Metadata for a freshly created entity: valid immediately
    pub(crate) fn new(kind: EntityKind, parent: Option<&EntityMeta>) -> Self {
        let mut meta = Self {
            id: Uuid::new_v4(),
            kind,
            valid: true,
            parent: None,
            signal: ModifiedSignal::new(),
        };
        if let Some(parent) = parent {
            meta.attach(parent);
        }
        meta
    }

    /// Metadata for an entity about to be read: invalid until `read` succeeds
    pub(crate) fn for_read(kind: EntityKind, parent: Option<&EntityMeta>) -> Self {
        let mut meta = Self::new(kind, parent);
        meta.valid = false;
        meta
    }

    /// Make `parent` the owner of this entity
    pub(crate) fn attach(&mut self, parent: &EntityMeta) {
        self.parent = Some(parent.id);
        self.signal.forward_to(&parent.signal);
    }

    pub(crate) fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    pub(crate) fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub(crate) fn ensure_valid(&self) -> PicsouResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(PicsouError::Validation(format!(
                "{} {} is not valid",
                self.kind, self.id
            )))
        }
    }

    /// Raise the "modified" notification for this entity
    pub(crate) fn emit_modified(&self) {
        self.signal.emit(&Modification {
            kind: self.kind,
            id: self.id,
        });
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent
    }

    pub fn signal(&self) -> &ModifiedSignal {
        &self.signal
    }
}

impl fmt::Debug for EntityMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMeta")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("valid", &self.valid)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Common capability of every node in the domain tree
pub trait ModelEntity {
    fn meta(&self) -> &EntityMeta;

    fn uuid(&self) -> Uuid {
        self.meta().id()
    }

    fn kind(&self) -> EntityKind {
        self.meta().kind()
    }

    fn is_valid(&self) -> bool {
        self.meta().is_valid()
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.meta().parent_id()
    }
}

/// JSON persistence contract
///
/// `read` rejects objects carrying keys the entity does not know, requires
/// mandatory keys and defaults optional ones. On failure the entity stays
/// invalid and must not be used.
pub trait JsonEntity: ModelEntity {
    fn read(&mut self, json: &Value) -> PicsouResult<()>;

    fn write(&self) -> PicsouResult<Value>;
}

/// Entities with a name that must be unique among siblings
pub trait Named {
    fn name(&self) -> &str;
}

/// Whether a sibling other than `except` already uses `name`
pub(crate) fn name_taken<'a, T, I>(siblings: I, name: &str, except: Option<Uuid>) -> bool
where
    T: Named + ModelEntity + 'a,
    I: IntoIterator<Item = &'a T>,
{
    siblings
        .into_iter()
        .any(|sibling| sibling.name() == name && Some(sibling.uuid()) != except)
}

/// Trim a user-supplied name, rejecting blank ones
pub(crate) fn clean_name(entity_type: &str, name: &str) -> PicsouResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PicsouError::Validation(format!(
            "{} name cannot be empty",
            entity_type
        )));
    }
    Ok(name.to_string())
}

/// Deserialize a strict on-disk record, mapping failures to `CorruptData`
pub(crate) fn parse_record<T: DeserializeOwned>(json: &Value, what: &str) -> PicsouResult<T> {
    T::deserialize(json).map_err(|e| PicsouError::CorruptData(format!("invalid {}: {}", what, e)))
}

/// Serialize an on-disk record
pub(crate) fn to_record<T: serde::Serialize>(record: &T) -> PicsouResult<Value> {
    Ok(serde_json::to_value(record)?)
}

/// Read a JSON list of children into a map keyed by id
///
/// The first malformed child aborts the whole read.
pub(crate) fn read_children<K, T>(
    items: &[Value],
    mut make: impl FnMut() -> T,
    key: impl Fn(&T) -> K,
) -> PicsouResult<HashMap<K, T>>
where
    K: Eq + Hash,
    T: JsonEntity,
{
    let mut children = HashMap::with_capacity(items.len());
    for item in items {
        let mut child = make();
        child.read(item)?;
        let kind = child.kind();
        let id = child.uuid();
        if children.insert(key(&child), child).is_some() {
            return Err(PicsouError::CorruptData(format!(
                "{} {} appears twice",
                kind, id
            )));
        }
    }
    Ok(children)
}

/// Fail if two named children share a name
pub(crate) fn ensure_unique_names<'a, T, I>(children: I) -> PicsouResult<()>
where
    T: Named + ModelEntity + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut seen = HashSet::new();
    for child in children {
        if !seen.insert(child.name()) {
            return Err(PicsouError::CorruptData(format!(
                "{} name used twice: {}",
                child.kind(),
                child.name()
            )));
        }
    }
    Ok(())
}

/// Write children in id order so output is stable across runs
pub(crate) fn write_children<'a, T, I>(children: I) -> PicsouResult<Vec<Value>>
where
    T: JsonEntity + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut list: Vec<&T> = children.into_iter().collect();
    list.sort_by_key(|child| child.uuid());
    list.into_iter().map(|child| child.write()).collect()
}

/// Snapshot of a child map, optionally sorted by name
pub(crate) fn snapshot<'a, T, I>(children: I, sorted: bool) -> Vec<&'a T>
where
    T: Named + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut list: Vec<&T> = children.into_iter().collect();
    if sorted {
        list.sort_by(|a, b| a.name().cmp(b.name()));
    }
    list
}
