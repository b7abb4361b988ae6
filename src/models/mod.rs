//! Core data models for Picsou
//!
//! The domain tree: a [`Document`] owns users; a [`User`] owns budgets and
//! accounts; an [`Account`] owns payment methods, scheduled operations and
//! operations.

pub mod account;
pub mod amount;
pub mod budget;
pub mod document;
pub mod entity;
pub mod ids;
pub mod operation;
pub mod payment_method;
pub mod user;

pub use account::Account;
pub use amount::{Amount, AmountParseError};
pub use budget::Budget;
pub use document::{Document, FORMAT_MAJOR, FORMAT_MINOR};
pub use entity::{EntityKind, JsonEntity, ModelEntity, Modification, ModifiedSignal, Named, ObserverId};
pub use ids::{AccountId, BudgetId, OperationId, PaymentMethodId, ScheduledOperationId, UserId};
pub use operation::{FrequencyUnit, Operation, OperationFields, Schedule, ScheduleEnd, ScheduledOperation};
pub use payment_method::PaymentMethod;
pub use user::User;
