//! Operations and scheduled operations
//!
//! Both share one [`OperationFields`] block. A scheduled operation adds a
//! name and a recurrence [`Schedule`].

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::crypto::secure_hash::to_hex;
use crate::crypto::{HashAlgorithm, SecureHash};
use crate::error::{PicsouError, PicsouResult};

use super::amount::Amount;
use super::entity::{parse_record, to_record, EntityKind, EntityMeta, JsonEntity, ModelEntity, Named};
use super::ids::{OperationId, ScheduledOperationId};

/// Data carried by every operation
///
/// `budget` and `payment_method` reference siblings by name, the way they
/// appear in imported bank statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFields {
    pub verified: bool,
    pub amount: Amount,
    pub date: NaiveDate,
    pub budget: String,
    /// Recipient of an expense or source of an income
    pub srcdst: String,
    pub description: String,
    pub payment_method: String,
}

impl OperationFields {
    pub fn new(amount: Amount, date: NaiveDate) -> Self {
        Self {
            verified: false,
            amount,
            date,
            budget: String::new(),
            srcdst: String::new(),
            description: String::new(),
            payment_method: String::new(),
        }
    }

    pub fn with_budget(mut self, budget: impl Into<String>) -> Self {
        self.budget = budget.into();
        self
    }

    pub fn with_srcdst(mut self, srcdst: impl Into<String>) -> Self {
        self.srcdst = srcdst.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = payment_method.into();
        self
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// SHA-256 over the identifying fields, used to spot duplicate imports
    ///
    /// `verified` is left out: checking an operation does not make it a
    /// different operation.
    pub fn fingerprint(&self) -> String {
        let mut hash = SecureHash::plain(HashAlgorithm::Sha256);
        hash.update(self.date.to_string().as_bytes());
        hash.update(&self.amount.cents().to_le_bytes());
        for part in [
            &self.budget,
            &self.srcdst,
            &self.description,
            &self.payment_method,
        ] {
            hash.update(&[0]);
            hash.update(part.as_bytes());
        }
        to_hex(hash.finish().as_slice())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationRecord {
    id: OperationId,
    #[serde(default)]
    verified: bool,
    amount: Amount,
    date: NaiveDate,
    #[serde(default)]
    budget: String,
    #[serde(default)]
    srcdst: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    payment_method: String,
}

/// A dated movement of money on an account
#[derive(Debug)]
pub struct Operation {
    meta: EntityMeta,
    fields: OperationFields,
}

impl Operation {
    /// A detached operation, e.g. produced by an import, awaiting
    /// `Account::add_operations`
    pub fn new(fields: OperationFields) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::Operation, None),
            fields,
        }
    }

    pub(crate) fn new_in(parent: &EntityMeta, fields: OperationFields) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::Operation, Some(parent)),
            fields,
        }
    }

    pub(crate) fn for_read(parent: Option<&EntityMeta>) -> Self {
        Self {
            meta: EntityMeta::for_read(EntityKind::Operation, parent),
            fields: OperationFields::new(Amount::zero(), NaiveDate::MIN),
        }
    }

    pub(crate) fn attach(&mut self, parent: &EntityMeta) {
        self.meta.attach(parent);
    }

    pub fn id(&self) -> OperationId {
        OperationId::from_uuid(self.meta.id())
    }

    pub fn fields(&self) -> &OperationFields {
        &self.fields
    }

    pub fn amount(&self) -> Amount {
        self.fields.amount
    }

    pub fn date(&self) -> NaiveDate {
        self.fields.date
    }

    pub fn is_verified(&self) -> bool {
        self.fields.verified
    }

    pub fn fingerprint(&self) -> String {
        self.fields.fingerprint()
    }

    pub(crate) fn update(&mut self, fields: OperationFields) {
        self.fields = fields;
        self.meta.emit_modified();
    }
}

impl ModelEntity for Operation {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl JsonEntity for Operation {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let r: OperationRecord = parse_record(json, "operation")?;
        self.meta.set_id(r.id.into());
        self.fields = OperationFields {
            verified: r.verified,
            amount: r.amount,
            date: r.date,
            budget: r.budget,
            srcdst: r.srcdst,
            description: r.description,
            payment_method: r.payment_method,
        };
        self.meta.set_valid(true);
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        let f = &self.fields;
        to_record(&OperationRecord {
            id: self.id(),
            verified: f.verified,
            amount: f.amount,
            date: f.date,
            budget: f.budget.clone(),
            srcdst: f.srcdst.clone(),
            description: f.description.clone(),
            payment_method: f.payment_method.clone(),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.fields.date, self.fields.amount, self.fields.srcdst
        )
    }
}

/// Unit of a schedule's period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl FrequencyUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "days" | "d" => Some(Self::Days),
            "week" | "weeks" | "w" => Some(Self::Weeks),
            "month" | "months" | "m" => Some(Self::Months),
            "year" | "years" | "y" => Some(Self::Years),
            _ => None,
        }
    }
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days => write!(f, "days"),
            Self::Weeks => write!(f, "weeks"),
            Self::Months => write!(f, "months"),
            Self::Years => write!(f, "years"),
        }
    }
}

/// How a schedule stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEnd {
    Endless,
    /// Last possible occurrence date, inclusive
    Until(NaiveDate),
    /// Total number of occurrences
    Count(u32),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleRecord {
    from: NaiveDate,
    freq_unit: FrequencyUnit,
    freq_value: u32,
    #[serde(default)]
    endless: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    until: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

/// Recurrence of a scheduled operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleRecord", into = "ScheduleRecord")]
pub struct Schedule {
    from: NaiveDate,
    freq_unit: FrequencyUnit,
    freq_value: u32,
    end: ScheduleEnd,
}

impl Schedule {
    pub fn new(
        from: NaiveDate,
        freq_unit: FrequencyUnit,
        freq_value: u32,
        end: ScheduleEnd,
    ) -> PicsouResult<Self> {
        if freq_value == 0 {
            return Err(PicsouError::Validation(
                "Schedule frequency must be at least 1".into(),
            ));
        }
        match end {
            ScheduleEnd::Until(until) if until < from => {
                return Err(PicsouError::Validation(format!(
                    "Schedule ends ({}) before it starts ({})",
                    until, from
                )));
            }
            ScheduleEnd::Count(0) => {
                return Err(PicsouError::Validation(
                    "Schedule count must be at least 1".into(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            from,
            freq_unit,
            freq_value,
            end,
        })
    }

    pub fn monthly(from: NaiveDate) -> Self {
        Self {
            from,
            freq_unit: FrequencyUnit::Months,
            freq_value: 1,
            end: ScheduleEnd::Endless,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.from
    }

    pub fn freq_unit(&self) -> FrequencyUnit {
        self.freq_unit
    }

    pub fn freq_value(&self) -> u32 {
        self.freq_value
    }

    pub fn end(&self) -> ScheduleEnd {
        self.end
    }

    pub fn is_endless(&self) -> bool {
        self.end == ScheduleEnd::Endless
    }

    /// Date of the `n`-th occurrence (0-based), computed from `from` so that
    /// month-end clamping never accumulates
    fn nth(&self, n: u32) -> Option<NaiveDate> {
        let steps = n.checked_mul(self.freq_value)?;
        match self.freq_unit {
            FrequencyUnit::Days => self.from.checked_add_days(chrono::Days::new(steps.into())),
            FrequencyUnit::Weeks => self
                .from
                .checked_add_days(chrono::Days::new(u64::from(steps) * 7)),
            FrequencyUnit::Months => self.from.checked_add_months(Months::new(steps)),
            FrequencyUnit::Years => self
                .from
                .checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }

    /// Every due date from the start up to `limit`, inclusive
    pub fn occurrences_until(&self, limit: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut n = 0;
        loop {
            if let ScheduleEnd::Count(count) = self.end {
                if n >= count {
                    break;
                }
            }
            let Some(date) = self.nth(n) else { break };
            if date > limit {
                break;
            }
            if let ScheduleEnd::Until(until) = self.end {
                if date > until {
                    break;
                }
            }
            dates.push(date);
            n += 1;
        }
        dates
    }
}

impl TryFrom<ScheduleRecord> for Schedule {
    type Error = String;

    fn try_from(r: ScheduleRecord) -> Result<Self, Self::Error> {
        let end = match (r.endless, r.until, r.count) {
            (true, None, None) => ScheduleEnd::Endless,
            (false, Some(until), None) => ScheduleEnd::Until(until),
            (false, None, Some(count)) => ScheduleEnd::Count(count),
            _ => {
                return Err(
                    "schedule needs exactly one of endless, until or count".to_string(),
                )
            }
        };
        Schedule::new(r.from, r.freq_unit, r.freq_value, end).map_err(|e| e.to_string())
    }
}

impl From<Schedule> for ScheduleRecord {
    fn from(s: Schedule) -> Self {
        let (endless, until, count) = match s.end {
            ScheduleEnd::Endless => (true, None, None),
            ScheduleEnd::Until(until) => (false, Some(until), None),
            ScheduleEnd::Count(count) => (false, None, Some(count)),
        };
        Self {
            from: s.from,
            freq_unit: s.freq_unit,
            freq_value: s.freq_value,
            endless,
            until,
            count,
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "every {} {} from {}",
            self.freq_value, self.freq_unit, self.from
        )?;
        match self.end {
            ScheduleEnd::Endless => Ok(()),
            ScheduleEnd::Until(until) => write!(f, " until {}", until),
            ScheduleEnd::Count(count) => write!(f, ", {} times", count),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduledOperationRecord {
    id: ScheduledOperationId,
    #[serde(default)]
    verified: bool,
    amount: Amount,
    date: NaiveDate,
    #[serde(default)]
    budget: String,
    #[serde(default)]
    srcdst: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    payment_method: String,
    name: String,
    schedule: Schedule,
}

/// A named, recurring operation template
#[derive(Debug)]
pub struct ScheduledOperation {
    meta: EntityMeta,
    fields: OperationFields,
    name: String,
    schedule: Schedule,
}

impl ScheduledOperation {
    pub(crate) fn new(
        parent: &EntityMeta,
        fields: OperationFields,
        name: impl Into<String>,
        schedule: Schedule,
    ) -> Self {
        Self {
            meta: EntityMeta::new(EntityKind::ScheduledOperation, Some(parent)),
            fields,
            name: name.into(),
            schedule,
        }
    }

    pub(crate) fn for_read(parent: &EntityMeta) -> Self {
        Self {
            meta: EntityMeta::for_read(EntityKind::ScheduledOperation, Some(parent)),
            fields: OperationFields::new(Amount::zero(), NaiveDate::MIN),
            name: String::new(),
            schedule: Schedule::monthly(NaiveDate::MIN),
        }
    }

    pub fn id(&self) -> ScheduledOperationId {
        ScheduledOperationId::from_uuid(self.meta.id())
    }

    pub fn fields(&self) -> &OperationFields {
        &self.fields
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Concrete operations due up to `limit`, one per occurrence
    pub fn materialize(&self, limit: NaiveDate) -> Vec<Operation> {
        self.schedule
            .occurrences_until(limit)
            .into_iter()
            .map(|date| {
                let mut fields = self.fields.clone();
                fields.date = date;
                fields.verified = false;
                Operation::new(fields)
            })
            .collect()
    }

    pub(crate) fn update(
        &mut self,
        fields: OperationFields,
        name: impl Into<String>,
        schedule: Schedule,
    ) {
        self.fields = fields;
        self.name = name.into();
        self.schedule = schedule;
        self.meta.emit_modified();
    }
}

impl ModelEntity for ScheduledOperation {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

impl Named for ScheduledOperation {
    fn name(&self) -> &str {
        &self.name
    }
}

impl JsonEntity for ScheduledOperation {
    fn read(&mut self, json: &Value) -> PicsouResult<()> {
        let r: ScheduledOperationRecord = parse_record(json, "scheduled operation")?;
        self.meta.set_id(r.id.into());
        self.fields = OperationFields {
            verified: r.verified,
            amount: r.amount,
            date: r.date,
            budget: r.budget,
            srcdst: r.srcdst,
            description: r.description,
            payment_method: r.payment_method,
        };
        self.name = r.name;
        self.schedule = r.schedule;
        self.meta.set_valid(true);
        Ok(())
    }

    fn write(&self) -> PicsouResult<Value> {
        self.meta.ensure_valid()?;
        let f = &self.fields;
        to_record(&ScheduledOperationRecord {
            id: self.id(),
            verified: f.verified,
            amount: f.amount,
            date: f.date,
            budget: f.budget.clone(),
            srcdst: f.srcdst.clone(),
            description: f.description.clone(),
            payment_method: f.payment_method.clone(),
            name: self.name.clone(),
            schedule: self.schedule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rent() -> OperationFields {
        OperationFields::new(Amount::from_cents(-80000), date(2024, 1, 31))
            .with_budget("Housing")
            .with_srcdst("Landlord")
            .with_payment_method("Transfer")
    }

    #[test]
    fn test_operation_json_keys() {
        let op = Operation::new(rent().verified(true));
        let json = op.write().unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "amount",
                "budget",
                "date",
                "description",
                "id",
                "payment_method",
                "srcdst",
                "verified"
            ]
        );
        assert_eq!(json["date"], "2024-01-31");
        assert_eq!(json["amount"], -800.0);
    }

    #[test]
    fn test_operation_read_defaults_optional_keys() {
        let mut op = Operation::for_read(None);
        op.read(&json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "amount": -20.0,
            "date": "2024-03-01"
        }))
        .unwrap();
        assert!(!op.is_verified());
        assert_eq!(op.fields().srcdst, "");
        assert_eq!(op.amount().cents(), -2000);
    }

    #[test]
    fn test_operation_read_rejects_bad_date() {
        let mut op = Operation::for_read(None);
        let err = op
            .read(&json!({
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "amount": 1.0,
                "date": "01/03/2024"
            }))
            .unwrap_err();
        assert!(matches!(err, PicsouError::CorruptData(_)));
    }

    #[test]
    fn test_fingerprint_ignores_verified_and_id() {
        let a = Operation::new(rent());
        let b = Operation::new(rent().verified(true));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c = Operation::new(rent().with_description("late"));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_monthly_occurrences_clamp_to_month_end() {
        let schedule = Schedule::new(
            date(2024, 1, 31),
            FrequencyUnit::Months,
            1,
            ScheduleEnd::Endless,
        )
        .unwrap();
        assert_eq!(
            schedule.occurrences_until(date(2024, 4, 30)),
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30)
            ]
        );
    }

    #[test]
    fn test_count_and_until_bounds() {
        let counted = Schedule::new(
            date(2024, 1, 1),
            FrequencyUnit::Weeks,
            2,
            ScheduleEnd::Count(3),
        )
        .unwrap();
        assert_eq!(
            counted.occurrences_until(date(2030, 1, 1)),
            vec![date(2024, 1, 1), date(2024, 1, 15), date(2024, 1, 29)]
        );

        let until = Schedule::new(
            date(2024, 1, 1),
            FrequencyUnit::Years,
            1,
            ScheduleEnd::Until(date(2025, 6, 1)),
        )
        .unwrap();
        assert_eq!(
            until.occurrences_until(date(2030, 1, 1)),
            vec![date(2024, 1, 1), date(2025, 1, 1)]
        );
    }

    #[test]
    fn test_schedule_validation() {
        assert!(Schedule::new(date(2024, 1, 1), FrequencyUnit::Days, 0, ScheduleEnd::Endless).is_err());
        assert!(Schedule::new(date(2024, 1, 1), FrequencyUnit::Days, 1, ScheduleEnd::Count(0)).is_err());
        assert!(Schedule::new(
            date(2024, 2, 1),
            FrequencyUnit::Days,
            1,
            ScheduleEnd::Until(date(2024, 1, 1))
        )
        .is_err());
    }

    #[test]
    fn test_schedule_json_modes() {
        let endless = Schedule::monthly(date(2024, 1, 5));
        let json = serde_json::to_value(endless).unwrap();
        assert_eq!(
            json,
            json!({"from": "2024-01-05", "freq_unit": "months", "freq_value": 1, "endless": true})
        );

        let counted: Schedule = serde_json::from_value(json!({
            "from": "2024-01-05", "freq_unit": "days", "freq_value": 3, "count": 4
        }))
        .unwrap();
        assert_eq!(counted.end(), ScheduleEnd::Count(4));

        let ambiguous = serde_json::from_value::<Schedule>(json!({
            "from": "2024-01-05", "freq_unit": "days", "freq_value": 3,
            "endless": true, "count": 4
        }));
        assert!(ambiguous.is_err());
    }

    #[test]
    fn test_scheduled_operation_round_trip() {
        let account = EntityMeta::new(EntityKind::Account, None);
        let sop = ScheduledOperation::new(&account, rent(), "Rent", Schedule::monthly(date(2024, 1, 31)));

        let mut loaded = ScheduledOperation::for_read(&account);
        loaded.read(&sop.write().unwrap()).unwrap();

        assert_eq!(loaded.id(), sop.id());
        assert_eq!(loaded.name(), "Rent");
        assert_eq!(loaded.fields(), sop.fields());
        assert_eq!(loaded.schedule(), sop.schedule());
    }

    #[test]
    fn test_materialize() {
        let account = EntityMeta::new(EntityKind::Account, None);
        let sop = ScheduledOperation::new(&account, rent(), "Rent", Schedule::monthly(date(2024, 1, 31)));
        let ops = sop.materialize(date(2024, 3, 1));
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].date(), date(2024, 2, 29));
        assert_eq!(ops[1].amount().cents(), -80000);
        assert!(ops.iter().all(|op| op.parent_id().is_none()));
    }
}
