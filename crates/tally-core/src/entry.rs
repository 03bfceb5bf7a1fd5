//! Ledger entries, payment events and counterparty candidates.
//!
//! - [`LedgerEntry`] - One obligation (receivable or payable)
//! - [`PaymentEvent`] - One atomic payment recorded against an entry
//! - [`CounterpartyCandidate`] - A resolution target for identity matching
//! - [`ExternalRef`] - Weak legacy identifiers (tax id, free-text name)

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(
    /// Identifier of a [`LedgerEntry`].
    EntryId
);
id_type!(
    /// Identifier of a [`PaymentEvent`].
    EventId
);
id_type!(
    /// Identifier of a canonical counterparty (client or supplier).
    CounterpartyId
);
id_type!(
    /// Identifier of the parent record an entry belongs to (e.g. a project).
    ParentId
);

/// Which side of the organization an obligation sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Owed to the organization by a client.
    Receivable,
    /// Owed by the organization to a supplier.
    Payable,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receivable => write!(f, "RECEIVABLE"),
            Self::Payable => write!(f, "PAYABLE"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RECEIVABLE" => Ok(Self::Receivable),
            "PAYABLE" => Ok(Self::Payable),
            _ => Err(format!("unknown direction: {s}")),
        }
    }
}

/// Lifecycle status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Nothing paid yet.
    #[default]
    Pending,
    /// Partially paid.
    Partial,
    /// Paid in full (or overpaid).
    Paid,
    /// Not fully paid and past its due date.
    Overdue,
    /// Cancelled; terminal.
    Cancelled,
}

impl EntryStatus {
    /// Get the status name as it is stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Partial => "PARTIAL",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PARTIAL" => Ok(Self::Partial),
            "PAID" => Ok(Self::Paid),
            "OVERDUE" => Ok(Self::Overdue),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

/// Weak identifiers a legacy record uses to point at a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    /// Tax identifier as typed into the legacy system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// Free-text counterparty name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ExternalRef {
    /// Create an empty reference.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tax identifier.
    #[must_use]
    pub fn with_tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }

    /// Set the free-text name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One obligation: an amount owed to or by the organization.
///
/// `paid`, `remaining` and `status` are derived fields, written only by
/// reconciliation. `counterparty` is written only by backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// Receivable or payable.
    pub direction: Direction,
    /// Resolved counterparty, if any.
    #[serde(default)]
    pub counterparty: Option<CounterpartyId>,
    /// Total amount owed.
    pub owed: Decimal,
    /// Total paid so far (derived).
    #[serde(default)]
    pub paid: Decimal,
    /// Remaining balance (derived); negative when overpaid.
    #[serde(default)]
    pub remaining: Decimal,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Lifecycle status (derived).
    #[serde(default)]
    pub status: EntryStatus,
    /// Identifier in the legacy system this entry was migrated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    /// Parent record (e.g. a project) the entry belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentId>,
    /// Legacy counterparty identifiers, kept until identity is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<ExternalRef>,
}

impl LedgerEntry {
    /// Create a new pending entry with nothing paid.
    #[must_use]
    pub fn new(id: impl Into<EntryId>, direction: Direction, owed: Decimal) -> Self {
        Self {
            id: id.into(),
            direction,
            counterparty: None,
            owed,
            paid: Decimal::ZERO,
            remaining: owed,
            due_date: None,
            status: EntryStatus::Pending,
            legacy_id: None,
            parent: None,
            external_ref: None,
        }
    }

    /// Set the counterparty.
    #[must_use]
    pub fn with_counterparty(mut self, counterparty: impl Into<CounterpartyId>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    /// Set the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Set the status.
    #[must_use]
    pub const fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the stored paid and remaining amounts.
    #[must_use]
    pub const fn with_balances(mut self, paid: Decimal, remaining: Decimal) -> Self {
        self.paid = paid;
        self.remaining = remaining;
        self
    }

    /// Set the legacy identifier.
    #[must_use]
    pub fn with_legacy_id(mut self, legacy_id: impl Into<String>) -> Self {
        self.legacy_id = Some(legacy_id.into());
        self
    }

    /// Set the parent record.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ParentId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Set the legacy counterparty reference.
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: ExternalRef) -> Self {
        self.external_ref = Some(external_ref);
        self
    }

    /// Check if the entry has a counterparty.
    #[must_use]
    pub const fn has_counterparty(&self) -> bool {
        self.counterparty.is_some()
    }

    /// Check the structural invariants of the entry itself.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owed.is_sign_negative() && !self.owed.is_zero() {
            return Err(ValidationError::NegativeOwed {
                entry: self.id.clone(),
                owed: self.owed,
            });
        }
        Ok(())
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash.
    Cash,
    /// Bank transfer or wire.
    BankTransfer,
    /// Card payment.
    Card,
    /// Check.
    Check,
    /// Anything else, or unknown in the legacy data.
    #[default]
    Other,
}

impl PaymentMethod {
    /// The serialized name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Card => "CARD",
            Self::Check => "CHECK",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "CASH" => Ok(Self::Cash),
            "BANK_TRANSFER" | "TRANSFER" | "WIRE" => Ok(Self::BankTransfer),
            "CARD" => Ok(Self::Card),
            "CHECK" | "CHEQUE" => Ok(Self::Check),
            "OTHER" | "" => Ok(Self::Other),
            _ => Err(format!("unknown payment method: {s}")),
        }
    }
}

/// One atomic payment applied to exactly one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Event identifier.
    pub id: EventId,
    /// Owning ledger entry.
    pub entry_id: EntryId,
    /// Amount paid; always positive.
    pub amount: Decimal,
    /// Payment date.
    pub date: NaiveDate,
    /// Payment method.
    #[serde(default)]
    pub method: PaymentMethod,
    /// Identifier in the legacy system, used for import deduplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
}

impl PaymentEvent {
    /// Create a payment event.
    ///
    /// Rejects non-positive amounts and events with an empty owner.
    pub fn new(
        id: impl Into<EventId>,
        entry_id: impl Into<EntryId>,
        amount: Decimal,
        date: NaiveDate,
        method: PaymentMethod,
    ) -> Result<Self, ValidationError> {
        let event = Self {
            id: id.into(),
            entry_id: entry_id.into(),
            amount,
            date,
            method,
            legacy_id: None,
        };
        event.validate()?;
        Ok(event)
    }

    /// Set the legacy identifier.
    #[must_use]
    pub fn with_legacy_id(mut self, legacy_id: impl Into<String>) -> Self {
        self.legacy_id = Some(legacy_id.into());
        self
    }

    /// Check the structural invariants of the event.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.entry_id.as_str().is_empty() {
            return Err(ValidationError::MissingEntryReference {
                event: self.id.clone(),
            });
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePayment {
                event: self.id.clone(),
                amount: self.amount,
            });
        }
        Ok(())
    }
}

/// A canonical counterparty that legacy references can be resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyCandidate {
    /// Counterparty identifier.
    pub id: CounterpartyId,
    /// Canonical name.
    pub name: String,
    /// Tax identifier, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

impl CounterpartyCandidate {
    /// Create a candidate without a tax identifier.
    #[must_use]
    pub fn new(id: impl Into<CounterpartyId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tax_id: None,
        }
    }

    /// Set the tax identifier.
    #[must_use]
    pub fn with_tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }
}
