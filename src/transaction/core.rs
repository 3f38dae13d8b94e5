//! Defines the core data models for transactions.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, UserID,
    account::AccountId,
    category::CategoryId,
    csv_import::ImportId,
    database_id::TransactionId,
    transaction::ledger::{resolve_kind, validate_account_references},
};

// ============================================================================
// MODELS
// ============================================================================

/// The direction of a transaction.
///
/// The amount of a transaction is never negative: whether money left or
/// entered an account is implied by the type and by which account slot the
/// account is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money left the source account.
    Debit,
    /// Money entered the target account.
    Credit,
    /// Money moved from the source account to a different target account.
    Transfer,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Debit => "Debit",
            TransactionType::Credit => "Credit",
            TransactionType::Transfer => "Transfer",
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Debit" => Ok(TransactionType::Debit),
            "Credit" => Ok(TransactionType::Credit),
            "Transfer" => Ok(TransactionType::Transfer),
            other => Err(FromSqlError::Other(
                format!("invalid transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// A single monetary movement, as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether this is a debit, credit or transfer.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The account money left, set for debits and transfers.
    pub source_account_id: Option<AccountId>,
    /// The account money entered, set for credits and transfers.
    pub target_account_id: Option<AccountId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money moved, never negative.
    pub amount: Decimal,
    /// The category the transaction belongs to.
    pub category_id: CategoryId,
    /// When the transaction happened.
    pub date: Date,
    /// The ID of the import that created this transaction.
    pub import_id: Option<ImportId>,
}

impl Transaction {
    /// The account whose currency the amount is denominated in: the source
    /// account for debits and transfers, the target account for credits.
    pub fn primary_account_id(&self) -> Option<AccountId> {
        match self.transaction_type {
            TransactionType::Credit => self.target_account_id,
            TransactionType::Debit | TransactionType::Transfer => self.source_account_id,
        }
    }
}

/// The type of a transaction together with exactly the account references
/// that type requires.
///
/// Only [TransactionKind::Transfer] needs a runtime check (the two accounts
/// must differ), see [TransactionKind::validate].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionKind {
    /// Money left `source_account_id`.
    Debit {
        /// The account money left.
        source_account_id: AccountId,
    },
    /// Money entered `target_account_id`.
    Credit {
        /// The account money entered.
        target_account_id: AccountId,
    },
    /// Money moved from `source_account_id` to `target_account_id`.
    Transfer {
        /// The account money left.
        source_account_id: AccountId,
        /// The account money entered.
        target_account_id: AccountId,
    },
}

impl TransactionKind {
    /// Build a kind from a type and optional account references.
    ///
    /// Account references the type does not use are dropped.
    ///
    /// # Errors
    /// Returns [Error::InvalidTransaction] if the references do not satisfy
    /// the rule for `transaction_type`.
    pub fn new(
        transaction_type: TransactionType,
        source_account_id: Option<AccountId>,
        target_account_id: Option<AccountId>,
    ) -> Result<Self, Error> {
        resolve_kind(transaction_type, source_account_id, target_account_id)
    }

    /// Check the rules the type system cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        validate_account_references(
            self.transaction_type(),
            self.source_account_id(),
            self.target_account_id(),
        )
    }

    /// The type of the transaction.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionKind::Debit { .. } => TransactionType::Debit,
            TransactionKind::Credit { .. } => TransactionType::Credit,
            TransactionKind::Transfer { .. } => TransactionType::Transfer,
        }
    }

    /// The account money left, if the type has one.
    pub fn source_account_id(&self) -> Option<AccountId> {
        match self {
            TransactionKind::Debit { source_account_id }
            | TransactionKind::Transfer {
                source_account_id, ..
            } => Some(*source_account_id),
            TransactionKind::Credit { .. } => None,
        }
    }

    /// The account money entered, if the type has one.
    pub fn target_account_id(&self) -> Option<AccountId> {
        match self {
            TransactionKind::Credit { target_account_id }
            | TransactionKind::Transfer {
                target_account_id, ..
            } => Some(*target_account_id),
            TransactionKind::Debit { .. } => None,
        }
    }
}

/// The data for creating a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The type and account references.
    #[serde(flatten)]
    pub kind: TransactionKind,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money moved, must not be negative.
    pub amount: Decimal,
    /// The category the transaction belongs to.
    pub category_id: CategoryId,
    /// When the transaction happened.
    pub date: Date,
}

/// A partial update to a transaction.
///
/// Fields that are `None` keep their current value. The merged result is
/// validated as a whole, so leaving out the account references cannot bypass
/// the rules for the transaction type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransactionUpdate {
    /// The new type.
    #[serde(default, rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// The new source account.
    #[serde(default)]
    pub source_account_id: Option<AccountId>,
    /// The new target account.
    #[serde(default)]
    pub target_account_id: Option<AccountId>,
    /// The new description.
    #[serde(default)]
    pub description: Option<String>,
    /// The new amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// The new category.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// The new date.
    #[serde(default)]
    pub date: Option<Date>,
}
