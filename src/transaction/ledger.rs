//! The rules that tie a transaction's type to its account references.

use rust_decimal::Decimal;

use crate::{
    Error,
    account::AccountId,
    transaction::{NewTransaction, Transaction, TransactionKind, TransactionType, TransactionUpdate},
};

const DEBIT_REQUIRES_SOURCE: &str = "Debit transactions require a source account";
const CREDIT_REQUIRES_TARGET: &str = "Credit transactions require a target account";
const TRANSFER_REQUIRES_BOTH: &str = "Transfer transactions require both source and target accounts";
const TRANSFER_REQUIRES_DIFFERENT: &str =
    "Source and target accounts must be different for transfers";

/// Build the [TransactionKind] for `transaction_type` from optional account
/// references, dropping the references the type does not use.
///
/// # Errors
/// Returns [Error::InvalidTransaction] if:
/// - a debit has no source account,
/// - a credit has no target account,
/// - a transfer is missing either account or both accounts are the same.
pub fn resolve_kind(
    transaction_type: TransactionType,
    source_account_id: Option<AccountId>,
    target_account_id: Option<AccountId>,
) -> Result<TransactionKind, Error> {
    match transaction_type {
        TransactionType::Debit => source_account_id
            .map(|source_account_id| TransactionKind::Debit { source_account_id })
            .ok_or_else(|| invalid(DEBIT_REQUIRES_SOURCE)),
        TransactionType::Credit => target_account_id
            .map(|target_account_id| TransactionKind::Credit { target_account_id })
            .ok_or_else(|| invalid(CREDIT_REQUIRES_TARGET)),
        TransactionType::Transfer => match (source_account_id, target_account_id) {
            (Some(source), Some(target)) if source == target => {
                Err(invalid(TRANSFER_REQUIRES_DIFFERENT))
            }
            (Some(source_account_id), Some(target_account_id)) => Ok(TransactionKind::Transfer {
                source_account_id,
                target_account_id,
            }),
            _ => Err(invalid(TRANSFER_REQUIRES_BOTH)),
        },
    }
}

/// Check that the account references satisfy the rule for `transaction_type`.
///
/// # Errors
/// See [resolve_kind].
pub fn validate_account_references(
    transaction_type: TransactionType,
    source_account_id: Option<AccountId>,
    target_account_id: Option<AccountId>,
) -> Result<(), Error> {
    resolve_kind(transaction_type, source_account_id, target_account_id).map(|_| ())
}

/// Check that `amount` is not negative.
///
/// The direction of a transaction is given by its type, never by the sign of
/// its amount.
pub fn validate_amount(amount: Decimal) -> Result<(), Error> {
    if amount < Decimal::ZERO {
        return Err(Error::InvalidTransaction(format!(
            "Transaction amounts cannot be negative, got {amount}"
        )));
    }

    Ok(())
}

/// Fill in the fields missing from `update` with the values of `current`
/// and validate the result as a whole.
///
/// An update that changes only the type must supply any account reference
/// the new type requires that `current` does not already have.
pub fn merge_update(
    current: &Transaction,
    update: &TransactionUpdate,
) -> Result<NewTransaction, Error> {
    let kind = resolve_kind(
        update.transaction_type.unwrap_or(current.transaction_type),
        update.source_account_id.or(current.source_account_id),
        update.target_account_id.or(current.target_account_id),
    )?;

    let amount = update.amount.unwrap_or(current.amount);
    validate_amount(amount)?;

    Ok(NewTransaction {
        kind,
        description: update
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone()),
        amount,
        category_id: update.category_id.unwrap_or(current.category_id),
        date: update.date.unwrap_or(current.date),
    })
}

fn invalid(reason: &str) -> Error {
    Error::InvalidTransaction(reason.to_owned())
}
