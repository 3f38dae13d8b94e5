//! Aggregate totals over the included transactions of a computation.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    exchange_rate::{ConvertedAmount, Currency},
    transaction::TransactionType,
};

/// The totals of a computation in the caller's display currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationTotals {
    /// The number of included transactions.
    pub transaction_count: usize,
    /// The sum of the included debits.
    pub total_debits: Decimal,
    /// The sum of the included credits.
    pub total_credits: Decimal,
    /// The sum of the included transfers.
    pub total_transfers: Decimal,
    /// Credits minus debits. Transfers move money between the user's own
    /// accounts and do not count.
    pub net: Decimal,
    /// The currency of the totals.
    pub display_currency: Currency,
    /// Whether at least one amount could not be converted and was added unconverted.
    pub conversion_failed: bool,
}

/// Sum the converted amounts of `transactions` by type.
///
/// # Errors
/// Returns [Error::AmountOverflow] if a total does not fit in a decimal.
pub fn compute_totals(
    transactions: &[(TransactionType, ConvertedAmount)],
    display_currency: Currency,
) -> Result<ComputationTotals, Error> {
    let mut totals = ComputationTotals {
        transaction_count: transactions.len(),
        total_debits: Decimal::ZERO,
        total_credits: Decimal::ZERO,
        total_transfers: Decimal::ZERO,
        net: Decimal::ZERO,
        display_currency,
        conversion_failed: false,
    };

    for (transaction_type, amount) in transactions {
        let total = match transaction_type {
            TransactionType::Debit => &mut totals.total_debits,
            TransactionType::Credit => &mut totals.total_credits,
            TransactionType::Transfer => &mut totals.total_transfers,
        };
        *total = total
            .checked_add(amount.converted_amount)
            .ok_or(Error::AmountOverflow)?;

        totals.conversion_failed |= amount.conversion_failed;
    }

    totals.net = totals
        .total_credits
        .checked_sub(totals.total_debits)
        .ok_or(Error::AmountOverflow)?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        Error,
        exchange_rate::{ConvertedAmount, Currency},
        transaction::TransactionType,
    };

    use super::compute_totals;

    fn usd(amount: Decimal) -> ConvertedAmount {
        ConvertedAmount {
            original_amount: amount,
            original_currency: Currency::USD,
            converted_amount: amount,
            display_currency: Currency::USD,
            conversion_applied: false,
            rate_date: None,
            conversion_failed: false,
        }
    }

    #[test]
    fn empty_totals_are_zero() {
        let totals = compute_totals(&[], Currency::EUR).unwrap();

        assert_eq!(totals.transaction_count, 0);
        assert_eq!(totals.net, Decimal::ZERO);
        assert_eq!(totals.display_currency, Currency::EUR);
        assert!(!totals.conversion_failed);
    }

    #[test]
    fn net_is_credits_minus_debits() {
        let totals = compute_totals(
            &[
                (TransactionType::Debit, usd(Decimal::new(2550, 2))),
                (TransactionType::Credit, usd(Decimal::new(100, 0))),
                (TransactionType::Transfer, usd(Decimal::new(40, 0))),
                (TransactionType::Debit, usd(Decimal::new(450, 2))),
            ],
            Currency::USD,
        )
        .unwrap();

        assert_eq!(totals.transaction_count, 4);
        assert_eq!(totals.total_debits, Decimal::new(30, 0));
        assert_eq!(totals.total_credits, Decimal::new(100, 0));
        assert_eq!(totals.total_transfers, Decimal::new(40, 0));
        assert_eq!(totals.net, Decimal::new(70, 0));
    }

    #[test]
    fn failed_conversion_is_flagged() {
        let mut failed = usd(Decimal::ONE);
        failed.conversion_failed = true;

        let totals = compute_totals(&[(TransactionType::Credit, failed)], Currency::USD).unwrap();

        assert!(totals.conversion_failed);
        assert_eq!(totals.total_credits, Decimal::ONE);
    }

    #[test]
    fn overflowing_total_is_an_error() {
        let result = compute_totals(
            &[
                (TransactionType::Credit, usd(Decimal::MAX)),
                (TransactionType::Credit, usd(Decimal::ONE)),
            ],
            Currency::USD,
        );

        assert_eq!(result, Err(Error::AmountOverflow));
    }

    #[test]
    fn overflowing_net_is_an_error() {
        let result = compute_totals(
            &[
                (TransactionType::Credit, usd(Decimal::MAX)),
                (TransactionType::Debit, usd(Decimal::MIN)),
            ],
            Currency::USD,
        );

        assert_eq!(result, Err(Error::AmountOverflow));
    }
}
