use rusqlite::Connection;
use rust_decimal::Decimal;
use time::{Date, macros::date};

use crate::{
    UserID,
    account::{AccountForm, AccountId, create_account},
    category::{CategoryForm, CategoryId, CategoryName, create_category},
    db::initialize,
    exchange_rate::Currency,
    transaction::{NewTransaction, Transaction, TransactionKind, TransactionType, create_transaction},
};

/// An initialized in-memory database with one user, two accounts and one category.
pub(crate) struct LedgerFixture {
    pub connection: Connection,
    pub user_id: UserID,
    /// An SGD account.
    pub checking: AccountId,
    /// A USD account.
    pub savings: AccountId,
    pub category: CategoryId,
}

pub(crate) const FIXTURE_DATE: Date = date!(2025 - 03 - 10);

pub(crate) fn get_fixture() -> LedgerFixture {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();
    let user_id = UserID::new(1);

    let checking = create_account(
        user_id,
        &AccountForm {
            name: "Checking".to_owned(),
            color: "#3366ff".to_owned(),
            currency: Currency::SGD,
        },
        &connection,
    )
    .unwrap()
    .id;
    let savings = create_account(
        user_id,
        &AccountForm {
            name: "Savings".to_owned(),
            color: "#33ff66".to_owned(),
            currency: Currency::USD,
        },
        &connection,
    )
    .unwrap()
    .id;
    let category = create_category(
        user_id,
        &CategoryForm {
            name: CategoryName::new_unchecked("General"),
            default_transaction_type: TransactionType::Debit,
        },
        &connection,
    )
    .unwrap()
    .id;

    LedgerFixture {
        connection,
        user_id,
        checking,
        savings,
        category,
    }
}

impl LedgerFixture {
    pub(crate) fn new_transaction(&self, kind: TransactionKind, amount: Decimal) -> NewTransaction {
        NewTransaction {
            kind,
            description: "Test transaction".to_owned(),
            amount,
            category_id: self.category,
            date: FIXTURE_DATE,
        }
    }

    /// Create a debit from the checking account.
    pub(crate) fn debit(&self, amount: Decimal) -> Transaction {
        self.create(TransactionKind::Debit {
            source_account_id: self.checking,
        }, amount)
    }

    /// Create a credit into the savings account.
    pub(crate) fn credit(&self, amount: Decimal) -> Transaction {
        self.create(TransactionKind::Credit {
            target_account_id: self.savings,
        }, amount)
    }

    /// Create a transfer from checking to savings.
    pub(crate) fn transfer(&self, amount: Decimal) -> Transaction {
        self.create(TransactionKind::Transfer {
            source_account_id: self.checking,
            target_account_id: self.savings,
        }, amount)
    }

    fn create(&self, kind: TransactionKind, amount: Decimal) -> Transaction {
        create_transaction(self.user_id, &self.new_transaction(kind, amount), &self.connection)
            .expect("could not create test transaction")
    }
}
