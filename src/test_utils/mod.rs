#![allow(missing_docs)]

pub(crate) mod fixture;
pub(crate) mod http;

pub(crate) use fixture::{FIXTURE_DATE, LedgerFixture, get_fixture};
pub(crate) use http::{get_test_server, get_test_state};
