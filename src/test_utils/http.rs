use std::{collections::HashMap, sync::Arc};

use axum_test::TestServer;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::Date;

use crate::{
    AppState,
    exchange_rate::{Currency, FixedClock, StaticRateProvider},
    routing::build_router,
};

/// Build an [AppState] around `connection` whose provider always returns
/// `rates` and whose clock is stuck on `today`.
pub(crate) fn get_test_state(
    connection: Connection,
    rates: &[(Currency, Decimal)],
    today: Date,
) -> AppState {
    let rates: HashMap<Currency, Decimal> = rates.iter().copied().collect();

    AppState::new(
        connection,
        Arc::new(StaticRateProvider::new(rates)),
        Arc::new(FixedClock(today)),
    )
    .expect("Could not create app state.")
}

pub(crate) fn get_test_server(state: AppState) -> TestServer {
    TestServer::new(build_router(state))
}
