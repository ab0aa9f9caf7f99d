#![allow(dead_code)]

use once_cell::sync::Lazy;
use twin_gateway_core::TwinGateway;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
});

pub fn init() {
    Lazy::force(&TRACING);
}

/// Wait until every previously submitted command, including its event
/// fan-out, has run. Relies on FIFO execution: a no-op submitted now cannot
/// run before earlier commands have finished notifying.
pub async fn flush(gateway: &TwinGateway) {
    gateway
        .engine()
        .submit(|_| Ok(()))
        .await
        .await
        .expect("engine alive");
}
