//! A thin demo binary: bootstraps a [`servitor::Runtime`], registers two
//! services, forks work from one service's pool onto the other's (the
//! auxiliary-pool path), feeds a split HTTP request through the
//! incremental parser, then shuts everything down.
//!
//! Grounded on `cloud-component-service/src/server.rs`'s pattern of a
//! `println!("{}", ...)` human-facing summary line at the very end of an
//! otherwise `tracing`-only binary.

use servitor::config::{ConfigLoader, RuntimeConfig};
use servitor::http::{HttpRequest, Protocol};
use servitor::session::SessionContext;
use servitor::Runtime;

fn main() -> anyhow::Result<()> {
    let config = load_config();
    let runtime = Runtime::bootstrap(config)?;

    let ingest = runtime.register_service("ingest", 10)?;
    let billing = runtime.register_service("billing", 5)?;
    let billing_pool = billing.primary_pool().clone();

    let session = SessionContext::new();
    session.put_all(std::collections::HashMap::from([(
        "tenant".to_string(),
        serde_json::Value::from("acme-co"),
    )]));

    let future = runtime.registry().run_and_wait(
        move || {
            let current = SessionContext::current();
            tracing::info!(tenant = ?current.properties().get("tenant"), "ingest bootstrap task running");
            ingest
                .fork_to(
                    || {
                        let tenant = SessionContext::current().properties().get("tenant");
                        tracing::info!(tenant = ?tenant, "forked task observed propagated session on billing's pool");
                        tenant
                    },
                    &billing_pool,
                )
                .and_then(|forked| forked.blocking_recv())
        },
        Some(session),
    )?;

    let request = HttpRequest::new(Protocol::Http);
    for chunk in [
        b"POST /orders HTTP/1.1\r\n".as_slice(),
        b"Host: api.acme.co\r\n",
        b"Content-Length: 11\r\n",
        b"\r\nhello worl",
        b"d",
    ] {
        request.add_data(chunk);
    }

    let tenant_seen_by_billing = tokio_block_on_current_thread(async { future.await? })?;

    println!(
        "order body parsed: complete={} bytes={:?} tenant-seen-by-billing={:?}",
        request.is_complete(),
        request.body().map(|b| b.len()),
        tenant_seen_by_billing
    );

    let errors = runtime.system_shutdown();
    println!("shutdown finished with {errors} hook error(s)");
    std::process::exit(errors);
}

fn load_config() -> RuntimeConfig {
    ConfigLoader::new("config/servitor.toml")
        .load()
        .unwrap_or_else(|_| RuntimeConfig::default())
}

fn tokio_block_on_current_thread<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build demo tokio runtime")
        .block_on(future)
}
