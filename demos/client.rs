//! Demo client: ten concurrent callers hammering one shared connection.
//!
//! Start the server demo first, then run `cargo run --example demo-client`.

use std::sync::Arc;

use wirecall::{RpcClient, Value};

#[tokio::main]
async fn main() -> wirecall::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let client = Arc::new(RpcClient::connect("127.0.0.1:9000").await?);

    let mut callers = Vec::new();
    for i in 1..=10i32 {
        let client = client.clone();
        callers.push(tokio::spawn(async move {
            let outcome = client
                .call("service1", "sleep", vec![Value::I64(100)])
                .await?;
            tracing::info!(caller = i, void = outcome.is_void(), "sleep finished");

            let outcome = client.call("service1", "now", vec![]).await?;
            tracing::info!(caller = i, now = %outcome.value().map(ToString::to_string).unwrap_or_default(), "server time");

            let outcome = client
                .call("service2", "multiply", vec![Value::I32(10), Value::I32(15)])
                .await?;
            tracing::info!(caller = i, result = ?outcome.value(), "multiply(10, 15)");

            // A miss on purpose, to show per-request errors leave the
            // connection alive for everyone else.
            if let Err(err) = client.call("wrongService", "multiply", vec![]).await {
                tracing::warn!(caller = i, %err, "expected failure");
            }

            wirecall::Result::Ok(())
        }));
    }

    for caller in callers {
        caller.await.map_err(|e| {
            wirecall::RpcError::InvocationFailure(format!("caller task failed: {e}"))
        })??;
    }

    tracing::info!("all callers finished");
    Ok(())
}
