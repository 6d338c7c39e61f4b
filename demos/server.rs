//! Demo server: two services on 127.0.0.1:9000.
//!
//! Run with `cargo run --example demo-server`, then start the client demo
//! in another terminal.

use std::sync::Arc;
use std::time::Duration;

use wirecall::{Outcome, Server, Service, ServiceRegistry, Value, ValueKind};

#[tokio::main]
async fn main() -> wirecall::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let service1 = Service::builder("service1")
        .method("sleep", &[ValueKind::I64], |args: Vec<Value>| async move {
            let millis = args[0].as_i64().ok_or("sleep expects milliseconds")?;
            tokio::time::sleep(Duration::from_millis(millis as u64)).await;
            Ok(Outcome::Void)
        })
        .method("now", &[], |_args: Vec<Value>| async move {
            Ok(Outcome::Value(Value::now()))
        })
        .build();

    let service2 = Service::builder("service2")
        .method(
            "multiply",
            &[ValueKind::I32, ValueKind::I32],
            |args: Vec<Value>| async move {
                let a = args[0].as_i32().ok_or("multiply expects i32 operands")?;
                let b = args[1].as_i32().ok_or("multiply expects i32 operands")?;
                Ok(Outcome::Value(Value::I32(a * b)))
            },
        )
        .build();

    let registry = Arc::new(
        ServiceRegistry::builder()
            .register(service1)
            .register(service2)
            .build(),
    );

    let server = Server::bind("127.0.0.1:9000", registry).await?;
    tracing::info!(addr = %server.local_addr()?, "server listening");
    server.run().await
}
