use std::net::SocketAddr;

use studyhub::coordinator::handlers::router;
use studyhub::coordinator::registry::StorageRegistry;

// A current-thread runtime: all handlers run on one control loop, so
// operations against a given storage name never observably interleave.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --bind <addr:port> [--register <name>[=<descriptor>]]", args[0]);
        eprintln!("Example: {} --bind 127.0.0.1:6000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:6000 --register shared=memory",
            args[0]
        );
        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut preregister: Vec<(String, Option<String>)> = vec![];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--register" => {
                let spec = &args[i + 1];
                match spec.split_once('=') {
                    Some((name, descriptor)) => {
                        preregister.push((name.to_string(), Some(descriptor.to_string())));
                    }
                    None => preregister.push((spec.clone(), None)),
                }
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");

    tracing::info!("Starting coordinator on {}", bind_addr);

    let registry = StorageRegistry::new();
    for (name, descriptor) in preregister {
        registry
            .register(&name, descriptor.as_deref())
            .map_err(|e| anyhow::anyhow!("pre-registration of {:?} failed: {}", name, e))?;
    }

    let app = router(registry.clone());

    let stats_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));

        loop {
            interval.tick().await;
            tracing::info!("Coordinator stats: {} registered storage(s)", stats_registry.len());
        }
    });

    tracing::info!("Coordinator listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
