use anyhow::{Context, Result};
use itgenie::{api, config, logging, rag::RagService};
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(config::load().context("failed to load configuration")?);
    logging::init_tracing(config.log_file.as_deref());

    let service = RagService::connect(config.clone())
        .await
        .with_context(|| {
            format!(
                "failed to prepare Qdrant collection '{}'",
                config.qdrant_collection_name
            )
        })?;
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    for port in DEFAULT_PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
