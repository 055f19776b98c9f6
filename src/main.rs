use std::sync::Arc;

use geoimage_api::{routes, Config, Error, ImageDB, ImageStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().await?;

    let db = Arc::new(ImageDB::new(&config).await?);
    let store = ImageStore::init(&config.upload_dir).await?;

    let (addr, server) =
        warp::serve(routes(db, store)).bind_with_graceful_shutdown(config.bind_addr()?, async {
            tokio::signal::ctrl_c().await.ok();
        });

    info!("Listening on `http://{addr}`");
    server.await;

    Ok(())
}
