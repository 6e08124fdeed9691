use stowage_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under streaming load,
// especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Initialize the application (tracing, database, storage, services, routes)
    let (_state, router) = stowage_api::setup::initialize_app(config.clone()).await?;

    stowage_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
