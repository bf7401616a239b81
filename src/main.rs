use camera_httpd::config::Config;
use camera_httpd::logger;
use camera_httpd::server::{self, ServerBootstrap};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime; `workers` overrides the CPU core count
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers.max(1));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = ServerBootstrap::launch(cfg)?;

    server::shutdown_signal().await;
    server.stop().await;
    Ok(())
}
