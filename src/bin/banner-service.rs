use banner_store::app::BannerApp;
use banner_store::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::from_env().unwrap_or_else(|err| err.exit());
    let app = BannerApp::new(config);

    if let Err(err) = app.setup_tracing() {
        eprintln!("Failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    if let Err(err) = app.run().await {
        tracing::error!("Application errored out: {err}");
        eprintln!("Application errored out: {err}");
        std::process::exit(1);
    }
}
