use anyhow::Context;
use contacts_eav::config::{Config, LogFormat};
use contacts_eav::seed::SeedDocument;
use contacts_eav::{Directory, http};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let directory = Directory::open_memory();

    if let Some(path) = &config.seed_file {
        let doc = SeedDocument::from_path(path)
            .with_context(|| format!("could not read seed file {}", path.display()))?;
        directory
            .seed(&doc, config.seed_reset, None)
            .await
            .context("seeding failed")?;
    }

    http::serve(&config, directory).await.context("server error")?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
