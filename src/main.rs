use anyhow::Context;
use readshelf_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load readshelf settings")?;
    readshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        port = settings.server.port,
        "readshelf-app bootstrap starting"
    );

    readshelf_app::run(settings).await
}
