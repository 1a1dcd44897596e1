//! Build a small web image on a local engine.
//!
//! ```text
//! STEVEDORE_SHARED_ROOT=/tmp/stevedore cargo run -p stevedore-core --example build_image
//! ```

use stevedore_core::{Binding, Host, HostConfig, Mounts};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("stevedore_core=info".parse()?)
                .add_directive("stevedore_engine=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = HostConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");
    let host = Host::connect(config)?;

    // Sources live next to the shared root so the demo is self-contained
    let src = host.shared_root().join("demo-src");
    tokio::fs::create_dir_all(&src).await?;
    tokio::fs::write(
        src.join("index.mjs"),
        "import http from 'node:http';\n\
         http.createServer((_, res) => res.end('hello\\n')).listen(3000);\n",
    )
    .await?;

    let mut mounts = Mounts::new();
    mounts.insert("src".into(), Binding::host(src.display().to_string()));
    mounts.insert("app".into(), Binding::defaults());

    let mut builder = host
        .image("node:20-alpine")
        .open_container(&host, "stevedore-demo", &mounts)
        .await?;

    let image = builder
        .script()
        .copy("app:index.mjs", "src:index.mjs")
        .cwd("app:")
        .execute(["node", "--check", "index.mjs"])
        .env("NODE_ENV", "production")
        .expose(3000, Some("http"))
        .entry(["node", "index.mjs"], Some("serve hello on port 3000"))
        .commit(Some("v1"), Some("stevedore-demo"))
        .await?;

    tracing::info!(image = %image, id = ?image.id(), "Build finished");

    if builder.remove().await {
        tracing::info!("Builder container removed");
    }
    Ok(())
}
