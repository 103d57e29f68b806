use castway_auth::services::youtube::BroadcastFilter;
use castway_auth::{
    BuiltinCredentials, ClientCredentials, JsonFileStore, OutputConfig, ServiceRegistry, store,
};
use eyre::Context;
use std::io::IsTerminal;
use tokio_stream::StreamExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Signs into a service and prints what the host would see: the channel,
/// the stream settings, and (for YouTube) the broadcast list.
///
/// Client credentials come from the environment:
/// `CASTWAY_TWITCH_CLIENT_ID`, `CASTWAY_RESTREAM_CLIENT_ID` /
/// `CASTWAY_RESTREAM_CLIENT_SECRET`, `CASTWAY_YOUTUBE_CLIENT_ID` /
/// `CASTWAY_YOUTUBE_CLIENT_SECRET`.
#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let service = std::env::args().nth(1).unwrap_or_else(|| "Twitch".into());

    let creds = BuiltinCredentials {
        twitch: std::env::var("CASTWAY_TWITCH_CLIENT_ID")
            .ok()
            .map(ClientCredentials::public),
        restream: client_from_env("CASTWAY_RESTREAM_CLIENT_ID", "CASTWAY_RESTREAM_CLIENT_SECRET"),
        youtube: client_from_env("CASTWAY_YOUTUBE_CLIENT_ID", "CASTWAY_YOUTUBE_CLIENT_SECRET"),
    };

    let store = store::shared(JsonFileStore::open("castway-auth.json"));
    let registry = ServiceRegistry::with_builtin_services(store, creds);

    let Some(session) = registry
        .login(&service)
        .await
        .with_context(|| format!("sign into {service}"))?
    else {
        eprintln!("no registered backend matches {service:?}; nothing to authenticate");
        return Ok(());
    };

    let info = session.channel_info().await.context("fetch channel info")?;
    eprintln!("==> {} ({})", info.display_name, info.id);

    let mut output = OutputConfig::default();
    session
        .on_stream_configured(&mut output)
        .await
        .context("apply stream settings")?;
    if !output.key.is_empty() {
        eprintln!("server : {}", output.server);
        eprintln!("key    : {}…", &output.key[..output.key.len().min(6)]);
    }

    if let Some(broadcasts) = session.broadcasts() {
        eprintln!("==> broadcasts");
        let list = broadcasts.list_broadcasts(BroadcastFilter::All);
        let mut list = std::pin::pin!(list);
        while let Some(broadcast) = list.next().await {
            let broadcast = broadcast.context("fetch broadcast")?;
            eprintln!(
                "{:>9} : {} ({})",
                broadcast.status.life_cycle_status.to_string(),
                broadcast.snippet.title,
                broadcast.id,
            );
        }
    }

    session.save();
    Ok(())
}

fn client_from_env(id_var: &str, secret_var: &str) -> Option<ClientCredentials> {
    let id = std::env::var(id_var).ok()?;
    let secret = std::env::var(secret_var).ok()?;
    Some(ClientCredentials::new(id, secret))
}
