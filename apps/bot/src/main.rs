use std::{sync::Arc, time::Duration};

use anyhow::Result;
use bot::{
    Data, Error,
    alerts::DiscordAlertSink,
    command::{self, help::help, stock::stock_command},
    config::Config,
    web::{self, WebState},
};
use poise::{Framework, FrameworkError, FrameworkOptions};
use serenity::all::{ActivityData, ChannelId, ClientBuilder, FullEvent, GatewayIntents, Interaction};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let data = Data::from_config(&config).await?;

    info!(
        tracked = data.symbol_store.len().await,
        threshold = data.monitor.threshold(),
        interval_secs = config.monitor_interval.as_secs(),
        "state loaded"
    );

    let intents = GatewayIntents::non_privileged();
    let commands = vec![stock_command(), help()];

    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |serenity_ctx, event, _framework_ctx, data| {
                Box::pin(async move {
                    if let FullEvent::InteractionCreate { interaction, .. } = event
                        && let Interaction::Component(component) = interaction
                        && let Err(e) =
                            command::stock::handle_component(serenity_ctx, data, component).await
                    {
                        warn!(error = ?e, "component interaction failed");
                    }
                    Ok(())
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            commands,
            ..Default::default()
        })
        .setup({
            let data = data.clone();
            let config = config.clone();

            move |ctx, ready, framework| {
                Box::pin(async move {
                    info!(user = %ready.user.name, user_id = %ready.user.id, "connected");

                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    let ctx_clone = ctx.clone();
                    tokio::spawn(async move {
                        let mut show_version = true;
                        let mut tick = tokio::time::interval(Duration::from_secs(30));

                        loop {
                            tick.tick().await;

                            let text = if show_version {
                                if config.version.starts_with('v') {
                                    config.version.clone()
                                } else {
                                    format!("Version - {}", config.version)
                                }
                            } else {
                                let now = chrono::Local::now();
                                format!("Time - {}", now.format("%H:%M (%:z)"))
                            };

                            ctx_clone.set_activity(Some(ActivityData::custom(text)));
                            show_version = !show_version;
                        }
                    });

                    Ok(data)
                })
            }
        })
        .build();

    let mut client = ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await?;

    let sink = Arc::new(DiscordAlertSink::new(
        client.http.clone(),
        ChannelId::new(config.alert_channel_id),
        Arc::clone(&data.preferences),
    ));

    let mut sched = JobScheduler::new().await?;

    sched
        .add(Job::new_repeated_async(
            config.monitor_interval,
            move |_uuid, _l| {
                let data = data.clone();
                let sink = Arc::clone(&sink);

                Box::pin(async move {
                    let symbols = data.symbol_store.list().await;
                    data.monitor
                        .tick(&data.market, &symbols, sink.as_ref())
                        .await;
                })
            },
        )?)
        .await?;

    sched.shutdown_on_ctrl_c();
    sched.start().await?;

    let web_state = WebState::from_config(&config);
    let (host, port) = (config.web_host.clone(), config.web_port);
    tokio::spawn(async move {
        if let Err(e) = web::serve(&host, port, web_state).await {
            error!(error = ?e, "status server stopped");
        }
    });

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(why) = client.start().await {
            error!(error = ?why, "client error");
        }
    });

    shutdown_signal().await?;

    info!("shutting down");
    shard_manager.shutdown_all().await;
    if let Err(e) = sched.shutdown().await {
        warn!(error = ?e, "scheduler shutdown failed");
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn on_error(error: FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            error!(command = %ctx.command().qualified_name, error = ?error, "command failed");
            if let Err(e) = ctx.say(format!("❌ {error}")).await {
                warn!(error = ?e, "could not report command failure");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                warn!(error = ?e, "error handler failed");
            }
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
