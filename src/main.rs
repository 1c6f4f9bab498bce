use clap::Parser;
use tracing_subscriber::{FmtSubscriber, EnvFilter};

use vfs::{cli, config, error, state};

fn main() {
    use tokio::runtime::Builder;

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .expect("failed to initialize global tracing subscriber");

    let rt = match Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .max_blocking_threads(4)
        .build() {
        Ok(rt) => rt,
        Err(err) => {
            panic!("failed to start tokio runtime. {}", err);
        }
    };

    tracing::debug!("started tokio runtime");

    if let Err(err) = rt.block_on(init()) {
        tracing::error!("{err}");

        std::process::exit(1);
    }
}

async fn init() -> error::Result<()> {
    let args = config::CliArgs::parse();
    let config = config::Config::from_args(&args)?;
    let state = state::Shared::from_config(&config)?;
    let ctx = state.context(&args.user);

    tracing::debug!("running as user {} role {:?}", ctx.user_id, ctx.role);

    cli::run(&state, &ctx, args.command).await
}
