use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use hotposts::{
    application::{error::AppError, posts::PostService, repos::PostsRepo},
    cache::{
        CacheMaterializer, MemoryRanking, PopularCache, PopularityConfig, RankingBackend,
        RankingStore, VisitRecorder,
    },
    config,
    infra::{
        db::{PostgresRanking, PostgresRepositories},
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::{net::TcpListener, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

struct ApplicationContext {
    http_state: HttpState,
    materializer: Arc<CacheMaterializer>,
    pg_ranking: Option<PostgresRanking>,
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    warm_popular_cache(&app).await;

    serve_http(&settings, app.http_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "hotposts::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| {
            InfraError::configuration(
                "database url is not configured (set --database-url or HOTPOSTS__DATABASE__URL)",
            )
        })
        .map_err(AppError::from)?;

    PostgresRepositories::connect_with(&settings.database, database_url)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let popularity = PopularityConfig::from(&settings.ranking);
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();

    let (ranking, pg_ranking): (Arc<dyn RankingStore>, Option<PostgresRanking>) =
        match popularity.backend {
            RankingBackend::Memory => (Arc::new(MemoryRanking::new()), None),
            RankingBackend::Postgres => {
                let store = repositories.ranking();
                (Arc::new(store.clone()), Some(store))
            }
        };

    info!(
        target = "hotposts::startup",
        backend = popularity.backend.as_str(),
        limit = popularity.effective_limit(),
        "popular posts cache configured"
    );

    let materializer = Arc::new(CacheMaterializer::new(
        ranking.clone(),
        posts_repo.clone(),
        Arc::new(PopularCache::new()),
        popularity.effective_limit(),
    ));
    let recorder = Arc::new(VisitRecorder::new(ranking, materializer.clone()));
    let posts = Arc::new(PostService::new(posts_repo, recorder));

    ApplicationContext {
        http_state: HttpState {
            posts,
            db: Some(repositories),
        },
        materializer,
        pg_ranking,
    }
}

/// Fill the popular cache from whatever ranking survived the restart.
async fn warm_popular_cache(app: &ApplicationContext) {
    if let Some(ranking) = app.pg_ranking.as_ref() {
        match ranking.prune_missing().await {
            Ok(0) => {}
            Ok(pruned) => info!(
                target = "hotposts::startup",
                pruned, "dropped ranking entries for deleted posts"
            ),
            Err(err) => warn!(
                target = "hotposts::startup",
                error = %err,
                "failed to prune ranking entries"
            ),
        }
    }

    match app.materializer.rebuild().await {
        Ok(entries) => info!(target = "hotposts::startup", entries, "popular cache warmed"),
        Err(err) => warn!(
            target = "hotposts::startup",
            error = %err,
            "popular cache warmup failed; continuing with an empty cache"
        ),
    }
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "hotposts::startup", addr = %settings.server.addr, "listening");

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router)
        .with_graceful_shutdown({
            let stop = stop.clone();
            async move { stop.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => stop.notify_one(),
    }

    drain(server, settings.server.graceful_shutdown).await
}

async fn drain<F>(server: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    info!(target = "hotposts::shutdown", grace_secs = grace.as_secs(), "draining connections");
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(target = "hotposts::shutdown", "graceful shutdown timed out");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
