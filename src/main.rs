//! Seatwise operator tool
//!
//! Runs migrations and drives the admission engine from the command line.

use anyhow::{bail, Context};
use tracing::{error, info};

use seatwise::{
    config::Settings,
    database::{connection::{create_pool, run_migrations, PoolConfig}},
    models::EnrollmentScope,
    services::ServiceFactory,
    utils::logging,
};

const USAGE: &str = "usage: seatwise <migrate | health | register EVENT USER | cancel EVENT USER | roster EVENT | enrollments USER [upcoming] | events | activate EVENT | deactivate EVENT | block USER | unblock USER | blocked>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("loading settings")?;
    settings.validate()?;
    
    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    info!("{} starting command {}", seatwise::info(), command);

    let pool = create_pool(&PoolConfig::from(&settings.database)).await?;

    if command == "migrate" {
        run_migrations(&pool).await?;
        println!("migrations applied");
        return Ok(());
    }

    let services = ServiceFactory::new(&settings, pool).await?;

    match command {
        "health" => {
            let status = services.health_check().await;
            for issue in status.get_issues() {
                error!(issue = %issue, "Health check issue");
            }
            if !status.is_healthy() {
                bail!("unhealthy: {}", status.get_issues().join(", "));
            }
            println!("ok");
        }
        "register" => {
            let (event_id, user_id) = (id_arg(&args, 1)?, id_arg(&args, 2)?);
            let outcome = services.engine.register(event_id, user_id).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        "cancel" => {
            let (event_id, user_id) = (id_arg(&args, 1)?, id_arg(&args, 2)?);
            let outcome = services.engine.cancel(event_id, user_id).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        "roster" => {
            let roster = services.engine.roster(id_arg(&args, 1)?).await?;
            println!("{}", serde_json::to_string_pretty(&roster)?);
        }
        "enrollments" => {
            let scope = match args.get(2).map(String::as_str) {
                None => EnrollmentScope::All,
                Some("upcoming") => EnrollmentScope::Upcoming,
                Some(other) => bail!("unknown enrollment scope {:?}\n{}", other, USAGE),
            };
            let enrollments = services.engine.user_enrollments(id_arg(&args, 1)?, scope).await?;
            println!("{}", serde_json::to_string_pretty(&enrollments)?);
        }
        "events" => {
            let events = services.database.events.list_upcoming(None).await?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        "activate" | "deactivate" => {
            let event = services
                .database
                .events
                .set_active(id_arg(&args, 1)?, command == "activate")
                .await?;
            println!("{}", serde_json::to_string(&event)?);
        }
        "block" => {
            let user = services.database.block_user(id_arg(&args, 1)?).await?;
            println!("{}", serde_json::to_string(&user)?);
        }
        "unblock" => {
            let user = services.database.unblock_user(id_arg(&args, 1)?).await?;
            println!("{}", serde_json::to_string(&user)?);
        }
        "blocked" => {
            let users = services.database.users.list_blocked().await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
        other => bail!("unknown command {:?}\n{}", other, USAGE),
    }

    Ok(())
}

fn id_arg(args: &[String], index: usize) -> anyhow::Result<i64> {
    let raw = args
        .get(index)
        .with_context(|| format!("missing argument {}\n{}", index, USAGE))?;
    raw.parse()
        .with_context(|| format!("argument {} must be an integer id, got {:?}", index, raw))
}
