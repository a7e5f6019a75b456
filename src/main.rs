use std::sync::Arc;

use clap::Parser;

use trustlayer::auth::migration::migrate_legacy_salts;
use trustlayer::auth::tokens::TokenMatcher;
use trustlayer::config::{Args, Command, Config};
use trustlayer::db::handlers::{PgIdentityStore, PgPaymentLogStore, PgTokenStore};
use trustlayer::payments::reconciler::PaymentReconciler;
use trustlayer::{db, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry()?;
    tracing::debug!("{:?}", args);

    let Some(command) = args.command else {
        anyhow::bail!("no subcommand given, see --help for the available jobs");
    };

    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("database_url is not configured (set DATABASE_URL or the config file)"))?;
    let pool = db::connect(database_url).await?;

    match command {
        Command::MigrateSalts => {
            let store = PgIdentityStore::new(pool);
            let report = migrate_legacy_salts(&store).await?;
            println!(
                "salt migration: {} migrated, {} skipped, {} failed",
                report.migrated, report.skipped, report.failed
            );
            if report.failed > 0 {
                anyhow::bail!("{} identities failed to migrate, re-run to retry", report.failed);
            }
        }
        Command::PurgeTokens => {
            let matcher = TokenMatcher::new(
                Arc::new(PgTokenStore::new(pool.clone())),
                Arc::new(PgIdentityStore::new(pool)),
                config.tokens.clone(),
            );
            let removed = matcher.purge_expired().await?;
            println!("purged {removed} expired tokens");
        }
        Command::ReconcilePayments => {
            let reconciler = PaymentReconciler::new(Arc::new(PgPaymentLogStore::new(pool)));
            let report = reconciler.reconcile().await?;
            println!(
                "payment reconciliation: {} duplicate groups, {} rows cleared, {} failures",
                report.duplicate_groups_found, report.records_cleared, report.failures
            );
            if report.failures > 0 {
                anyhow::bail!("{} rows failed to reconcile, re-run to retry", report.failures);
            }
        }
    }

    Ok(())
}
