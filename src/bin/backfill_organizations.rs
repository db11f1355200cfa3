//! Rewrites legacy verdict rows (no organization, keyed by tender name) into
//! the current keyed shape, using the tender corpus to recover organizations.

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::FromRow;
use std::env;
use tenderec_api::models::{TenderKey, VERDICT_SCHEMA_VERSION};
use tenderec_api::tender_source::TenderCatalog;

#[derive(Debug, FromRow)]
struct LegacyVerdict {
    company_id: String,
    tender_key: String,
    tender_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = env::var("DB_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL must be set"))?;
    let tenders_path =
        env::var("TENDERS_PATH").unwrap_or_else(|_| "resources/tenders.json".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let catalog = TenderCatalog::load(&tenders_path)?;

    tracing::info!("Starting organization backfill of legacy verdicts...");

    let legacy: Vec<LegacyVerdict> = sqlx::query_as(
        r#"
        SELECT company_id, tender_key, tender_name
        FROM recommendations
        WHERE organization IS NULL
        ORDER BY company_id, tender_name
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let total = legacy.len();
    tracing::info!("Found {} legacy verdicts to process.", total);

    let mut migrated_count = 0;
    let mut skipped_count = 0;
    let mut error_count = 0;

    for row in legacy {
        let organization = match catalog.organization_of(&row.tender_name) {
            Some(org) => org,
            None => {
                tracing::warn!(
                    "Skipping '{}' for '{}' (not in corpus or published by several organizations)",
                    row.tender_name,
                    row.company_id
                );
                skipped_count += 1;
                continue;
            }
        };
        let key = TenderKey::new(&organization, &row.tender_name);

        let mut tx = match pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::error!("Failed to start transaction: {}", e);
                error_count += 1;
                continue;
            }
        };

        // A keyed row written after the legacy one is newer and wins.
        let insert_result = sqlx::query(
            r#"
            INSERT INTO recommendations (
                company_id, tender_key, tender_name, organization,
                name_match, name_reason, industry_match, industry_reason,
                schema_version, created_at
            )
            SELECT company_id, $3, tender_name, $4,
                   name_match, name_reason, industry_match, industry_reason,
                   $5, created_at
            FROM recommendations
            WHERE company_id = $1 AND tender_key = $2
            ON CONFLICT (company_id, tender_key) DO NOTHING
            "#,
        )
        .bind(&row.company_id)
        .bind(&row.tender_key)
        .bind(key.as_str())
        .bind(&organization)
        .bind(VERDICT_SCHEMA_VERSION)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert_result {
            tracing::error!("Failed to rewrite verdict '{}': {}", row.tender_name, e);
            error_count += 1;
            continue;
        }

        let delete_result =
            sqlx::query("DELETE FROM recommendations WHERE company_id = $1 AND tender_key = $2")
                .bind(&row.company_id)
                .bind(&row.tender_key)
                .execute(&mut *tx)
                .await;

        if let Err(e) = delete_result {
            tracing::error!("Failed to retire legacy verdict '{}': {}", row.tender_name, e);
            error_count += 1;
            continue;
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(
                "Failed to commit transaction for '{}': {}",
                row.tender_name,
                e
            );
            error_count += 1;
        } else {
            migrated_count += 1;
            if migrated_count % 100 == 0 {
                tracing::info!("Backfilled {} verdicts...", migrated_count);
            }
        }
    }

    tracing::info!("Backfill complete.");
    tracing::info!("Backfilled: {}", migrated_count);
    tracing::info!("Skipped (organization unknown): {}", skipped_count);
    tracing::info!("Errors: {}", error_count);

    Ok(())
}
