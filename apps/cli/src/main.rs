//! Keygate operator command line.

#![forbid(unsafe_code)]

mod config;

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use keygate_application::{
    BulkOutcome, BulkPermissionService, EdgeListQuery, OwnerLocks, PermissionAssignmentService,
    PermissionCatalogService, PermissionQuery, PermissionResolver,
};
use keygate_core::{AppError, AppResult, Clock, PermissionId, RoleId, SystemClock, UserId};
use keygate_domain::EdgeOwner;
use keygate_infrastructure::{
    MIGRATOR, PostgresPermissionCatalogRepository, PostgresPermissionEdgeRepository,
    PostgresRoleMembershipRepository,
};

use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

const USAGE: &str = "usage: keygate-cli <migrate | check <user_id> <code> [resource] | \
effective <user_id> | permissions [module] | role-edges <role_id> | \
sync-role <role_id> <permission_id>... | copy-role <source_role_id> <target_role_id>>";

const OPERATOR: &str = "keygate-cli";

struct Services {
    catalog: PermissionCatalogService,
    assignments: PermissionAssignmentService,
    bulk: BulkPermissionService,
    resolver: PermissionResolver,
}

#[derive(Debug, Serialize)]
struct BulkReport {
    owner: String,
    #[serde(flatten)]
    outcome: BulkOutcome,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        return Err(AppError::Validation(USAGE.to_owned()));
    };

    let config = CliConfig::load()?;
    let pool = connect_pool(&config).await?;

    if command == "migrate" {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
        info!("keygate migrations applied");
        return Ok(());
    }

    let services = build_services(pool, &config);
    let rest = &args[1..];
    match command {
        "check" => {
            let (user_id, code) = match rest {
                [user_id, code, ..] => (UserId::from_str(user_id)?, code.as_str()),
                _ => return Err(AppError::Validation(USAGE.to_owned())),
            };
            let resource = rest.get(2).map(String::as_str);
            let decision = services
                .resolver
                .has_permission(user_id, code, resource)
                .await?;
            print_json(&decision)
        }
        "effective" => {
            let [user_id] = rest else {
                return Err(AppError::Validation(USAGE.to_owned()));
            };
            let effective = services
                .resolver
                .effective_permissions(UserId::from_str(user_id)?)
                .await?;
            print_json(&effective)
        }
        "permissions" => {
            let permissions = services
                .catalog
                .query(permission_listing(rest.first().cloned(), &config))
                .await?;
            print_json(&permissions)
        }
        "role-edges" => {
            let [role_id] = rest else {
                return Err(AppError::Validation(USAGE.to_owned()));
            };
            let page = services
                .assignments
                .list(
                    EdgeOwner::Role(RoleId::from_str(role_id)?),
                    EdgeListQuery::default(),
                )
                .await?;
            print_json(&page)
        }
        "sync-role" => {
            let Some((role_id, permission_ids)) = rest.split_first() else {
                return Err(AppError::Validation(USAGE.to_owned()));
            };
            let owner = EdgeOwner::Role(RoleId::from_str(role_id)?);
            let permission_ids = permission_ids
                .iter()
                .map(|value| PermissionId::from_str(value))
                .collect::<AppResult<Vec<_>>>()?;
            let outcome = services.bulk.sync(owner, permission_ids, OPERATOR).await?;
            print_json(&BulkReport {
                owner: owner.to_string(),
                outcome,
            })
        }
        "copy-role" => {
            let [source, target] = rest else {
                return Err(AppError::Validation(USAGE.to_owned()));
            };
            let source = EdgeOwner::Role(RoleId::from_str(source)?);
            let target = EdgeOwner::Role(RoleId::from_str(target)?);
            let outcome = services.bulk.copy(source, target, OPERATOR).await?;
            print_json(&BulkReport {
                owner: target.to_string(),
                outcome,
            })
        }
        _ => Err(AppError::Validation(format!(
            "unknown command '{command}'; {USAGE}"
        ))),
    }
}

async fn connect_pool(config: &CliConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_services(pool: PgPool, config: &CliConfig) -> Services {
    let catalog = Arc::new(PostgresPermissionCatalogRepository::new(pool.clone()));
    let edges = Arc::new(PostgresPermissionEdgeRepository::new(pool.clone()));
    let memberships = Arc::new(PostgresRoleMembershipRepository::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let locks = Arc::new(OwnerLocks::new());

    Services {
        catalog: PermissionCatalogService::new(catalog.clone(), clock.clone(), config.paging),
        assignments: PermissionAssignmentService::new(
            catalog.clone(),
            edges.clone(),
            clock.clone(),
            config.paging,
            locks.clone(),
        ),
        bulk: BulkPermissionService::new(catalog.clone(), edges.clone(), clock.clone(), locks),
        resolver: PermissionResolver::new(catalog, edges, memberships, clock, config.resolution),
    }
}

fn permission_listing(module: Option<String>, config: &CliConfig) -> PermissionQuery {
    PermissionQuery {
        module,
        limit: config.paging.default_page_size(),
        ..PermissionQuery::default()
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
