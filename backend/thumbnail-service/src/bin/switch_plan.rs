//! Operator command: bind a user to a plan, replacing any existing binding
//!
//! Usage: switch-plan --user-id <uuid> --plan <title>

use anyhow::{bail, Context};
use uuid::Uuid;

use thumbnail_service::db::{self, PgPlanCatalog};
use thumbnail_service::Config;

struct Args {
    user_id: Uuid,
    plan: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut user_id = None;
    let mut plan = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--user-id" => {
                let value = args.next().context("--user-id requires a value")?;
                user_id = Some(Uuid::parse_str(&value).context("--user-id must be a UUID")?);
            }
            "--plan" => {
                plan = Some(args.next().context("--plan requires a value")?);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(Args {
        user_id: user_id.context("--user-id is required")?,
        plan: plan.context("--plan is required")?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let pool = db::connect(&config.database).await?;
    let catalog = PgPlanCatalog::new(pool);

    let plan = match catalog.plan_by_title(&args.plan).await? {
        Some(plan) => plan,
        None => {
            let titles = catalog.plan_titles().await?;
            bail!(
                "plan with \"{}\" title does not exist\navailable plans: {}",
                args.plan,
                titles.join(",")
            );
        }
    };

    catalog.bind_user_plan(args.user_id, plan.id).await?;
    println!("Successfully changed plan");
    Ok(())
}
