//! Log command handler

use std::time::Duration;

use anyhow::Result;
use colored::*;
use rollstack_client::RollstackClient;
use rollstack_core::domain::log::Log;
use rollstack_core::dto::log::{LogPage, LogQuery};
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::{resolve_deployment_id, resolve_stack_id};

const FOLLOW_INTERVAL: Duration = Duration::from_secs(2);

/// Print the latest `limit` lines, then keep polling with the cursor when
/// `follow` is set
pub async fn show_logs(
    config: &Config,
    stack: &str,
    deployment: Option<&str>,
    limit: u32,
    follow: bool,
) -> Result<()> {
    let client = RollstackClient::new(&config.orchestrator_url);
    let stack_id = resolve_stack_id(&client, stack).await?;
    let deployment_id = match deployment {
        Some(id) => Some(resolve_deployment_id(&client, stack_id, id).await?),
        None => None,
    };

    let mut query = LogQuery {
        limit: Some(limit),
        after_id: None,
    };

    let page = fetch(&client, stack_id, deployment_id, &query).await?;
    if page.logs.is_empty() && !follow {
        println!("{}", "No logs found.".yellow());
        return Ok(());
    }
    print_page(&page, &mut query);

    while follow {
        tokio::time::sleep(FOLLOW_INTERVAL).await;
        let page = fetch(&client, stack_id, deployment_id, &query).await?;
        print_page(&page, &mut query);
    }

    Ok(())
}

async fn fetch(
    client: &RollstackClient,
    stack_id: Uuid,
    deployment_id: Option<Uuid>,
    query: &LogQuery,
) -> Result<LogPage> {
    let page = match deployment_id {
        Some(id) => client.get_deployment_logs(stack_id, id, query).await?,
        None => client.get_stack_logs(stack_id, query).await?,
    };
    Ok(page)
}

/// Print a page and move the cursor past it
fn print_page(page: &LogPage, query: &mut LogQuery) {
    for log in &page.logs {
        print_log(log);
    }
    if page.next_cursor.is_some() {
        query.after_id = page.next_cursor;
    }
}

fn print_log(log: &Log) {
    println!(
        "{} {}",
        log.created_at.format("%H:%M:%S").to_string().dimmed(),
        log.message
    );
}
