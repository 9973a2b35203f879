//! `ploy get` command implementation

use anyhow::{Context as _, Result};
use unicode_width::UnicodeWidthStr;

use super::Context;
use crate::engine::Engine;
use crate::session::SessionListing;

const HEADERS: [&str; 4] = ["Name", "Last Update", "Deployment Info", "URL"];

pub async fn run<E: Engine>(ctx: &Context<E>) -> Result<()> {
    let org = ctx.org()?;
    let listings = ctx
        .client
        .list_sessions(org, &ctx.config.project)
        .await
        .context("Failed to list deployments")?;

    if listings.is_empty() {
        println!("No ploy apps currently deployed");
        return Ok(());
    }

    print!("{}", render_table(&listings));
    Ok(())
}

pub fn render_table(listings: &[SessionListing]) -> String {
    let rows: Vec<[String; 4]> = listings
        .iter()
        .map(|listing| {
            [
                listing.name.clone(),
                last_update(listing),
                deployment_info(listing),
                listing
                    .endpoint()
                    .map(|endpoint| endpoint.url())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.width());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    let mut out = String::new();
    out.push_str(&separator);
    out.push_str(&format_row(&HEADERS.map(str::to_uppercase), &widths));
    out.push_str(&separator);
    for row in &rows {
        out.push_str(&format_row(row, &widths));
    }
    out.push_str(&separator);
    out
}

fn last_update(listing: &SessionListing) -> String {
    if listing.updating {
        return "in progress".to_string();
    }
    listing.last_update.clone().unwrap_or_default()
}

fn deployment_info(listing: &SessionListing) -> String {
    match (&listing.info, listing.resources) {
        (Some(url), Some(count)) => format!("{} ({} resources)", url, count),
        (Some(url), None) => url.clone(),
        (None, Some(count)) => format!("{} resources", count),
        (None, None) => String::new(),
    }
}

fn format_row(cells: &[String; 4], widths: &[usize; 4]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        let padding = width.saturating_sub(cell.width());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(padding + 1));
        line.push('|');
    }
    line.push('\n');
    line
}
