use colored::Colorize;
use comfy_table::Table;
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::Result;
use crate::reports;
use crate::settings::Settings;

fn connect() -> Result<Connection> {
    get_connection(&Settings::from_env(None).db_path)
}

fn ranking_table(ranking: &reports::MonthlyRanking) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Brand", "Receipts scanned"]);
    for brand in &ranking.brands {
        table.add_row(vec![brand.name.clone(), brand.receipts.to_string()]);
    }
    table
}

fn money_or_na(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${v:.2}"),
        None => "n/a".to_string(),
    }
}

pub fn top_brands() -> Result<()> {
    let conn = connect()?;
    let ranking = reports::top_brands_current_month(&conn)?;
    println!("{} ({})", "Top 5 brands by receipts scanned".bold(), ranking.month);
    println!("{}", ranking_table(&ranking));
    Ok(())
}

pub fn month_compare() -> Result<()> {
    let conn = connect()?;
    let (current, previous) = reports::top_brands_month_comparison(&conn)?;
    println!("{} ({})", "Current month".bold(), current.month);
    println!("{}", ranking_table(&current));
    println!("{} ({})", "Previous month".bold(), previous.month);
    println!("{}", ranking_table(&previous));
    Ok(())
}

pub fn spend_by_status() -> Result<()> {
    let conn = connect()?;
    let averages = reports::average_spend_by_status(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["Status", "Average spend"]);
    table.add_row(vec!["Accepted".to_string(), money_or_na(averages.accepted)]);
    table.add_row(vec!["Rejected".to_string(), money_or_na(averages.rejected)]);
    println!("{}", "Average receipt spend by status".bold());
    println!("{table}");
    Ok(())
}

pub fn items_by_status() -> Result<()> {
    let conn = connect()?;
    let totals = reports::items_purchased_by_status(&conn)?;
    let mut table = Table::new();
    table.set_header(vec!["Status", "Items purchased"]);
    table.add_row(vec!["Accepted".to_string(), totals.accepted.to_string()]);
    table.add_row(vec!["Rejected".to_string(), totals.rejected.to_string()]);
    println!("{}", "Items purchased by status".bold());
    println!("{table}");
    Ok(())
}

pub fn top_brand_spend() -> Result<()> {
    let conn = connect()?;
    println!("{}", "Top brand by spend, users created in the last 180 days".bold());
    match reports::top_brand_by_spend_recent_users(&conn)? {
        Some(brand) => println!("{} (${:.2})", brand.name.green(), brand.total_spent),
        None => println!("No matching receipts."),
    }
    Ok(())
}

pub fn top_brand_count() -> Result<()> {
    let conn = connect()?;
    println!("{}", "Top brand by transactions, users created in the last 180 days".bold());
    match reports::top_brand_by_transactions_recent_users(&conn)? {
        Some(brand) => println!("{} ({} transactions)", brand.name.green(), brand.transactions),
        None => println!("No matching receipts."),
    }
    Ok(())
}

pub fn all() -> Result<()> {
    top_brands()?;
    month_compare()?;
    spend_by_status()?;
    items_by_status()?;
    top_brand_spend()?;
    top_brand_count()?;
    Ok(())
}
