//! The fixed set of read-only analytics queries. Brand joins go through the
//! unenforced brand_code soft reference; receipts reach users through the
//! equally soft user_id. All aggregation happens in the store.

use chrono::{DateTime, Datelike, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::normalize::TIMESTAMP_FORMAT;

const MONTH_FORMAT: &str = "%Y-%m";

pub struct BrandReceiptCount {
    pub name: String,
    pub receipts: i64,
}

pub struct MonthlyRanking {
    /// YYYY-MM month the ranking covers.
    pub month: String,
    pub brands: Vec<BrandReceiptCount>,
}

/// Average spend for Accepted vs Rejected receipts. `None` means no
/// receipts carried that status.
pub struct StatusAverages {
    pub accepted: Option<f64>,
    pub rejected: Option<f64>,
}

pub struct StatusItemTotals {
    pub accepted: i64,
    pub rejected: i64,
}

pub struct BrandSpend {
    pub name: String,
    pub total_spent: f64,
}

pub struct BrandTransactionCount {
    pub name: String,
    pub transactions: i64,
}

fn ranking_for_month(conn: &Connection, month: &str) -> Result<MonthlyRanking> {
    let mut stmt = conn.prepare(
        "SELECT b.name, COUNT(DISTINCT r.id) AS receipt_count \
         FROM brands b \
         JOIN transactions t ON t.brand_code = b.brand_code \
         JOIN receipts r ON r.id = t.receipt_id \
         WHERE strftime('%Y-%m', r.date_scanned) = ?1 \
         GROUP BY b.name \
         ORDER BY receipt_count DESC \
         LIMIT 5",
    )?;
    let brands: Vec<BrandReceiptCount> = stmt
        .query_map([month], |row| {
            Ok(BrandReceiptCount {
                name: row.get(0)?,
                receipts: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(MonthlyRanking {
        month: month.to_string(),
        brands,
    })
}

fn previous_month(now: DateTime<Utc>) -> String {
    let first_of_month = now
        .date_naive()
        .with_day0(0)
        .unwrap_or_else(|| now.date_naive());
    (first_of_month - Duration::days(1))
        .format(MONTH_FORMAT)
        .to_string()
}

/// Top 5 brands by receipts scanned in the current calendar month.
pub fn top_brands_current_month(conn: &Connection) -> Result<MonthlyRanking> {
    ranking_for_month(conn, &Utc::now().format(MONTH_FORMAT).to_string())
}

/// The same ranking for the current and the previous month, side by side.
/// Two independent result sets, not a merged diff.
pub fn top_brands_month_comparison(conn: &Connection) -> Result<(MonthlyRanking, MonthlyRanking)> {
    let now = Utc::now();
    let current = ranking_for_month(conn, &now.format(MONTH_FORMAT).to_string())?;
    let previous = ranking_for_month(conn, &previous_month(now))?;
    Ok((current, previous))
}

fn scalar_by_status(conn: &Connection, sql: &str, status: &str) -> Result<Option<f64>> {
    Ok(conn.query_row(sql, [status], |row| row.get(0))?)
}

/// Average total_spent for Accepted vs Rejected receipts.
pub fn average_spend_by_status(conn: &Connection) -> Result<StatusAverages> {
    let sql = "SELECT AVG(total_spent) FROM receipts WHERE rewards_receipt_status = ?1";
    Ok(StatusAverages {
        accepted: scalar_by_status(conn, sql, "Accepted")?,
        rejected: scalar_by_status(conn, sql, "Rejected")?,
    })
}

/// Total purchased_item_count for Accepted vs Rejected receipts.
pub fn items_purchased_by_status(conn: &Connection) -> Result<StatusItemTotals> {
    let sql = "SELECT COALESCE(SUM(purchased_item_count), 0) \
               FROM receipts WHERE rewards_receipt_status = ?1";
    let total = |status: &str| -> Result<i64> {
        Ok(conn.query_row(sql, [status], |row| row.get(0))?)
    };
    Ok(StatusItemTotals {
        accepted: total("Accepted")?,
        rejected: total("Rejected")?,
    })
}

fn cohort_cutoff() -> String {
    (Utc::now() - Duration::days(180))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Brand with the highest summed receipt spend among users created in the
/// trailing 180 days.
pub fn top_brand_by_spend_recent_users(conn: &Connection) -> Result<Option<BrandSpend>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, SUM(r.total_spent) AS total_spend \
         FROM brands b \
         JOIN transactions t ON t.brand_code = b.brand_code \
         JOIN receipts r ON r.id = t.receipt_id \
         JOIN users u ON u.id = r.user_id \
         WHERE u.created_date >= ?1 \
         GROUP BY b.name \
         ORDER BY total_spend DESC \
         LIMIT 1",
    )?;
    Ok(stmt
        .query_row([cohort_cutoff()], |row| {
            Ok(BrandSpend {
                name: row.get(0)?,
                total_spent: row.get(1)?,
            })
        })
        .optional()?)
}

/// Brand with the most transactions among the same user cohort.
pub fn top_brand_by_transactions_recent_users(
    conn: &Connection,
) -> Result<Option<BrandTransactionCount>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, COUNT(t.id) AS transaction_count \
         FROM brands b \
         JOIN transactions t ON t.brand_code = b.brand_code \
         JOIN receipts r ON r.id = t.receipt_id \
         JOIN users u ON u.id = r.user_id \
         WHERE u.created_date >= ?1 \
         GROUP BY b.name \
         ORDER BY transaction_count DESC \
         LIMIT 1",
    )?;
    Ok(stmt
        .query_row([cohort_cutoff()], |row| {
            Ok(BrandTransactionCount {
                name: row.get(0)?,
                transactions: row.get(1)?,
            })
        })
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ensure_table, get_connection};
    use crate::schema::Entity;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        for entity in Entity::ALL {
            ensure_table(&conn, entity).unwrap();
        }
        (dir, conn)
    }

    fn now_stamp() -> String {
        Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }

    fn add_brand(conn: &Connection, id: &str, name: &str, code: &str) {
        conn.execute(
            "INSERT INTO brands (id, name, brand_code) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, name, code],
        )
        .unwrap();
    }

    fn add_receipt(conn: &Connection, id: &str, scanned: &str, status: &str, spent: f64, items: i64, user: &str) {
        conn.execute(
            "INSERT INTO receipts (id, date_scanned, rewards_receipt_status, total_spent, purchased_item_count, user_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, scanned, status, spent, items, user],
        )
        .unwrap();
    }

    fn add_transaction(conn: &Connection, receipt: &str, brand_code: &str) {
        conn.execute(
            "INSERT INTO transactions (receipt_id, brand_code) VALUES (?1, ?2)",
            rusqlite::params![receipt, brand_code],
        )
        .unwrap();
    }

    fn add_user(conn: &Connection, id: &str, created: &str) {
        conn.execute(
            "INSERT INTO users (id, created_date) VALUES (?1, ?2)",
            rusqlite::params![id, created],
        )
        .unwrap();
    }

    #[test]
    fn test_top_brands_current_month_ranks_by_receipt_count() {
        let (_dir, conn) = test_db();
        add_brand(&conn, "b1", "Doritos", "DORITOS");
        add_brand(&conn, "b2", "Pepsi", "PEPSI");
        let now = now_stamp();
        for i in 0..3 {
            add_receipt(&conn, &format!("r{i}"), &now, "Accepted", 10.0, 1, "u1");
            add_transaction(&conn, &format!("r{i}"), "DORITOS");
        }
        add_receipt(&conn, "r9", &now, "Accepted", 5.0, 1, "u1");
        add_transaction(&conn, "r9", "PEPSI");

        let ranking = top_brands_current_month(&conn).unwrap();
        assert_eq!(ranking.brands.len(), 2);
        assert_eq!(ranking.brands[0].name, "Doritos");
        assert_eq!(ranking.brands[0].receipts, 3);
        assert_eq!(ranking.brands[1].name, "Pepsi");
    }

    #[test]
    fn test_month_comparison_keeps_months_separate() {
        let (_dir, conn) = test_db();
        add_brand(&conn, "b1", "Doritos", "DORITOS");
        let current = now_stamp();
        let previous = format!("{}-15 12:00:00", previous_month(Utc::now()));
        add_receipt(&conn, "r1", &current, "Accepted", 10.0, 1, "u1");
        add_transaction(&conn, "r1", "DORITOS");
        add_receipt(&conn, "r2", &previous, "Accepted", 10.0, 1, "u1");
        add_transaction(&conn, "r2", "DORITOS");

        let (cur, prev) = top_brands_month_comparison(&conn).unwrap();
        assert_ne!(cur.month, prev.month);
        assert_eq!(cur.brands[0].receipts, 1);
        assert_eq!(prev.brands[0].receipts, 1);
    }

    #[test]
    fn test_average_spend_by_status() {
        let (_dir, conn) = test_db();
        add_receipt(&conn, "r1", "2024-01-01 00:00:00", "Accepted", 10.0, 2, "u1");
        add_receipt(&conn, "r2", "2024-01-02 00:00:00", "Accepted", 20.0, 3, "u1");
        add_receipt(&conn, "r3", "2024-01-03 00:00:00", "Rejected", 5.0, 1, "u1");

        let averages = average_spend_by_status(&conn).unwrap();
        assert_eq!(averages.accepted, Some(15.0));
        assert_eq!(averages.rejected, Some(5.0));
    }

    #[test]
    fn test_average_spend_with_no_matching_status() {
        let (_dir, conn) = test_db();
        let averages = average_spend_by_status(&conn).unwrap();
        assert_eq!(averages.accepted, None);
        assert_eq!(averages.rejected, None);
    }

    #[test]
    fn test_items_purchased_by_status() {
        let (_dir, conn) = test_db();
        add_receipt(&conn, "r1", "2024-01-01 00:00:00", "Accepted", 10.0, 2, "u1");
        add_receipt(&conn, "r2", "2024-01-02 00:00:00", "Accepted", 20.0, 3, "u1");
        add_receipt(&conn, "r3", "2024-01-03 00:00:00", "Rejected", 5.0, 1, "u1");

        let totals = items_purchased_by_status(&conn).unwrap();
        assert_eq!(totals.accepted, 5);
        assert_eq!(totals.rejected, 1);
    }

    #[test]
    fn test_cohort_queries_filter_on_user_age() {
        let (_dir, conn) = test_db();
        add_brand(&conn, "b1", "Doritos", "DORITOS");
        add_brand(&conn, "b2", "Pepsi", "PEPSI");
        let recent = now_stamp();
        let ancient = (Utc::now() - Duration::days(400))
            .format(TIMESTAMP_FORMAT)
            .to_string();
        add_user(&conn, "new_user", &recent);
        add_user(&conn, "old_user", &ancient);

        add_receipt(&conn, "r1", &recent, "Accepted", 30.0, 1, "new_user");
        add_transaction(&conn, "r1", "DORITOS");
        // Bigger spend, but the user is outside the 180-day cohort.
        add_receipt(&conn, "r2", &recent, "Accepted", 500.0, 1, "old_user");
        add_transaction(&conn, "r2", "PEPSI");

        let spend = top_brand_by_spend_recent_users(&conn).unwrap().unwrap();
        assert_eq!(spend.name, "Doritos");
        assert_eq!(spend.total_spent, 30.0);

        let count = top_brand_by_transactions_recent_users(&conn).unwrap().unwrap();
        assert_eq!(count.name, "Doritos");
        assert_eq!(count.transactions, 1);
    }

    #[test]
    fn test_cohort_queries_on_empty_db() {
        let (_dir, conn) = test_db();
        assert!(top_brand_by_spend_recent_users(&conn).unwrap().is_none());
        assert!(top_brand_by_transactions_recent_users(&conn).unwrap().is_none());
    }

    #[test]
    fn test_previous_month_rolls_over_year() {
        let jan = DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(previous_month(jan), "2023-12");
        let jun = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(previous_month(jun), "2024-05");
    }
}
