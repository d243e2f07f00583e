//! Order report commands.

use partsbin_storefront::db::{self, OrderStore, PgOrderStore};
use partsbin_storefront::services::OrderStats;

use super::{CommandError, database_url, outbound_timeout};

/// Print whole-table order statistics.
///
/// # Errors
///
/// Returns an error if the order table cannot be read.
pub async fn stats(json: bool) -> Result<(), CommandError> {
    let database_url = database_url()?;
    let timeout = outbound_timeout();
    let pool = db::create_pool(&database_url, timeout).await?;
    let store = PgOrderStore::new(pool, timeout);

    let orders = store.scan().await?;
    let stats = OrderStats::from_orders(&orders);

    #[allow(clippy::print_stdout)]
    {
        if json {
            println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
        } else {
            print!("{}", render_table(&stats));
        }
    }

    Ok(())
}

fn render_table(stats: &OrderStats) -> String {
    let rows = [
        ("Pending payment", stats.pending_payment),
        ("Processing", stats.processing),
        ("Shipped", stats.shipped),
        ("Delivered", stats.delivered),
        ("Cancelled", stats.cancelled),
    ];

    let mut out = String::new();
    for (label, count) in rows {
        out.push_str(&format!("{label:<16} {count:>8}\n"));
    }
    out.push_str(&format!("{:<16} {:>8}\n", "Total", stats.total));
    out.push_str(&format!("{:<16} {:>8}\n", "Revenue", stats.total_revenue));
    out
}
