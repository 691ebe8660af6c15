//! Print trade statistics of a ledger file
//!
//! Run with: cargo run --bin trade_report -- <client.json> [settings.json] [--json]

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use portfolio_trades::config::ReportSettings;
use portfolio_trades::performance::NewtonRaphsonIrr;
use portfolio_trades::pp::common::shares;
use portfolio_trades::pp::Client;
use portfolio_trades::trades::{
    Trade, TradeCategory, TradeCollector, TradeContext, TradeTotals, TradesGroupedByTaxonomy,
};

/// One row of the JSON output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TradeReport {
    category: String,
    trade_count: i64,
    currency: String,
    entry_value: f64,
    exit_value: f64,
    profit_loss: f64,
    profit_loss_without_taxes_and_fees: f64,
    profit_loss_moving_average: f64,
    average_return: f64,
    average_irr: f64,
    average_holding_period: i64,
    win_rate: f64,
}

impl TradeReport {
    fn from_category(name: &str, category: &TradeCategory<'_>) -> Self {
        Self {
            category: name.to_string(),
            trade_count: category.trade_count(),
            currency: category.total_entry_value().currency.clone(),
            entry_value: category.total_entry_value().to_decimal(),
            exit_value: category.total_exit_value().to_decimal(),
            profit_loss: category.total_profit_loss().to_decimal(),
            profit_loss_without_taxes_and_fees: category
                .total_profit_loss_without_taxes_and_fees()
                .to_decimal(),
            profit_loss_moving_average: category.total_profit_loss_moving_average().to_decimal(),
            average_return: category.average_return(),
            average_irr: category.average_irr(),
            average_holding_period: category.average_holding_period(),
            win_rate: category.win_rate(),
        }
    }
}

struct Args {
    client: PathBuf,
    settings: Option<PathBuf>,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut json = false;
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--json" {
            json = true;
        } else {
            paths.push(PathBuf::from(arg));
        }
    }

    let mut paths = paths.into_iter();
    let Some(client) = paths.next() else {
        bail!("Usage: trade_report <client.json> [settings.json] [--json]");
    };

    Ok(Args {
        client,
        settings: paths.next(),
        json,
    })
}

fn load_client(path: &Path) -> Result<Client> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse ledger JSON {}", path.display()))
}

/// Open shares and number of lot fragments per security
fn open_positions(trades: &[Trade]) -> HashMap<&str, (i64, i64)> {
    let mut open: HashMap<&str, (i64, i64)> = HashMap::new();
    for trade in trades.iter().filter(|t| !t.is_closed()) {
        let position = open.entry(trade.security_uuid()).or_insert((0, 0));
        position.0 += trade.shares();
        position.1 += trade.transactions().len() as i64;
    }
    open
}

/// Each split fragment may be off by one share unit
fn matches_holdings(held: i64, open_shares: i64, fragments: i64) -> bool {
    (held - open_shares).abs() <= fragments
}

/// Compare the shares of open trades with the holdings booked per security
fn check_open_positions(client: &Client, trades: &[Trade]) -> usize {
    let open = open_positions(trades);
    let mut mismatches = 0;
    for (security_uuid, held) in client.total_holdings() {
        let (in_trades, fragments) = open.get(security_uuid.as_str()).copied().unwrap_or((0, 0));
        if !matches_holdings(held, in_trades, fragments) {
            log::warn!(
                "Security {}: holdings {} but open trades {}",
                security_uuid,
                shares::to_decimal(held),
                shares::to_decimal(in_trades)
            );
            mismatches += 1;
        }
    }
    mismatches
}

fn print_row(row: &TradeReport) {
    println!(
        "{:<30} {:>6} {:>14.2} {:>14.2} {:>12.2} {:>8.2}% {:>8.2}% {:>6}d {:>6.1}%",
        row.category,
        row.trade_count,
        row.entry_value,
        row.exit_value,
        row.profit_loss,
        row.average_return * 100.0,
        row.average_irr * 100.0,
        row.average_holding_period,
        row.win_rate * 100.0
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let client = load_client(&args.client)?;
    let settings = ReportSettings::load_or_default(args.settings.as_deref())?;

    let term_currency = settings
        .term_currency
        .clone()
        .unwrap_or_else(|| client.base_currency.clone());
    let converter = settings.exchange_rate_table(&term_currency);
    let irr = NewtonRaphsonIrr;
    let context = TradeContext::new(&converter, &irr, settings.today());

    log::info!(
        "Loaded {} securities, {} portfolios; valuing open trades at {} in {}",
        client.securities.len(),
        client.portfolios.len(),
        context.today,
        term_currency
    );

    let collector = TradeCollector::new(&client, &context);
    let (trades, failures) = collector.collect_all(&client.securities);
    if !failures.is_empty() && !settings.skip_inconsistent_securities {
        let (security, error) = &failures[0];
        bail!(
            "{} securities have inconsistent transactions, first {}: {}",
            failures.len(),
            security,
            error
        );
    }
    let mismatches = check_open_positions(&client, &trades);
    if mismatches > 0 {
        log::warn!("{} securities have open trades differing from holdings", mismatches);
    }

    let mut rows = Vec::new();
    if let Some(ref name) = settings.taxonomy {
        let taxonomy = client
            .find_taxonomy(name)
            .with_context(|| format!("Taxonomy '{}' not found", name))?;
        let grouped = TradesGroupedByTaxonomy::new(taxonomy, &trades, &context)?;
        for category in grouped.as_list() {
            rows.push(TradeReport::from_category(&category.classification().name, category));
        }
    }

    let totals = TradeTotals::new(&trades, &context)?;
    rows.push(TradeReport::from_category("Total", totals.all_trades()));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<30} {:>6} {:>14} {:>14} {:>12} {:>9} {:>9} {:>7} {:>7}",
        "Category", "Trades", "Entry", "Exit", "P/L", "Return", "IRR", "Held", "Win"
    );
    for row in &rows {
        print_row(row);
    }

    println!();
    println!(
        "Shares: {}  Avg entry: {}  Avg exit: {}  P/L (moving avg): {}",
        shares::to_decimal(totals.total_shares()),
        totals
            .average_entry_price()
            .map_or_else(|| "-".to_string(), |m| m.to_string()),
        totals
            .average_exit_price()
            .map_or_else(|| "-".to_string(), |m| m.to_string()),
        totals.total_profit_loss_moving_average()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portfolio_trades::currency::ExchangeRateTable;
    use portfolio_trades::pp::common::Money;
    use portfolio_trades::pp::{Portfolio, PortfolioTransaction, PortfolioTransactionType, Security};

    const SHARE: i64 = 100_000_000;

    fn booking(
        uuid: &str,
        day: u32,
        kind: PortfolioTransactionType,
        shares: i64,
    ) -> PortfolioTransaction {
        let date = NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut tx = PortfolioTransaction::new(
            uuid.to_string(),
            date,
            kind,
            Money::new(shares / SHARE * 1000, "EUR"),
            shares,
        );
        tx.security_uuid = Some("sec".to_string());
        tx
    }

    #[test]
    fn test_matches_holdings_within_rounding() {
        assert!(matches_holdings(10 * SHARE, 10 * SHARE, 0));
        assert!(matches_holdings(10 * SHARE, 10 * SHARE - 1, 1));
        assert!(!matches_holdings(10 * SHARE, 10 * SHARE - 2, 1));
        assert!(matches_holdings(10 * SHARE, 10 * SHARE + 2, 2));
        assert!(!matches_holdings(10 * SHARE, 0, 0));
    }

    #[test]
    fn test_open_positions_match_holdings() {
        let mut client = Client::new("EUR");
        client.securities.push(Security::new(
            "sec".to_string(),
            "Security".to_string(),
            "EUR".to_string(),
        ));
        let mut portfolio = Portfolio::new("p".to_string(), "P".to_string());
        portfolio.transactions.extend([
            booking("b1", 1, PortfolioTransactionType::Buy, 3 * SHARE),
            booking("b2", 2, PortfolioTransactionType::Buy, 2 * SHARE),
            booking("s1", 3, PortfolioTransactionType::Sell, 4 * SHARE),
        ]);
        client.portfolios.push(portfolio);

        let converter = ExchangeRateTable::new("EUR");
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let context = TradeContext::new(&converter, &NewtonRaphsonIrr, date);
        let trades = TradeCollector::new(&client, &context)
            .collect(&client.securities[0])
            .unwrap();

        let open = open_positions(&trades);
        assert_eq!(open.get("sec"), Some(&(SHARE, 1)));
        assert_eq!(check_open_positions(&client, &trades), 0);
        assert_eq!(check_open_positions(&client, &trades[..1]), 1);
    }
}
