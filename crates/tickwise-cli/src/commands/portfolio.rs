use std::collections::BTreeMap;
use std::path::PathBuf;
use tickwise_application::portfolio;
use tickwise_domain::entities::valuation::Period;
use tickwise_domain::repositories::valuation::ValuationRepository;
use tickwise_domain::value_objects::side::Side;
use tickwise_domain::value_objects::timestamp::parse_timestamp;
use tickwise_domain::value_objects::transaction::NewTransaction;

pub(super) fn run_trade(
    config_path: PathBuf,
    action: Side,
    ticker: String,
    qty: f64,
    price: f64,
    date: Option<String>,
    notes: Option<String>,
) -> Result<(), String> {
    let (config, _source) = super::common::load(&config_path)?;
    let timestamp = match date.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => chrono::Utc::now().timestamp(),
    };

    let mut request = match action {
        Side::Buy => NewTransaction::buy(&ticker, qty, price, timestamp),
        Side::Sell => NewTransaction::sell(&ticker, qty, price, timestamp),
    };
    if let Some(notes) = notes {
        request = request.with_notes(notes);
    }

    let ledger = crate::infra::build_ledger_repo(&config);
    let transaction = portfolio::record_trade(&ledger, request).map_err(|e| e.to_string())?;
    println!("recorded {}", crate::output::transaction_line(&transaction));
    println!("ledger: {}", ledger.path().display());
    Ok(())
}

pub(super) fn run_portfolio(
    config_path: PathBuf,
    prices: Vec<String>,
    record: bool,
    period: Period,
) -> Result<(), String> {
    let (config, _source) = super::common::load(&config_path)?;
    let overrides = parse_price_overrides(&prices)?;

    let crate::infra::PortfolioDeps {
        ledger,
        valuations,
        market_data,
    } = crate::infra::build_portfolio_deps(&config);

    let held = portfolio::load_ledger(&ledger).map_err(|e| e.to_string())?;
    let tickers = portfolio::held_tickers(&held);
    let current_prices = portfolio::latest_prices(&market_data, &tickers, &overrides);

    let history: &dyn ValuationRepository = &valuations;
    let mut snapshot =
        portfolio::get_portfolio_snapshot(&ledger, Some(history), &current_prices, period)
            .map_err(|e| e.to_string())?;

    if record {
        let now = chrono::Utc::now().timestamp();
        portfolio::store_valuation(history, now, &snapshot.totals)
            .map_err(|e| e.to_string())?;
        // Re-read so the new point counts toward performance.
        snapshot =
            portfolio::get_portfolio_snapshot(&ledger, Some(history), &current_prices, period)
                .map_err(|e| e.to_string())?;
        println!("valuation recorded: {}", valuations.path().display());
    }

    crate::output::print_portfolio(&snapshot);
    Ok(())
}

pub(super) fn run_transactions(config_path: PathBuf, limit: Option<usize>) -> Result<(), String> {
    let (config, _source) = super::common::load(&config_path)?;
    let ledger = crate::infra::build_ledger_repo(&config);
    let transactions = portfolio::list_transactions(&ledger, limit).map_err(|e| e.to_string())?;
    if transactions.is_empty() {
        println!("no transactions");
        return Ok(());
    }
    for tx in &transactions {
        println!("{}", crate::output::transaction_line(tx));
    }
    Ok(())
}

/// `TICKER=PRICE` pairs from `--price`.
fn parse_price_overrides(raw: &[String]) -> Result<BTreeMap<String, f64>, String> {
    let mut prices = BTreeMap::new();
    for entry in raw {
        let (ticker, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("invalid --price '{}' (expected TICKER=PRICE)", entry))?;
        let ticker = ticker.trim();
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid price in --price '{}'", entry))?;
        if ticker.is_empty() || !value.is_finite() || value <= 0.0 {
            return Err(format!("invalid --price '{}'", entry));
        }
        prices.insert(ticker.to_uppercase(), value);
    }
    Ok(prices)
}
