use std::path::{Path, PathBuf};
use tickwise_application::config::Config;
use tickwise_infrastructure::artifacts::FilesystemArtifactWriter;
use tickwise_infrastructure::market_data::CsvMarketDataRepository;
use tickwise_infrastructure::persistence::{CsvLedgerRepository, CsvValuationRepository};

const DEFAULT_LEDGER_FILE: &str = "ledger.csv";
const DEFAULT_VALUATION_FILE: &str = "valuations.csv";

pub struct EngineDeps {
    pub market_data: CsvMarketDataRepository,
    pub artifacts: FilesystemArtifactWriter,
}

pub struct PortfolioDeps {
    pub ledger: CsvLedgerRepository,
    pub valuations: CsvValuationRepository,
    pub market_data: CsvMarketDataRepository,
}

pub fn build_engine_deps(config: &Config) -> EngineDeps {
    EngineDeps {
        market_data: build_market_data_repo(config),
        artifacts: FilesystemArtifactWriter::new(),
    }
}

pub fn build_portfolio_deps(config: &Config) -> PortfolioDeps {
    PortfolioDeps {
        ledger: build_ledger_repo(config),
        valuations: CsvValuationRepository::new(valuation_path(config)),
        market_data: build_market_data_repo(config),
    }
}

pub fn build_ledger_repo(config: &Config) -> CsvLedgerRepository {
    CsvLedgerRepository::new(ledger_path(config))
}

pub fn build_market_data_repo(config: &Config) -> CsvMarketDataRepository {
    CsvMarketDataRepository::new(&config.paths.data_dir)
}

/// `paths.ledger_path`, or `ledger.csv` under the output directory.
pub fn ledger_path(config: &Config) -> PathBuf {
    resolve_store_path(
        config.paths.ledger_path.as_deref(),
        &config.paths.out_dir,
        DEFAULT_LEDGER_FILE,
    )
}

pub fn valuation_path(config: &Config) -> PathBuf {
    resolve_store_path(
        config.paths.valuation_path.as_deref(),
        &config.paths.out_dir,
        DEFAULT_VALUATION_FILE,
    )
}

fn resolve_store_path(configured: Option<&str>, out_dir: &str, default_file: &str) -> PathBuf {
    match configured.map(str::trim).filter(|p| !p.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => Path::new(out_dir).join(default_file),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_store_path;
    use std::path::PathBuf;

    #[test]
    fn store_paths_fall_back_to_out_dir() {
        assert_eq!(
            resolve_store_path(Some("data/ledger.csv"), "runs", "ledger.csv"),
            PathBuf::from("data/ledger.csv")
        );
        assert_eq!(
            resolve_store_path(Some("  "), "runs", "ledger.csv"),
            PathBuf::from("runs/ledger.csv")
        );
        assert_eq!(
            resolve_store_path(None, "runs", "valuations.csv"),
            PathBuf::from("runs/valuations.csv")
        );
    }
}
