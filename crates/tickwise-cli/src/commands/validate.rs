use std::path::PathBuf;

pub(super) fn run_validate(
    config_path: PathBuf,
    strict: bool,
    out: Option<PathBuf>,
) -> Result<(), String> {
    let (config, _config_toml) = super::common::load(&config_path)?;
    super::common::print_config_summary("validate", &config, None);

    let market_data = crate::infra::build_market_data_repo(&config);
    let report = tickwise_application::validation::validate(&config, strict, &market_data)
        .map_err(|e| e.to_string())?;

    crate::output::print_validation(&report);

    if let Some(out_path) = out {
        let pretty = serde_json::to_string_pretty(&report)
            .map_err(|err| format!("failed to serialize report: {}", err))?;
        std::fs::write(&out_path, pretty)
            .map_err(|err| format!("failed to write report {}: {}", out_path.display(), err))?;
        println!("report: {}", out_path.display());
    }

    Ok(())
}
