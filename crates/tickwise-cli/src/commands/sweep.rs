use std::path::PathBuf;
use tickwise_application::experiments::sweep;

pub(super) fn run_sweep(sweep_config: PathBuf) -> Result<(), String> {
    let (_sweep, base_config) =
        sweep::load_sweep_file(&sweep_config).map_err(|e| e.to_string())?;
    super::common::print_config_summary("sweep", &base_config, None);

    let crate::infra::EngineDeps {
        market_data,
        artifacts,
    } = crate::infra::build_engine_deps(&base_config);

    let result =
        sweep::run_sweep(&sweep_config, &market_data, &artifacts).map_err(|e| e.to_string())?;
    crate::output::print_sweep(&result);
    Ok(())
}
