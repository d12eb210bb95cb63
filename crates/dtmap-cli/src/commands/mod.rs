pub mod profile;
pub mod query;
pub mod run;
pub mod verify;

use dtmap_core::config::Config;
use dtmap_core::error::DtmapError;
use dtmap_core::oracle::ChatOracle;

/// Build the chat oracle from the environment, failing early without an API key.
fn oracle_from_env() -> Result<ChatOracle, DtmapError> {
    let config = Config::from_env()?;
    let oracle = ChatOracle::from_config(&config)?;
    tracing::info!(model = oracle.model(), base_url = %config.base_url, "Using chat oracle");
    Ok(oracle)
}
