use blockscout_service_launcher::{
    database::DatabaseSettings,
    launcher::ConfigSettings,
    tracing::{JaegerSettings, TracingSettings},
};
use serde::Deserialize;
use swap_points_indexer_logic::indexer::IndexerSettings;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub tracing: TracingSettings,
    #[serde(default)]
    pub jaeger: JaegerSettings,

    pub database: DatabaseSettings,

    #[serde(default)]
    pub indexer: IndexerSettings,
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "SWAP_POINTS_INDEXER";

    fn validate(&self) -> anyhow::Result<()> {
        if !(10..=1000).contains(&self.indexer.window_size) {
            anyhow::bail!(
                "indexer.window_size must be within [10, 1000], got {}",
                self.indexer.window_size
            );
        }
        Ok(())
    }
}
