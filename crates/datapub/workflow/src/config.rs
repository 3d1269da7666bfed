use datapub_registrar::DataCiteConfig;
use datapub_types::PrefixAllowList;
use serde::Deserialize;

/// Installation-wide workflow settings, loaded by the host application.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkflowConfig {
    /// Site identifier recorded on every ledger row.
    pub site_id: String,
    /// Portal base URL for landing pages and notification links.
    pub site_url: String,
    /// Default DOI prefix for minted identifiers.
    pub doi_prefix: String,
    /// Admin-approved additional prefixes for custom identifiers.
    #[serde(default)]
    pub custom_prefixes: Vec<String>,
    /// Minter strategy name, resolved against the registry at startup.
    #[serde(default = "default_minter")]
    pub minter: String,
    /// Address notified on every transition.
    pub admin_email: String,
    pub datacite: DataCiteConfig,
}

fn default_minter() -> String {
    "uuid".to_string()
}

impl WorkflowConfig {
    /// The prefixes this installation accepts: default plus custom.
    pub fn allow_list(&self) -> PrefixAllowList {
        PrefixAllowList::new(self.doi_prefix.clone(), self.custom_prefixes.clone())
    }
}
