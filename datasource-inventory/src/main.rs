//! Data source inventory.
//!
//! Lists every data source visible to the configured credentials and logs
//! its identity together with the names of the custom HTTP headers it sends.
//! Header values are write-only on the platform and are never printed.
//!
//! # Configuration
//! | Env var                | Default                 |
//! |------------------------|-------------------------|
//! | `GRAFANA_URL`          | `http://localhost:3000` |
//! | `GRAFANA_TOKEN`        | optional                |
//! | `GRAFANA_BASIC_AUTH`   | optional, `user:pass`   |
//! | `GRAFANA_ORG_ID`       | optional                |
//! | `GRAFANA_TIMEOUT_SECS` | `30`                    |

use anyhow::{Context, Result};
use grafana_api::{GrafanaClient, TransportConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("datasource_inventory=info".parse()?)
                .add_directive("grafana_api=info".parse()?),
        )
        .json()
        .init();

    let config = TransportConfig::from_env().context("Invalid Grafana configuration")?;
    info!(url = %config.base_url, org_id = ?config.org_id, "connecting to Grafana");

    let client = GrafanaClient::from_config(&config).context("Failed to build Grafana client")?;
    let data_sources = client
        .data_sources()
        .await
        .context("Failed to list data sources")?;

    info!(count = data_sources.len(), "data sources found");

    for ds in &data_sources {
        let headers = match ds.http_headers() {
            Ok(decoded) => decoded
                .headers
                .iter()
                .map(|(name, presence)| format!("{name}(set={presence})"))
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(name = %ds.name, error = %e, "malformed header configuration");
                Vec::new()
            }
        };

        info!(
            id = ?ds.id,
            uid = ds.uid.as_deref().unwrap_or(""),
            name = %ds.name,
            kind = %ds.kind,
            url = %ds.url,
            is_default = ds.is_default,
            read_only = ds.read_only,
            headers = ?headers,
            "data source"
        );
    }

    Ok(())
}
