use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tdoacore::correlate::CorrelatorConfig;
use tdoacore::events::{ReceiverProfile, ReceiverTable};
use tdoacore::solve::SolverConfig;
use tdoacore::validate::ValidityConfig;

/// Server-side configuration, loaded once at startup. Changing the receiver
/// table requires a restart.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// UDP address detection events arrive on.
    pub listen: String,
    /// HTTP address for the status bridge.
    pub status_listen: String,
    /// Directory map artifacts are written into.
    pub artifact_dir: PathBuf,
    pub receivers: Vec<ReceiverProfile>,
    pub pipeline: PipelineSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:65432".to_string(),
            status_listen: "127.0.0.1:9000".to_string(),
            artifact_dir: PathBuf::from("artifacts"),
            receivers: Vec::new(),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Tuning shared by the correlator, solver, and validity checker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub correlation_window_s: f64,
    pub propagation_speed_mps: f64,
    pub timing_slack_s: f64,
    pub max_residual_error_m: f64,
    pub bounding_region_multiple: f64,
    pub locus_points: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            correlation_window_s: 4.0,
            propagation_speed_mps: 343.0,
            timing_slack_s: 0.05,
            max_residual_error_m: 25.0,
            bounding_region_multiple: 10.0,
            locus_points: 1000,
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading server config {}", path_ref.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing server config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn receiver_table(&self) -> ReceiverTable {
        ReceiverTable::from_profiles(self.receivers.iter().cloned())
    }
}

impl PipelineSettings {
    pub fn to_correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            correlation_window_s: self.correlation_window_s,
            propagation_speed_mps: self.propagation_speed_mps,
            timing_slack_s: self.timing_slack_s,
            ..Default::default()
        }
    }

    pub fn to_solver_config(&self) -> SolverConfig {
        SolverConfig {
            propagation_speed_mps: self.propagation_speed_mps,
            locus_points: self.locus_points,
            ..Default::default()
        }
    }

    pub fn to_validity_config(&self) -> ValidityConfig {
        ValidityConfig {
            propagation_speed_mps: self.propagation_speed_mps,
            max_residual_error_m: self.max_residual_error_m,
            bounding_region_multiple: self.bounding_region_multiple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"listen: 0.0.0.0:7000\nreceivers:\n  - id: north\n    latitude_deg: 47.1\n    longitude_deg: 8.2\n  - id: south\n    latitude_deg: 47.0\n    longitude_deg: 8.2\npipeline:\n  propagation_speed_mps: 340.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.listen, "0.0.0.0:7000");
        assert_eq!(config.receivers.len(), 2);
        assert!((config.pipeline.propagation_speed_mps - 340.0).abs() < 1e-9);
        // Unlisted fields keep their defaults.
        assert_eq!(config.pipeline.locus_points, 1000);

        let table = config.receiver_table();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn one_speed_feeds_all_three_configs() {
        let settings = PipelineSettings {
            propagation_speed_mps: 331.0,
            ..Default::default()
        };
        assert_eq!(settings.to_correlator_config().propagation_speed_mps, 331.0);
        assert_eq!(settings.to_solver_config().propagation_speed_mps, 331.0);
        assert_eq!(settings.to_validity_config().propagation_speed_mps, 331.0);
    }
}
