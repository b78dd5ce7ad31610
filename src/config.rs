use crate::types::{Config, TransportConfig};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let roi = &self.roi;
        if roi.total_bands == 0 {
            bail!("roi.total_bands must be at least 1");
        }
        if roi.active_bands.is_empty() {
            bail!("roi.active_bands must name at least one band");
        }
        if let Some(bad) = roi.active_bands.iter().find(|&&b| b >= roi.total_bands) {
            bail!(
                "roi.active_bands contains {} but only {} bands exist (indices start at 0)",
                bad,
                roi.total_bands
            );
        }
        if roi.edge_low > roi.edge_high {
            bail!(
                "roi.edge_low ({}) must not exceed roi.edge_high ({})",
                roi.edge_low,
                roi.edge_high
            );
        }

        let drive = &self.drive;
        if drive.min_speed > drive.max_speed {
            bail!(
                "drive.min_speed ({}) must not exceed drive.max_speed ({})",
                drive.min_speed,
                drive.max_speed
            );
        }

        if let Some(limit) = self.pid.integral_limit {
            if limit < 0.0 {
                bail!("pid.integral_limit must be non-negative");
            }
        }

        if self.dispatch.send_interval_secs < 0.0 {
            bail!("dispatch.send_interval_secs must be non-negative");
        }
        if self.dispatch.timeout_ms == 0 {
            bail!("dispatch.timeout_ms must be positive");
        }
        if let TransportConfig::Http(http) = &self.dispatch.transport {
            if http.url.is_empty() {
                bail!("dispatch.transport.url must not be empty");
            }
        }

        if let Some([w, h]) = self.source.resize {
            if w == 0 || h == 0 {
                bail!("source.resize dimensions must be positive");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaskStrategy, ScanPolicy, SourceKind};
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let file = write_config("{}\n");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.roi.total_bands, 10);
        assert_eq!(config.roi.active_bands, vec![2, 5, 7]);
        assert_eq!(config.roi.scan, ScanPolicy::FirstRow);
        assert_eq!(config.mask.strategy, MaskStrategy::Hsv);
        assert_eq!(config.drive.base_speed, 30);
        assert!(matches!(config.dispatch.transport, TransportConfig::Mqtt(_)));
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
source:
  kind: image
  uri: track.png
  resize: [320, 240]
mask:
  strategy: segmentation
  segmentation:
    model_path: models/line.onnx
    mask_threshold: 0.6
roi:
  total_bands: 8
  active_bands: [1, 6]
  scan: band_average
pid:
  kp: 0.2
  kd: 0.05
  integral_limit: 500.0
drive:
  base_speed: 40
  curve_speed: 25
dispatch:
  send_interval_secs: 0.5
  transport:
    kind: http
    url: http://10.0.0.2/setSpeed
"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.source.kind, SourceKind::Image);
        assert_eq!(config.source.resize, Some([320, 240]));
        assert_eq!(config.mask.strategy, MaskStrategy::Segmentation);
        assert_eq!(config.mask.segmentation.mask_threshold, 0.6);
        assert_eq!(config.mask.segmentation.input_size, 640);
        assert_eq!(config.roi.scan, ScanPolicy::BandAverage);
        assert_eq!(config.pid.integral_limit, Some(500.0));
        assert_eq!(config.drive.curve_speed, Some(25));
        assert_eq!(config.drive.min_speed, 20);
        match config.dispatch.transport {
            TransportConfig::Http(http) => assert_eq!(http.url, "http://10.0.0.2/setSpeed"),
            other => panic!("expected http transport, got {:?}", other),
        }
    }

    #[test]
    fn test_mqtt_topics_default_when_omitted() {
        let file = write_config(
            r#"
dispatch:
  transport:
    kind: mqtt
    broker: 127.0.0.1
"#,
        );
        let config = Config::load(file.path()).unwrap();
        match config.dispatch.transport {
            TransportConfig::Mqtt(mqtt) => {
                assert_eq!(mqtt.broker, "127.0.0.1");
                assert_eq!(mqtt.right_topic, "MotorKanan");
                assert_eq!(mqtt.left_topic, "MotorKiri");
            }
            other => panic!("expected mqtt transport, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_band_out_of_range() {
        let file = write_config("roi:\n  total_bands: 5\n  active_bands: [1, 5]\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("active_bands"));
    }

    #[test]
    fn test_rejects_inverted_speed_range() {
        let mut config = Config::default();
        config.drive.min_speed = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.yaml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.source.kind, SourceKind::Stream);
        assert_eq!(config.roi.active_bands, vec![2, 5, 7]);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/lane-pilot.yaml").is_err());
    }
}
