/// Upper bound for `effect.count`, one ball per row of a tall panel is plenty.
pub const MAX_BALLS_PER_COLUMN: usize = 256;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    pub display: DisplayConfig,
    pub effect: BouncingBallsConfig,
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DisplayConfig {
    pub host: std::net::IpAddr,
    pub port: u16,
    pub udp_port: u16,
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub layout: crate::panel::Layout,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BouncingBallsConfig {
    /// Balls per column
    #[serde(default = "default_count")]
    pub count: usize,

    /// Frames simulated and shown per loop callback
    #[serde(default = "default_loops")]
    pub loops: u32,

    /// Delay between loop callbacks
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: std::time::Duration,

    #[serde(default = "default_dim_all")]
    pub dim_all: u8,

    #[serde(default)]
    pub colors: Vec<[u8; 3]>,

    #[serde(default)]
    pub measure_loop_time: bool,

    pub seed: Option<u64>,
}

fn default_count() -> usize {
    3
}

fn default_loops() -> u32 {
    1
}

fn default_timeout() -> std::time::Duration {
    std::time::Duration::from_millis(20)
}

fn default_dim_all() -> u8 {
    u8::MAX
}

impl Default for BouncingBallsConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            loops: default_loops(),
            timeout: default_timeout(),
            dim_all: default_dim_all(),
            colors: Vec::new(),
            measure_loop_time: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MqttConfig {
    pub host: std::net::IpAddr,
    pub port: u16,
    pub qos: Qos,
    pub client_name: String,

    #[serde(with = "humantime_serde")]
    pub keep_alive: std::time::Duration,

    pub topic_prefix: String,
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[expect(clippy::enum_variant_names, reason = "That's the names")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Qos> for rumqttc::v5::mqttbytes::QoS {
    fn from(value: Qos) -> Self {
        match value {
            Qos::AtMostOnce => rumqttc::v5::mqttbytes::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::v5::mqttbytes::QoS::AtLeastOnce,
            Qos::ExactlyOnce => rumqttc::v5::mqttbytes::QoS::ExactlyOnce,
        }
    }
}

impl Config {
    pub async fn load(path: &camino::Utf8Path) -> Result<Self, ConfigError> {
        let config_str =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadingFile {
                    path: path.to_path_buf(),
                    source,
                })?;

        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(config_str).map_err(ConfigError::ParsingConfig)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::EmptyPanel {
                width: self.display.width,
                height: self.display.height,
            });
        }

        if self.effect.count == 0 || self.effect.count > MAX_BALLS_PER_COLUMN {
            return Err(ConfigError::BallCount {
                count: self.effect.count,
            });
        }

        if self.effect.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from path '{}'", .path)]
    ReadingFile {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ParsingConfig(#[from] toml::de::Error),

    #[error("Panel must have at least one pixel, got {width}x{height}")]
    EmptyPanel { width: u32, height: u32 },

    #[error("Ball count must be between 1 and {MAX_BALLS_PER_COLUMN}, got {count}")]
    BallCount { count: usize },

    #[error("Effect timeout must not be zero")]
    ZeroTimeout,
}
