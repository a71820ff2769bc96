//! Pipeline settings: built-in defaults, optionally overlaid by a YAML file,
//! then by command-line flags.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::cli::{self, InputArgs};

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_APPLIANCE_ACCOUNT_TYPE: &str = "Appliance";

/// How cleaning treats a geography pair with exactly one half present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum PartialPairPolicy {
    /// Count the row as malformed.
    #[default]
    Fail,
    /// Fill the absent half with the sentinel, keep the row and report it.
    Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningPolicy {
    /// Malformed rows tolerated before cleaning fails.
    pub tolerance: usize,
    pub partial_pairs: PartialPairPolicy,
}

impl Default for CleaningPolicy {
    fn default() -> Self {
        Self {
            tolerance: 0,
            partial_pairs: PartialPairPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub top_n: usize,
    pub appliance_account_type: String,
    pub featured_contractors: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            appliance_account_type: DEFAULT_APPLIANCE_ACCOUNT_TYPE.to_string(),
            featured_contractors: [
                "BOOTS UK LIMITED",
                "LLOYDS PHARMACY LTD",
                "WELL PHARMACY",
                "ROWLANDS PHARMACY",
                "SUPERDRUG STORES PLC",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    #[serde(deserialize_with = "deserialize_delimiter")]
    pub delimiter: Option<u8>,
    pub encoding: Option<String>,
    pub verify_line_count: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: None,
            verify_line_count: true,
        }
    }
}

fn deserialize_delimiter<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| cli::parse_delimiter(&value).map_err(de::Error::custom))
        .transpose()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputSettings,
    pub cleaning: CleaningPolicy,
    pub catalog: CatalogSettings,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(text).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then `--config`, then explicit flags.
    pub fn resolve(args: &InputArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if args.delimiter.is_some() {
            config.input.delimiter = args.delimiter;
        }
        if let Some(encoding) = &args.input_encoding {
            config.input.encoding = Some(encoding.clone());
        }
        if args.skip_line_check {
            config.input.verify_line_count = false;
        }
        if let Some(tolerance) = args.tolerance {
            config.cleaning.tolerance = tolerance;
        }
        if let Some(policy) = args.partial_pairs {
            config.cleaning.partial_pairs = policy;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.top_n == 0 {
            return Err(anyhow!("catalog.top_n must be at least 1"));
        }
        if self.catalog.appliance_account_type.trim().is_empty() {
            return Err(anyhow!("catalog.appliance_account_type cannot be empty"));
        }
        Ok(())
    }
}
