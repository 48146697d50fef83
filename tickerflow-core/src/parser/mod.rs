use crate::error::ParseError;
use crate::types::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub config: PipelineConfig,
    pub format: ConfigFormat,
}

pub fn parse_config_str(input: &str, format: ConfigFormat) -> Result<ParsedConfig, ParseError> {
    match format {
        ConfigFormat::Json => Ok(ParsedConfig {
            config: serde_json::from_str::<PipelineConfig>(input)?,
            format,
        }),
        ConfigFormat::Yaml => Ok(ParsedConfig {
            config: serde_yaml::from_str::<PipelineConfig>(input)?,
            format,
        }),
        ConfigFormat::Auto => parse_config_auto(input),
    }
}

fn parse_config_auto(input: &str) -> Result<ParsedConfig, ParseError> {
    // JSON documents start with `{` after trimming; everything else is YAML first.
    let trimmed = input.trim_start();
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<PipelineConfig>(input) {
            Ok(config) => Ok(ParsedConfig {
                config,
                format: ConfigFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<PipelineConfig>(input) {
                Ok(config) => Ok(ParsedConfig {
                    config,
                    format: ConfigFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<PipelineConfig>(input) {
        Ok(config) => Ok(ParsedConfig {
            config,
            format: ConfigFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(config) = serde_json::from_str::<PipelineConfig>(input) {
                return Ok(ParsedConfig {
                    config,
                    format: ConfigFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}
