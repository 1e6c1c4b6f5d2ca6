use crate::core::{Projection, ReductionMode, ScanFilter};
use crate::report::ReportFields;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIGURATION_FILE: &str = "longest_title.json";

#[derive(Debug, Serialize, Deserialize)]
struct Defaults {
    discriminator_field: String,
    discriminator_value: String,
    state_field: String,
    excluded_state: String,
    title_field: String,
    reference_field: String,
    reduction: ReductionMode,
    log_level: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            discriminator_field: "Type".to_string(),
            discriminator_value: "SERIES".to_string(),
            state_field: "AvailabilityState".to_string(),
            excluded_state: "unavailable".to_string(),
            title_field: "Title".to_string(),
            reference_field: "WebRef".to_string(),
            reduction: ReductionMode::Materialized,
            log_level: "info".to_string(),
        }
    }
}

/// Everything a run needs, passed explicitly instead of read from ambient state.
#[derive(Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub table_name: String,
    /// Named credentials profile; the SDK default chain is used when absent.
    pub profile: Option<String>,
    pub region: Option<String>,
    pub discriminator_field: String,
    pub discriminator_value: String,
    pub state_field: String,
    pub excluded_state: String,
    pub title_field: String,
    pub reference_field: String,
    pub page_size: Option<i32>,
    pub reduction: ReductionMode,
    pub log_level: String,
}

impl Configuration {
    /// Defaults, then `longest_title.json` if present, then `APP_*` variables.
    /// A `page_size` below 1 is rejected here rather than by DynamoDB.
    pub fn load() -> Result<Self, figment::Error> {
        let config: Self = Self::figment().extract()?;
        match config.page_size {
            Some(page_size) if page_size < 1 => Err(figment::Error::from(format!(
                "page_size must be at least 1, got {}",
                page_size
            ))),
            _ => Ok(config),
        }
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Defaults::default()))
            .merge(Json::file(CONFIGURATION_FILE))
            .merge(Env::prefixed("APP_"))
    }

    pub async fn sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader.load().await
    }

    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter::new(
            &self.discriminator_field,
            &self.discriminator_value,
            &self.state_field,
            &self.excluded_state,
        )
    }

    pub fn projection(&self) -> Projection {
        Projection::new([
            &self.discriminator_field,
            &self.title_field,
            &self.reference_field,
            &self.state_field,
        ])
    }

    pub fn report_fields(&self) -> ReportFields {
        ReportFields {
            discriminator: self.discriminator_field.clone(),
            title: self.title_field.clone(),
            reference: self.reference_field.clone(),
            state: self.state_field.clone(),
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration {{ table_name: {}, profile: {:?}, region: {:?}, reduction: {:?} }}",
            self.table_name, self.profile, self.region, self.reduction
        )
    }
}
