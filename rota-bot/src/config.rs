//! Process flags and the roster file.
//!
//! Flags come from the command line with environment fallbacks. Who is in
//! which group, the location catalog and the thank-you messages live in a
//! TOML roster file (`rota.toml` by default):
//!
//! ```toml
//! thanks = ["Thank you!"]
//!
//! [groups]
//! a = ["Alice Example", "Bob Example"]
//! b = ["Carol Example"]
//!
//! [locations]
//! catalog = ["201", "203", "204", "205", "corridor", "sink"]
//!
//! [locations.reduced]
//! exclude = ["corridor", "sink"]
//! months = [1, 3, 5, 7, 9, 11]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Weekday};
use clap::Parser;
use rota_sdk::{RetryPolicy, SlackConfig};
use serde::Deserialize;

use crate::groups::GroupTable;
use crate::locations::{LocationPool, ReducedScope};
use crate::timer::{self, WeeklySchedule};

#[derive(Parser, Debug, Clone)]
#[command(name = "rota-bot", about = "Weekly cleaning-duty rotation for a Slack channel")]
pub struct Args {
    /// Port for the warm-up and Slack events endpoint
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Slack bot token (xoxb-...)
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_bot_token: String,

    /// Slack signing secret; inbound events are unverified without it
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    /// Channel ID the rotation runs in
    #[arg(long, env = "ROTA_CHANNEL")]
    pub channel: String,

    /// Roster file (groups, locations, thank-you messages)
    #[arg(long, env = "ROTA_ROSTER", default_value = "rota.toml")]
    pub roster: PathBuf,

    /// Rotation state file
    #[arg(long, env = "ROTA_STATE_FILE", default_value = "data/rotation.json")]
    pub state_file: PathBuf,

    /// Day of the weekly cycle
    #[arg(long, env = "ROTA_WEEKDAY", default_value = "wed", value_parser = timer::parse_weekday)]
    pub weekday: Weekday,

    /// Local time of the weekly cycle (HH:MM)
    #[arg(long, env = "ROTA_AT", default_value = "14:44", value_parser = timer::parse_time)]
    pub at: NaiveTime,

    /// UTC offset the weekday and time are given in
    #[arg(
        long,
        env = "ROTA_UTC_OFFSET",
        default_value = "+09:00",
        allow_hyphen_values = true,
        value_parser = timer::parse_utc_offset
    )]
    pub utc_offset: FixedOffset,

    /// Per-request timeout for Slack API calls
    #[arg(long, default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Attempts per Slack API call, including the first
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    #[arg(long, hide = true, default_value = rota_sdk::slack::DEFAULT_API_BASE)]
    pub api_base: String,
}

impl Args {
    pub fn schedule(&self) -> WeeklySchedule {
        WeeklySchedule {
            weekday: self.weekday,
            time: self.at,
            utc_offset: self.utc_offset,
        }
    }

    pub fn slack_config(&self) -> SlackConfig {
        SlackConfig::new(self.slack_bot_token.clone())
            .with_api_base(self.api_base.clone())
            .with_timeout(Duration::from_secs(self.http_timeout_secs))
            .with_retry(RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                ..RetryPolicy::default()
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read roster file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid roster file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("names listed in both group a and group b: {}", .0.join(", "))]
    OverlappingGroups(Vec<String>),
    #[error("location catalog is empty")]
    EmptyCatalog,
    #[error("reduced-scope month {0} is not in 1..=12")]
    InvalidMonth(u32),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterFile {
    #[serde(default)]
    thanks: Vec<String>,
    groups: GroupsSection,
    locations: LocationsSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupsSection {
    #[serde(default)]
    a: Vec<String>,
    #[serde(default)]
    b: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocationsSection {
    catalog: Vec<String>,
    reduced: Option<ReducedSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReducedSection {
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    months: Vec<u32>,
}

/// Validated roster file contents.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub groups: GroupTable,
    pub locations: LocationPool,
    /// Empty when the file configures none.
    pub thanks: Vec<String>,
}

impl RosterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let file: RosterFile = toml::from_str(text)?;

        let groups = GroupTable::new(file.groups.a, file.groups.b)
            .map_err(ConfigError::OverlappingGroups)?;

        if file.locations.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        let mut locations = LocationPool::new(file.locations.catalog);
        if let Some(reduced) = file.locations.reduced {
            if let Some(&bad) = reduced.months.iter().find(|m| !(1..=12).contains(*m)) {
                return Err(ConfigError::InvalidMonth(bad));
            }
            locations = locations.with_reduced_scope(ReducedScope {
                exclude: reduced.exclude.into_iter().collect(),
                months: reduced.months.into_iter().collect(),
            });
        }

        Ok(Self {
            groups,
            locations,
            thanks: file.thanks,
        })
    }
}
