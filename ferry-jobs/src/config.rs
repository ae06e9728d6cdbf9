use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::JobError;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
/// How the checksums reported by both legs of a transfer are verified.
pub enum ChecksumPolicy {
    /// Every finished transfer is accepted.
    Disabled,
    #[default]
    /// Matching checksums are accepted, as is a transfer where either
    /// slave could not produce a checksum.
    Lenient,
    /// Both checksums must be known and equal.
    Strict,
}

impl ChecksumPolicy {
    /// Returns if a transfer with the given checksums counts as a copy.
    ///
    /// A checksum of `0` means the slave could not compute one.
    pub fn accepts(&self, source: u64, destination: u64) -> bool {
        match self {
            ChecksumPolicy::Disabled => true,
            ChecksumPolicy::Lenient => {
                source == 0 || destination == 0 || source == destination
            },
            ChecksumPolicy::Strict => source != 0 && source == destination,
        }
    }

    /// Returns if a copy already present on a destination counts as a copy.
    pub fn accepts_existing(&self, known: Option<u64>, existing: u64) -> bool {
        match (self, known) {
            (ChecksumPolicy::Disabled, _) => true,
            (ChecksumPolicy::Lenient, None) => true,
            (ChecksumPolicy::Strict, None) => existing != 0,
            (policy, Some(known)) => policy.accepts(known, existing),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
/// Settings of the [JobManager](crate::JobManager).
///
/// ```toml
/// checksum-policy = "strict"
/// secure-transfers = true
/// transfer-timeout = "2h"
/// idle-interval = 5000
/// ```
pub struct JobManagerConfig {
    pub checksum_policy: ChecksumPolicy,
    /// Use encrypted connections between slaves.
    pub secure_transfers: bool,
    /// The default for jobs which do not say if offline destination
    /// slaves count towards their copies.
    pub only_count_online: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    /// The time waited between polling the status of a running transfer.
    pub poll_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    /// The maximum time a single transfer may take.
    pub transfer_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    /// The longest a worker sleeps when there is no work for its slave.
    pub idle_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    /// How long a failed destination or source is skipped by a job.
    pub retry_delay: Duration,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        let (idle_interval, retry_delay, transfer_timeout) = if cfg!(test) {
            (
                Duration::from_millis(250),
                Duration::from_millis(100),
                Duration::from_secs(5),
            )
        } else {
            (
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(6 * 60 * 60),
            )
        };

        Self {
            checksum_policy: ChecksumPolicy::default(),
            secure_transfers: false,
            only_count_online: false,
            poll_interval: Duration::from_millis(100),
            transfer_timeout,
            idle_interval,
            retry_delay,
        }
    }
}

impl JobManagerConfig {
    /// Parses the config from a TOML document, missing keys keep
    /// their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, JobError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksum_policy = policy;
        self
    }

    pub fn with_secure_transfers(mut self, secure: bool) -> Self {
        self.secure_transfers = secure;
        self
    }

    pub fn with_only_count_online(mut self, only_count_online: bool) -> Self {
        self.only_count_online = only_count_online;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(u64),
    Human(String),
}

/// Accepts integer milliseconds or a humantime string such as `"30s"`.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => Ok(Duration::from_millis(ms)),
        RawDuration::Human(s) => {
            humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
        },
    }
}
