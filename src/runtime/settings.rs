//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::durability::PollerOptions;
use crate::error::BusError;
use crate::transport::ListenerOptions;

/// Settings for a [`MessagingRuntime`](super::MessagingRuntime).
///
/// Durations are milliseconds in serialized form; missing fields take their
/// defaults.
///
/// ```
/// use std::time::Duration;
/// use courier::runtime::MessagingSettings;
///
/// let settings = MessagingSettings::from_json(
///     r#"{ "service_name": "billing", "scheduled_job_polling_time": 1000 }"#,
/// ).unwrap();
/// assert_eq!(settings.service_name, "billing");
/// assert_eq!(settings.scheduled_job_polling_time, Duration::from_secs(1));
/// assert_eq!(settings.default_maximum_attempts, 1);
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    /// Stamped as `source` on every outgoing envelope.
    pub service_name: String,
    /// Maximum attempts for chains without their own setting.
    pub default_maximum_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub scheduled_job_polling_time: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub first_scheduled_job_execution: Duration,
    /// Hard deadline for one chain invocation.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub execution_timeout: Option<Duration>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub listener_poll_interval: Duration,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            service_name: "courier".to_string(),
            default_maximum_attempts: 1,
            scheduled_job_polling_time: Duration::from_secs(5),
            first_scheduled_job_execution: Duration::ZERO,
            execution_timeout: None,
            listener_poll_interval: Duration::from_millis(50),
        }
    }
}

impl MessagingSettings {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Load settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if self.default_maximum_attempts == 0 {
            return Err(BusError::Settings(
                "default_maximum_attempts must be at least 1".to_string(),
            ));
        }
        if self.listener_poll_interval.is_zero() {
            return Err(BusError::Settings(
                "listener_poll_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_default_maximum_attempts(mut self, attempts: u32) -> Self {
        self.default_maximum_attempts = attempts;
        self
    }

    pub fn with_scheduled_job_polling_time(mut self, interval: Duration) -> Self {
        self.scheduled_job_polling_time = interval;
        self
    }

    pub fn with_first_scheduled_job_execution(mut self, delay: Duration) -> Self {
        self.first_scheduled_job_execution = delay;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    pub fn with_listener_poll_interval(mut self, interval: Duration) -> Self {
        self.listener_poll_interval = interval;
        self
    }

    pub fn poller_options(&self) -> PollerOptions {
        PollerOptions {
            first_execution: self.first_scheduled_job_execution,
            polling_time: self.scheduled_job_polling_time,
        }
    }

    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            poll_interval: self.listener_poll_interval,
        }
    }
}
