use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{MAX_SAMPLES, TOPIC_LIGHT, TOPIC_PRESENCE};
use crate::util::{format_time, parse_reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Light,
    Presence,
}

impl SensorKind {
    pub fn label(self) -> &'static str {
        match self {
            SensorKind::Light => "Light",
            SensorKind::Presence => "Presence",
        }
    }
}

/// The two topic names the monitor listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub light: String,
    pub presence: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            light: TOPIC_LIGHT.to_string(),
            presence: TOPIC_PRESENCE.to_string(),
        }
    }
}

impl Topics {
    pub fn classify(&self, topic: &str) -> Option<SensorKind> {
        if topic == self.light {
            Some(SensorKind::Light)
        } else if topic == self.presence {
            Some(SensorKind::Presence)
        } else {
            None
        }
    }

    pub fn all(&self) -> [&str; 2] {
        [&self.light, &self.presence]
    }
}

/// Rolling window of aligned light/presence samples.
///
/// Every accepted message appends one slot to all three series: the series
/// the message belongs to gets the parsed value, the other one repeats its
/// previous value (0 when it has none yet). Once the window is full the
/// oldest slot is dropped from all three series together.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    topics: Topics,
    capacity: usize,
    timestamps: VecDeque<String>,
    light: VecDeque<f64>,
    presence: VecDeque<f64>,
}

impl SampleWindow {
    pub fn new(topics: Topics) -> Self {
        Self::with_capacity(topics, MAX_SAMPLES)
    }

    /// `capacity` is clamped to at least one slot.
    pub fn with_capacity(topics: Topics, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            topics,
            capacity,
            timestamps: VecDeque::with_capacity(capacity + 1),
            light: VecDeque::with_capacity(capacity + 1),
            presence: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Record a raw payload received on `topic`, stamped with the current
    /// local time. Unknown topics leave the window untouched.
    pub fn record(&mut self, topic: &str, payload: &[u8]) -> Option<SensorKind> {
        self.record_at(topic, payload, Local::now())
    }

    pub fn record_at(
        &mut self,
        topic: &str,
        payload: &[u8],
        at: DateTime<Local>,
    ) -> Option<SensorKind> {
        let Some(kind) = self.topics.classify(topic) else {
            debug!(topic, "ignoring message on unknown topic");
            return None;
        };
        let value = parse_reading(payload);

        let (fresh, held) = match kind {
            SensorKind::Light => (&mut self.light, &mut self.presence),
            SensorKind::Presence => (&mut self.presence, &mut self.light),
        };
        let carried = held.back().copied().unwrap_or(0.0);
        fresh.push_back(value);
        held.push_back(carried);
        self.timestamps.push_back(format_time(at));

        while self.timestamps.len() > self.capacity {
            self.timestamps.pop_front();
            self.light.pop_front();
            self.presence.pop_front();
        }

        info!("{}: {}", topic, value);
        Some(kind)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &VecDeque<String> {
        &self.timestamps
    }

    pub fn light(&self) -> &VecDeque<f64> {
        &self.light
    }

    pub fn presence(&self) -> &VecDeque<f64> {
        &self.presence
    }

    pub fn series(&self, kind: SensorKind) -> &VecDeque<f64> {
        match kind {
            SensorKind::Light => &self.light,
            SensorKind::Presence => &self.presence,
        }
    }

    /// Most recent value of a series together with its time label.
    pub fn latest(&self, kind: SensorKind) -> Option<(f64, &str)> {
        let value = *self.series(kind).back()?;
        let at = self.timestamps.back()?;
        Some((value, at.as_str()))
    }
}
