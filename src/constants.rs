pub const TICK_RATE_MS: u64 = 100; // keyboard poll / channel wait
pub const MAX_SAMPLES: usize = 20;

pub const DEFAULT_BROKER_HOST: &str = "broker.hivemq.com";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "room-monitor";
pub const KEEP_ALIVE_SECS: u64 = 60;

pub const TOPIC_LIGHT: &str = "/sala/luminosidade";
pub const TOPIC_PRESENCE: &str = "/sala/presenca";

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const PLOT_LIMIT: f64 = 1e300;
pub const CHART_TITLE: &str = " Real-time monitoring ";
pub const DEFAULT_LOG_FILE: &str = "room-monitor.log";
