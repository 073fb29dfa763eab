// Timestamped key/value events handed to a metrics sink

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            // zabbix_sender rejects a missing value, so empty text goes out quoted.
            MetricValue::Text(s) if s.is_empty() => f.write_str("\"\""),
            MetricValue::Text(s) if s.chars().any(|c| c.is_whitespace() || c == '"') => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub hostname: String,
    pub timestamp: i64,
    pub key: String,
    pub value: MetricValue,
}

impl Event {
    /// One `zabbix_sender --with-timestamps` input line: `hostname key timestamp value`.
    pub fn sender_line(&self) -> String {
        format!(
            "{} {} {} {}\n",
            self.hostname, self.key, self.timestamp, self.value
        )
    }
}
