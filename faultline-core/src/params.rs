//! Typed attack parameters.
//!
//! Each attack kind declares one parameter struct. The controller's parameter
//! map is converted with [`parse`] during prepare; after that no attack code
//! looks at untyped values again.
//!
//! The controller encodes numbers as floats (`"rate": 50.0`), so integer
//! fields go through [`integer`] which truncates like the controller's own
//! percentage handling does.

use std::fmt;
use std::time::Duration;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::AttackError;

/// Converts a parameter map into a typed, validated parameter struct.
pub fn parse<T>(config: &Map<String, Value>) -> Result<T, AttackError>
where
    T: DeserializeOwned + Validate,
{
    let params: T = serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| AttackError::validation(format!("invalid attack parameters: {}", e)))?;
    params
        .validate()
        .map_err(|e| AttackError::validation(format!("invalid attack parameters: {}", e)))?;
    Ok(params)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("'{}' is not a number", text))),
    }
}

/// Percentage in `0..=100`, fractional part dropped.
pub fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = number(deserializer)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(D::Error::custom(format!(
            "rate {} is outside of 0..=100",
            value
        )));
    }
    Ok(value.trunc() as u8)
}

/// Whole number, fractional part dropped.
pub fn integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = number(deserializer)?;
    if !value.is_finite() {
        return Err(D::Error::custom("expected a finite number"));
    }
    T::try_from(value.trunc() as i64)
        .map_err(|_| D::Error::custom(format!("{} is out of range", value)))
}

/// Milliseconds as a number, or a string with an `ms`/`s` suffix.
pub fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) if n >= 0.0 && n.is_finite() => {
            Ok(Duration::from_millis(n.trunc() as u64))
        }
        NumberOrText::Number(n) => Err(D::Error::custom(format!("invalid duration {}", n))),
        NumberOrText::Text(text) => parse_duration(&text).map_err(D::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    let (digits, scale) = if let Some(ms) = text.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(s) = text.strip_suffix('s') {
        (s, 1000)
    } else {
        (text, 1)
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .map(Duration::from_millis)
        .ok_or_else(|| format!("invalid duration '{}'", text))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LatencyParams {
    #[serde(deserialize_with = "percentage")]
    #[validate(range(max = 100))]
    pub rate: u8,
    #[serde(deserialize_with = "millis")]
    pub minimum_latency: Duration,
    #[serde(deserialize_with = "millis")]
    pub maximum_latency: Duration,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusCodeParams {
    #[serde(deserialize_with = "percentage")]
    #[validate(range(max = 100))]
    pub rate: u8,
    #[serde(deserialize_with = "integer")]
    #[validate(range(min = 100, max = 599))]
    pub status_code: u16,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionParams {
    #[serde(deserialize_with = "percentage")]
    #[validate(range(max = 100))]
    pub rate: u8,
    #[validate(length(min = 1))]
    pub exception_msg: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FillDiskParams {
    #[serde(deserialize_with = "percentage")]
    #[validate(range(max = 100))]
    pub rate: u8,
    #[serde(deserialize_with = "integer")]
    #[validate(range(min = 1))]
    pub megabytes: u32,
}

/// Traffic direction of a network block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Direction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            _ => Err(format!(
                "invalid direction {} is specified, please select one of the following: inbound, outbound",
                value
            )),
        }
    }
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        direction.as_str().to_string()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BlockParams {
    #[serde(deserialize_with = "percentage", default = "full_rate")]
    #[validate(range(max = 100))]
    pub rate: u8,
    #[validate(length(min = 1))]
    pub hosts: Vec<String>,
    #[serde(default = "default_direction")]
    pub direction: Direction,
}

fn full_rate() -> u8 {
    100
}

fn default_direction() -> Direction {
    Direction::Outbound
}

/// Power state operation of a virtual machine state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VmAction {
    Restart,
    PowerOff,
    Start,
    Delete,
    Deallocate,
}

impl VmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmAction::Restart => "restart",
            VmAction::PowerOff => "power-off",
            VmAction::Start => "start",
            VmAction::Delete => "delete",
            VmAction::Deallocate => "deallocate",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StateChangeParams {
    pub action: VmAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn config(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn controller_floats_become_integers() {
        let params: StatusCodeParams =
            parse(&config(json!({ "rate": 50.0, "statusCode": 500.0, "duration": "30s" })))
                .unwrap();
        assert_eq!(params.rate, 50);
        assert_eq!(params.status_code, 500);
    }

    #[test]
    fn rate_outside_percentage_is_rejected() {
        let err = parse::<StatusCodeParams>(&config(json!({ "rate": 150, "statusCode": 500 })))
            .unwrap_err();
        assert!(err.to_string().contains("rate 150 is outside of 0..=100"));
    }

    #[test]
    fn status_code_range_is_validated() {
        let err = parse::<StatusCodeParams>(&config(json!({ "rate": 10, "statusCode": 42 })))
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid attack parameters"));
    }

    #[test]
    fn latency_accepts_numbers_and_suffixed_strings() {
        let params: LatencyParams = parse(&config(json!({
            "rate": 100,
            "minimumLatency": 250,
            "maximumLatency": "2s"
        })))
        .unwrap();
        assert_eq!(params.minimum_latency, Duration::from_millis(250));
        assert_eq!(params.maximum_latency, Duration::from_millis(2000));
    }

    #[test]
    fn oversized_latency_is_rejected() {
        let err = parse::<LatencyParams>(&config(json!({
            "rate": 10,
            "minimumLatency": "18446744073709551615s",
            "maximumLatency": 1
        })))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn missing_parameter_is_named() {
        let err = parse::<ExceptionParams>(&config(json!({ "rate": 10 }))).unwrap_err();
        assert!(err.to_string().contains("exceptionMsg"));
    }

    #[test]
    fn invalid_direction_lists_options() {
        let err = parse::<BlockParams>(&config(json!({
            "hosts": ["10.0.0.5"],
            "direction": "sideways"
        })))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("please select one of the following: inbound, outbound"));
    }

    #[test]
    fn block_defaults_to_outbound() {
        let params: BlockParams = parse(&config(json!({ "hosts": ["10.0.0.5"] }))).unwrap();
        assert_eq!(params.direction, Direction::Outbound);
        assert_eq!(params.rate, 100);
    }

    #[test]
    fn empty_host_list_is_rejected() {
        assert!(parse::<BlockParams>(&config(json!({ "hosts": [] }))).is_err());
    }

    #[test]
    fn vm_actions_use_kebab_case() {
        let params: StateChangeParams =
            parse(&config(json!({ "action": "power-off" }))).unwrap();
        assert_eq!(params.action, VmAction::PowerOff);
        assert!(parse::<StateChangeParams>(&config(json!({ "action": "explode" }))).is_err());
    }
}
