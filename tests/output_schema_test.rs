use chrono::{DateTime, Utc};
use emporia_poller::models::{ChannelReading, PollResult};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn to_line(result: &PollResult) -> String {
    serde_json::to_string(result).unwrap()
}

fn assert_valid_utc_timestamp(value: &Value) {
    let raw = value.as_str().expect("timestamp must be a string");
    let parsed = DateTime::parse_from_rfc3339(raw).expect("timestamp must be ISO-8601");
    assert_eq!(parsed.offset().local_minus_utc(), 0);
}

#[test]
fn no_internet_schema() {
    let line = to_line(&PollResult::NoInternet {
        message: "connectivity check failed: timeout".into(),
        timestamp: Utc::now(),
    });
    assert!(!line.contains('\n'));

    let json: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["status"], "no_internet");
    assert_eq!(json["message"], "connectivity check failed: timeout");
    assert_valid_utc_timestamp(&json["timestamp"]);
}

#[test]
fn success_schema_with_readings() {
    let readings = vec![
        ChannelReading::new(464590, "1,2,3".into(), "Mains".into(), Some(0.0001)),
        ChannelReading::new(464590, "4".into(), "Heater".into(), None),
    ];
    let line = to_line(&PollResult::Success {
        execution_time_seconds: 2.41,
        readings,
    });
    assert!(!line.contains('\n'));

    let json: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["status"], "success");
    assert!(json["execution_time_seconds"].as_f64().unwrap() >= 0.0);

    let readings = json["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 2);
    for reading in readings {
        assert_valid_utc_timestamp(&reading["timestamp"]);
    }
    assert_eq!(readings[0]["device_id"], 464590);
    assert_eq!(readings[0]["channel_id"], "1,2,3");
    assert_eq!(readings[0]["channel_name"], "Mains");
    assert_eq!(readings[0]["usage_kWh"], 0.0001);
    assert_eq!(readings[0]["usage_W"], 360.0);
    // Missing usage is reported as zero, not omitted.
    assert_eq!(readings[1]["usage_kWh"], 0.0);
    assert_eq!(readings[1]["usage_W"], 0.0);
}

#[test]
fn api_error_schema() {
    let line = to_line(&PollResult::ApiError {
        message: "API request failed: 429 Too Many Requests".into(),
        execution_time_seconds: 0.87,
        timestamp: Utc::now(),
    });
    assert!(!line.contains('\n'));

    let json: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["status"], "api_error");
    assert!(json["execution_time_seconds"].as_f64().unwrap() >= 0.0);
    assert_valid_utc_timestamp(&json["timestamp"]);
}

#[test]
fn fatal_error_schema_and_exit_code() {
    let result = PollResult::FatalError {
        message: "authentication failed: bad credentials".into(),
        timestamp: Utc::now(),
    };
    let line = to_line(&result);
    assert!(!line.contains('\n'));

    let json: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["status"], "fatal_error");
    assert_valid_utc_timestamp(&json["timestamp"]);
    assert_eq!(result.exit_code(), 1);
}
