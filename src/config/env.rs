//! Environment variable overrides.
//!
//! Variable names follow the services' deployment manifests:
//! `GATEWAY_*` for the listener, `<BACKEND>_SERVICE_*` per backend, and
//! `LOG_LEVEL` / `LOG_FORMAT` for logging. Overrides are applied on top of
//! defaults and the optional config file.

use std::time::Duration;

use crate::backend::BackendName;
use crate::config::loader::ConfigError;
use crate::config::schema::{GatewayConfig, LogFormat};

/// Apply overrides read through `lookup` (normally `std::env::var`).
///
/// Unset or empty variables are ignored; malformed values are errors.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(addr) = get("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(port) = get("GATEWAY_PORT") {
        let port: u16 = parse_value("GATEWAY_PORT", &port)?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    if let Some(v) = get("GATEWAY_REQUEST_TIMEOUT") {
        config.server.request_timeout_ms = duration_ms("GATEWAY_REQUEST_TIMEOUT", &v)?;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = get("LOG_FORMAT") {
        config.observability.log_format = match v.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            _ => return Err(invalid("LOG_FORMAT", &v, "expected 'json' or 'pretty'")),
        };
    }
    if let Some(v) = get("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse_value("METRICS_ENABLED", &v)?;
    }
    if let Some(v) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = v;
    }
    if let Some(v) = get("HEALTH_CHECK_INTERVAL") {
        config.health_check.interval_ms = duration_ms("HEALTH_CHECK_INTERVAL", &v)?;
    }

    for name in BackendName::ALL {
        let prefix = format!("{}_SERVICE_", name.as_str().to_ascii_uppercase());
        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let backend = config.backends.get_mut(name);

        if let Some(v) = get(&key("ADDRESS")) {
            backend.address = v;
        }
        if let Some(v) = get(&key("TIMEOUT")) {
            backend.timeout_ms = duration_ms(&key("TIMEOUT"), &v)?;
        }
        if let Some(v) = get(&key("MAX_RETRIES")) {
            let retries: u32 = parse_value(&key("MAX_RETRIES"), &v)?;
            backend.retry.max_attempts = retries.saturating_add(1);
        }
        if let Some(v) = get(&key("RETRY_DELAY")) {
            backend.retry.initial_delay_ms = duration_ms(&key("RETRY_DELAY"), &v)?;
        }
        if let Some(v) = get(&key("MAX_RETRY_DELAY")) {
            backend.retry.max_delay_ms = duration_ms(&key("MAX_RETRY_DELAY"), &v)?;
        }
        if let Some(v) = get(&key("BACKOFF_MULTIPLIER")) {
            backend.retry.multiplier = parse_value(&key("BACKOFF_MULTIPLIER"), &v)?;
        }
        if let Some(v) = get(&key("RETRY_JITTER")) {
            backend.retry.jitter = parse_value(&key("RETRY_JITTER"), &v)?;
        }
        if let Some(v) = get(&key("CB_MAX_REQUESTS")) {
            backend.circuit_breaker.max_half_open_requests = parse_value(&key("CB_MAX_REQUESTS"), &v)?;
        }
        if let Some(v) = get(&key("CB_INTERVAL")) {
            backend.circuit_breaker.interval_ms = duration_ms(&key("CB_INTERVAL"), &v)?;
        }
        if let Some(v) = get(&key("CB_TIMEOUT")) {
            backend.circuit_breaker.open_timeout_ms = duration_ms(&key("CB_TIMEOUT"), &v)?;
        }
        if let Some(v) = get(&key("CB_FAILURE_THRESHOLD")) {
            backend.circuit_breaker.failure_threshold = parse_value(&key("CB_FAILURE_THRESHOLD"), &v)?;
        }
        if let Some(v) = get(&key("CB_SUCCESS_THRESHOLD")) {
            backend.circuit_breaker.success_threshold = parse_value(&key("CB_SUCCESS_THRESHOLD"), &v)?;
        }
        if let Some(v) = get(&key("HEALTH_INTERVAL")) {
            backend.health_interval_ms = Some(duration_ms(&key("HEALTH_INTERVAL"), &v)?);
        }
    }

    Ok(())
}

/// Parse a Go-style duration: one or more `<number><unit>` terms such as
/// `250ms`, `1.5s` or `1h2m30s`, with units `ns`, `us`/`µs`, `ms`, `s`, `m`
/// and `h`. A bare number is a millisecond count.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(millis) = raw.parse::<f64>() {
        return nanos(millis, 1_000_000);
    }

    let mut rest = raw;
    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let value: f64 = number.parse().ok()?;
        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };
        total = total.checked_add(nanos(value, scale)?)?;
        rest = tail;
    }
    Some(total)
}

/// `value * scale` nanoseconds, rejecting NaN, negatives and overflow.
fn nanos(value: f64, scale: u64) -> Option<Duration> {
    let nanos = (value * scale as f64).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

fn duration_ms(key: &str, raw: &str) -> Result<u64, ConfigError> {
    parse_duration(raw)
        .map(|d| d.as_millis() as u64)
        .ok_or_else(|| invalid(key, raw, "expected a duration like 250ms, 10s or 1m30s"))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
