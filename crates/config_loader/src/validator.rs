//! 配置校验模块
//!
//! 校验规则：
//! - app_service_id 非空且为十六进制
//! - max_concurrency >= 1
//! - step_timeout_ms / stop_retry_delay_ms >= 1
//! - skip_after.failures >= 1

use contracts::{BeatcastConfig, ContractError, DeviceRetryPolicy};

/// 校验 BeatcastConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &BeatcastConfig) -> Result<(), ContractError> {
    validate_advertise(config)?;
    validate_connect(config)?;
    Ok(())
}

fn is_hex(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// 校验广播配置
fn validate_advertise(config: &BeatcastConfig) -> Result<(), ContractError> {
    let advertise = &config.advertise;

    if !is_hex(&advertise.app_service_id) {
        return Err(ContractError::config_validation(
            "advertise.app_service_id",
            format!(
                "must be a non-empty hex service id, got '{}'",
                advertise.app_service_id
            ),
        ));
    }

    if advertise.stop_retry_delay_ms == 0 {
        return Err(ContractError::config_validation(
            "advertise.stop_retry_delay_ms",
            "stop_retry_delay_ms must be >= 1",
        ));
    }

    Ok(())
}

/// 校验连接分发配置
fn validate_connect(config: &BeatcastConfig) -> Result<(), ContractError> {
    let connect = &config.connect;

    if connect.max_concurrency == 0 {
        return Err(ContractError::config_validation(
            "connect.max_concurrency",
            "max_concurrency must be >= 1",
        ));
    }

    if connect.step_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "connect.step_timeout_ms",
            "step_timeout_ms must be >= 1",
        ));
    }

    if let DeviceRetryPolicy::SkipAfter { failures: 0 } = connect.retry_policy {
        return Err(ContractError::config_validation(
            "connect.retry_policy.failures",
            "skip_after needs failures >= 1",
        ));
    }

    for (field, id) in [
        ("connect.scan_service_id", &connect.scan_service_id),
        ("connect.write_characteristic_id", &connect.write_characteristic_id),
    ] {
        if !is_hex(&id.replace('-', "")) {
            return Err(ContractError::config_validation(
                field,
                format!("must be a hex uuid, got '{id}'"),
            ));
        }
    }

    Ok(())
}
