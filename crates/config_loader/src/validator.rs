//! 场景校验模块
//!
//! 校验规则：
//! - duration_s 为有限正数
//! - lookahead_s 为有限正数
//! - size_classes 非空、严格递增、最后一级为无穷大
//! - 初始运动为有限值，运动范围 low <= high 且包含初始位置
//! - 初始 cue 与时间线 cue 的 key 非空，初始 cue 的 key 唯一
//! - 时间线 at >= 0 且不递减，运动更新为有限值

use std::collections::HashSet;

use contracts::{ContractError, MotionUpdate, Scenario};

/// 校验 Scenario
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(scenario: &Scenario) -> Result<(), ContractError> {
    validate_duration(scenario)?;
    validate_sequencer(scenario)?;
    validate_size_classes(scenario)?;
    validate_motion(scenario)?;
    validate_cues(scenario)?;
    validate_timeline(scenario)?;
    Ok(())
}

fn finite_positive(field: &str, value: f64) -> Result<(), ContractError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ContractError::config_validation(
            field,
            format!("must be a finite number > 0, got {value}"),
        ));
    }
    Ok(())
}

/// 校验运行时长
fn validate_duration(scenario: &Scenario) -> Result<(), ContractError> {
    finite_positive("duration_s", scenario.duration_s)
}

/// 校验前瞻窗口
fn validate_sequencer(scenario: &Scenario) -> Result<(), ContractError> {
    finite_positive("sequencer.lookahead_s", scenario.sequencer.lookahead_s)
}

/// 校验桶的长度分级
fn validate_size_classes(scenario: &Scenario) -> Result<(), ContractError> {
    let classes = &scenario.axis.size_classes;
    let Some(last) = classes.last() else {
        return Err(ContractError::config_validation(
            "axis.size_classes",
            "at least one size class is required",
        ));
    };
    if classes.iter().any(|c| c.is_nan() || *c < 0.0) {
        return Err(ContractError::config_validation(
            "axis.size_classes",
            "size classes must be non-negative numbers",
        ));
    }
    if classes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ContractError::config_validation(
            "axis.size_classes",
            "size classes must be strictly ascending",
        ));
    }
    if *last != f64::INFINITY {
        return Err(ContractError::config_validation(
            "axis.size_classes",
            format!("last size class must be inf, got {last}"),
        ));
    }
    Ok(())
}

/// 校验初始运动与范围
fn validate_motion(scenario: &Scenario) -> Result<(), ContractError> {
    let motion = &scenario.motion;
    for (field, value) in [
        ("motion.position", motion.position),
        ("motion.velocity", motion.velocity),
        ("motion.acceleration", motion.acceleration),
    ] {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("must be finite, got {value}"),
            ));
        }
    }

    let range = &motion.range;
    if range.low.is_nan() || range.high.is_nan() || range.low > range.high {
        return Err(ContractError::config_validation(
            "motion.range",
            format!("invalid range [{}, {}]", range.low, range.high),
        ));
    }
    if motion.position < range.low || motion.position > range.high {
        return Err(ContractError::config_validation(
            "motion.position",
            format!(
                "position {} outside range [{}, {}]",
                motion.position, range.low, range.high
            ),
        ));
    }
    Ok(())
}

/// 校验初始 cue
fn validate_cues(scenario: &Scenario) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, cue) in scenario.cues.iter().enumerate() {
        if !cue.key.is_valid() {
            return Err(ContractError::config_validation(
                format!("cues[{idx}].key"),
                "cue key cannot be empty",
            ));
        }
        if !seen.insert(cue.key.as_str()) {
            return Err(ContractError::config_validation(
                format!("cues[key={}]", cue.key),
                "duplicate cue key",
            ));
        }
    }
    Ok(())
}

fn validate_motion_update(field: &str, update: &MotionUpdate) -> Result<(), ContractError> {
    if update.is_empty() {
        return Err(ContractError::config_validation(
            field,
            "motion update sets no field",
        ));
    }
    let values = [update.position, update.velocity, update.acceleration];
    if values.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ContractError::config_validation(
            field,
            "motion update values must be finite",
        ));
    }
    Ok(())
}

/// 校验时间线
fn validate_timeline(scenario: &Scenario) -> Result<(), ContractError> {
    let mut prev = 0.0;
    for (idx, step) in scenario.timeline.iter().enumerate() {
        if !step.at.is_finite() || step.at < prev {
            return Err(ContractError::config_validation(
                format!("timeline[{idx}].at"),
                format!("steps must be finite, >= 0 and in order, got {}", step.at),
            ));
        }
        prev = step.at;

        if let Some(motion) = &step.motion {
            validate_motion_update(&format!("timeline[{idx}].motion"), motion)?;
        }
        if let Some(pos) = step.cues.iter().position(|c| !c.key.is_valid()) {
            return Err(ContractError::config_validation(
                format!("timeline[{idx}].cues[{pos}].key"),
                "cue key cannot be empty",
            ));
        }
    }
    Ok(())
}
