use super::{SensorError, SensorEvent};

/// One parsed line of the sensor bridge protocol.
///
/// ```text
/// [ms,]din,<index>,<0|1>
/// [ms,]ain,<index>,<value>
/// [ms,]attach,<device>
/// [ms,]detach
/// [ms,]fault,<description>
/// ```
///
/// The optional leading field is a millisecond offset used by recorded
/// traces; live bridges omit it.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorLine {
    pub offset_ms: Option<u64>,
    pub event: SensorEvent,
}

/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_sensor_line(raw: &str) -> Result<Option<SensorLine>, SensorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let offset_ms = match fields.first().map(|first| first.parse::<u64>()) {
        Some(Ok(offset)) => {
            fields.remove(0);
            Some(offset)
        }
        _ => None,
    };

    let Some((kind, args)) = fields.split_first() else {
        return Err(parse_error(trimmed, "missing event kind"));
    };

    let event = match kind.to_ascii_lowercase().as_str() {
        "din" => {
            let [index, state] = args else {
                return Err(parse_error(trimmed, "expected din,<index>,<state>"));
            };
            SensorEvent::DigitalChanged {
                index: parse_index(trimmed, index)?,
                state: parse_digital(trimmed, state)?,
            }
        }
        "ain" => {
            let [index, value] = args else {
                return Err(parse_error(trimmed, "expected ain,<index>,<value>"));
            };
            let value = value
                .parse::<f64>()
                .map_err(|e| parse_error(trimmed, &format!("invalid analog value: {e}")))?;
            SensorEvent::AnalogChanged {
                index: parse_index(trimmed, index)?,
                value,
            }
        }
        "attach" => {
            let device = args.join(",");
            SensorEvent::Attached {
                device: if device.is_empty() {
                    "unknown device".to_string()
                } else {
                    device
                },
            }
        }
        "detach" => SensorEvent::Detached,
        "fault" => SensorEvent::Fault {
            description: args.join(","),
        },
        other => return Err(parse_error(trimmed, &format!("unknown event kind `{other}`"))),
    };

    Ok(Some(SensorLine { offset_ms, event }))
}

fn parse_index(line: &str, raw: &str) -> Result<u8, SensorError> {
    raw.parse::<u8>()
        .map_err(|e| parse_error(line, &format!("invalid channel index `{raw}`: {e}")))
}

fn parse_digital(line: &str, raw: &str) -> Result<bool, SensorError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(parse_error(line, &format!("invalid digital state `{raw}`"))),
    }
}

fn parse_error(line: &str, reason: &str) -> SensorError {
    SensorError::Parse {
        line: line.to_string(),
        reason: reason.to_string(),
    }
}
