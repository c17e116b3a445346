//! Conversion between [`Action`]s and transport-safe JSON records.

use super::{Action, DecodeError, Stroke, default_size};
use crate::color::BoardColor;
use kurbo::Point;
use serde::Deserialize;
use serde_json::Value;

/// Tag of single-segment records written by older clients.
pub const LEGACY_SEGMENT_TAG: &str = "draw";

/// Old per-segment pen record. Decoded into a two-point stroke, never written.
#[derive(Deserialize)]
struct LegacySegment {
    from: Point,
    to: Point,
    #[serde(default)]
    color: BoardColor,
    #[serde(default = "default_size")]
    size: f64,
}

/// Encode an action as a transport record.
pub fn encode(action: &Action) -> Result<Value, serde_json::Error> {
    serde_json::to_value(action)
}

/// Encode a whole sequence, preserving order.
pub fn encode_all(actions: &[Action]) -> Result<Vec<Value>, serde_json::Error> {
    actions.iter().map(encode).collect()
}

/// Decode a transport record.
///
/// Rejects records that are missing required fields for their declared type
/// or that violate an action invariant. `color` and `size` may be omitted and
/// fall back to black and 2.
pub fn decode(record: &Value) -> Result<Action, DecodeError> {
    let obj = record.as_object().ok_or(DecodeError::NotAnObject)?;
    let tag = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    let kind: &'static str = match tag {
        "stroke" => "stroke",
        "rect" => "rect",
        "circle" => "circle",
        "text" => "text",
        LEGACY_SEGMENT_TAG => LEGACY_SEGMENT_TAG,
        other => return Err(DecodeError::UnknownType(other.to_string())),
    };
    let malformed = |e: serde_json::Error| DecodeError::Malformed {
        kind,
        message: e.to_string(),
    };

    let action = if kind == LEGACY_SEGMENT_TAG {
        let seg = LegacySegment::deserialize(record).map_err(malformed)?;
        Action::Stroke(Stroke::new(vec![seg.from, seg.to], seg.color, seg.size))
    } else {
        Action::deserialize(record).map_err(malformed)?
    };

    action.validate()?;
    Ok(action)
}

/// Decode a sequence, skipping (and logging) records that fail to decode.
///
/// One corrupt entry must not blank the board, so the remaining actions are
/// returned in their original relative order.
pub fn decode_all(records: &[Value]) -> Vec<Action> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match decode(record) {
            Ok(action) => Some(action),
            Err(e) => {
                log::warn!("Skipping action record {}: {}", index, e);
                None
            }
        })
        .collect()
}
