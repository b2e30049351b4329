use serde_json::Value;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello { name: Option<String> },
    Select { row: i64, col: i64 },
    NewBoard { seed: Option<u64> },
    Hint,
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let name = match object.get("name") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            Some(ParsedClientMessage::Hello { name })
        }
        "select" => {
            let row = parse_optional_i64(object.get("row"))??;
            let col = parse_optional_i64(object.get("col"))??;
            Some(ParsedClientMessage::Select { row, col })
        }
        "new_board" => {
            let seed = match parse_optional_i64(object.get("seed"))? {
                None => None,
                Some(seed) => Some(u64::try_from(seed).ok()?),
            };
            Some(ParsedClientMessage::NewBoard { seed })
        }
        "hint" => Some(ParsedClientMessage::Hint),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
