//! Stats API response envelope
//!
//! Every endpoint answers with one or more named tables, each a list of
//! headers plus rows of positional JSON values.

use crate::{HoopsError, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Top-level response body
#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    #[serde(rename = "resultSets", default)]
    result_sets: Option<OneOrMany>,
    /// A few endpoints use the singular key
    #[serde(rename = "resultSet", default)]
    result_set: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ResultSet>),
    One(ResultSet),
}

impl OneOrMany {
    fn as_slice(&self) -> &[ResultSet] {
        match self {
            OneOrMany::Many(sets) => sets,
            OneOrMany::One(set) => std::slice::from_ref(set),
        }
    }
}

impl StatsResponse {
    /// Parse a raw response body
    pub fn parse(endpoint: &str, body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| HoopsError::Api {
            endpoint: endpoint.to_string(),
            status: None,
            message: format!("malformed response: {}", e),
        })
    }

    /// All tables in the response
    pub fn sets(&self) -> &[ResultSet] {
        self.result_sets
            .as_ref()
            .or(self.result_set.as_ref())
            .map(OneOrMany::as_slice)
            .unwrap_or(&[])
    }

    /// Table by name, ignoring case
    pub fn set(&self, name: &str) -> Result<&ResultSet> {
        self.sets()
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| HoopsError::Parse(format!("result set {} missing from response", name)))
    }

    /// First table, for endpoints that return a single one
    pub fn first(&self) -> Result<&ResultSet> {
        self.sets()
            .first()
            .ok_or_else(|| HoopsError::Parse("response has no result sets".to_string()))
    }
}

/// A named table of rows
#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    pub name: String,
    pub headers: Vec<String>,
    #[serde(rename = "rowSet")]
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Index of a column, ignoring case (`TEAM_ID` and `Team_ID` both occur)
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row { set: self, values })
    }
}

/// A single row with header-named accessors
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a ResultSet,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.set.column(name).and_then(|i| self.values.get(i))
    }

    /// Integer value; null, missing or unparseable yields 0
    pub fn int(&self, name: &str) -> i64 {
        self.opt_int(name).unwrap_or(0)
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(value_to_i64)
    }

    /// Text value; numbers are rendered, null is None
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Minutes played as whole minutes
    pub fn minutes(&self, name: &str) -> i64 {
        self.get(name).map(parse_minutes).unwrap_or(0)
    }
}

/// Convert a JSON value to an integer, truncating decimals
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f as i64),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

fn iso_minutes() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^PT(\d+)M(\d+(?:\.\d+)?)S$").expect("valid regex"))
}

/// Parse a minutes value: `MM:SS`, `PT34M12.00S`, or a plain number.
/// Anything else is logged and counted as zero.
pub fn parse_minutes(value: &Value) -> i64 {
    let text = match value {
        Value::Null => return 0,
        Value::Number(n) => return n.as_f64().map(|f| f as i64).unwrap_or(0),
        Value::String(s) => s.trim(),
        other => {
            log::warn!("Could not parse minutes value: {}", other);
            return 0;
        }
    };

    if text.is_empty() {
        return 0;
    }

    if let Some((mins, secs)) = text.split_once(':') {
        if let (Ok(m), Ok(s)) = (mins.trim().parse::<f64>(), secs.trim().parse::<f64>()) {
            return (m + s / 60.0) as i64;
        }
    } else if let Some(caps) = iso_minutes().captures(text) {
        let m: f64 = caps[1].parse().unwrap_or(0.0);
        let s: f64 = caps[2].parse().unwrap_or(0.0);
        return (m + s / 60.0) as i64;
    } else if let Ok(m) = text.parse::<f64>() {
        return m as i64;
    }

    log::warn!("Could not parse minutes value: {}", text);
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GAME_LOG: &str = r#"{
        "resource": "teamgamelog",
        "resultSets": [{
            "name": "TeamGameLog",
            "headers": ["Team_ID", "Game_ID", "GAME_DATE", "PTS", "FG_PCT", "MIN"],
            "rowSet": [
                [1610612738, "0022400061", "OCT 22, 2024", 132, 0.506, "240:00"],
                [1610612738, "0022400075", "OCT 24, 2024", null, null, null]
            ]
        }]
    }"#;

    #[test]
    fn test_parse_result_sets() {
        let response = StatsResponse::parse("teamgamelog", GAME_LOG).unwrap();
        let set = response.set("teamgamelog").unwrap();
        assert_eq!(set.len(), 2);

        let rows: Vec<_> = set.rows().collect();
        assert_eq!(rows[0].int("TEAM_ID"), 1610612738);
        assert_eq!(rows[0].text("game_id").as_deref(), Some("0022400061"));
        assert_eq!(rows[1].int("PTS"), 0);
        assert_eq!(rows[1].opt_int("PTS"), None);
        assert_eq!(rows[1].text("FG_PCT"), None);
        assert!(response.set("LineScore").is_err());
    }

    #[test]
    fn test_parse_singular_result_set() {
        let body = r#"{"resultSet": {"name": "Players", "headers": ["PERSON_ID"], "rowSet": [[1], [2]]}}"#;
        let response = StatsResponse::parse("x", body).unwrap();
        assert_eq!(response.first().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_body() {
        let err = StatsResponse::parse("scoreboardv2", "<html>blocked</html>").unwrap_err();
        assert!(matches!(err, HoopsError::Api { ref endpoint, .. } if endpoint == "scoreboardv2"));
    }

    #[test]
    fn test_value_to_i64() {
        assert_eq!(value_to_i64(&json!(12)), Some(12));
        assert_eq!(value_to_i64(&json!(12.9)), Some(12));
        assert_eq!(value_to_i64(&json!("7")), Some(7));
        assert_eq!(value_to_i64(&json!("7.0")), Some(7));
        assert_eq!(value_to_i64(&json!(null)), None);
        assert_eq!(value_to_i64(&json!("n/a")), None);
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes(&json!("34:30")), 34);
        assert_eq!(parse_minutes(&json!("9:59")), 9);
        assert_eq!(parse_minutes(&json!("PT36M12.00S")), 36);
        assert_eq!(parse_minutes(&json!("PT00M59.99S")), 0);
        assert_eq!(parse_minutes(&json!(28)), 28);
        assert_eq!(parse_minutes(&json!("31.8")), 31);
        assert_eq!(parse_minutes(&json!(null)), 0);
        assert_eq!(parse_minutes(&json!("")), 0);
        assert_eq!(parse_minutes(&json!("DNP")), 0);
    }
}
