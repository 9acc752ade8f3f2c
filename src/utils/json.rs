use serde_json::Value;

/// Removes markdown code fences a model tends to wrap JSON replies in.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "")
}

pub fn parse_model_json(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_reply() {
        let raw = "  ```json\n{\"parties\": [\"Acme\", \"Globex\"]}\n```  ";
        assert_eq!(
            parse_model_json(raw).expect("valid json"),
            json!({ "parties": ["Acme", "Globex"] })
        );
    }

    #[test]
    fn parses_bare_array() {
        let raw = "[{\"clause_name\": \"Indemnity\", \"risk_level\": \"High\"}]";
        let value = parse_model_json(raw).expect("valid json");
        assert_eq!(value[0]["risk_level"], "High");
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_model_json("Sorry, I cannot help with that.").is_err());
        assert!(parse_model_json("LLM API Error: request failed").is_err());
    }
}
