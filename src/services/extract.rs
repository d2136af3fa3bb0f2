//! 模型响应文本归一化
//! 剥离 Markdown 代码块与旁白文字，提取可直接解析的 JSON 片段

use regex::Regex;

/// 从模型原始响应中提取 JSON 负载
///
/// 依次尝试：代码块围栏内的内容、正文里第一段括号包围的片段、
/// 首个 `[` 与末尾 `]` 之间的切片。找不到时原样返回清理后的文本，
/// 由调用方的 JSON 解析报错。
pub fn extract_json_payload(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut text = trimmed.to_string();

    if trimmed.starts_with("```") {
        for part in trimmed.split("```") {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("json") {
                text = rest.trim().to_string();
                break;
            }
            if part.starts_with('[') || part.starts_with('{') {
                text = part.to_string();
                break;
            }
        }
    } else if let Some(found) = Regex::new(r"(?s)\[.*\]|\{.*\}").unwrap().find(trimmed) {
        text = found.as_str().to_string();
    }

    let text = text.trim();
    if !text.starts_with('[') {
        if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
            if end > start {
                return text[start..=end].to_string();
            }
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_block() {
        let raw = "```json\n[\"A\",\"B\"]\n```";
        let payload = extract_json_payload(raw);
        assert_eq!(payload, "[\"A\",\"B\"]");
        let parsed: Vec<String> = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, vec!["A", "B"]);
    }

    #[test]
    fn test_fenced_block_without_language_tag() {
        let raw = "```\n[\"X\"]\n```";
        assert_eq!(extract_json_payload(raw), "[\"X\"]");
    }

    #[test]
    fn test_prose_wrapped_array() {
        let raw = "Sure! [\"A\", \"B\"]";
        assert_eq!(extract_json_payload(raw), "[\"A\", \"B\"]");
    }

    #[test]
    fn test_array_spanning_newlines() {
        let raw = "Here you go:\n[\n  \"A\",\n  \"B\"\n]\nHope this helps!";
        let payload = extract_json_payload(raw);
        let parsed: Vec<String> = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed, vec!["A", "B"]);
    }

    #[test]
    fn test_object_payload() {
        let raw = "Result: {\"message\": \"hi\"}";
        assert_eq!(extract_json_payload(raw), "{\"message\": \"hi\"}");
    }

    #[test]
    fn test_unrecoverable_text_returned_as_is() {
        let raw = "  no json here  ";
        let payload = extract_json_payload(raw);
        assert_eq!(payload, "no json here");
        assert!(serde_json::from_str::<serde_json::Value>(&payload).is_err());
    }
}
