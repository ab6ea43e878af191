use crate::config::RegistryConfig;

/// One `shortName:value` pair, both sides trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Split a payload into tokens.
///
/// Pieces without the marker, or with an empty name, are skipped. Only the
/// first marker splits, so values may themselves contain it. Separators
/// inside `{}`/`[]` or double-quoted strings do not split, which keeps JSON
/// values whole.
pub fn tokenize<'a>(payload: &'a str, config: &RegistryConfig) -> Vec<Token<'a>> {
    top_level_pieces(payload, &config.separators)
        .into_iter()
        .filter_map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                return None;
            }
            let Some((name, value)) = piece.split_once(config.marker) else {
                tracing::trace!(piece, "skipping token without marker");
                return None;
            };
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Token {
                name,
                value: value.trim(),
            })
        })
        .collect()
}

fn top_level_pieces<'a>(payload: &'a str, separators: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in payload.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && separators.contains(c) => {
                pieces.push(&payload[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&payload[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(tokens: &'a [Token<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.name).collect()
    }

    #[test]
    fn splits_on_every_separator() {
        let config = RegistryConfig::default();
        let tokens = tokenize("id:01A2;temp:23.5,hum:40\r\nbat:3.7", &config);
        assert_eq!(names(&tokens), vec!["id", "temp", "hum", "bat"]);
        assert_eq!(tokens[1].value, "23.5");
    }

    #[test]
    fn trims_and_skips_malformed() {
        let config = RegistryConfig::default();
        let tokens = tokenize(" temp : 1 ;;garbage; :orphan;hum:", &config);
        assert_eq!(
            tokens,
            vec![
                Token {
                    name: "temp",
                    value: "1"
                },
                Token {
                    name: "hum",
                    value: ""
                },
            ]
        );
    }

    #[test]
    fn first_marker_wins() {
        let config = RegistryConfig::default();
        let tokens = tokenize(r#"cfg:{"a":1}"#, &config);
        assert_eq!(tokens[0].value, r#"{"a":1}"#);
    }

    #[test]
    fn json_members_stay_in_one_value() {
        let config = RegistryConfig::default();
        let tokens = tokenize(r#"cfg:{"a":1,"b":[2,3]};note:"x;y";temp:4"#, &config);
        assert_eq!(names(&tokens), vec!["cfg", "note", "temp"]);
        assert_eq!(tokens[0].value, r#"{"a":1,"b":[2,3]}"#);
        assert_eq!(tokens[1].value, r#""x;y""#);
        assert_eq!(tokens[2].value, "4");
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let config = RegistryConfig::default();
        let tokens = tokenize(r#"cfg:{"s":"a\",b"};n:1"#, &config);
        assert_eq!(names(&tokens), vec!["cfg", "n"]);
        assert_eq!(tokens[0].value, r#"{"s":"a\",b"}"#);
    }

    #[test]
    fn custom_separator_and_marker() {
        let config = RegistryConfig {
            separators: "|".to_string(),
            marker: '=',
            ..RegistryConfig::default()
        };
        let tokens = tokenize("a=1|b=2;c", &config);
        assert_eq!(names(&tokens), vec!["a", "b"]);
        assert_eq!(tokens[1].value, "2;c");
    }
}
