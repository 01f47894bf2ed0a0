// entities.rs — entity lump parser

use cubebake_common::q_shared::{parse_vec3, Vec3};

use crate::BspError;

/// One `{ "key" "value" ... }` block. Keys keep their order; lookups are
/// case-insensitive and the last duplicate wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    pub pairs: Vec<(String, String)>,
}

impl Entity {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> &str {
        self.value("classname").unwrap_or("")
    }

    pub fn vec3(&self, key: &str) -> Option<Vec3> {
        self.value(key).and_then(parse_vec3)
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        self.value(key).and_then(|v| v.trim().parse().ok())
    }
}

/// Next token: a quoted string, a brace, or a bare word. `//` comments
/// run to the end of the line.
fn parse_token<'a>(text: &mut &'a str) -> Option<&'a str> {
    loop {
        *text = text.trim_start();
        if let Some(rest) = text.strip_prefix("//") {
            *text = rest.find('\n').map_or("", |i| &rest[i..]);
            continue;
        }
        break;
    }
    if text.is_empty() {
        return None;
    }

    let s = *text;
    if let Some(rest) = s.strip_prefix('"') {
        let end = rest.find('"').unwrap_or(rest.len());
        *text = rest.get(end + 1..).unwrap_or("");
        return Some(&rest[..end]);
    }
    if s.starts_with('{') || s.starts_with('}') {
        *text = &s[1..];
        return Some(&s[..1]);
    }
    let end = s
        .find(|c: char| c.is_whitespace() || c == '{' || c == '}' || c == '"')
        .unwrap_or(s.len());
    *text = &s[end..];
    Some(&s[..end])
}

pub fn parse_entities(text: &str) -> Result<Vec<Entity>, BspError> {
    let mut rest = text.trim_end_matches('\0');
    let mut entities = Vec::new();

    while let Some(token) = parse_token(&mut rest) {
        if token != "{" {
            return Err(BspError::Entity(format!("expected '{{', found '{}'", token)));
        }
        let mut entity = Entity::default();
        loop {
            let key = parse_token(&mut rest).ok_or_else(|| BspError::Entity("EOF without closing brace".into()))?;
            if key == "}" {
                break;
            }
            let value = parse_token(&mut rest).ok_or_else(|| BspError::Entity("EOF without closing brace".into()))?;
            if value == "}" {
                return Err(BspError::Entity(format!("closing brace without data after '{}'", key)));
            }
            entity.pairs.push((key.to_string(), value.to_string()));
        }
        entities.push(entity);
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worldspawn_and_light() {
        let text = r#"
{
"classname" "worldspawn"
"skyname" "sky_day01_01"
}
// a comment
{
"origin" "16 -32 64"
"classname" "light"
"_light" "255 128 0 200"
}
"#;
        let ents = parse_entities(text).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), "worldspawn");
        assert_eq!(ents[0].value("SKYNAME"), Some("sky_day01_01"));
        assert_eq!(ents[1].vec3("origin"), Some([16.0, -32.0, 64.0]));
    }

    #[test]
    fn test_trailing_nul_and_empty() {
        assert!(parse_entities("\0").unwrap().is_empty());
        assert_eq!(parse_entities("{ \"a\" \"b\" }\0").unwrap().len(), 1);
    }

    #[test]
    fn test_unterminated_entity() {
        assert!(parse_entities("{ \"classname\" \"light\"").is_err());
        assert!(parse_entities("\"stray\"").is_err());
    }
}
