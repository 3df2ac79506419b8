//! Delimiter-based substitution engine for build-info templates.
//!
//! Supports `{{.Field}}` substitution with dotted paths plus
//! `{{if .Field}} … {{else}} … {{end}}` blocks. That is the whole
//! grammar; anything else inside `{{ }}` is a parse error.

use thiserror::Error;

/// Parse or render failure. These are surfaced as compile errors so
/// the served page carries them, they never abort the build pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed {{{{ delimiter")]
    Unclosed,
    #[error("unexpected action: {{{{{0}}}}}")]
    Unexpected(String),
    #[error("unterminated if block")]
    UnterminatedIf,
    #[error("unknown field: .{0}")]
    UnknownField(String),
}

/// Value a template field resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Text(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Text(s) => !s.is_empty(),
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

/// Resolver for dotted field paths, e.g. `Version` or `Extra.theme`.
pub trait Fields {
    fn field(&self, path: &str) -> Option<Value>;
}

/// Render `input` against the given field resolver.
pub fn render(input: &str, fields: &dyn Fields) -> Result<String, TemplateError> {
    let tokens = tokenize(input)?;
    let mut tokens = tokens.into_iter();
    let (segments, closer) = parse_block(&mut tokens, false)?;
    debug_assert!(closer.is_none());

    let mut out = String::with_capacity(input.len());
    render_segments(&segments, fields, &mut out)?;
    Ok(out)
}

enum Token {
    Text(String),
    Action(String),
}

enum Segment {
    Text(String),
    Field(String),
    If {
        cond: String,
        then: Vec<Segment>,
        otherwise: Vec<Segment>,
    },
}

fn tokenize(input: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_owned()));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::Unclosed)?;
        tokens.push(Token::Action(after[..end].trim().to_owned()));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_owned()));
    }

    Ok(tokens)
}

/// Parse tokens until the stream ends or, inside an if block, until an
/// `else`/`end` closer is hit. The closer is returned to the caller.
fn parse_block(
    tokens: &mut std::vec::IntoIter<Token>,
    nested: bool,
) -> Result<(Vec<Segment>, Option<String>), TemplateError> {
    let mut segments = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => segments.push(Segment::Text(text)),
            Token::Action(action) => {
                if let Some(cond) = action.strip_prefix("if ") {
                    let cond = parse_field(cond.trim())?;
                    let (then, closer) = parse_block(tokens, true)?;
                    let otherwise = match closer.as_deref() {
                        Some("else") => {
                            let (otherwise, closer) = parse_block(tokens, true)?;
                            if closer.as_deref() != Some("end") {
                                return Err(TemplateError::UnterminatedIf);
                            }
                            otherwise
                        }
                        Some("end") => Vec::new(),
                        _ => return Err(TemplateError::UnterminatedIf),
                    };
                    segments.push(Segment::If {
                        cond,
                        then,
                        otherwise,
                    });
                } else if action == "else" || action == "end" {
                    if !nested {
                        return Err(TemplateError::Unexpected(action));
                    }
                    return Ok((segments, Some(action)));
                } else {
                    segments.push(Segment::Field(parse_field(&action)?));
                }
            }
        }
    }

    if nested {
        return Err(TemplateError::UnterminatedIf);
    }

    Ok((segments, None))
}

fn parse_field(token: &str) -> Result<String, TemplateError> {
    let field = token
        .strip_prefix('.')
        .ok_or_else(|| TemplateError::Unexpected(token.to_owned()))?;

    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(TemplateError::Unexpected(token.to_owned()));
    }

    Ok(field.to_owned())
}

fn render_segments(
    segments: &[Segment],
    fields: &dyn Fields,
    out: &mut String,
) -> Result<(), TemplateError> {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Field(path) => {
                let value = fields
                    .field(path)
                    .ok_or_else(|| TemplateError::UnknownField(path.clone()))?;
                out.push_str(&value.render());
            }
            Segment::If {
                cond,
                then,
                otherwise,
            } => {
                let value = fields
                    .field(cond)
                    .ok_or_else(|| TemplateError::UnknownField(cond.clone()))?;
                let branch = if value.truthy() { then } else { otherwise };
                render_segments(branch, fields, out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestFields;

    impl Fields for TestFields {
        fn field(&self, path: &str) -> Option<Value> {
            match path {
                "Version" => Some(Value::Text("abc123".into())),
                "Empty" => Some(Value::Text(String::new())),
                "Yes" => Some(Value::Bool(true)),
                "No" => Some(Value::Bool(false)),
                "Extra.theme" => Some(Value::Text("dark".into())),
                _ => None,
            }
        }
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("hello world", &TestFields).unwrap(), "hello world");
    }

    #[test]
    fn test_field_substitution() {
        assert_eq!(
            render("<p>{{.Version}}</p>", &TestFields).unwrap(),
            "<p>abc123</p>"
        );
        assert_eq!(render("{{ .Version }}", &TestFields).unwrap(), "abc123");
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(render("{{.Extra.theme}}", &TestFields).unwrap(), "dark");
    }

    #[test]
    fn test_bool_renders_as_literal() {
        assert_eq!(render("{{.Yes}}/{{.No}}", &TestFields).unwrap(), "true/false");
    }

    #[test]
    fn test_if_else_end() {
        let input = "{{if .Yes}}on{{else}}off{{end}}";
        assert_eq!(render(input, &TestFields).unwrap(), "on");

        let input = "{{if .No}}on{{else}}off{{end}}";
        assert_eq!(render(input, &TestFields).unwrap(), "off");
    }

    #[test]
    fn test_if_without_else() {
        assert_eq!(render("a{{if .No}}b{{end}}c", &TestFields).unwrap(), "ac");
    }

    #[test]
    fn test_empty_text_is_falsy() {
        assert_eq!(
            render("{{if .Empty}}x{{else}}y{{end}}", &TestFields).unwrap(),
            "y"
        );
    }

    #[test]
    fn test_nested_if() {
        let input = "{{if .Yes}}{{if .No}}a{{else}}b{{end}}{{end}}";
        assert_eq!(render(input, &TestFields).unwrap(), "b");
    }

    #[test]
    fn test_unknown_field_fails() {
        assert_eq!(
            render("{{.Nope}}", &TestFields),
            Err(TemplateError::UnknownField("Nope".into()))
        );
    }

    #[test]
    fn test_unclosed_delimiter_fails() {
        assert_eq!(render("{{.Version", &TestFields), Err(TemplateError::Unclosed));
    }

    #[test]
    fn test_unterminated_if_fails() {
        assert_eq!(
            render("{{if .Yes}}x", &TestFields),
            Err(TemplateError::UnterminatedIf)
        );
    }

    #[test]
    fn test_stray_end_fails() {
        assert_eq!(
            render("x{{end}}", &TestFields),
            Err(TemplateError::Unexpected("end".into()))
        );
    }

    #[test]
    fn test_malformed_action_fails() {
        assert!(render("{{Version}}", &TestFields).is_err());
        assert!(render("{{.}}", &TestFields).is_err());
        assert!(render("{{.a..b}}", &TestFields).is_err());
    }
}
