//! `{field}` substitution for scenario texts.
//!
//! `{{` and `}}` stand for literal braces. Everything else between braces is a
//! context key.

use thiserror::Error;

use crate::types::Context;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing context field `{0}`")]
    MissingContextField(String),
    #[error("unclosed `{{` at byte {0}")]
    Unclosed(usize),
    #[error("unmatched `}}` at byte {0}")]
    UnmatchedClose(usize),
    #[error("empty placeholder at byte {0}")]
    EmptyField(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => return Err(TemplateError::Unclosed(position)),
                            Some((_, c)) => field.push(c),
                        }
                    }
                    let field = field.trim();
                    if field.is_empty() {
                        return Err(TemplateError::EmptyField(position));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field.to_string()));
                }
                '}' => return Err(TemplateError::UnmatchedClose(position)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// Text exactly as written in the catalog.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, context: &Context) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(name) => {
                    let value = context
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingContextField(name.clone()))?;
                    rendered.push_str(value);
                }
            }
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_fields_from_context() {
        let template = Template::parse("Спасибо, {name}! Билет отправлен на {email}.").unwrap();
        let rendered = template
            .render(&context(&[("name", "Вениамин"), ("email", "email@email.ru")]))
            .unwrap();
        assert_eq!(rendered, "Спасибо, Вениамин! Билет отправлен на email@email.ru.");
        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["name", "email"]);
    }

    #[test]
    fn missing_field_is_reported() {
        let template = Template::parse("Hello {name}").unwrap();
        assert_eq!(
            template.render(&Context::new()),
            Err(TemplateError::MissingContextField("name".to_string()))
        );
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = Template::parse("{{not a field}} {x}").unwrap();
        assert_eq!(template.fields().count(), 1);
        assert_eq!(
            template.render(&context(&[("x", "1")])).unwrap(),
            "{not a field} 1"
        );
        assert_eq!(template.source(), "{{not a field}} {x}");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert_eq!(Template::parse("oops {name"), Err(TemplateError::Unclosed(5)));
        assert_eq!(Template::parse("oops }"), Err(TemplateError::UnmatchedClose(5)));
        assert_eq!(Template::parse("a { } b"), Err(TemplateError::EmptyField(2)));
    }

    #[test]
    fn plain_text_renders_unchanged() {
        let template = Template::parse("Введите имя").unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "Введите имя");
    }
}
