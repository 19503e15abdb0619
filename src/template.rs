//! Template Resolver for `{{variable}}` placeholders
//!
//! Expansion is single-pass and left-to-right. A substituted value is copied
//! verbatim and never scanned again, so values containing `{{...}}` stay literal.

use std::ops::Range;

use crate::error::TemplateError;
use crate::variables::ScopeChain;

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder {
        /// Trimmed variable name
        name: &'a str,
        /// Byte range of the whole `{{ ... }}` token
        span: Range<usize>,
    },
}

/// Split a template into literal text and placeholders.
///
/// An opening `{{` without a closing `}}` is an error rather than literal text.
/// A lone `}}` with no opener is ordinary text.
pub fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(found) = template[pos..].find("{{") {
        let start = pos + found;
        if start > pos {
            segments.push(Segment::Literal(&template[pos..start]));
        }

        let inner_start = start + 2;
        let close = template[inner_start..]
            .find("}}")
            .ok_or(TemplateError::Unterminated { offset: start })?;
        let inner_end = inner_start + close;

        let name = template[inner_start..inner_end].trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName { offset: start });
        }

        segments.push(Segment::Placeholder {
            name,
            span: start..inner_end + 2,
        });
        pos = inner_end + 2;
    }

    if pos < template.len() {
        segments.push(Segment::Literal(&template[pos..]));
    }

    Ok(segments)
}

/// Expand every placeholder in `template` against `scopes`
pub fn expand(template: &str, scopes: &ScopeChain) -> Result<String, TemplateError> {
    let segments = parse(template)?;
    let mut out = String::with_capacity(template.len());

    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder { name, .. } => out.push_str(scopes.resolve(name)?),
        }
    }

    Ok(out)
}

/// Variable names referenced by `template`, in order of appearance
pub fn placeholder_names(template: &str) -> Result<Vec<&str>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder { name, .. } => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

pub fn has_placeholders(text: &str) -> bool {
    text.contains("{{")
}
