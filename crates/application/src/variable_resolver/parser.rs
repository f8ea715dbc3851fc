//! Variable parser for {{variable}} syntax
//!
//! Parses strings to extract placeholder references with their positions and
//! recognizes template function calls such as `{{hash.md5('x')}}` or
//! `{{$uuid}}`.

use std::ops::Range;

/// Represents a parsed placeholder in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    /// The trimmed text between `{{` and `}}`.
    pub name: String,

    /// Whether the placeholder has the shape of a template function call.
    pub is_function: bool,

    /// Byte range in the original string where this reference appears.
    pub span: Range<usize>,
}

impl VariableReference {
    /// Creates a new variable reference.
    #[must_use]
    pub fn new(name: impl Into<String>, span: Range<usize>) -> Self {
        let name = name.into();
        let is_function = is_function_signature(&name);
        Self {
            name,
            is_function,
            span,
        }
    }
}

/// A template function call parsed from a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// Dotted function name without the `$` prefix, e.g. `hash.md5`.
    pub name: String,
    /// Arguments with surrounding whitespace and quotes removed.
    pub args: Vec<String>,
}

/// Parses a string and extracts all placeholder references.
///
/// When placeholders nest, the innermost one is reported and the enclosing
/// braces are left alone, so `{{hash.md5('{{A}}')}}` yields only `A`. Once `A`
/// is substituted, parsing again yields the function call.
///
/// # Examples
///
/// ```
/// use strata_application::variable_resolver::parser::parse_variables;
///
/// let refs = parse_variables("Hello {{name}}, your ID is {{$uuid}}");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].name, "name");
/// assert_eq!(refs[1].name, "$uuid");
/// assert!(refs[1].is_function);
/// ```
#[must_use]
pub fn parse_variables(input: &str) -> Vec<VariableReference> {
    let bytes = input.as_bytes();
    let mut references = Vec::new();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            // In a run like `{{{`, the last pair opens the placeholder.
            let mut start = i;
            while start + 2 < bytes.len() && bytes[start + 2] == b'{' {
                start += 1;
            }
            open = Some(start);
            i = start + 2;
            continue;
        }

        if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            if let Some(start) = open.take() {
                let end = i + 2;
                let name = input[start + 2..i].trim();
                if !name.is_empty() {
                    references.push(VariableReference::new(name, start..end));
                }
                i = end;
                continue;
            }
        }

        i += 1;
    }

    references
}

/// Validates a variable key.
///
/// Valid keys start with a letter or underscore and continue with
/// alphanumerics, underscore, hyphen or dot. The `$` prefix is reserved for
/// template functions.
#[must_use]
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// Returns true if the placeholder content looks like a function call.
#[must_use]
pub fn is_function_signature(name: &str) -> bool {
    parse_function_call(name).is_some()
}

/// Parses placeholder content as a function call.
///
/// Accepted shapes are `ns.fn(args)`, `$ns.fn(args)` and, for calls without
/// arguments, `$ns.fn`. A bare `name` is a variable, not a call.
#[must_use]
pub fn parse_function_call(content: &str) -> Option<FunctionCall> {
    let content = content.trim();
    let (content, has_prefix) = match content.strip_prefix('$') {
        Some(stripped) => (stripped, true),
        None => (content, false),
    };

    let (name, args) = match content.find('(') {
        Some(open) => {
            let inner = content[open + 1..].strip_suffix(')')?;
            (content[..open].trim_end(), split_arguments(inner))
        }
        None if has_prefix => (content, Vec::new()),
        None => return None,
    };

    is_dotted_identifier(name).then(|| FunctionCall {
        name: name.to_string(),
        args,
    })
}

fn is_dotted_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Splits a raw argument list on commas outside quotes.
///
/// Each argument is trimmed and one pair of matching surrounding quotes
/// (`'` or `"`) is removed.
#[must_use]
pub fn split_arguments(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                current.push(ch);
            }
            (Some(q), _) if ch == q => {
                quote = None;
                current.push(ch);
            }
            (None, ',') => args.push(unquote(&std::mem::take(&mut current))),
            _ => current.push(ch),
        }
    }
    args.push(unquote(&current));

    args
}

fn unquote(arg: &str) -> String {
    let arg = arg.trim();
    for q in ['\'', '"'] {
        if arg.len() >= 2 && arg.starts_with(q) && arg.ends_with(q) {
            return arg[1..arg.len() - 1].to_string();
        }
    }
    arg.to_string()
}

/// Returns true if the input string contains any variable references.
#[must_use]
pub fn has_variables(input: &str) -> bool {
    !parse_variables(input).is_empty()
}

/// Extracts the names of non-function placeholders, de-duplicated in
/// first-seen order.
#[must_use]
pub fn extract_variable_names(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for reference in parse_variables(input) {
        if !reference.is_function && !names.contains(&reference.name) {
            names.push(reference.name);
        }
    }
    names
}
