use anyhow::{anyhow, bail, Result};

use crate::models::{Auth, HttpMethod, KeyValue, RequestTemplate, ResolvedRequest};

/// Parse a cURL command into a request template
pub fn parse_curl(input: &str) -> Result<RequestTemplate> {
    let mut request = RequestTemplate::new("", HttpMethod::GET, "");
    let mut explicit_method = false;

    // Remove line continuations and normalize
    let normalized = input.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut tokens = tokenize(&normalized)?;

    // Skip 'curl' command if present
    if tokens.first().map(|s| s.as_str()) == Some("curl") {
        tokens.remove(0);
    }

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let mut value = |flag: &str| iter.next().ok_or_else(|| anyhow!("{} expects a value", flag));

        match token.as_str() {
            "-X" | "--request" => {
                let method = value(token.as_str())?;
                request.method = HttpMethod::parse(&method)
                    .ok_or_else(|| anyhow!("Unknown HTTP method: {}", method))?;
                explicit_method = true;
            }
            "-I" | "--head" => {
                request.method = HttpMethod::HEAD;
                explicit_method = true;
            }
            "-H" | "--header" => {
                let header = parse_header(&value(token.as_str())?)?;
                if header.key.eq_ignore_ascii_case("authorization") {
                    if let Some(token) = strip_prefix_ignore_case(&header.value, "bearer ") {
                        request.auth = Auth::Bearer {
                            token: token.trim().to_string(),
                        };
                        continue;
                    }
                }
                // Don't add duplicate headers
                if !request.headers.iter().any(|h| h.key.eq_ignore_ascii_case(&header.key)) {
                    request.headers.push(header);
                }
            }
            "-A" | "--user-agent" => {
                request.headers.push(KeyValue::new("User-Agent", value(token.as_str())?));
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--json" => {
                let body = value(token.as_str())?;
                if token == "--json" {
                    request.headers.push(KeyValue::new("Content-Type", "application/json"));
                }
                request.body = Some(body);
                // Infer POST if not set
                if !explicit_method {
                    request.method = HttpMethod::POST;
                }
            }
            "-u" | "--user" => {
                let (username, password) = parse_basic_auth(&value(token.as_str())?);
                request.auth = Auth::Basic { username, password };
            }
            "--url" => {
                request.url = value(token.as_str())?;
            }
            "--compressed" | "-k" | "--insecure" | "-L" | "--location" | "-s" | "--silent" | "-v"
            | "--verbose" | "-i" | "--include" => {
                // Ignored flags
            }
            other if other.starts_with('-') => {
                tracing::debug!(flag = other, "Ignoring unsupported curl flag");
            }
            _ => {
                if request.url.is_empty() {
                    request.url = token;
                }
            }
        }
    }

    if request.url.is_empty() {
        bail!("No URL found in curl command");
    }
    request.name = default_name(&request);
    Ok(request)
}

/// "GET /users/42" from the method and URL path
fn default_name(request: &RequestTemplate) -> String {
    let without_scheme = request
        .url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&request.url);
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("/");
    let path = path.split(['?', '#']).next().unwrap_or(path);
    format!("{} {}", request.method.as_str(), path)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.is_char_boundary(prefix.len()) && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_header(s: &str) -> Result<KeyValue> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => Ok(KeyValue::new(key.trim(), value.trim())),
        _ => Err(anyhow!("Invalid header format: {}", s)),
    }
}

fn parse_basic_auth(s: &str) -> (String, String) {
    match s.split_once(':') {
        Some((user, pass)) => (user.to_string(), pass.to_string()),
        None => (s.to_string(), String::new()),
    }
}

/// Tokenize a curl command, respecting quotes
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    let mut quoted = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' if !in_single_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            ' ' | '\t' | '\n' | '\r' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                    quoted = false;
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if in_single_quote || in_double_quote {
        bail!("Unterminated quote in curl command");
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Quote for a POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Format a sent request as a cURL command
pub fn to_curl(request: &ResolvedRequest) -> String {
    let mut parts = vec!["curl".to_string()];

    match request.method {
        HttpMethod::GET => {}
        HttpMethod::HEAD => parts.push("-I".to_string()),
        method => parts.push(format!("-X {}", method.as_str())),
    }

    parts.push(shell_quote(&request.url));

    for (key, value) in &request.headers {
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", key, value))));
    }

    if let Some(body) = &request.body {
        parts.push(format!("--data-raw {}", shell_quote(body)));
    }

    parts.join(" \\\n  ")
}
