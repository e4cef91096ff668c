use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

static PI_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z]+)\s*=\s*"([^"]*)""#).unwrap());

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("no <OFX> element found")]
    MissingRoot,
    #[error("<OFX> element holds text instead of elements")]
    LeafRoot,
    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),
    #[error("elements nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Abstraction over the statement tokenizer.
/// `Ok(None)` means the file parsed but carried nothing.
pub trait OfxTokenizer: Send + Sync {
    fn tokenize(&self, content: &str) -> Result<Option<Value>, TokenizeError>;
}

/// Lenient SGML/XML tokenizer; the default backend. Produces
/// `{ "header": {...}, "OFX": {...} }` with upper-cased element names, and a
/// name repeated under one parent becomes an array.
#[derive(Debug, Default, Clone, Copy)]
pub struct SgmlTokenizer;

impl OfxTokenizer for SgmlTokenizer {
    fn tokenize(&self, content: &str) -> Result<Option<Value>, TokenizeError> {
        let content = content.trim_start_matches('\u{feff}');
        let root_at = find_root(content).ok_or(TokenizeError::MissingRoot)?;
        let (head, body) = content.split_at(root_at);

        let tokens = lex(body, root_at)?;
        let root = build_tree(&tokens)?;
        if root.is_null() {
            return Ok(None);
        }

        let mut doc = Map::new();
        doc.insert("header".to_string(), Value::Object(parse_header(head)));
        doc.insert("OFX".to_string(), root);
        Ok(Some(Value::Object(doc)))
    }
}

fn find_root(content: &str) -> Option<usize> {
    // ASCII upper-casing keeps byte offsets stable.
    content.to_ascii_uppercase().find("<OFX>")
}

// ── header ────────────────────────────────────────────────────────────────────

fn parse_header(head: &str) -> Map<String, Value> {
    let mut header = Map::new();
    for line in head.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(pi) = line.strip_prefix("<?") {
            // OFX 2.x carries its header as attributes of <?OFX ...?>.
            if pi.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("OFX")) {
                for caps in PI_ATTRIBUTE.captures_iter(pi) {
                    header.insert(caps[1].to_ascii_uppercase(), Value::String(caps[2].to_string()));
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            header.insert(
                key.trim().to_ascii_uppercase(),
                Value::String(value.trim().to_string()),
            );
        }
    }
    header
}

// ── lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open(String),
    Close(String),
    Text(&'a str),
}

fn lex(body: &str, base_offset: usize) -> Result<Vec<Token<'_>>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(rel) = body[pos..].find('<') {
        let lt = pos + rel;
        let text = body[pos..lt].trim();
        if !text.is_empty() {
            tokens.push(Token::Text(text));
        }

        if body[lt..].starts_with("<!--") {
            let end = body[lt..]
                .find("-->")
                .ok_or(TokenizeError::UnterminatedTag(base_offset + lt))?;
            pos = lt + end + 3;
            continue;
        }

        let gt = body[lt..]
            .find('>')
            .map(|g| lt + g)
            .ok_or(TokenizeError::UnterminatedTag(base_offset + lt))?;
        let inner = body[lt + 1..gt].trim();
        pos = gt + 1;

        if inner.starts_with('?') || inner.starts_with('!') || inner.is_empty() {
            continue;
        }

        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close(name.trim().to_ascii_uppercase()));
            continue;
        }

        let self_closing = inner.ends_with('/');
        let inner = inner.trim_end_matches('/');
        let name = inner
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if self_closing {
            tokens.push(Token::Open(name.clone()));
            tokens.push(Token::Close(name));
        } else {
            tokens.push(Token::Open(name));
        }
    }

    let tail = body[pos..].trim();
    if !tail.is_empty() {
        tokens.push(Token::Text(tail));
    }

    Ok(tokens)
}

// ── tree builder ──────────────────────────────────────────────────────────────

/// Deepest aggregate nesting accepted. Real statements stay under ten.
pub const MAX_DEPTH: usize = 256;

struct Frame {
    name: String,
    children: Map<String, Value>,
}

fn build_tree(tokens: &[Token<'_>]) -> Result<Value, TokenizeError> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Open(name) => match tokens.get(i + 1) {
                Some(Token::Text(text)) => {
                    i += 2;
                    if matches!(tokens.get(i), Some(Token::Close(c)) if c == name) {
                        i += 1;
                    }
                    let leaf = Value::String(decode_entities(text));
                    if let Some(root) = attach(&mut stack, name, leaf)? {
                        return Ok(root);
                    }
                    continue;
                }
                Some(Token::Close(c)) if c == name => {
                    i += 2;
                    if let Some(root) = attach(&mut stack, name, Value::String(String::new()))? {
                        return Ok(root);
                    }
                    continue;
                }
                _ => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(TokenizeError::TooDeep(MAX_DEPTH));
                    }
                    stack.push(Frame {
                        name: name.clone(),
                        children: Map::new(),
                    });
                }
            },
            Token::Close(name) => {
                let pos = stack
                    .iter()
                    .rposition(|f| &f.name == name)
                    .ok_or_else(|| TokenizeError::UnexpectedClose(name.clone()))?;
                while stack.len() > pos + 1 {
                    fold_unclosed(&mut stack);
                }
                if let Some(frame) = stack.pop() {
                    let value = if frame.children.is_empty() {
                        Value::String(String::new())
                    } else {
                        Value::Object(frame.children)
                    };
                    if let Some(root) = attach(&mut stack, &frame.name, value)? {
                        return Ok(root);
                    }
                }
            }
            // Stray character data between aggregates carries nothing.
            Token::Text(_) => {}
        }
        i += 1;
    }

    match stack.first() {
        Some(frame) => Err(TokenizeError::Unclosed(frame.name.clone())),
        None => Err(TokenizeError::MissingRoot),
    }
}

/// An element still open when an enclosing aggregate closes was a valueless
/// SGML leaf. It becomes `""` and everything read after it moves up to its
/// parent as siblings.
fn fold_unclosed(stack: &mut Vec<Frame>) {
    let Some(frame) = stack.pop() else { return };
    let Some(parent) = stack.last_mut() else { return };
    insert_child(&mut parent.children, &frame.name, Value::String(String::new()));
    for (name, value) in frame.children {
        match value {
            Value::Array(items) => {
                for item in items {
                    insert_child(&mut parent.children, &name, item);
                }
            }
            other => insert_child(&mut parent.children, &name, other),
        }
    }
}

/// Attach a finished element to its parent. Returns the document root
/// once the outermost element completes, or `Value::Null` for an empty root.
fn attach(stack: &mut [Frame], name: &str, value: Value) -> Result<Option<Value>, TokenizeError> {
    let Some(parent) = stack.last_mut() else {
        return match value {
            Value::Object(children) => Ok(Some(Value::Object(children))),
            Value::String(s) if s.is_empty() => Ok(Some(Value::Null)),
            _ => Err(TokenizeError::LeafRoot),
        };
    };
    insert_child(&mut parent.children, name, value);
    Ok(None)
}

fn insert_child(children: &mut Map<String, Value>, name: &str, value: Value) {
    match children.get_mut(name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name.to_string(), value);
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| resolve_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
