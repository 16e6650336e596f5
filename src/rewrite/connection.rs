use super::RewriteError;
use crate::config::ConnectionTarget;
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::Range;

const UTF8_BOM: &str = "\u{feff}";
const EXPRESSION_PATH: [Option<&str>; 7] = [
    Some("model"),
    Some("tables"),
    None,
    Some("partitions"),
    None,
    Some("source"),
    Some("expression"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    ModelBim,
    Text,
}

impl DefinitionFormat {
    pub fn for_path(path: &str) -> Self {
        if path.to_ascii_lowercase().ends_with(".bim") {
            Self::ModelBim
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRewrite {
    pub text: String,
    pub updated_count: usize,
}

impl ConnectionRewrite {
    pub fn changed_from(&self, original: &str) -> bool {
        self.text != original
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionRewriter {
    pattern: Regex,
}

impl ConnectionRewriter {
    pub fn new(connector_functions: &[String]) -> Result<Self, RewriteError> {
        let names: Vec<String> = connector_functions
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(regex::escape)
            .collect();
        if names.is_empty() {
            return Err(RewriteError::NoConnectors);
        }
        let source = format!(
            r#"(?:^|[^\w.])(?:{})\s*\(\s*(?P<server>"(?:[^"\n]|"")*")\s*,\s*(?P<database>"(?:[^"\n]|"")*")"#,
            names.join("|")
        );
        let pattern = Regex::new(&source).map_err(|err| RewriteError::Pattern(err.to_string()))?;
        Ok(Self { pattern })
    }

    /// Byte ranges of the server and database literals of every connector call in `text`.
    fn connection_literals(&self, text: &str) -> Vec<(Range<usize>, Range<usize>)> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| Some((caps.name("server")?.range(), caps.name("database")?.range())))
            .collect()
    }

    pub fn rewrite_expression(&self, expression: &str, target: &ConnectionTarget) -> (String, usize) {
        let server = quote_m_literal(&target.server_endpoint);
        let database = quote_m_literal(&target.database_name);
        let calls = self.connection_literals(expression);
        let edits = calls.iter().flat_map(|(server_span, database_span)| {
            [
                (server_span.clone(), server.as_str()),
                (database_span.clone(), database.as_str()),
            ]
        });
        (splice(expression, edits), calls.len())
    }

    pub fn rewrite_connections(
        &self,
        definition: &str,
        format: DefinitionFormat,
        target: &ConnectionTarget,
    ) -> Result<ConnectionRewrite, RewriteError> {
        match format {
            DefinitionFormat::Text => {
                let (text, updated_count) = self.rewrite_expression(definition, target);
                Ok(ConnectionRewrite {
                    text,
                    updated_count,
                })
            }
            DefinitionFormat::ModelBim => self.rewrite_model_bim(definition, target),
        }
    }

    // Only the raw bytes of each matched literal are replaced; every other escape
    // sequence in the document is left as written.
    fn rewrite_model_bim(
        &self,
        raw: &str,
        target: &ConnectionTarget,
    ) -> Result<ConnectionRewrite, RewriteError> {
        let body_start = if raw.starts_with(UTF8_BOM) {
            UTF8_BOM.len()
        } else {
            0
        };
        serde_json::from_str::<serde_json::Value>(&raw[body_start..])
            .map_err(|err| RewriteError::InvalidJson(err.to_string()))?;

        let server = json_string_body(&quote_m_literal(&target.server_endpoint))?;
        let database = json_string_body(&quote_m_literal(&target.database_name))?;
        let mut edits: Vec<(Range<usize>, &str)> = Vec::new();
        let mut updated_count = 0;
        for group in expression_groups(raw, body_start) {
            let lines = group
                .into_iter()
                .map(|span| DecodedLine::parse(raw, span))
                .collect::<Result<Vec<_>, _>>()?;
            let joined = lines
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            for (server_span, database_span) in self.connection_literals(&joined) {
                let (Some(server_raw), Some(database_raw)) = (
                    raw_range(&lines, server_span),
                    raw_range(&lines, database_span),
                ) else {
                    continue;
                };
                updated_count += 1;
                edits.push((server_raw, server.as_str()));
                edits.push((database_raw, database.as_str()));
            }
        }
        Ok(ConnectionRewrite {
            text: splice(raw, edits),
            updated_count,
        })
    }
}

pub fn quote_m_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn splice<'a>(text: &str, edits: impl IntoIterator<Item = (Range<usize>, &'a str)>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&text[cursor..range.start]);
        out.push_str(replacement);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

// JSON-escaped form of `value` without the surrounding quotes.
fn json_string_body(value: &str) -> Result<String, RewriteError> {
    let encoded =
        serde_json::to_string(value).map_err(|err| RewriteError::InvalidJson(err.to_string()))?;
    Ok(encoded
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or_default()
        .to_string())
}

/// A JSON string value decoded together with the raw document offset of every
/// decoded character boundary.
struct DecodedLine {
    text: String,
    raw_offsets: BTreeMap<usize, usize>,
}

impl DecodedLine {
    fn parse(raw: &str, span: Range<usize>) -> Result<Self, RewriteError> {
        let inner = (span.start + 1)..span.end.saturating_sub(1).max(span.start + 1);
        let mut text = String::new();
        let mut raw_offsets = BTreeMap::new();
        let mut at = inner.start;
        while at < inner.end {
            raw_offsets.insert(text.len(), at);
            let end = (at + unit_len(&raw[at..inner.end])).min(inner.end);
            let unit = &raw[at..end];
            if unit.starts_with('\\') {
                let decoded: String = serde_json::from_str(&format!("\"{unit}\""))
                    .map_err(|err| RewriteError::InvalidJson(err.to_string()))?;
                text.push_str(&decoded);
            } else {
                text.push_str(unit);
            }
            at = end;
        }
        raw_offsets.insert(text.len(), inner.end);
        Ok(Self { text, raw_offsets })
    }
}

// Length of the next character or escape sequence; surrogate pairs count as one unit.
fn unit_len(rest: &str) -> usize {
    if !rest.starts_with('\\') {
        return rest.chars().next().map_or(1, char::len_utf8);
    }
    if !rest.starts_with("\\u") {
        return 2;
    }
    let code = rest
        .get(2..6)
        .and_then(|hex| u16::from_str_radix(hex, 16).ok());
    let paired = rest.get(6..).is_some_and(|tail| tail.starts_with("\\u"));
    match code {
        Some(0xD800..=0xDBFF) if paired => 12,
        _ => 6,
    }
}

// Maps a range of the newline-joined group text back to raw document bytes.
// Ranges that cross a line boundary have no single raw counterpart.
fn raw_range(lines: &[DecodedLine], span: Range<usize>) -> Option<Range<usize>> {
    let mut base = 0;
    for line in lines {
        let end = base + line.text.len();
        if span.start >= base && span.end <= end {
            let start = line.raw_offsets.get(&(span.start - base))?;
            let stop = line.raw_offsets.get(&(span.end - base))?;
            return Some(*start..*stop);
        }
        base = end + 1;
    }
    None
}

struct Container {
    is_object: bool,
    key: Option<String>,
    expect_key: bool,
    open: usize,
}

fn is_expression_path(stack: &[Container]) -> bool {
    let segments: Vec<Option<&str>> = stack
        .iter()
        .map(|c| c.is_object.then(|| c.key.as_deref().unwrap_or_default()))
        .collect();
    match segments.len() {
        7 => segments[..] == EXPRESSION_PATH[..],
        8 => segments[..7] == EXPRESSION_PATH[..] && segments[7].is_none(),
        _ => false,
    }
}

// String values found at model.tables[].partitions[].source.expression, as byte
// ranges with quotes included. An array-valued expression yields one group holding
// all of its lines.
fn expression_groups(raw: &str, start: usize) -> Vec<Vec<Range<usize>>> {
    let bytes = raw.as_bytes();
    let mut stack: Vec<Container> = Vec::new();
    let mut groups: Vec<(usize, Vec<Range<usize>>)> = Vec::new();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            open @ (b'{' | b'[') => {
                let is_object = open == b'{';
                stack.push(Container {
                    is_object,
                    key: None,
                    expect_key: is_object,
                    open: i,
                });
                i += 1;
            }
            b'}' | b']' => {
                stack.pop();
                i += 1;
            }
            b',' => {
                if let Some(top) = stack.last_mut().filter(|c| c.is_object) {
                    top.expect_key = true;
                }
                i += 1;
            }
            b'"' => {
                let end = string_end(bytes, i);
                let span = i..end;
                let is_key = stack
                    .last()
                    .is_some_and(|top| top.is_object && top.expect_key);
                if is_key {
                    if let Some(top) = stack.last_mut() {
                        top.key = serde_json::from_str(&raw[span]).ok();
                        top.expect_key = false;
                    }
                } else if is_expression_path(&stack) {
                    let group_key = match stack.last() {
                        Some(top) if !top.is_object => top.open,
                        _ => span.start,
                    };
                    match groups.last_mut() {
                        Some((key, spans)) if *key == group_key => spans.push(span),
                        _ => groups.push((group_key, vec![span])),
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    groups.into_iter().map(|(_, spans)| spans).collect()
}

fn string_end(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
