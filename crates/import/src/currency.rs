use serde_json::Value;

/// Statement-level currency locations, in lookup order. Only the
/// enveloped shapes are consulted.
const CURRENCY_PATHS: &[&[&str]] = &[
    &["OFX", "BANKMSGSRSV1", "STMTTRNRS", "STMTRS", "CURDEF"],
    &["OFX", "CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS", "CURDEF"],
];

/// First string-valued `CURDEF` found, if any.
pub fn extract_currency(doc: &Value) -> Option<String> {
    CURRENCY_PATHS
        .iter()
        .find_map(|path| lookup_str(doc, path))
        .map(str::to_string)
}

fn lookup_str<'a>(node: &'a Value, path: &[&str]) -> Option<&'a str> {
    match node {
        Value::Array(items) => items.iter().find_map(|item| lookup_str(item, path)),
        _ => match path.split_first() {
            None => node.as_str(),
            Some((head, rest)) => lookup_str(node.get(*head)?, rest),
        },
    }
}
