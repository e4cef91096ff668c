use serde_json::Value;

/// Transaction field names, in preference order. Some tokenizers emit the
/// misspelt `STRTTRN`; it is always checked before `STMTTRN`.
pub const TRANSACTION_FIELDS: [&str; 2] = ["STRTTRN", "STMTTRN"];

/// A named route to a transaction container.
#[derive(Debug, Clone, Copy)]
pub struct StatementPath {
    pub name: &'static str,
    pub segments: &'static [&'static str],
}

pub const KNOWN_PATHS: &[StatementPath] = &[
    StatementPath {
        name: "bank",
        segments: &["OFX", "BANKMSGSRSV1", "STMTTRNRS", "STMTRS", "BANKTRANLIST"],
    },
    StatementPath {
        name: "bank (no envelope)",
        segments: &["BANKMSGSRSV1", "STMTTRNRS", "STMTRS", "BANKTRANLIST"],
    },
    StatementPath {
        name: "credit card",
        segments: &["OFX", "CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS", "BANKTRANLIST"],
    },
    StatementPath {
        name: "credit card statement",
        segments: &["OFX", "CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS"],
    },
    StatementPath {
        name: "credit card (no envelope)",
        segments: &["CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS", "BANKTRANLIST"],
    },
    StatementPath {
        name: "credit card statement (no envelope)",
        segments: &["CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS"],
    },
];

/// Where a transaction list was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    Known(&'static str),
    DeepSearch,
    NotFound,
}

/// Locate the raw transactions of `doc`. Returns an empty list when
/// nothing is found; that is not an error.
pub fn locate_transactions(doc: &Value) -> (Vec<&Value>, Located) {
    for path in KNOWN_PATHS {
        if let Some(found) = follow(doc, path.segments) {
            return (found, Located::Known(path.name));
        }
    }
    match deep_search(doc) {
        Some(found) => (found, Located::DeepSearch),
        None => (Vec::new(), Located::NotFound),
    }
}

/// Walk `segments` from `node` and read the transaction field at the end.
pub fn follow<'a>(node: &'a Value, segments: &[&str]) -> Option<Vec<&'a Value>> {
    match node {
        Value::Array(items) => items.iter().find_map(|item| follow(item, segments)),
        _ => match segments.split_first() {
            None => transactions_in(node),
            Some((head, rest)) => follow(node.get(*head)?, rest),
        },
    }
}

/// Read the transaction field of a container, preferring `STRTTRN`.
pub fn transactions_in(container: &Value) -> Option<Vec<&Value>> {
    TRANSACTION_FIELDS
        .iter()
        .find_map(|field| container.get(*field).and_then(as_records))
}

/// Arrays pass through, a lone object becomes a one-element list,
/// anything else counts as absent.
pub fn as_records(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(_) => Some(vec![value]),
        _ => None,
    }
}

/// Depth-first, document-order search for the first object carrying a
/// transaction field. Iterative so hostile nesting cannot blow the stack.
pub fn deep_search(doc: &Value) -> Option<Vec<&Value>> {
    let mut pending = vec![doc];
    while let Some(node) = pending.pop() {
        match node {
            Value::Object(map) => {
                if let Some(found) = transactions_in(node) {
                    return Some(found);
                }
                pending.extend(map.values().rev());
            }
            Value::Array(items) => pending.extend(items.iter().rev()),
            _ => {}
        }
    }
    None
}
