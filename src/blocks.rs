use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("document is not a list of blocks: {message}")]
    InvalidDocument { message: String },
    #[error("block {index} ({kind}) is malformed: {message}")]
    InvalidBlock {
        index: usize,
        kind: String,
        message: String,
    },
}

/// One typed entry in a multi-block document.
///
/// Kinds the parser does not recognize are kept as `Unknown` so the
/// document round-trips losslessly and the view can show a marker for them.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Markdown { text: String },
    Chart { spec: Value },
    Unknown { kind: String, data: Value },
}

/// Wire format: each block is a `{"kind": ..., "data": ...}` record.
/// `data` is required; a record without it fails the whole document.
#[derive(Serialize, Deserialize)]
struct BlockRecord {
    kind: String,
    data: Value,
}

impl ContentBlock {
    pub fn kind(&self) -> &str {
        match self {
            ContentBlock::Markdown { .. } => "markdown",
            ContentBlock::Chart { .. } => "chart",
            ContentBlock::Unknown { kind, .. } => kind,
        }
    }

    fn from_record(index: usize, record: BlockRecord) -> Result<Self, ParseError> {
        match record.kind.as_str() {
            "markdown" => {
                let text = record
                    .data
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ParseError::InvalidBlock {
                        index,
                        kind: record.kind.clone(),
                        message: "missing string field `text`".to_string(),
                    })?;
                Ok(ContentBlock::Markdown {
                    text: text.to_string(),
                })
            }
            "chart" => Ok(ContentBlock::Chart { spec: record.data }),
            _ => Ok(ContentBlock::Unknown {
                kind: record.kind,
                data: record.data,
            }),
        }
    }

    fn to_record(&self) -> BlockRecord {
        match self {
            ContentBlock::Markdown { text } => BlockRecord {
                kind: "markdown".to_string(),
                data: serde_json::json!({ "text": text }),
            },
            ContentBlock::Chart { spec } => BlockRecord {
                kind: "chart".to_string(),
                data: spec.clone(),
            },
            ContentBlock::Unknown { kind, data } => BlockRecord {
                kind: kind.clone(),
                data: data.clone(),
            },
        }
    }
}

/// Parse a serialized block list. Any structural problem fails the whole
/// document with one error; there is no per-block recovery.
pub fn parse(raw: &str) -> Result<Vec<ContentBlock>, ParseError> {
    let records: Vec<BlockRecord> =
        serde_json::from_str(raw).map_err(|err| ParseError::InvalidDocument {
            message: err.to_string(),
        })?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| ContentBlock::from_record(index, record))
        .collect()
}

pub fn serialize(blocks: &[ContentBlock]) -> String {
    let records: Vec<BlockRecord> = blocks.iter().map(ContentBlock::to_record).collect();
    serde_json::to_string_pretty(&records).expect("block records serialize to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_markdown_and_chart_blocks() {
        let raw = r##"[
            {"kind":"markdown","data":{"text":"# Hi"}},
            {"kind":"chart","data":{"series":[]}}
        ]"##;
        let blocks = parse(raw).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0],
            ContentBlock::Markdown {
                text: "# Hi".to_string()
            }
        );
        assert_eq!(
            blocks[1],
            ContentBlock::Chart {
                spec: json!({"series": []})
            }
        );
    }

    #[test]
    fn keeps_unknown_kinds_instead_of_dropping_them() {
        let raw = r#"[{"kind":"video","data":{"url":"x"}}]"#;
        let blocks = parse(raw).unwrap();
        assert_eq!(
            blocks[0],
            ContentBlock::Unknown {
                kind: "video".to_string(),
                data: json!({"url": "x"}),
            }
        );
    }

    #[test]
    fn preserves_block_order() {
        let raw = r#"[
            {"kind":"markdown","data":{"text":"one"}},
            {"kind":"mystery","data":{}},
            {"kind":"markdown","data":{"text":"two"}}
        ]"#;
        let blocks = parse(raw).unwrap();
        let kinds: Vec<&str> = blocks.iter().map(|b| b.kind()).collect();
        assert_eq!(kinds, vec!["markdown", "mystery", "markdown"]);
    }

    #[test]
    fn truncated_input_fails_the_whole_document() {
        let err = parse(r#"[{"kind":"markdown","data"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument { .. }));
    }

    #[test]
    fn non_list_input_fails_the_whole_document() {
        let err = parse(r#"{"kind":"markdown"}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDocument { .. }));
    }

    #[test]
    fn record_without_data_fails_the_whole_document() {
        let raw = r#"[
            {"kind":"markdown","data":{"text":"fine"}},
            {"kind":"chart"}
        ]"#;
        assert!(matches!(
            parse(raw),
            Err(ParseError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn markdown_without_text_fails_the_whole_document() {
        let raw = r#"[{"kind":"markdown","data":{"body":"nope"}}]"#;
        assert_eq!(
            parse(raw),
            Err(ParseError::InvalidBlock {
                index: 0,
                kind: "markdown".to_string(),
                message: "missing string field `text`".to_string(),
            })
        );
    }

    #[test]
    fn round_trips_through_serialize() {
        let doc = vec![
            ContentBlock::Markdown {
                text: "## Title".to_string(),
            },
            ContentBlock::Chart {
                spec: json!({"series": [{"type": "line", "data": [1, 2, 3]}]}),
            },
            ContentBlock::Unknown {
                kind: "embed".to_string(),
                data: json!({"src": "somewhere"}),
            },
        ];
        assert_eq!(parse(&serialize(&doc)).unwrap(), doc);
    }
}
