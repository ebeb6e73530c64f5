//! Stock transforms between tuple shapes.

use crate::core::Tuple;

/// Renders a record as a `{"sequence", "time"}` document.
pub fn to_document(tuple: Tuple) -> Result<Tuple, String> {
    match tuple {
        Tuple::Record(record) => Ok(Tuple::Document(record.to_document())),
        Tuple::Sequence(seq) => Ok(Tuple::Document(serde_json::json!({ "sequence": seq }))),
        Tuple::Document(_) => Ok(tuple),
        Tuple::Text(_) => Err("text tuples have no document form".to_string()),
    }
}

/// Serializes a document (or record) to its canonical text.
pub fn serialize_document(tuple: Tuple) -> Result<Tuple, String> {
    match tuple {
        Tuple::Document(doc) => Ok(Tuple::Text(doc.to_string())),
        Tuple::Record(record) => Ok(Tuple::Text(record.to_text())),
        other => Err(format!("cannot serialize a {} tuple", other.kind())),
    }
}

/// Renders any tuple as text. Sequence numbers become their decimal form.
pub fn to_text(tuple: Tuple) -> Result<Tuple, String> {
    Ok(match tuple {
        Tuple::Sequence(seq) => Tuple::Text(seq.to_string()),
        Tuple::Record(record) => Tuple::Text(record.to_text()),
        Tuple::Document(doc) => Tuple::Text(doc.to_string()),
        text @ Tuple::Text(_) => text,
    })
}
