//! BSON value sanitization for MongoDB compatibility.
//!
//! MongoDB reserves dots and dollar signs in field names and rejects null bytes. Keys and
//! strings are escaped on the way in and restored on the way out; field paths used in
//! filters, sorts and updates keep their dots as separators and escape each segment.

use bson::{Bson, Document};

pub(crate) struct ValueSanitizer;

impl ValueSanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Recursively sanitizes a BSON value, replacing problematic characters in keys and strings.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::sanitize_string(s)),
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::sanitize_document(doc)),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
            .collect()
    }

    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter() {
            sanitized = sanitized.replace(*target, *replacement);
        }
        sanitized
    }

    /// Sanitizes each segment of a dotted field path, keeping the separators.
    pub(crate) fn sanitize_path(path: &str) -> String {
        path.split('.')
            .map(Self::sanitize_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Recursively restores a BSON value, reverting sanitization transformations.
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::String(s) => Bson::String(Self::restore_string(s)),
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(Self::restore_document(doc)),
            _ => value.clone(),
        }
    }

    pub(crate) fn restore_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
            .collect()
    }

    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = input.to_string();
        for (target, replacement) in Self::REPLACEMENTS.iter().rev() {
            restored = restored.replace(*replacement, *target);
        }
        restored
    }
}
