//! Schema overrides for fields that carry free-form backend settings.
//!
//! Kubernetes structural schemas reject an untyped `additionalProperties: true`,
//! so free-form maps are published as objects that preserve unknown fields.

use schemars::{json_schema, Schema, SchemaGenerator};

pub(crate) fn free_form_object(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "description": "Backend-specific settings passed through to the service verbatim.",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

pub(crate) fn optional_free_form_object(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "nullable": true,
        "description": "Settings merged into the service's media management configuration.",
        "x-kubernetes-preserve-unknown-fields": true
    })
}
