//! The manuals manifest: loading, validation, and `--only` selection.
//!
//! `manuals.json` is a JSON object keyed by manual identifier:
//!
//! ```json
//! {
//!   "model_3": {
//!     "display_name": "Model 3",
//!     "document_title": "Manual del propietario",
//!     "pdf_url": "https://example.com/model_3_es_mx.pdf",
//!     "region": "MX"
//!   }
//! }
//! ```
//!
//! Entry order in the file is the processing order of every stage.

use crate::config::DataLayout;
use crate::error::CorpusError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// One configured manual. Built once at start-up and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualConfig {
    pub key: String,
    pub display_name: String,
    /// Filesystem-safe identifier; every artifact path derives from it.
    pub slug: String,
    pub document_title: String,
    pub pdf_url: String,
    pub source_url: Option<String>,
    pub language: String,
    pub region: Option<String>,
}

impl ManualConfig {
    pub fn raw_pdf_path(&self, layout: &DataLayout) -> PathBuf {
        layout.raw_pdf_path(self)
    }

    pub fn intermediate_json_path(&self, layout: &DataLayout) -> PathBuf {
        layout.intermediate_json_path(self)
    }

    pub fn intermediate_txt_path(&self, layout: &DataLayout) -> PathBuf {
        layout.intermediate_txt_path(self)
    }

    pub fn processed_jsonl_path(&self, layout: &DataLayout) -> PathBuf {
        layout.processed_jsonl_path(self)
    }

    /// File name of the raw PDF, recorded as `source_file` in chunk metadata.
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.slug)
    }
}

/// Load and validate the manuals manifest at `path`.
///
/// `example` is only used in the not-found message, pointing the user at the
/// template to copy.
pub fn load_manuals_config(path: &Path, example: &Path) -> Result<Vec<ManualConfig>, CorpusError> {
    if !path.exists() {
        return Err(CorpusError::ConfigNotFound {
            path: path.to_path_buf(),
            example: example.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
    let manuals = parse_manuals_config(&raw).map_err(|e| match e {
        ParseFailure::Json(source) => CorpusError::json(path, source),
        ParseFailure::Invalid(err) => err,
    })?;

    debug!("Loaded {} manuals from {}", manuals.len(), path.display());
    Ok(manuals)
}

enum ParseFailure {
    Json(serde_json::Error),
    Invalid(CorpusError),
}

impl From<CorpusError> for ParseFailure {
    fn from(e: CorpusError) -> Self {
        ParseFailure::Invalid(e)
    }
}

fn parse_manuals_config(raw: &str) -> Result<Vec<ManualConfig>, ParseFailure> {
    // Editors on Windows like to save with a BOM.
    let raw = raw.strip_prefix('\u{FEFF}').unwrap_or(raw);
    let data: Value = serde_json::from_str(raw).map_err(ParseFailure::Json)?;

    let Value::Object(entries) = data else {
        return Err(CorpusError::InvalidConfig(
            "manuals configuration must be a JSON object keyed by manual id".into(),
        )
        .into());
    };

    let mut manuals: Vec<ManualConfig> = Vec::with_capacity(entries.len());
    for (key, entry) in &entries {
        let Value::Object(fields) = entry else {
            return Err(CorpusError::InvalidConfig(format!(
                "entry '{key}' must be a JSON object"
            ))
            .into());
        };
        let manual = parse_entry(key, fields)?;
        // Artifact paths are keyed by slug.
        if let Some(other) = manuals.iter().find(|m| m.slug == manual.slug) {
            return Err(CorpusError::InvalidConfig(format!(
                "entries '{}' and '{key}' share the slug '{}'; set a distinct \"slug\"",
                other.key, manual.slug
            ))
            .into());
        }
        manuals.push(manual);
    }

    if manuals.is_empty() {
        return Err(CorpusError::EmptyConfig.into());
    }
    Ok(manuals)
}

fn parse_entry(key: &str, fields: &Map<String, Value>) -> Result<ManualConfig, CorpusError> {
    let required = |field: &'static str| {
        fields.get(field).ok_or_else(|| CorpusError::MissingField {
            key: key.to_string(),
            field,
        })
    };

    let display_name = value_to_string(required("display_name")?);
    let document_title = value_to_string(required("document_title")?);
    let pdf_url = match required("pdf_url")? {
        Value::String(url) if url.to_lowercase().ends_with(".pdf") => url.clone(),
        other => {
            return Err(CorpusError::InvalidUrl {
                key: key.to_string(),
                url: value_to_string(other),
            })
        }
    };

    let optional = |field: &str| {
        fields
            .get(field)
            .filter(|v| !v.is_null())
            .map(value_to_string)
            .filter(|s| !s.is_empty())
    };

    let slug = optional("slug").unwrap_or_else(|| normalize_identifier(key));
    if slug.is_empty() {
        return Err(CorpusError::InvalidConfig(format!(
            "entry '{key}' has no usable slug; set \"slug\" to an ASCII identifier"
        )));
    }

    Ok(ManualConfig {
        key: key.to_string(),
        display_name,
        slug,
        document_title,
        pdf_url,
        source_url: optional("source_url"),
        language: optional("language").unwrap_or_else(|| "es".to_string()),
        region: optional("region"),
    })
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Narrow `manuals` to those named by `only` (empty means no filter).
///
/// Keys, slugs, and display names are compared after
/// [`normalize_identifier`], so `"Model Y"`, `model-y` and `MODEL_Y` all
/// select the same manual. Output keeps configured order without
/// duplicates. Every token that matched nothing is reported at once.
pub fn filter_manuals(
    manuals: &[ManualConfig],
    only: &[String],
) -> Result<Vec<ManualConfig>, CorpusError> {
    if only.is_empty() {
        return Ok(manuals.to_vec());
    }

    let requested: BTreeSet<String> = only.iter().map(|t| normalize_identifier(t)).collect();
    let mut matched: BTreeSet<&str> = BTreeSet::new();
    let mut selected = Vec::new();

    for manual in manuals {
        let identifiers = [
            normalize_identifier(&manual.key),
            normalize_identifier(&manual.slug),
            normalize_identifier(&manual.display_name),
        ];
        let mut hit = false;
        for id in &identifiers {
            if let Some(token) = requested.get(id) {
                matched.insert(token.as_str());
                hit = true;
            }
        }
        if hit {
            selected.push(manual.clone());
        }
    }

    let missing: Vec<String> = requested
        .iter()
        .filter(|t| !matched.contains(t.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CorpusError::ManualsNotFound { tokens: missing });
    }

    Ok(selected)
}

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Slugify an identifier with `_` as separator.
///
/// Accents are folded (`Módelo` → `modelo`), apostrophes dropped, and any
/// other run of non-alphanumerics becomes one `_`. Idempotent.
pub fn normalize_identifier(value: &str) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| !matches!(c, '\'' | '’'))
        .collect::<String>()
        .to_lowercase();
    RE_NON_ALNUM
        .replace_all(&folded, "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "model_y": {
            "display_name": "Model Y",
            "document_title": "Manual del propietario Model Y",
            "pdf_url": "https://example.com/manuals/model_y.PDF"
        },
        "Model 3 Highland": {
            "display_name": "Model 3",
            "document_title": "Manual del propietario Model 3",
            "pdf_url": "https://example.com/manuals/model_3.pdf",
            "language": "en",
            "region": "US",
            "source_url": "https://example.com/model3"
        },
        "cybertruck": {
            "display_name": "Cybertruck",
            "slug": "cyber",
            "document_title": "Cybertruck Owner's Manual",
            "pdf_url": "https://example.com/manuals/cybertruck.pdf"
        }
    }"#;

    fn sample() -> Vec<ManualConfig> {
        match parse_manuals_config(SAMPLE) {
            Ok(m) => m,
            Err(_) => panic!("sample config should parse"),
        }
    }

    fn parse_err(raw: &str) -> CorpusError {
        match parse_manuals_config(raw) {
            Ok(_) => panic!("expected failure"),
            Err(ParseFailure::Invalid(e)) => e,
            Err(ParseFailure::Json(e)) => panic!("unexpected JSON error: {e}"),
        }
    }

    #[test]
    fn preserves_key_order_and_defaults() {
        let manuals = sample();
        let keys: Vec<&str> = manuals.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["model_y", "Model 3 Highland", "cybertruck"]);

        assert_eq!(manuals[0].slug, "model_y");
        assert_eq!(manuals[0].language, "es");
        assert_eq!(manuals[0].region, None);

        assert_eq!(manuals[1].slug, "model_3_highland");
        assert_eq!(manuals[1].language, "en");
        assert_eq!(manuals[1].region.as_deref(), Some("US"));
        assert_eq!(manuals[1].source_url.as_deref(), Some("https://example.com/model3"));

        assert_eq!(manuals[2].slug, "cyber");
    }

    #[test]
    fn missing_required_field_names_key() {
        let err = parse_err(r#"{"semi": {"display_name": "Semi", "pdf_url": "https://x/semi.pdf"}}"#);
        match err {
            CorpusError::MissingField { key, field } => {
                assert_eq!(key, "semi");
                assert_eq!(field, "document_title");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_pdf_url_rejected() {
        let err = parse_err(
            r#"{"s": {"display_name": "S", "document_title": "T", "pdf_url": "https://x/s.html"}}"#,
        );
        assert!(matches!(err, CorpusError::InvalidUrl { .. }));

        let err = parse_err(r#"{"s": {"display_name": "S", "document_title": "T", "pdf_url": 42}}"#);
        assert!(matches!(err, CorpusError::InvalidUrl { .. }));
    }

    #[test]
    fn empty_object_is_empty_config() {
        assert!(matches!(parse_err("{}"), CorpusError::EmptyConfig));
    }

    #[test]
    fn bom_is_tolerated() {
        let with_bom = format!("\u{FEFF}{SAMPLE}");
        assert!(parse_manuals_config(&with_bom).is_ok());
    }

    #[test]
    fn key_without_slug_characters_rejected() {
        let err = parse_err(
            r#"{"東京": {"display_name": "Tokio", "document_title": "T", "pdf_url": "https://x/t.pdf"}}"#,
        );
        match err {
            CorpusError::InvalidConfig(msg) => assert!(msg.contains("東京"), "got: {msg}"),
            other => panic!("unexpected error: {other}"),
        }

        let ok = parse_manuals_config(
            r#"{"東京": {"display_name": "Tokio", "slug": "tokyo", "document_title": "T", "pdf_url": "https://x/t.pdf"}}"#,
        );
        assert!(matches!(ok, Ok(ref m) if m[0].slug == "tokyo"));
    }

    #[test]
    fn colliding_slugs_rejected() {
        let err = parse_err(
            r#"{
                "Model Y": {"display_name": "Y", "document_title": "T", "pdf_url": "https://x/a.pdf"},
                "model-y": {"display_name": "Y2", "document_title": "T", "pdf_url": "https://x/b.pdf"}
            }"#,
        );
        match err {
            CorpusError::InvalidConfig(msg) => {
                assert!(msg.contains("Model Y") && msg.contains("model-y") && msg.contains("model_y"), "got: {msg}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn top_level_array_rejected() {
        assert!(matches!(parse_err("[]"), CorpusError::InvalidConfig(_)));
    }

    #[test]
    fn normalize_identifier_slugifies() {
        assert_eq!(normalize_identifier("Model Y"), "model_y");
        assert_eq!(normalize_identifier("  model-3 / Highland "), "model_3_highland");
        assert_eq!(normalize_identifier("Módelo Ñ"), "modelo_n");
        assert_eq!(normalize_identifier("Owner's Manual"), "owners_manual");
        assert_eq!(normalize_identifier("__x__"), "x");
    }

    #[test]
    fn normalize_identifier_is_idempotent() {
        for s in ["Model Y", "Cybertruck (2024)", "modelo-S/X", "Ártico__Plaid", ""] {
            let once = normalize_identifier(s);
            assert_eq!(normalize_identifier(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn no_filter_returns_everything() {
        let manuals = sample();
        assert_eq!(filter_manuals(&manuals, &[]).unwrap(), manuals);
    }

    #[test]
    fn filter_by_key_slug_or_display_name() {
        let manuals = sample();
        for token in ["model 3 highland", "MODEL_3_HIGHLAND", "Model 3", "model-3"] {
            let only = vec![token.to_string()];
            let selected = filter_manuals(&manuals, &only).unwrap();
            assert_eq!(selected.len(), 1, "token {token:?}");
            assert_eq!(selected[0].key, "Model 3 Highland");
        }
        let only = vec!["CYBER".to_string()];
        assert_eq!(filter_manuals(&manuals, &only).unwrap()[0].key, "cybertruck");
    }

    #[test]
    fn filter_dedups_and_keeps_config_order() {
        let manuals = sample();
        let only = vec![
            "cybertruck".to_string(),
            "cyber".to_string(),
            "model y".to_string(),
        ];
        let selected = filter_manuals(&manuals, &only).unwrap();
        let keys: Vec<&str> = selected.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["model_y", "cybertruck"]);
    }

    #[test]
    fn filter_reports_all_unmatched_tokens() {
        let manuals = sample();
        let only = vec!["semi".to_string(), "model y".to_string(), "Roadster".to_string()];
        match filter_manuals(&manuals, &only) {
            Err(CorpusError::ManualsNotFound { tokens }) => {
                assert_eq!(tokens, vec!["roadster".to_string(), "semi".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
