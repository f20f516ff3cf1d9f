//! Recognising stale-deployment failures.
//!
//! A failure is ours only if its name or message matches one of a fixed set
//! of loader signatures. Everything else belongs to the host's own error
//! reporting and must be left alone.

use std::sync::OnceLock;

use regex::Regex;

use staleguard_types::{ElementTag, LoadFailure, ModuleKey, ResourceErrorEvent};

struct Signatures {
    loading_chunk: Regex,
    chunk_load_error: Regex,
    loading_css_chunk: Regex,
    failed_to_import: Regex,
    network_error_chunk: Regex,
    chunk_number: Regex,
}

impl Signatures {
    fn new() -> Self {
        Self {
            loading_chunk: Regex::new(r"(?i)loading chunk \d+ failed")
                .expect("valid loading-chunk regex"),
            chunk_load_error: Regex::new(r"(?i)ChunkLoadError").expect("valid ChunkLoadError regex"),
            loading_css_chunk: Regex::new(r"(?i)loading css chunk")
                .expect("valid css-chunk regex"),
            failed_to_import: Regex::new(r"(?i)failed to import").expect("valid import regex"),
            network_error_chunk: Regex::new(r"(?i)NetworkError.*chunk")
                .expect("valid network-error regex"),
            chunk_number: Regex::new(r"(?i)chunk (\d+)").expect("valid chunk-number regex"),
        }
    }

    fn matches(&self, text: &str) -> bool {
        [
            &self.loading_chunk,
            &self.chunk_load_error,
            &self.loading_css_chunk,
            &self.failed_to_import,
            &self.network_error_chunk,
        ]
        .iter()
        .any(|re| re.is_match(text))
    }
}

static SIGNATURES: OnceLock<Signatures> = OnceLock::new();

fn signatures() -> &'static Signatures {
    SIGNATURES.get_or_init(Signatures::new)
}

/// True when `text` looks like a chunk that no longer exists on the server.
#[must_use]
pub fn is_stale_deployment(text: &str) -> bool {
    signatures().matches(text)
}

/// Classify a thrown/rejected error by its name and message.
#[must_use]
pub fn classify(failure: &LoadFailure) -> bool {
    failure.name.as_deref().is_some_and(is_stale_deployment)
        || is_stale_deployment(&failure.message)
}

/// Path of a chunk script relative to `static_prefix`, query and fragment stripped.
#[must_use]
pub fn key_from_path(url: &str, static_prefix: &str) -> Option<ModuleKey> {
    let start = url.find(static_prefix)? + static_prefix.len();
    let rest = &url[start..];
    let end = rest
        .find(|c: char| c == '?' || c == '#' || c.is_whitespace())
        .unwrap_or(rest.len());
    let path = &rest[..end];
    (!path.is_empty()).then(|| ModuleKey::new(path))
}

/// `chunk N` in the message wins, then a chunk path, then `unknown-chunk`.
#[must_use]
pub fn key_from_message(message: &str, static_prefix: &str) -> ModuleKey {
    if let Some(caps) = signatures().chunk_number.captures(message) {
        return ModuleKey::new(format!("chunk-{}", &caps[1]));
    }
    key_from_path(message, static_prefix).unwrap_or_else(ModuleKey::unknown)
}

/// Key for a rejection or loader-hook failure.
#[must_use]
pub fn key_for_failure(failure: &LoadFailure, static_prefix: &str) -> ModuleKey {
    match &failure.module_id {
        Some(id) => ModuleKey::for_module_id(id),
        None => key_from_message(&failure.message, static_prefix),
    }
}

/// Decide whether a global error event is a stale chunk, and which one.
///
/// A failed `<script>` under the static chunk path qualifies by location
/// alone. Anything else must classify by its own message or attached error.
#[must_use]
pub fn key_for_resource_error(event: &ResourceErrorEvent, static_prefix: &str) -> Option<ModuleKey> {
    if event.tag == Some(ElementTag::Script)
        && let Some(src) = event.src.as_deref()
        && src.contains(static_prefix)
    {
        return Some(key_from_path(src, static_prefix).unwrap_or_else(ModuleKey::unknown));
    }

    let classified = is_stale_deployment(&event.message)
        || event.error.as_ref().is_some_and(classify);
    if !classified {
        return None;
    }

    let message_key = key_from_message(&event.message, static_prefix);
    if message_key.as_str() != ModuleKey::UNKNOWN {
        return Some(message_key);
    }
    if let Some(error) = &event.error {
        let error_key = key_for_failure(error, static_prefix);
        if error_key.as_str() != ModuleKey::UNKNOWN {
            return Some(error_key);
        }
    }
    Some(
        event
            .filename
            .as_deref()
            .and_then(|f| key_from_path(f, static_prefix))
            .unwrap_or_else(ModuleKey::unknown),
    )
}
