//! Built-in Endpoints
//!
//! The endpoint set written on first use. Remote entries ship without a
//! credential, so they stay out of the candidate list until the user fills in
//! a key.

use std::collections::HashSet;

use super::endpoint::{ProviderEndpoint, ProviderKind, RequestAffinity};

/// The built-in default endpoint set
#[must_use]
pub fn builtin_endpoints() -> Vec<ProviderEndpoint> {
    vec![
        ProviderEndpoint::new(
            "openrouter-qwen-coder",
            ProviderKind::OpenRouter,
            "qwen/qwen3-coder:free",
        )
        .with_priority(1),
        ProviderEndpoint::new(
            "openrouter-gpt-oss",
            ProviderKind::OpenRouter,
            "openai/gpt-oss-20b:free",
        )
        .with_priority(2)
        .with_affinity(RequestAffinity::Completion),
        ProviderEndpoint::new("gemini-flash", ProviderKind::Gemini, "gemini-2.0-flash")
            .with_priority(3)
            .with_quota_signatures(["RESOURCE_EXHAUSTED"]),
        ProviderEndpoint::new("openai-gpt-4o-mini", ProviderKind::OpenAi, "gpt-4o-mini")
            .with_priority(4)
            .with_quota_signatures(["insufficient_quota", "rate_limit_exceeded"]),
        ProviderEndpoint::new("ollama-local", ProviderKind::Ollama, "qwen2.5-coder")
            .with_priority(10)
            .with_enabled(false),
    ]
}

/// Append every default whose name is not already in `existing`.
///
/// Existing entries are never modified or reordered. Returns the merged list
/// and how many defaults were added; applying the result again adds nothing.
#[must_use]
pub fn merge_missing_defaults(
    existing: &[ProviderEndpoint],
    defaults: &[ProviderEndpoint],
) -> (Vec<ProviderEndpoint>, usize) {
    let present: HashSet<&str> = existing.iter().map(|e| e.name.as_str()).collect();

    let missing: Vec<ProviderEndpoint> = defaults
        .iter()
        .filter(|d| !present.contains(d.name.as_str()))
        .cloned()
        .collect();
    let added = missing.len();

    let mut merged = existing.to_vec();
    merged.extend(missing);
    (merged, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_names_unique() {
        let defaults = builtin_endpoints();
        let names: HashSet<_> = defaults.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.len(), defaults.len());
    }

    #[test]
    fn test_merge_never_overwrites_user_entry() {
        let user = ProviderEndpoint::new("gemini-flash", ProviderKind::Gemini, "gemini-1.5-pro")
            .with_credential("mine")
            .with_priority(0);

        let (merged, added) = merge_missing_defaults(&[user.clone()], &builtin_endpoints());

        assert_eq!(added, builtin_endpoints().len() - 1);
        assert_eq!(merged[0], user);
        assert_eq!(
            merged.iter().filter(|e| e.name == "gemini-flash").count(),
            1
        );
    }

    #[test]
    fn test_merge_idempotent() {
        let custom = ProviderEndpoint::new("mine", ProviderKind::Custom, "m");
        let (once, _) = merge_missing_defaults(&[custom], &builtin_endpoints());
        let (twice, added) = merge_missing_defaults(&once, &builtin_endpoints());

        assert_eq!(added, 0);
        assert_eq!(once, twice);
    }
}
