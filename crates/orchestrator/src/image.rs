//! Image-reference validation and rewriting
//!
//! A candidate image name coming back from the builder is accepted only if
//! the canonical `registry[:port][/namespace...]/name[:tag]` grammar matches
//! it over its entire length. Anything else, including the JSON body the
//! builder sends on failure, lands in the rejection path.

use regex::Regex;
use std::sync::LazyLock;

static IMAGE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]+(?:[._-][a-z0-9]+)*(?::[0-9]+)?(?:/[a-zA-Z0-9]+(?:[._-][a-z0-9]+)*)+(?::[a-zA-Z0-9._-]+)?$",
    )
    .ok()
});

/// Full-length grammar check. Fails closed if the pattern is unavailable.
pub fn valid_image(image: &str) -> bool {
    match IMAGE_PATTERN.as_ref() {
        Some(pattern) => pattern.is_match(image),
        None => false,
    }
}

/// Swap the push-registry prefix for the pull-registry prefix, first
/// occurrence only.
pub fn rewrite_image(image: &str, push_registry_url: &str, registry_url: &str) -> String {
    image.replacen(push_registry_url, registry_url, 1)
}
