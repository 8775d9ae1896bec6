//! Container naming for runtimes
//!
//! Container names are `faas_` followed by the image reference with `_`
//! used as an escape character:
//!
//! | image char | name chars |
//! |------------|------------|
//! | `_`        | `__`       |
//! | `/`        | `_s`       |
//! | `:`        | `_c`       |
//! | `@`        | `_a`       |
//!
//! Every other character of a valid reference is already allowed in a
//! container name, so the mapping is a bijection and names always decode
//! back to the exact image, registry ports and digests included.

use std::fmt;

use crate::error::{Result, RuntimeError};

/// Prefix marking containers managed by this backend
pub const RUNTIME_NAME_PREFIX: &str = "faas_";

/// Backend name used in runtime keys
pub const BACKEND_NAME: &str = "docker";

/// Runtime identifier that maps to the configured default image
pub const DEFAULT_RUNTIME: &str = "default";

/// Resolve `"default"` and reject empty identifiers
pub fn resolve_image(image: &str, default_image: &str) -> Result<String> {
    let image = image.trim();
    let resolved = if image == DEFAULT_RUNTIME {
        default_image.trim()
    } else {
        image
    };

    if resolved.is_empty() {
        return Err(RuntimeError::Config(
            "runtime image name cannot be empty".to_string(),
        ));
    }

    Ok(resolved.to_string())
}

/// Container name for an image
pub fn encode_runtime_name(image: &str) -> String {
    let mut name = String::with_capacity(RUNTIME_NAME_PREFIX.len() + image.len() * 2);
    name.push_str(RUNTIME_NAME_PREFIX);
    for c in image.chars() {
        match c {
            '_' => name.push_str("__"),
            '/' => name.push_str("_s"),
            ':' => name.push_str("_c"),
            '@' => name.push_str("_a"),
            other => name.push(other),
        }
    }
    name
}

/// Image for a container name, `None` if the name was not produced by
/// [`encode_runtime_name`]
pub fn decode_runtime_name(name: &str) -> Option<String> {
    let encoded = name
        .trim_start_matches('/')
        .strip_prefix(RUNTIME_NAME_PREFIX)?;

    let mut image = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        if c != '_' {
            image.push(c);
            continue;
        }
        match chars.next()? {
            '_' => image.push('_'),
            's' => image.push('/'),
            'c' => image.push(':'),
            'a' => image.push('@'),
            _ => return None,
        }
    }

    if image.is_empty() {
        None
    } else {
        Some(image)
    }
}

/// Split an image reference into repository and tag (or digest) for pulls
pub fn split_image_reference(image: &str) -> (String, String) {
    if let Some((repository, digest)) = image.split_once('@') {
        return (repository.to_string(), digest.to_string());
    }

    // A ':' before the last '/' belongs to a registry host:port
    let last_slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_slash..].rfind(':') {
        Some(i) => {
            let split = last_slash + i;
            (image[..split].to_string(), image[split + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

/// Key identifying an installed runtime for a given backend and host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeKey {
    pub backend: String,
    pub host: String,
    pub container_name: String,
}

impl RuntimeKey {
    pub fn new(host: &str, image: &str) -> Self {
        Self {
            backend: BACKEND_NAME.to_string(),
            host: host.to_string(),
            container_name: encode_runtime_name(image),
        }
    }
}

impl fmt::Display for RuntimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.backend, self.host, self.container_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_runtime_name() {
        assert_eq!(
            encode_runtime_name("myrepo/myimage:tag"),
            "faas_myrepo_smyimage_ctag"
        );
        assert_eq!(encode_runtime_name("python:3.8"), "faas_python_c3.8");
        assert_eq!(encode_runtime_name("my_image"), "faas_my__image");
    }

    #[test]
    fn test_decode_roundtrip() {
        let images = [
            "myrepo/myimage:tag",
            "python:3.8-slim",
            "my_repo/my__image",
            "registry.example.com:5000/team/img:tag",
            "busybox@sha256:abcdef0123",
            "a_s",
        ];
        for image in images {
            assert_eq!(
                decode_runtime_name(&encode_runtime_name(image)).as_deref(),
                Some(image)
            );
        }
    }

    #[test]
    fn test_decode_rejects_foreign_names() {
        assert_eq!(decode_runtime_name("redis"), None);
        assert_eq!(decode_runtime_name("faas_"), None);
        assert_eq!(decode_runtime_name("faas_bad_escape_x"), None);
        assert_eq!(decode_runtime_name("faas_trailing_"), None);
        // Engine API names carry a leading slash
        assert_eq!(
            decode_runtime_name("/faas_python_c3.8").as_deref(),
            Some("python:3.8")
        );
    }

    #[test]
    fn test_resolve_image() {
        assert_eq!(
            resolve_image("default", "faas/runtime-python:1.0.0").unwrap(),
            "faas/runtime-python:1.0.0"
        );
        assert_eq!(resolve_image("alpine:3", "x").unwrap(), "alpine:3");
        assert!(resolve_image("", "x").is_err());
        assert!(resolve_image("default", " ").is_err());
    }

    #[test]
    fn test_split_image_reference() {
        assert_eq!(
            split_image_reference("python:3.8"),
            ("python".to_string(), "3.8".to_string())
        );
        assert_eq!(
            split_image_reference("myrepo/myimage"),
            ("myrepo/myimage".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_reference("registry.example.com:5000/img"),
            ("registry.example.com:5000/img".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_reference("registry.example.com:5000/img:v2"),
            ("registry.example.com:5000/img".to_string(), "v2".to_string())
        );
        assert_eq!(
            split_image_reference("busybox@sha256:abc"),
            ("busybox".to_string(), "sha256:abc".to_string())
        );
    }

    #[test]
    fn test_runtime_key() {
        let key = RuntimeKey::new("127.0.0.1", "myrepo/myimage:tag");
        assert_eq!(key.to_string(), "docker/127.0.0.1/faas_myrepo_smyimage_ctag");
    }
}
