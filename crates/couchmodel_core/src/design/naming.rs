//! Model name to design document identifier.

use once_cell::sync::Lazy;
use regex::Regex;

static ACRONYM_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z\d]+)([A-Z][a-z])").expect("valid acronym regex"));
static WORD_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z\d])([A-Z])").expect("valid word boundary regex"));

/// Derives the design document identifier for a model type name.
///
/// Namespace separators (`::`, `/`) and camel-case boundaries become `_`
/// and the result is lowercased: `Admin::BlogPost` -> `admin_blog_post`,
/// `HTTPRequest` -> `http_request`.
pub fn design_document_id(model_name: &str) -> String {
    let flattened = model_name.trim().replace("::", "/");
    let split = ACRONYM_BOUNDARY_RE.replace_all(&flattened, "${1}_${2}");
    let split = WORD_BOUNDARY_RE.replace_all(&split, "${1}_${2}");
    split.replace(['/', '-'], "_").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::design_document_id;

    #[test]
    fn underscores_camel_case_and_namespaces() {
        assert_eq!(design_document_id("Post"), "post");
        assert_eq!(design_document_id("BlogPost"), "blog_post");
        assert_eq!(design_document_id("Admin::BlogPost"), "admin_blog_post");
        assert_eq!(design_document_id("HTTPRequest"), "http_request");
        assert_eq!(design_document_id("already_snake"), "already_snake");
    }
}
