use std::fmt;

use serde::Serialize;

use crate::id::ObjectId;
use crate::name::DisplayName;

/// Client-facing pointer to a stored object.
///
/// Renders as `<id>/<name>`. Only the id resolves the object; the name is
/// carried so downloads get a friendly filename. The backing filesystem path
/// is never part of a reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RetrievalRef {
    pub id: ObjectId,
    pub name: DisplayName,
}

impl RetrievalRef {
    pub fn new(id: ObjectId, name: DisplayName) -> Self {
        Self { id, name }
    }

    /// Join the reference onto a public base such as `https://host/v1/objects`.
    pub fn to_url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self)
    }
}

impl fmt::Display for RetrievalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdSpec, NamePolicy};

    #[test]
    fn display_is_id_then_name() {
        let id = IdSpec::default().generate();
        let name = DisplayName::sanitize("a.pdf", &NamePolicy::default());
        let r = RetrievalRef::new(id.clone(), name);
        assert_eq!(r.to_string(), format!("{id}/a.pdf"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let id = IdSpec::default().generate();
        let name = DisplayName::sanitize("a.pdf", &NamePolicy::default());
        let r = RetrievalRef::new(id.clone(), name);
        assert_eq!(
            r.to_url("http://localhost:8080/v1/objects/"),
            format!("http://localhost:8080/v1/objects/{id}/a.pdf")
        );
    }

    #[test]
    fn traversal_names_never_reach_the_reference() {
        let id = IdSpec::default().generate();
        let name = DisplayName::sanitize("../../etc/passwd", &NamePolicy::default());
        let r = RetrievalRef::new(id, name);
        let rendered = r.to_string();
        assert!(!rendered.contains(".."));
        assert_eq!(rendered.matches('/').count(), 1);
    }
}
