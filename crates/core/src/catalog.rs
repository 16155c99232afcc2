//! Built-in shot template catalog.
//!
//! Each template describes one scene the provider can render a source
//! image into. Shoots are created against any subset of the catalog;
//! template ids double as item ids inside a shoot.

use crate::error::CoreError;

/// One scene template from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotTemplate {
    /// Stable slug, used as the item id inside a shoot.
    pub id: &'static str,
    /// Human-readable name shown in clients.
    pub display_name: &'static str,
    /// Base prompt sent to the provider, before style composition.
    pub prompt: &'static str,
    /// Aspect ratio requested from the provider, e.g. `"3:4"`.
    pub aspect_ratio: &'static str,
}

/// The full template catalog, in display order.
pub const TEMPLATES: &[ShotTemplate] = &[
    ShotTemplate {
        id: "studio-portrait",
        display_name: "Studio Portrait",
        prompt: "professional studio portrait, soft key light, seamless grey backdrop, \
                 shallow depth of field",
        aspect_ratio: "3:4",
    },
    ShotTemplate {
        id: "golden-hour-rooftop",
        display_name: "Golden Hour Rooftop",
        prompt: "candid rooftop portrait at golden hour, warm backlight, city skyline \
                 softly out of focus",
        aspect_ratio: "3:4",
    },
    ShotTemplate {
        id: "cafe-candid",
        display_name: "Café Candid",
        prompt: "candid photo seated by a café window, natural morning light, espresso cup \
                 on the table",
        aspect_ratio: "4:5",
    },
    ShotTemplate {
        id: "linen-editorial",
        display_name: "Linen Editorial",
        prompt: "editorial fashion photo in neutral linen clothing, textured plaster wall, \
                 diffused daylight",
        aspect_ratio: "4:5",
    },
    ShotTemplate {
        id: "neon-night",
        display_name: "Neon Night",
        prompt: "street portrait at night under neon signage, cinematic color grade, \
                 light rain reflections",
        aspect_ratio: "2:3",
    },
    ShotTemplate {
        id: "overcast-beach",
        display_name: "Overcast Beach",
        prompt: "windswept portrait on an overcast beach, muted tones, dunes in the \
                 background",
        aspect_ratio: "3:2",
    },
    ShotTemplate {
        id: "library-profile",
        display_name: "Library Profile",
        prompt: "thoughtful profile portrait between tall library shelves, warm tungsten \
                 lamps, books softly blurred",
        aspect_ratio: "3:4",
    },
    ShotTemplate {
        id: "garden-spring",
        display_name: "Spring Garden",
        prompt: "portrait among flowering branches in a spring garden, bright diffuse \
                 light, pastel palette",
        aspect_ratio: "4:5",
    },
];

/// Look up a template by its slug.
pub fn find(id: &str) -> Option<&'static ShotTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Resolve a list of template ids into templates, preserving order.
///
/// Fails with [`CoreError::NotFound`] on the first unknown id. Duplicate
/// ids are rejected as a validation error because item ids must be unique
/// within a shoot.
pub fn resolve(ids: &[String]) -> Result<Vec<&'static ShotTemplate>, CoreError> {
    let mut templates = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(CoreError::Validation(format!(
                "Duplicate template id \"{id}\""
            )));
        }
        let template = find(id).ok_or_else(|| CoreError::not_found("ShotTemplate", id))?;
        templates.push(template);
    }
    Ok(templates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_unique() {
        for (i, t) in TEMPLATES.iter().enumerate() {
            assert!(
                !TEMPLATES[..i].iter().any(|other| other.id == t.id),
                "duplicate template id {}",
                t.id
            );
        }
    }

    #[test]
    fn find_known_template() {
        let t = find("studio-portrait").expect("template should exist");
        assert_eq!(t.display_name, "Studio Portrait");
    }

    #[test]
    fn find_unknown_returns_none() {
        assert!(find("underwater-disco").is_none());
    }

    #[test]
    fn resolve_preserves_order() {
        let ids = vec!["cafe-candid".to_string(), "studio-portrait".to_string()];
        let templates = resolve(&ids).expect("both ids are known");
        assert_eq!(templates[0].id, "cafe-candid");
        assert_eq!(templates[1].id, "studio-portrait");
    }

    #[test]
    fn resolve_unknown_id_fails() {
        let ids = vec!["studio-portrait".to_string(), "nope".to_string()];
        let err = resolve(&ids).expect_err("unknown id must fail");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn resolve_duplicate_id_fails() {
        let ids = vec!["cafe-candid".to_string(), "cafe-candid".to_string()];
        let err = resolve(&ids).expect_err("duplicate must fail");
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
