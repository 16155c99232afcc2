//! Final-prompt composition for provider calls.
//!
//! A shoot carries one style string and optional per-item prompt
//! overrides. The final prompt for an item is the override (when present)
//! or the template's base prompt, with the shoot style appended.

use crate::catalog::ShotTemplate;

/// Compose the final provider prompt for one item.
///
/// An override replaces the template's prompt body entirely; the shoot
/// style is appended either way. An empty style contributes nothing.
pub fn compose(template: &ShotTemplate, style: &str, override_prompt: Option<&str>) -> String {
    let base = override_prompt.unwrap_or(template.prompt);
    let style = style.trim();
    if style.is_empty() {
        base.to_string()
    } else {
        format!("{base}, {style} style")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
