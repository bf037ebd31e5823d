// Kept apart from the pricing table: a label change must not move billing.

const EXACT_LABELS: &[(&str, &str)] = &[
    ("claude-3-opus-20240229", "Opus 3"),
    ("claude-3-sonnet-20240229", "Sonnet 3"),
    ("claude-3-haiku-20240307", "Haiku 3"),
    ("claude-3-5-sonnet-20240620", "Sonnet 3.5"),
    ("claude-3-5-sonnet-20241022", "Sonnet 3.5"),
    ("claude-3-5-haiku-20241022", "Haiku 3.5"),
    ("claude-3-7-sonnet-20250219", "Sonnet 3.7"),
];

// Checked in order; more specific fragments come before their family.
const FAMILY_LABELS: &[(&str, &str)] = &[
    ("opus-4-6", "Opus 4.6"),
    ("opus-4-5", "Opus 4.5"),
    ("opus-4-1", "Opus 4.1"),
    ("opus-4", "Opus 4"),
    ("opus-3", "Opus 3"),
    ("sonnet-4-6", "Sonnet 4.6"),
    ("sonnet-4-5", "Sonnet 4.5"),
    ("sonnet-4", "Sonnet 4"),
    ("sonnet-3", "Sonnet 3.x"),
    ("haiku-4-5", "Haiku 4.5"),
    ("haiku-3-5", "Haiku 3.5"),
    ("haiku-3", "Haiku 3"),
];

/// Short display label for a model id; unknown ids are returned unchanged.
///
/// Family fragments match anywhere in the lowercased id so provider-prefixed
/// ids such as `us.anthropic.claude-opus-4-6-v1` still resolve.
pub fn short_model_label(model: &str) -> String {
    if let Some((_, label)) = EXACT_LABELS.iter().find(|(id, _)| *id == model) {
        return label.to_string();
    }
    let lowered = model.to_ascii_lowercase();
    FAMILY_LABELS
        .iter()
        .find(|(fragment, _)| lowered.contains(fragment))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| model.to_string())
}
