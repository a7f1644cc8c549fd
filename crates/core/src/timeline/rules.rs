use serde::{Deserialize, Serialize};

/// Appends `tag` to segments named `segment` unless already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRule {
    pub segment: String,
    pub tag: String,
}

impl EffectRule {
    pub fn new(segment: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            segment: segment.into().to_uppercase(),
            tag: tag.into(),
        }
    }
}

/// Default effect tags keyed by upper-cased segment name.
///
/// Existing templates rely on the default table: `HOOK` gets `zoom`, `PUNCH`
/// gets `sfx:vine_boom` and falls back to a random `punch` effect, and every
/// segment gets `caption`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRules {
    pub per_segment: Vec<EffectRule>,
    pub always: Vec<String>,
    /// Catalog tag sampled when a segment ends up with no resolvable `sfx:` tag.
    pub sfx_fallbacks: Vec<EffectRule>,
}

impl Default for EffectRules {
    fn default() -> Self {
        Self {
            per_segment: vec![
                EffectRule::new("HOOK", "zoom"),
                EffectRule::new("PUNCH", "sfx:vine_boom"),
            ],
            always: vec!["caption".to_string()],
            sfx_fallbacks: vec![EffectRule::new("PUNCH", "punch")],
        }
    }
}

impl EffectRules {
    /// No defaults at all; segments keep exactly the template's tags.
    pub fn empty() -> Self {
        Self {
            per_segment: Vec::new(),
            always: Vec::new(),
            sfx_fallbacks: Vec::new(),
        }
    }

    /// Stringified template tags followed by every default tag the segment
    /// does not already carry (compared case-insensitively).
    pub fn normalize(&self, segment: &str, effects: &[String]) -> Vec<String> {
        let mut normalized = effects.to_vec();
        let defaults = self
            .per_segment
            .iter()
            .filter(|rule| rule.segment == segment)
            .map(|rule| &rule.tag)
            .chain(self.always.iter());

        for tag in defaults {
            let present = normalized
                .iter()
                .any(|existing| existing.to_lowercase() == tag.to_lowercase());
            if !present {
                normalized.push(tag.clone());
            }
        }
        normalized
    }

    pub fn fallback_sfx_tag(&self, segment: &str) -> Option<&str> {
        self.sfx_fallbacks
            .iter()
            .find(|rule| rule.segment == segment)
            .map(|rule| rule.tag.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_table_matches_known_segments() {
        let rules = EffectRules::default();
        assert_eq!(rules.normalize("HOOK", &[]), tags(&["zoom", "caption"]));
        assert_eq!(rules.normalize("PUNCH", &[]), tags(&["sfx:vine_boom", "caption"]));
        assert_eq!(rules.normalize("BUILD", &tags(&["shake"])), tags(&["shake", "caption"]));
    }

    #[test]
    fn existing_tags_suppress_defaults_case_insensitively() {
        let rules = EffectRules::default();
        assert_eq!(
            rules.normalize("PUNCH", &tags(&["SFX:Vine_Boom", "Caption"])),
            tags(&["SFX:Vine_Boom", "Caption"])
        );
    }

    #[test]
    fn rules_only_match_exact_names() {
        let rules = EffectRules::default();
        assert_eq!(rules.normalize("HOOK_2", &[]), tags(&["caption"]));
        assert_eq!(rules.fallback_sfx_tag("PUNCH"), Some("punch"));
        assert_eq!(rules.fallback_sfx_tag("HOOK"), None);
    }

    #[test]
    fn custom_rules_extend_the_table() {
        let mut rules = EffectRules::empty();
        rules.per_segment.push(EffectRule::new("outro", "fade"));
        assert_eq!(rules.normalize("OUTRO", &[]), tags(&["fade"]));
        assert!(rules.normalize("HOOK", &[]).is_empty());
    }
}
