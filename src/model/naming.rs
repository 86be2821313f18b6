//! Collection naming

/// Collection name derived from a model name: lowercased and, when
/// `pluralize` is set, given an English plural ending.
pub fn collection_name(model: &str, pluralize: bool) -> String {
    let lower = model.to_lowercase();
    if !pluralize || lower.is_empty() {
        return lower;
    }
    plural(&lower)
}

fn plural(word: &str) -> String {
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{}es", word);
    }
    if let Some(stem) = word.strip_suffix('y') {
        let after_consonant = stem
            .chars()
            .last()
            .map_or(false, |c| !"aeiou".contains(c));
        if after_consonant {
            return format!("{}ies", stem);
        }
    }
    format!("{}s", word)
}
