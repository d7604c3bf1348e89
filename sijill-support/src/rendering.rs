//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format candidate lists, type names,
//! and helpful suggestions in error output.

/// Renders a list of names as a single comma-separated line.
///
/// # Examples
/// ```
/// use sijill_support::rendering::render_list;
///
/// let names = vec!["FastLogger", "DefaultLogger"];
/// assert_eq!(render_list(&names), "FastLogger, DefaultLogger");
/// ```
pub fn render_list(items: &[impl AsRef<str>]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders competing candidates as an aligned table.
///
/// ```text
///   [priority 100] app::FastLogger     (from: plugins, #3)
///   [priority 100] app::DefaultLogger  (from: builder, #7)
/// ```
pub fn render_candidates(entries: &[CandidateEntry]) -> String {
    let max_priority_len = entries
        .iter()
        .map(|e| e.priority.to_string().len())
        .max()
        .unwrap_or(0);
    let max_name_len = entries
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0);

    let mut result = String::new();
    for entry in entries {
        result.push_str(&format!(
            "  [priority {:>pwidth$}] {:<nwidth$}",
            entry.priority,
            entry.name,
            pwidth = max_priority_len,
            nwidth = max_name_len,
        ));

        if let Some(ref origin) = entry.origin {
            result.push_str(&format!("  (from: {origin})"));
        }

        result.push('\n');
    }

    result
}

/// One competing registration in a candidate table.
#[derive(Debug, Clone)]
pub struct CandidateEntry {
    /// What provides the service (implementation type, factory or instance)
    pub name: String,
    /// Override priority of the candidate
    pub priority: i32,
    /// Optional: where the candidate was declared
    pub origin: Option<String>,
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use sijill_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
///
/// let short = shorten_type_name("my_app::cache::Cache<_>");
/// assert_eq!(short, "Cache<_>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => {
                current_segment.push(ch);
            }
        }
    }

    result.push_str(&current_segment);
    result
}

/// Generates "did you mean?" suggestions from registered type names.
///
/// Exact substring matches rank first, then matches on the shortened
/// name, then names sharing a prefix of at least three characters.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower)
                || requested_lower.contains(&name_lower)
            {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short)
                || requested_short.contains(&name_short)
            {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    // stable: equal scores keep registry order
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_two_names() {
        assert_eq!(render_list(&["A", "B"]), "A, B");
    }

    #[test]
    fn render_empty_list() {
        let names: Vec<&str> = vec![];
        assert_eq!(render_list(&names), "");
    }

    #[test]
    fn shorten_simple_path() {
        assert_eq!(
            shorten_type_name("my_app::services::UserService"),
            "UserService"
        );
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            shorten_type_name("my_app::Cache<alloc::string::String, core::option::Option<i32>>"),
            "Cache<String, Option<i32>>"
        );
    }

    #[test]
    fn shorten_reference_and_tuple() {
        assert_eq!(shorten_type_name("&a::B"), "&B");
        assert_eq!(shorten_type_name("(a::B, c::D)"), "(B, D)");
    }

    #[test]
    fn suggest_finds_typo_by_prefix() {
        let available = vec!["my_app::UserService", "my_app::Database"];
        let suggestions = suggest_similar("my_app::UserServise", &available, 3);
        assert_eq!(suggestions, vec!["my_app::UserService".to_string()]);
    }

    #[test]
    fn suggest_skips_exact_request() {
        let available = vec!["my_app::Logger"];
        assert!(suggest_similar("my_app::Logger", &available, 3).is_empty());
    }

    #[test]
    fn suggest_no_match() {
        let available = vec!["my_app::Database"];
        let suggestions = suggest_similar("XyzAbcDef", &available, 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn candidate_table_rendering() {
        let entries = vec![
            CandidateEntry {
                name: "app::FastLogger".to_string(),
                priority: 100,
                origin: Some("plugins, #3".to_string()),
            },
            CandidateEntry {
                name: "app::DefaultLogger".to_string(),
                priority: 100,
                origin: None,
            },
        ];

        let rendered = render_candidates(&entries);
        assert!(rendered.contains("[priority 100] app::FastLogger"));
        assert!(rendered.contains("(from: plugins, #3)"));
        assert!(rendered.contains("app::DefaultLogger"));
        assert_eq!(rendered.lines().count(), 2);
    }
}
