/// Human readable map name from a file name.
///
/// Drops the extension, treats hyphens as word breaks and capitalizes each
/// word: `rhine-valley.map` becomes `Rhine Valley`.
pub fn display_name_from_file_name(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };

    let words: Vec<String> = stem
        .split('-')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() {
        stem.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_file_name() {
        assert_eq!(display_name_from_file_name("alps.map"), "Alps");
        assert_eq!(display_name_from_file_name("rhine-valley.map"), "Rhine Valley");
        assert_eq!(display_name_from_file_name("north-rhine-westphalia.map"), "North Rhine Westphalia");
        assert_eq!(display_name_from_file_name("österreich.map"), "Österreich");
        assert_eq!(display_name_from_file_name("germany.v5.map"), "Germany.v5");
        assert_eq!(display_name_from_file_name(".map"), ".map");
        assert_eq!(display_name_from_file_name("noext"), "Noext");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}
