/// Splits a `/`-separated path into its non-empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Strips the directory `base` from the front of `path`.
///
/// Returns `path` unchanged if it does not lie below `base`.
pub fn strip_base_dir<'a>(path: &'a str, base: &str) -> &'a str {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path;
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => path,
    }
}

/// The directory part of `path`, without the file name.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default()
}

/// Whether any segment of `path` starts with one of `prefixes`.
pub fn has_ignored_segment(path: &str, prefixes: &[String]) -> bool {
    split_segments(path).iter().any(|segment| {
        prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && segment.starts_with(prefix.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::{has_ignored_segment, parent_dir, split_segments, strip_base_dir};

    #[test]
    fn test_split_segments() {
        assert_eq!(
            split_segments("/data//year=2020/f.csv"),
            vec!["data", "year=2020", "f.csv"]
        );
        assert!(split_segments("").is_empty());
    }

    #[test]
    fn test_strip_base_dir_and_parent() {
        assert_eq!(strip_base_dir("/data/a/1/x.csv", "/data/"), "a/1/x.csv");
        assert_eq!(strip_base_dir("/database/x.csv", "/data"), "/database/x.csv");
        assert_eq!(strip_base_dir("a/x.csv", ""), "a/x.csv");
        assert_eq!(parent_dir("a/1/x.csv"), "a/1");
        assert_eq!(parent_dir("x.csv"), "");
    }

    #[test]
    fn test_has_ignored_segment() {
        let prefixes = vec![".".to_string(), "_".to_string()];
        assert!(has_ignored_segment("a/_SUCCESS", &prefixes));
        assert!(has_ignored_segment(".hidden/x.csv", &prefixes));
        assert!(!has_ignored_segment("a/b_c/x.csv", &prefixes));
    }
}
