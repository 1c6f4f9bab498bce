use crate::validation::check_control_leading_trailing;

pub const MAX_BASENAME_CHARS: usize = 512;
pub const LINK_EXTENSION: &str = "url";

fn valid_basename_char(ch: char) -> bool {
    !matches!(ch, '/' | '\\' | '\0')
}

/// names like `C:` or `c:dir` that some platforms read as a drive
pub fn has_drive_prefix(given: &str) -> bool {
    let bytes = given.as_bytes();

    bytes.len() >= 2 && bytes[1] == b':'
}

/// a single entry name. rejects separators, control characters, surrounding
/// whitespace, drive prefixes and the `.`/`..` directory aliases.
pub fn basename_valid(given: &str) -> bool {
    !given.is_empty()
        && given != "."
        && given != ".."
        && !has_drive_prefix(given)
        && given.chars().all(valid_basename_char)
        && check_control_leading_trailing(given, Some(MAX_BASENAME_CHARS))
}

/// splits a name into its stem and extension. names without a dot or with
/// only a leading dot have no extension.
pub fn split_ext(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(index) => (&name[..index], Some(&name[index + 1..])),
    }
}

pub fn is_link_name(name: &str) -> bool {
    matches!(split_ext(name), (_, Some(ext)) if ext.eq_ignore_ascii_case(LINK_EXTENSION))
}

/// appends the link extension if the name does not already carry it
pub fn link_name(name: &str) -> String {
    if is_link_name(name) {
        name.to_owned()
    } else {
        format!("{name}.{LINK_EXTENSION}")
    }
}

/// `stem_n.ext` form used when avoiding collisions in a directory
pub fn numbered_name(name: &str, n: usize) -> String {
    match split_ext(name) {
        (stem, Some(ext)) => format!("{stem}_{n}.{ext}"),
        (stem, None) => format!("{stem}_{n}"),
    }
}

/// `stem (n).ext` form used for favorite display names
pub fn display_name(name: &str, n: usize) -> String {
    match split_ext(name) {
        (stem, Some(ext)) => format!("{stem} ({n}).{ext}"),
        (stem, None) => format!("{stem} ({n})"),
    }
}

/// probes `name`, `stem_1.ext`, `stem_2.ext`, ... and returns the first one
/// that `exists` reports as free. with N collisions `exists` is called
/// exactly N + 1 times.
pub fn first_free_name<F>(name: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool
{
    if !exists(name) {
        return name.to_owned();
    }

    let mut n = 1;

    loop {
        let candidate = numbered_name(name, n);

        if !exists(&candidate) {
            return candidate;
        }

        n += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn basename_validation() {
        let valid = [
            "file_name.txt",
            "a",
            ".hidden",
            "with space.pdf",
        ];

        for test in valid {
            assert!(basename_valid(test), "valid string failed {:?}", test);
        }

        let max_len = crate::string_to_len(MAX_BASENAME_CHARS + 1);

        let invalid = [
            "",
            ".",
            "..",
            "/leading_slash",
            "trailing_slash/",
            "middle\\back_slash",
            " leading_space",
            "nul\u{0000}byte",
            "x:y",
            "C:",
            max_len.as_str()
        ];

        for test in invalid {
            assert!(!basename_valid(test), "invalid string failed {:?}", test);
        }
    }

    #[test]
    fn extension_split() {
        assert_eq!(split_ext("f.txt"), ("f", Some("txt")));
        assert_eq!(split_ext("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_ext("README"), ("README", None));
        assert_eq!(split_ext(".env"), (".env", None));

        assert_eq!(numbered_name("f.txt", 2), "f_2.txt");
        assert_eq!(numbered_name("README", 1), "README_1");
        assert_eq!(display_name("report.pdf", 1), "report (1).pdf");

        assert!(is_link_name("site.URL"));
        assert_eq!(link_name("site"), "site.url");
        assert_eq!(link_name("site.url"), "site.url");
    }

    #[test]
    fn first_free_probes() {
        let taken: HashSet<&str> = ["f.txt", "f_1.txt"].into_iter().collect();
        let mut probes = 0;

        let found = first_free_name("f.txt", |candidate| {
            probes += 1;
            taken.contains(candidate)
        });

        assert_eq!(found, "f_2.txt");
        assert_eq!(probes, taken.len() + 1);

        let mut probes = 0;
        let found = first_free_name("new.txt", |candidate| {
            probes += 1;
            taken.contains(candidate)
        });

        assert_eq!(found, "new.txt");
        assert_eq!(probes, 1);
    }
}
