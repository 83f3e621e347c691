use regex::Regex;

/// A piece of a string produced by [`split`], tagged with whether it matched the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'t> {
    pub text: &'t str,
    pub matched: bool,
}

impl<'t> Segment<'t> {
    fn matched(text: &'t str) -> Self {
        Segment {
            text,
            matched: true,
        }
    }

    fn unmatched(text: &'t str) -> Self {
        Segment {
            text,
            matched: false,
        }
    }
}

/// Iterator over the segments of a string, see [`split_regex`].
pub struct Segments<'r, 't> {
    regex: &'r Regex,
    text: &'t str,
    // Start of the next segment to emit.
    start: usize,
    // Where the next search begins. Runs ahead of `start` only after empty matches.
    search: usize,
    queued: Option<Segment<'t>>,
    done: bool,
}

impl<'r, 't> Iterator for Segments<'r, 't> {
    type Item = Segment<'t>;

    fn next(&mut self) -> Option<Segment<'t>> {
        if let Some(segment) = self.queued.take() {
            return Some(segment);
        }
        if self.done {
            return None;
        }

        let text = self.text;
        loop {
            let rest = &text[self.search..];
            let found = match self.regex.find(rest) {
                Some(m) => m,
                None => break,
            };

            if found.is_empty() {
                // Skip a character so the search makes progress.
                match rest[found.start()..].chars().next() {
                    Some(c) => {
                        self.search += found.start() + c.len_utf8();
                        continue;
                    }
                    None => break,
                }
            }

            let match_start = self.search + found.start();
            let match_end = self.search + found.end();
            let gap = &text[self.start..match_start];
            let matched = Segment::matched(&text[match_start..match_end]);
            self.start = match_end;
            self.search = match_end;

            if gap.is_empty() {
                return Some(matched);
            }
            self.queued = Some(matched);
            return Some(Segment::unmatched(gap));
        }

        self.done = true;
        let tail = &text[self.start..];
        if tail.is_empty() {
            None
        } else {
            Some(Segment::unmatched(tail))
        }
    }
}

/// Splits `text` into matched and unmatched segments using a compiled `regex`.
///
/// Each step searches the unconsumed remainder of `text` for the leftmost match.
/// The text before the match, if any, is yielded as an unmatched segment followed
/// by the match itself. Empty matches are skipped. Concatenating the yielded
/// segments always gives back `text`.
pub fn split_regex<'r, 't>(regex: &'r Regex, text: &'t str) -> Segments<'r, 't> {
    Segments {
        regex,
        text,
        start: 0,
        search: 0,
        queued: None,
        done: false,
    }
}

/// Splits `text` by the regular expression `pattern`.
///
/// If `pattern` does not compile, the whole input comes back as a single
/// unmatched segment.
///
/// # Examples
///
/// ```
/// use veiled_rs::split;
///
/// let segments = split("[0-9]+", "ab12cd");
/// let texts: Vec<_> = segments.iter().map(|s| (s.text, s.matched)).collect();
/// assert_eq!(texts, vec![("ab", false), ("12", true), ("cd", false)]);
///
/// assert_eq!(split("[0-9", "ab12cd").len(), 1);
/// ```
pub fn split<'t>(pattern: &str, text: &'t str) -> Vec<Segment<'t>> {
    match Regex::new(pattern) {
        Ok(regex) => split_regex(&regex, text).collect(),
        Err(_) => vec![Segment::unmatched(text)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{seq::SliceRandom, Rng};

    fn pairs<'t>(segments: &[Segment<'t>]) -> Vec<(&'t str, bool)> {
        segments.iter().map(|s| (s.text, s.matched)).collect()
    }

    #[test]
    fn test_split_basic() {
        let segments = split("[0-9]{8,20}", "ID 110101199003078515, tel 13812345678.");
        assert_eq!(
            pairs(&segments),
            vec![
                ("ID ", false),
                ("110101199003078515", true),
                (", tel ", false),
                ("13812345678", true),
                (".", false),
            ]
        );
    }

    #[test]
    fn test_split_edges() {
        assert!(split("[0-9]+", "").is_empty());
        assert_eq!(pairs(&split("[0-9]+", "abc")), vec![("abc", false)]);
        assert_eq!(pairs(&split("[0-9]+", "123")), vec![("123", true)]);
        assert_eq!(
            pairs(&split("[0-9]+", "1a2")),
            vec![("1", true), ("a", false), ("2", true)]
        );
        assert_eq!(
            pairs(&split("x", "xxy")),
            vec![("x", true), ("x", true), ("y", false)]
        );
    }

    #[test]
    fn test_split_invalid_pattern() {
        assert_eq!(
            pairs(&split("[0-9", "abc 123")),
            vec![("abc 123", false)]
        );
        assert_eq!(pairs(&split("(", "")), vec![("", false)]);
    }

    #[test]
    fn test_split_empty_matches() {
        assert_eq!(
            pairs(&split("a*", "baab")),
            vec![("b", false), ("aa", true), ("b", false)]
        );
        assert_eq!(pairs(&split("", "héllo")), vec![("héllo", false)]);
    }

    #[test]
    fn test_split_searches_remainder() {
        // The anchor applies to each remaining suffix.
        assert_eq!(
            pairs(&split("^a", "aab")),
            vec![("a", true), ("a", true), ("b", false)]
        );
    }

    #[test]
    fn test_split_is_lazy() {
        let regex = Regex::new("[0-9]+").unwrap();
        let mut segments = split_regex(&regex, "a1b2c3");
        assert_eq!(segments.next(), Some(Segment::unmatched("a")));
        assert_eq!(segments.next(), Some(Segment::matched("1")));
        assert_eq!(segments.count(), 4);
    }

    #[test]
    fn test_random_partitions() {
        let patterns = ["[0-9]{8,20}", "[0-9a-f*]{6,18}[0-9]!", "a*", "ab|b", "[", "é+"];
        let alphabet = ['1', '2', 'a', 'b', 'f', '*', '!', ' ', 'é'];
        let mut rng = rand::thread_rng();

        for _ in 0..2_000 {
            let len = rng.gen_range(0..40);
            let text: String = (0..len)
                .map(|_| *alphabet.choose(&mut rng).unwrap())
                .collect();
            for pattern in patterns {
                let joined: String = split(pattern, &text).iter().map(|s| s.text).collect();
                assert_eq!(joined, text, "pattern {:?}", pattern);
            }
        }
    }
}
