use difflib::sequencematcher::SequenceMatcher;

/// Ratcliff/Obershelp similarity of two strings, in `0.0..=1.0`.
///
/// `2 * M / T` over the matching blocks `difflib` finds, where `T` is the
/// total number of chars in both strings. Comparison is char-wise and
/// case-sensitive; callers lowercase when needed.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = SequenceMatcher::new(&a, &b)
        .get_matching_blocks()
        .iter()
        .map(|block| block.size)
        .sum();
    2.0 * matched as f64 / total as f64
}

/// Best-scoring candidate whose `ratio` against `word` is at least `cutoff`.
///
/// Ties keep the earliest candidate.
pub fn close_match<'a, S: AsRef<str>>(word: &str, candidates: &'a [S], cutoff: f64) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let score = ratio(word, candidate);
        if score < cutoff {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((candidate, score)),
        }
    }
    best.map(|(c, _)| c)
}
