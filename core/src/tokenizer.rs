use lazy_static::lazy_static;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;

/// Widths of the character n-grams emitted alongside each stem. The bare
/// stem keeps exact matches ranked; the n-grams broaden recall to
/// substring matches.
const NGRAM_WIDTHS: [usize; 3] = [3, 5, 7];

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Splits text into raw tokens: a maximal run of digits, a maximal run of
/// letters (Unicode categories), or a single character for anything else.
/// Whitespace between tokens is skipped.
struct RawTokens<'a> {
    rest: &'a str,
}

impl<'a> RawTokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for RawTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.rest = self.rest.trim_start();
        let first = self.rest.chars().next()?;
        let end = if first.is_numeric() {
            self.rest
                .find(|c: char| !c.is_numeric())
                .unwrap_or(self.rest.len())
        } else if first.is_alphabetic() {
            self.rest
                .find(|c: char| !c.is_alphabetic())
                .unwrap_or(self.rest.len())
        } else {
            first.len_utf8()
        };
        let (token, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(token)
    }
}

/// Normalize text into index tokens: lowercase, drop stopwords, stem, then
/// emit the stem followed by its character n-grams at widths 3, 5 and 7 in
/// left-to-right order. Stems shorter than a width produce no n-grams at
/// that width.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in RawTokens::new(text) {
        let term = raw.trim().to_lowercase();
        if term.is_empty() || is_stopword(&term) {
            continue;
        }
        let stem = STEMMER.stem(&term).into_owned();
        let chars: Vec<char> = stem.chars().collect();
        tokens.push(stem);
        for width in NGRAM_WIDTHS {
            for start in 0..(chars.len() + 1).saturating_sub(width) {
                tokens.push(chars[start..start + width].iter().collect());
            }
        }
    }
    tokens
}
