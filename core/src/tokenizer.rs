use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","ain","all","am","an","and","any","are","aren","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","couldn","couldn't",
            "d","did","didn","didn't","do","does","doesn","doesn't","doing","don","don't","down","during",
            "each","few","for","from","further",
            "had","hadn","hadn't","has","hasn","hasn't","have","haven","haven't","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","isn","isn't","it","it's","its","itself",
            "just","ll","m","ma","me","mightn","mightn't","more","most","mustn","mustn't","my","myself",
            "needn","needn't","no","nor","not","now",
            "o","of","off","on","once","only","or","other","our","ours","ourselves","out","over","own",
            "re","s","same","shan","shan't","she","she's","should","should've","shouldn","shouldn't","so","some","such",
            "t","than","that","that'll","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","ve","very",
            "was","wasn","wasn't","we","were","weren","weren't","what","when","where","which","while","who","whom","why","will","with","won","won't","wouldn","wouldn't",
            "y","you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// NFKC, lowercase, then drop every character that is neither a word character nor whitespace.
fn clean(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    NON_WORD.replace_all(&lowered, "").into_owned()
}

/// Normalizes text into index terms: lowercase, punctuation stripped, split on whitespace,
/// stopwords removed, stemmed.
///
/// Index build and every query path go through this function, so the two vocabularies agree.
/// Order and duplicates are preserved; the i-th term sits at token position i.
pub fn normalize(text: &str) -> Vec<String> {
    clean(text)
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .map(|token| STEMMER.stem(token).into_owned())
        .collect()
}

/// Stems a single bare word without stopword filtering (proximity operands).
pub fn stem_word(word: &str) -> String {
    let cleaned = clean(word);
    STEMMER.stem(cleaned.trim()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_normalize() {
        let t = normalize("Running, runner's run!");
        assert_eq!(t[0], "run");
        assert!(t.iter().all(|w| !w.contains(',')));
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let t = normalize("rust and Rust and RUST");
        assert_eq!(t, vec!["rust", "rust", "rust"]);
    }

    #[test]
    fn stem_word_ignores_stopword_list() {
        assert_eq!(stem_word("The"), "the");
        assert_eq!(stem_word("Apples"), "appl");
    }
}
