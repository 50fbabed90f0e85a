//! Built-in normalizers
//!
//! - [`BypassNormalizer`]: identity transform
//! - [`TokenNormalizer`]: regex tokenizer joining tokens with the word separator

use std::sync::Arc;

use gazette_core::{
    GazetteError, Normalized, Normalizer, NormalizerConfig, NormalizerKind, Result,
};
use regex::Regex;

/// Default token pattern: word runs and single punctuation marks
pub const DEFAULT_TOKEN_PATTERN: &str = r"\w+|[^\w\s]";

/// `tokenizer_option` value that drops punctuation tokens
pub const DROP_PUNCTUATION: u8 = 1;

/// Leaves text untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct BypassNormalizer;

impl Normalizer for BypassNormalizer {
    fn normalize(&self, text: &str, _word_separator: char, _tokenizer_option: u8) -> Normalized {
        Normalized::identity(text)
    }

    fn kind(&self) -> &str {
        "bypass"
    }
}

/// Regex tokenizer
///
/// Every match of the token pattern becomes one token; tokens are joined by
/// the word separator, so whitespace runs collapse and punctuation attached
/// to a word is split off. With [`DROP_PUNCTUATION`] tokens without any
/// alphanumeric character are discarded.
#[derive(Debug, Clone)]
pub struct TokenNormalizer {
    pattern: Regex,
    lowercase: bool,
}

impl TokenNormalizer {
    pub fn new() -> Result<Self> {
        Self::with_pattern(DEFAULT_TOKEN_PATTERN)
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            GazetteError::Configuration(format!("invalid token pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern,
            lowercase: false,
        })
    }

    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }
}

impl Normalizer for TokenNormalizer {
    fn normalize(&self, text: &str, word_separator: char, tokenizer_option: u8) -> Normalized {
        let mut output = String::with_capacity(text.len());
        let mut forward = Vec::with_capacity(text.len());
        let mut byte_pos = 0;
        let mut char_pos = 0;
        let mut previous_end: Option<usize> = None;

        for m in self.pattern.find_iter(text) {
            let token = m.as_str();
            char_pos += text[byte_pos..m.start()].chars().count();
            let start = char_pos;
            let length = token.chars().count();
            char_pos += length;
            byte_pos = m.end();

            if token.is_empty()
                || (tokenizer_option == DROP_PUNCTUATION
                    && !token.chars().any(char::is_alphanumeric))
            {
                continue;
            }

            if let Some(end) = previous_end {
                output.push(word_separator);
                forward.push(end);
            }
            for (i, c) in token.chars().enumerate() {
                if self.lowercase {
                    for lower in c.to_lowercase() {
                        output.push(lower);
                        forward.push(start + i);
                    }
                } else {
                    output.push(c);
                    forward.push(start + i);
                }
            }
            previous_end = Some(start + length);
        }

        Normalized::from_forward(output, forward, char_pos + text[byte_pos..].chars().count())
    }

    fn kind(&self) -> &str {
        "token"
    }
}

/// Build the normalizer described by `config`
pub fn from_config(config: &NormalizerConfig) -> Result<Arc<dyn Normalizer>> {
    Ok(match config.kind {
        NormalizerKind::Bypass => Arc::new(BypassNormalizer),
        NormalizerKind::Token => {
            let normalizer = match &config.pattern {
                Some(pattern) => TokenNormalizer::with_pattern(pattern)?,
                None => TokenNormalizer::new()?,
            };
            Arc::new(normalizer.lowercase(config.lowercase))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn original(text: &str, n: &Normalized, begin: usize, end: usize) -> String {
        let (b, e) = n.to_original(begin, end);
        text.chars().skip(b).take(e - b).collect()
    }

    #[test]
    fn test_bypass() {
        let n = BypassNormalizer.normalize("Hello,  World", ' ', 0);
        assert_eq!(n.text, "Hello,  World");
        assert_eq!(n.forward.len(), 14);
    }

    #[test]
    fn test_token_splits_punctuation() {
        let text = "white refrigerator, please";
        let n = TokenNormalizer::new().unwrap().normalize(text, ' ', 0);
        assert_eq!(n.text, "white refrigerator , please");
        assert_eq!(original(text, &n, 0, 18), "white refrigerator");
        assert_eq!(original(text, &n, 19, 20), ",");
        assert_eq!(original(text, &n, 21, 27), "please");
        assert_eq!(n.original_len(), text.chars().count());
    }

    #[test]
    fn test_token_collapses_whitespace() {
        let text = "  white \t refrigerator ";
        let n = TokenNormalizer::new().unwrap().normalize(text, ' ', 0);
        assert_eq!(n.text, "white refrigerator");
        assert_eq!(original(text, &n, 0, 18), "white \t refrigerator");
        assert_eq!(n.to_normalized(0, text.chars().count()), (0, 18));
    }

    #[test]
    fn test_token_drops_punctuation() {
        let text = "cats, dogs!";
        let n = TokenNormalizer::new().unwrap().normalize(text, ' ', DROP_PUNCTUATION);
        assert_eq!(n.text, "cats dogs");
        assert_eq!(original(text, &n, 5, 9), "dogs");
    }

    #[test]
    fn test_token_lowercase_multibyte() {
        let text = "Große Kühlschrank";
        let n = TokenNormalizer::new()
            .unwrap()
            .lowercase(true)
            .normalize(text, '_', 0);
        assert_eq!(n.text, "große_kühlschrank");
        assert_eq!(original(text, &n, 6, 17), "Kühlschrank");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(TokenNormalizer::with_pattern("(").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = NormalizerConfig {
            name: "lower".to_string(),
            kind: NormalizerKind::Token,
            lowercase: true,
            pattern: None,
            default: false,
            tags: vec![],
        };
        let normalizer = from_config(&config).unwrap();
        assert_eq!(normalizer.kind(), "token");
        assert_eq!(normalizer.normalize("A B", ' ', 0).text, "a b");
    }
}
