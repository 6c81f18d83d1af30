//! Token counting for the combined artifact.
//!
//! Uses tiktoken-rs for OpenAI-compatible counts, with a length heuristic
//! when an encoder cannot be loaded.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::Serialize;
use tiktoken_rs::CoreBPE;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    #[default]
    #[serde(rename = "cl100k_base")]
    Cl100kBase,
    /// o200k_base: GPT-4o
    #[serde(rename = "o200k_base")]
    O200kBase,
}

impl Encoding {
    /// Canonical encoding name.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::O200kBase => "o200k_base",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

// Loaded once per encoding; `None` records a failed load.
static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    let cell = match encoding {
        Encoding::Cl100kBase => &CL100K,
        Encoding::O200kBase => &O200K,
    };
    cell.get_or_init(|| {
        let loaded = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        };
        match loaded {
            Ok(bpe) => Some(bpe),
            Err(err) => {
                tracing::warn!(%encoding, error = %err, "tokenizer unavailable, estimating token count");
                None
            }
        }
    })
    .as_ref()
}

/// Fallback heuristic: ~4 bytes per token.
fn estimate(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Count tokens in text using the default encoding (cl100k_base).
///
/// # Examples
///
/// ```
/// use sagg::tokens::count_tokens;
///
/// assert!(count_tokens("def main(): pass") > 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

/// Count tokens in text using the specified encoding.
///
/// Never fails: falls back to a length-based estimate if the encoder
/// cannot be loaded.
pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    match tokenizer(encoding) {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => estimate(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens_with_encoding("", Encoding::O200kBase), 0);
    }

    #[test]
    fn test_python_source() {
        let code = "def greet(name):\n    print(f\"Hello, {name}!\")\n";
        let count = count_tokens(code);
        assert!(count > 5 && count < code.len());
    }

    #[test]
    fn test_estimate() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("a"), 1);
        assert_eq!(estimate("abcd"), 1);
        assert_eq!(estimate("abcde"), 2);
        assert_eq!(estimate("abcdefgh"), 2);
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("cl100k".parse::<Encoding>().unwrap(), Encoding::Cl100kBase);
        assert_eq!("CL100K_BASE".parse::<Encoding>().unwrap(), Encoding::Cl100kBase);
        assert_eq!("o200k".parse::<Encoding>().unwrap(), Encoding::O200kBase);
        assert!("p50k".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_encoding_display_matches_serde() {
        for encoding in [Encoding::Cl100kBase, Encoding::O200kBase] {
            let json = serde_json::to_string(&encoding).unwrap();
            assert_eq!(json, format!("\"{encoding}\""));
        }
    }
}
