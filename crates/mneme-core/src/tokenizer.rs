//! Text → token pipeline, stages 1 and 2 of spec.md §4.C:
//! normalize, then greedy-longest-match WordPiece.
//!
//! Kept separate from inference (see [`crate::embeddings`]) so each
//! stage is independently testable without a loaded model — the
//! WordPiece vocabulary alone is enough to exercise everything here.

use std::collections::HashMap;

pub const CLS: &str = "[CLS]";
pub const SEP: &str = "[SEP]";
pub const PAD: &str = "[PAD]";
pub const UNK: &str = "[UNK]";
pub const MASK: &str = "[MASK]";

/// Stage 1: strip control characters, collapse whitespace runs, and
/// lowercase ASCII only — multi-byte UTF-8 sequences pass through
/// byte-for-byte untouched (spec.md §4.C stage 1).
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        let mapped = if ch.is_ascii() {
            if ch.is_whitespace() {
                ' '
            } else {
                ch.to_ascii_lowercase()
            }
        } else {
            ch
        };
        if mapped == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(mapped);
    }
    out.trim().to_string()
}

/// A fixed WordPiece vocabulary: token → id. Continuation pieces use
/// the `##` prefix convention.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build a vocabulary from an ordered token list (as read from a
    /// `vocab.txt`-style file, one token per line). The special tokens
    /// are required; their absence is a configuration error the caller
    /// should surface as `MnemeError::EmbedderUnavailable`.
    pub fn from_tokens(tokens: impl IntoIterator<Item = String>) -> Self {
        let token_to_id = tokens
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t, i as u32))
            .collect();
        Self { token_to_id }
    }

    pub fn has_special_tokens(&self) -> bool {
        [CLS, SEP, PAD, UNK, MASK]
            .iter()
            .all(|t| self.token_to_id.contains_key(*t))
    }

    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    /// A small built-in vocabulary sufficient for tests and for the
    /// null embedder path: special tokens plus whatever unigrams the
    /// caller seeds it with. Never used for real inference.
    pub fn minimal_for_testing(words: &[&str]) -> Self {
        let mut tokens: Vec<String> =
            vec![PAD.into(), UNK.into(), CLS.into(), SEP.into(), MASK.into()];
        tokens.extend(words.iter().map(|w| w.to_string()));
        Self::from_tokens(tokens)
    }
}

/// Output of the WordPiece stage, already padded/truncated to
/// `max_seq_len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub token_type_ids: Vec<u32>,
}

/// Stage 2: greedy longest-match WordPiece tokenization against a
/// fixed vocabulary (spec.md §4.C stage 2).
pub struct WordPieceTokenizer<'a> {
    vocab: &'a Vocabulary,
    max_seq_len: usize,
}

impl<'a> WordPieceTokenizer<'a> {
    pub fn new(vocab: &'a Vocabulary, max_seq_len: usize) -> Self {
        Self { vocab, max_seq_len }
    }

    /// Split normalized text into whitespace-delimited words, then
    /// WordPiece each word independently.
    fn wordpiece_word(&self, word: &str) -> Vec<String> {
        let chars: Vec<char> = word.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut is_bad = false;

        while start < chars.len() {
            let mut end = chars.len();
            let mut matched: Option<String> = None;
            while end > start {
                let mut candidate: String = chars[start..end].iter().collect();
                if start > 0 {
                    candidate = format!("##{candidate}");
                }
                if self.vocab.id_of(&candidate).is_some() {
                    matched = Some(candidate);
                    break;
                }
                end -= 1;
            }
            match matched {
                Some(piece) => {
                    pieces.push(piece);
                    start = end;
                }
                None => {
                    is_bad = true;
                    break;
                }
            }
        }

        if is_bad {
            vec![UNK.to_string()]
        } else {
            pieces
        }
    }

    /// Tokenize already-normalized text into an [`Encoding`], padding
    /// with `[PAD]` or truncating to `max_seq_len` (overflow truncates
    /// silently per spec.md §4.C Failure modes), and wrapping with
    /// `[CLS]` / `[SEP]`.
    pub fn encode(&self, normalized_text: &str) -> Encoding {
        let mut piece_ids: Vec<u32> = Vec::new();
        for word in normalized_text.split_whitespace() {
            for piece in self.wordpiece_word(word) {
                let id = self
                    .vocab
                    .id_of(&piece)
                    .unwrap_or_else(|| self.vocab.id_of(UNK).unwrap_or(0));
                piece_ids.push(id);
            }
        }

        let cls_id = self.vocab.id_of(CLS).unwrap_or(0);
        let sep_id = self.vocab.id_of(SEP).unwrap_or(0);
        let pad_id = self.vocab.id_of(PAD).unwrap_or(0);

        // Reserve room for [CLS] and [SEP].
        let budget = self.max_seq_len.saturating_sub(2);
        if piece_ids.len() > budget {
            piece_ids.truncate(budget);
        }

        let mut input_ids = Vec::with_capacity(self.max_seq_len);
        input_ids.push(cls_id);
        input_ids.extend(piece_ids);
        input_ids.push(sep_id);

        let real_len = input_ids.len();
        let mut attention_mask = vec![1u32; real_len];
        let token_type_ids = vec![0u32; real_len];

        while input_ids.len() < self.max_seq_len {
            input_ids.push(pad_id);
            attention_mask.push(0);
        }
        let mut token_type_ids = token_type_ids;
        token_type_ids.resize(self.max_seq_len, 0);

        Encoding {
            input_ids,
            attention_mask,
            token_type_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_lowercases_ascii() {
        assert_eq!(normalize("  Hello   WORLD\t\n"), "hello world");
    }

    #[test]
    fn normalize_preserves_multibyte_utf8() {
        let s = normalize("café ☕日本語");
        assert!(s.contains('é'));
        assert!(s.contains('☕'));
        assert!(s.contains("日本語"));
    }

    #[test]
    fn wordpiece_known_word_is_single_piece() {
        let vocab = Vocabulary::minimal_for_testing(&["hello", "world"]);
        let tok = WordPieceTokenizer::new(&vocab, 16);
        let enc = tok.encode("hello world");
        // [CLS] hello world [SEP] + padding
        assert_eq!(enc.input_ids[0], vocab.id_of(CLS).unwrap());
        assert_eq!(enc.input_ids[1], vocab.id_of("hello").unwrap());
        assert_eq!(enc.input_ids[2], vocab.id_of("world").unwrap());
        assert_eq!(enc.input_ids[3], vocab.id_of(SEP).unwrap());
        assert_eq!(enc.attention_mask[4], 0);
    }

    #[test]
    fn wordpiece_splits_into_continuation_pieces() {
        let vocab = Vocabulary::minimal_for_testing(&["play", "##ing"]);
        let tok = WordPieceTokenizer::new(&vocab, 16);
        let enc = tok.encode("playing");
        assert_eq!(enc.input_ids[1], vocab.id_of("play").unwrap());
        assert_eq!(enc.input_ids[2], vocab.id_of("##ing").unwrap());
    }

    #[test]
    fn unknown_word_maps_to_unk() {
        let vocab = Vocabulary::minimal_for_testing(&["known"]);
        let tok = WordPieceTokenizer::new(&vocab, 16);
        let enc = tok.encode("zzzznotinvocab");
        assert_eq!(enc.input_ids[1], vocab.id_of(UNK).unwrap());
    }

    #[test]
    fn overflow_truncates_silently() {
        let words: Vec<&str> = (0..50)
            .map(|_| "hello")
            .collect();
        let vocab = Vocabulary::minimal_for_testing(&["hello"]);
        let tok = WordPieceTokenizer::new(&vocab, 8);
        let enc = tok.encode(&words.join(" "));
        assert_eq!(enc.input_ids.len(), 8);
    }
}
