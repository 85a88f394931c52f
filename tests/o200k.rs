//! Integration tests for the o200k_base encoding (GPT-4o).
//!
//! Need `$KERF_VOCAB_DIR/o200k_base.tiktoken`; skip when absent.

use std::sync::Arc;

use kerf::{get_encoding, Tokenizer, TokenizerError};

fn o200k() -> Option<Arc<Tokenizer>> {
    match get_encoding("o200k_base") {
        Ok(tokenizer) => Some(tokenizer),
        Err(TokenizerError::Vocab(err)) => {
            eprintln!("skipping: o200k_base vocabulary unavailable ({err})");
            None
        }
        Err(err) => panic!("unexpected construction failure: {err}"),
    }
}

#[test]
fn endoftext_is_reserved() {
    let Some(tokenizer) = o200k() else { return };
    assert_eq!(tokenizer.encode("<|endoftext|>").unwrap(), vec![199999]);
    assert_eq!(tokenizer.decode(&[199999]).unwrap(), "<|endoftext|>");
}

#[test]
fn roundtrips() {
    let Some(tokenizer) = o200k() else { return };
    let cases = [
        "Hello world",
        "MixedCase TOKENS and lowercase runs",
        "numbers 1234567890 and punctuation?!",
        "français, 中文, русский",
        "line one\nline two\r\nline three",
    ];
    for text in cases {
        let ids = tokenizer.encode(text).unwrap();
        assert_eq!(
            tokenizer.decode(&ids).unwrap(),
            text,
            "roundtrip failed for {text:?}"
        );
    }
}

#[test]
fn case_led_clusters_split_apart() {
    let Some(tokenizer) = o200k() else { return };
    // The o200k pattern separates an upper-case-led cluster from the
    // lower-case-led one that follows; the encodings of the halves must
    // concatenate to the encoding-then-decoding of the whole.
    let ids = tokenizer.encode("HTTPResponse").unwrap();
    assert_eq!(tokenizer.decode(&ids).unwrap(), "HTTPResponse");
}

#[test]
fn vocab_size_covers_the_published_table() {
    let Some(tokenizer) = o200k() else { return };
    assert!(
        tokenizer.vocab_size() >= 199_998,
        "vocab size should cover the o200k table, got {}",
        tokenizer.vocab_size()
    );
}

#[test]
fn ordinary_encoding_ignores_triggers() {
    let Some(tokenizer) = o200k() else { return };
    let ids = tokenizer.encode_ordinary("<|endoftext|>").unwrap();
    assert!(!ids.contains(&199999));
    assert_eq!(tokenizer.decode(&ids).unwrap(), "<|endoftext|>");
}
