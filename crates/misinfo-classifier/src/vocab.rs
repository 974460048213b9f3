//! Tokenizer definitions
//!
//! From-scratch backbones get a word-level vocabulary trained on the
//! corpus with the same lowercase normalizer and `Whitespace`
//! pre-tokenizer the finished tokenizer encodes with. Pretrained backbones
//! shipping only a `vocab.txt` get a BERT WordPiece tokenizer.

use misinfo_core::{Error, Result};
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::wordlevel::{WordLevel, WordLevelTrainerBuilder};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::models::ModelWrapper;
use tokenizers::normalizers::{BertNormalizer, Lowercase, NormalizerWrapper};
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{AddedToken, Model, Tokenizer, TokenizerBuilder};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Special tokens in id order
pub const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN];

fn tokenizer_err(context: &'static str) -> impl Fn(tokenizers::Error) -> Error {
    move |e| Error::tokenizer(format!("{}: {}", context, e))
}

/// Train a vocabulary of at most `max_vocab` entries, specials first.
///
/// Words are ordered by descending frequency, ties broken lexically, so the
/// same corpus always yields the same ids.
pub fn build_vocab<S: AsRef<str>>(texts: &[S], max_vocab: usize) -> Result<Vec<String>> {
    let room = max_vocab.saturating_sub(SPECIAL_TOKENS.len());
    let mut trainer = WordLevelTrainerBuilder::default()
        .vocab_size(room)
        .min_frequency(0)
        .show_progress(false)
        .build()
        .map_err(|e| Error::tokenizer(format!("Invalid vocabulary trainer: {}", e)))?;

    let mut counter = TokenizerBuilder::<
        WordLevel,
        NormalizerWrapper,
        PreTokenizerWrapper,
        PostProcessorWrapper,
        DecoderWrapper,
    >::new()
    .with_model(WordLevel::default())
    .with_normalizer(Some(Lowercase.into()))
    .with_pre_tokenizer(Some(Whitespace::default().into()))
    .with_post_processor(None)
    .with_decoder(None)
    .build()
    .map_err(tokenizer_err("Failed to build vocabulary counter"))?;

    let corpus: Vec<String> = texts.iter().map(|t| t.as_ref().to_string()).collect();
    counter
        .train(&mut trainer, corpus.into_iter())
        .map_err(tokenizer_err("Vocabulary training failed"))?;

    let mut words: Vec<(String, u32)> = counter.get_model().get_vocab().into_iter().collect();
    words.sort_by_key(|(_, id)| *id);

    Ok(SPECIAL_TOKENS
        .iter()
        .map(|s| s.to_string())
        .chain(
            words
                .into_iter()
                .map(|(word, _)| word)
                .filter(|word| !SPECIAL_TOKENS.contains(&word.as_str()))
                .take(room),
        )
        .collect())
}

/// Build a lowercase word-level tokenizer that wraps input in `[CLS] ... [SEP]`
pub fn word_level_tokenizer(vocab: &[String]) -> Result<Tokenizer> {
    for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
        if vocab.get(id).map(String::as_str) != Some(*token) {
            return Err(Error::tokenizer(format!(
                "vocabulary must start with {:?}",
                SPECIAL_TOKENS
            )));
        }
    }

    let model = WordLevel::builder()
        .vocab(vocab_ids(vocab).collect())
        .unk_token(UNK_TOKEN.to_string())
        .build()
        .map_err(tokenizer_err("Invalid word-level vocabulary"))?;

    assemble(
        vocab,
        model.into(),
        Lowercase.into(),
        Whitespace::default().into(),
    )
}

/// Build a BERT WordPiece tokenizer from the lines of a `vocab.txt`
pub fn wordpiece_tokenizer(vocab: &[String], lowercase: bool) -> Result<Tokenizer> {
    let model = WordPiece::builder()
        .vocab(vocab_ids(vocab).collect())
        .unk_token(UNK_TOKEN.to_string())
        .continuing_subword_prefix("##".to_string())
        .max_input_chars_per_word(100)
        .build()
        .map_err(tokenizer_err("Invalid WordPiece vocabulary"))?;

    assemble(
        vocab,
        model.into(),
        BertNormalizer::new(true, true, None, lowercase).into(),
        BertPreTokenizer.into(),
    )
}

fn vocab_ids(vocab: &[String]) -> impl Iterator<Item = (String, u32)> + '_ {
    vocab
        .iter()
        .enumerate()
        .map(|(id, token)| (token.clone(), id as u32))
}

fn assemble(
    vocab: &[String],
    model: ModelWrapper,
    normalizer: NormalizerWrapper,
    pre_tokenizer: PreTokenizerWrapper,
) -> Result<Tokenizer> {
    let id_of = |token: &str| -> Result<u32> {
        vocab
            .iter()
            .position(|t| t == token)
            .map(|id| id as u32)
            .ok_or_else(|| Error::tokenizer(format!("vocabulary has no {} token", token)))
    };
    let post_processor = BertProcessing::new(
        (SEP_TOKEN.to_string(), id_of(SEP_TOKEN)?),
        (CLS_TOKEN.to_string(), id_of(CLS_TOKEN)?),
    );

    let mut tokenizer = TokenizerBuilder::<
        ModelWrapper,
        NormalizerWrapper,
        PreTokenizerWrapper,
        PostProcessorWrapper,
        DecoderWrapper,
    >::new()
    .with_model(model)
    .with_normalizer(Some(normalizer))
    .with_pre_tokenizer(Some(pre_tokenizer))
    .with_post_processor(Some(post_processor.into()))
    .with_decoder(None)
    .build()
    .map_err(tokenizer_err("Failed to build tokenizer"))?;

    let specials: Vec<AddedToken> = SPECIAL_TOKENS
        .iter()
        .filter(|token| vocab.iter().any(|t| t.as_str() == **token))
        .map(|token| AddedToken::from(token.to_string(), true))
        .collect();
    tokenizer.add_special_tokens(&specials);

    Ok(Tokenizer::from(tokenizer))
}
