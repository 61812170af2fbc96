//! # Codificação BIO
//!
//! Converte spans de entidade mais a sequência completa de tokens numa
//! sequência de mesmo comprimento de tokens rotulados no esquema
//! **BIO** (Begin-Inside-Outside):
//!
//! - `B-classe`: primeiro token de uma entidade
//! - `I-classe`: tokens seguintes da mesma entidade
//! - `O`: token fora de qualquer entidade
//!
//! A função é total sobre as fronteiras de token: nunca descarta nem funde
//! tokens — a saída tem exatamente os offsets da entrada, só com rótulos.

use crate::error::FrogError;
use crate::span::Span;

/// Rotula `tokens` com tags BIO segundo `entities`.
///
/// As entidades podem vir em qualquer ordem (cada uma é localizada por
/// busca binária pelo `start`), mas não podem se sobrepor: um token
/// reivindicado duas vezes é [`FrogError::OverlappingEntities`]. Uma
/// entidade que começa depois do último token é [`FrogError::OutOfRange`].
/// Os tokens devem estar ordenados por `start` — é o que a busca binária
/// pressupõe.
pub fn to_bio(entities: &[Span], tokens: &[Span]) -> Result<Vec<Span>, FrogError> {
    let mut bio: Vec<Option<Span>> = vec![None; tokens.len()];

    for entity in entities {
        let class = entity.label.as_deref().ok_or_else(|| {
            FrogError::InvalidInput(format!("entity span {entity} without a class label"))
        })?;

        let mut pos = tokens.partition_point(|t| t.start < entity.start);
        if pos >= tokens.len() {
            return Err(FrogError::OutOfRange);
        }

        let mut begin = true;
        while pos < tokens.len() && tokens[pos].start < entity.end {
            if bio[pos].is_some() {
                return Err(FrogError::OverlappingEntities);
            }
            let prefix = if begin { "B-" } else { "I-" };
            bio[pos] = Some(Span::labeled(
                tokens[pos].start,
                tokens[pos].end,
                format!("{prefix}{class}"),
            ));
            begin = false;
            pos += 1;
        }
    }

    Ok(bio
        .into_iter()
        .enumerate()
        .map(|(i, tagged)| {
            tagged.unwrap_or_else(|| Span::labeled(tokens[i].start, tokens[i].end, "O"))
        })
        .collect())
}
