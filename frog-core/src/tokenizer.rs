//! # Tokenizador padrão
//!
//! Divide o texto bruto em tokens preservando os offsets de byte originais.
//! O Frog também sabe tokenizar, mas deixá-lo fazer isso tornaria quase
//! impossível reconstruir os spans sobre o texto original — por isso a
//! tokenização acontece do lado do cliente e o texto já segmentado é enviado
//! linha a linha.
//!
//! Qualquer outro tokenizador serve, desde que produza uma sequência de
//! [`Span`]s estritamente ordenada, sem cruzamentos e sem tokens vazios;
//! [`crate::client::FrogClient::apply_tokens`] aceita spans de qualquer
//! origem.

use crate::span::Span;

/// Tokeniza um texto em spans de byte.
///
/// Regra simples: sequências alfanuméricas viram um token; qualquer outro
/// caractere não-branco vira um token de um caractere. Por construção a
/// saída é ordenada, sem spans vazios e sem cruzamentos.
///
/// # Exemplo
/// `"Henk staat."` → `[0..4) [5..10) [10..11)`
pub fn tokenize(text: &str) -> Vec<Span> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            if word_start.is_none() {
                word_start = Some(i);
            }
            continue;
        }
        if let Some(start) = word_start.take() {
            tokens.push(Span::new(start, i));
        }
        if !ch.is_whitespace() {
            tokens.push(Span::new(i, i + ch.len_utf8()));
        }
    }
    if let Some(start) = word_start {
        tokens.push(Span::new(start, text.len()));
    }
    tokens
}
