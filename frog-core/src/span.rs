//! # Álgebra de Spans
//!
//! Um [`Span`] é um intervalo semiaberto `[start, end)` de posições de byte
//! sobre um texto UTF-8, com um rótulo opcional. É a moeda de troca de todo o
//! pipeline: o tokenizador produz spans de tokens, o Frog devolve spans de
//! entidades e o codificador BIO produz spans rotulados token a token.
//!
//! O endereçamento por byte é o mesmo nos dois lados da fronteira do
//! protocolo: os offsets das entidades são derivados diretamente dos offsets
//! dos tokens fornecidos pelo chamador, nunca recalculados a partir da
//! resposta do reconhecedor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Intervalo semiaberto `[start, end)` sobre um texto, com rótulo opcional.
///
/// Invariante: `start <= end`. Spans vazios (`start == end`) são
/// representáveis, mas rejeitados na validação de entrada do protocolo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Posição de byte inicial (inclusiva).
    pub start: usize,
    /// Posição de byte final (exclusiva).
    pub end: usize,
    /// Rótulo opcional (classe de entidade, tag BIO...).
    pub label: Option<String>,
}

impl Span {
    /// Cria um span sem rótulo.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span invertido: {start} > {end}");
        Span { start, end, label: None }
    }

    /// Cria um span com rótulo.
    pub fn labeled(start: usize, end: usize, label: impl Into<String>) -> Self {
        debug_assert!(start <= end, "span invertido: {start} > {end}");
        Span { start, end, label: Some(label.into()) }
    }

    /// Comprimento do intervalo em bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Verdadeiro se o intervalo é vazio.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Verdadeiro se `other` está inteiramente contido em `self`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Verdadeiro se os dois intervalos têm alguma posição em comum.
    pub fn intersects(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Verdadeiro se os intervalos se sobrepõem **parcialmente**: há
    /// interseção, mas nenhum contém o outro.
    ///
    /// Usado apenas para rejeitar sequências de tokens malformadas, nunca
    /// para mesclar spans.
    pub fn crosses(&self, other: &Span) -> bool {
        self.intersects(other) && !self.contains(other) && !other.contains(self)
    }

    /// Encolhe o span para excluir espaços em branco nas bordas.
    ///
    /// Nunca expande: o resultado tem limites idênticos ou mais estreitos.
    /// Um span só de espaços encolhe até um span vazio. O rótulo é
    /// preservado.
    pub fn trim(&self, text: &str) -> Span {
        let slice = &text[self.start..self.end];
        let from_start = slice.len() - slice.trim_start().len();
        if from_start == slice.len() {
            // Só espaços: colapsa no início do trecho não-branco inexistente.
            return Span { start: self.end, end: self.end, label: self.label.clone() };
        }
        let from_end = slice.len() - slice.trim_end().len();
        Span {
            start: self.start + from_start,
            end: self.end - from_end,
            label: self.label.clone(),
        }
    }

    /// Fatia do texto coberta pelo span.
    ///
    /// Offsets fora do texto (ou fora de fronteira de caractere) são um bug
    /// do chamador e causam `panic`, não um erro recuperável.
    pub fn covered_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "[{}..{}) {}", self.start, self.end, label),
            None => write!(f, "[{}..{})", self.start, self.end),
        }
    }
}
