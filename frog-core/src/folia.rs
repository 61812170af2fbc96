//! # Mapeamento da resposta FoLiA
//!
//! O Frog responde com um documento FoLiA: elementos `w` para os tokens
//! (identificados por `xml:id`) e elementos `entity` com classe e filhos
//! `wref` apontando de volta aos tokens. Este módulo reexprime essas
//! referências como spans de byte sobre o texto original do chamador.
//!
//! O mapeamento id→índice é **posicional**: o enésimo elemento `w` em ordem
//! de documento corresponde ao enésimo token enviado. Confiamos que o
//! reconhecedor ecoa os tokens na ordem e na quantidade em que os recebeu;
//! uma referência a um id desconhecido ou além da sequência de tokens é
//! violação de protocolo.

use std::collections::HashMap;

use crate::error::FrogError;
use crate::span::Span;
use crate::xml::{resolved_name, scope_with, Document, Element, Node, NsScope};

/// Namespace dos documentos FoLiA produzidos pelo Frog.
pub const FOLIA_NS: &str = "http://ilk.uvt.nl/folia";

/// Resolve os spans de entidade de uma resposta FoLiA contra a sequência de
/// tokens originalmente enviada.
///
/// Cada entidade vira um `Span { start, end, label }` onde `start`/`end`
/// vêm do primeiro e do último token referenciado e `label` é o atributo
/// `class`. Entidades **sem** classe são artefatos do detector de MWU do
/// Frog, não entidades nomeadas, e são puladas. A saída segue a ordem de
/// documento das entidades; quem precisar de spans ordenados e sem
/// sobreposição ordena explicitamente.
///
/// Assumimos que os `wref` de cada entidade são contíguos e vêm em ordem
/// textual, então só o primeiro e o último importam; uma resposta que
/// viole isso produz um span errado em silêncio.
pub fn entity_spans(doc: &Document, tokens: &[Span]) -> Result<Vec<Span>, FrogError> {
    let mut words: Vec<&Element> = Vec::new();
    let mut entities: Vec<(&Element, NsScope)> = Vec::new();
    let scope = NsScope::new();
    collect(&doc.root, &scope, &mut words, &mut entities);

    let mut id_to_index: HashMap<&str, usize> = HashMap::with_capacity(words.len());
    for (index, word) in words.iter().enumerate() {
        let id = word
            .attribute("xml:id")
            .ok_or_else(|| FrogError::Protocol(format!("token element {index} without xml:id")))?;
        id_to_index.insert(id, index);
    }

    let mut spans = Vec::with_capacity(entities.len());
    for (entity, entity_scope) in &entities {
        let mut wrefs: Vec<&Element> = Vec::new();
        collect_wrefs(entity, entity_scope, &mut wrefs);
        let (first, last) = match (wrefs.first(), wrefs.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(FrogError::Protocol(
                    "entity without token references".to_string(),
                ))
            }
        };

        let start = tokens[resolve(first, &id_to_index, tokens.len())?].start;
        let end = tokens[resolve(last, &id_to_index, tokens.len())?].end;
        // O atributo class existe por construção: é o filtro de coleta.
        let class = entity.attribute("class").unwrap_or_default();
        spans.push(Span::labeled(start, end, class));
    }
    Ok(spans)
}

fn resolve(
    wref: &Element,
    id_to_index: &HashMap<&str, usize>,
    token_count: usize,
) -> Result<usize, FrogError> {
    let id = wref
        .attribute("id")
        .ok_or_else(|| FrogError::Protocol("wref without id".to_string()))?;
    let index = *id_to_index
        .get(id)
        .ok_or_else(|| FrogError::Protocol(format!("unknown token id '{id}'")))?;
    if index >= token_count {
        return Err(FrogError::Protocol(format!(
            "token id '{id}' beyond the {token_count} tokens sent"
        )));
    }
    Ok(index)
}

/// Percorre a árvore em ordem de documento coletando os `w` e os `entity`
/// com classe, ambos no namespace FoLiA. O escopo de namespaces é carregado
/// junto porque os `wref` de cada entidade são resolvidos depois.
fn collect<'a>(
    elem: &'a Element,
    scope: &NsScope,
    words: &mut Vec<&'a Element>,
    entities: &mut Vec<(&'a Element, NsScope)>,
) {
    let updated = scope_with(elem, scope);
    let scope = updated.as_ref().unwrap_or(scope);

    if let (Some(FOLIA_NS), local) = resolved_name(elem, scope) {
        match local {
            "w" => words.push(elem),
            "entity" if elem.attribute("class").is_some() => {
                entities.push((elem, scope.clone()));
            }
            _ => {}
        }
    }

    for child in &elem.children {
        if let Node::Element(inner) = child {
            collect(inner, scope, words, entities);
        }
    }
}

fn collect_wrefs<'a>(elem: &'a Element, scope: &NsScope, out: &mut Vec<&'a Element>) {
    let updated = scope_with(elem, scope);
    let scope = updated.as_ref().unwrap_or(scope);
    for child in &elem.children {
        if let Node::Element(inner) = child {
            let child_updated = scope_with(inner, scope);
            let child_scope = child_updated.as_ref().unwrap_or(scope);
            if resolved_name(inner, child_scope) == (Some(FOLIA_NS), "wref") {
                out.push(inner);
            }
            collect_wrefs(inner, scope, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resposta FoLiA mínima no formato que o Frog produz.
    fn folia(body: &str) -> Document {
        Document::parse(&format!(
            r#"<FoLiA xmlns="http://ilk.uvt.nl/folia" xml:id="untitled">{body}</FoLiA>"#
        ))
        .unwrap()
    }

    fn word(id: &str, text: &str) -> String {
        format!(r#"<w xml:id="{id}"><t>{text}</t></w>"#)
    }

    #[test]
    fn test_single_token_entity() {
        let doc = folia(&format!(
            "{}{}<entities><entity xml:id=\"e.1\" class=\"per\"><wref id=\"w.1\" t=\"Henk\"/></entity></entities>",
            word("w.1", "Henk"),
            word("w.2", "staat"),
        ));
        let tokens = vec![Span::new(0, 4), Span::new(5, 10)];
        let spans = entity_spans(&doc, &tokens).unwrap();
        assert_eq!(spans, vec![Span::labeled(0, 4, "per")]);
    }

    #[test]
    fn test_multi_token_entity_uses_first_and_last() {
        let doc = folia(&format!(
            "{}{}{}<entities><entity class=\"per\">\
             <wref id=\"w.1\" t=\"Bert\"/><wref id=\"w.2\" t=\"Haanstra\"/>\
             </entity></entities>",
            word("w.1", "Bert"),
            word("w.2", "Haanstra"),
            word("w.3", "."),
        ));
        let tokens = vec![Span::new(0, 4), Span::new(5, 13), Span::new(13, 14)];
        let spans = entity_spans(&doc, &tokens).unwrap();
        assert_eq!(spans, vec![Span::labeled(0, 13, "per")]);
    }

    #[test]
    fn test_classless_entity_skipped() {
        // O detector de MWU produz entidades sem classe; não são entidades
        // nomeadas.
        let doc = folia(&format!(
            "{}<entities><entity><wref id=\"w.1\" t=\"x\"/></entity></entities>",
            word("w.1", "x"),
        ));
        let spans = entity_spans(&doc, &[Span::new(0, 1)]).unwrap();
        assert!(spans.is_empty());
    }

    #[test]
    fn test_unknown_id_is_protocol_violation() {
        let doc = folia(&format!(
            "{}<entities><entity class=\"per\"><wref id=\"w.99\" t=\"x\"/></entity></entities>",
            word("w.1", "x"),
        ));
        let err = entity_spans(&doc, &[Span::new(0, 1)]).unwrap_err();
        assert!(matches!(err, FrogError::Protocol(msg) if msg.contains("w.99")));
    }

    #[test]
    fn test_more_words_than_tokens_is_protocol_violation() {
        let doc = folia(&format!(
            "{}{}<entities><entity class=\"per\"><wref id=\"w.2\" t=\"y\"/></entity></entities>",
            word("w.1", "x"),
            word("w.2", "y"),
        ));
        let err = entity_spans(&doc, &[Span::new(0, 1)]).unwrap_err();
        assert!(matches!(err, FrogError::Protocol(_)));
    }

    #[test]
    fn test_entity_without_wrefs() {
        let doc = folia(&format!(
            "{}<entities><entity class=\"per\"/></entities>",
            word("w.1", "x"),
        ));
        let err = entity_spans(&doc, &[Span::new(0, 1)]).unwrap_err();
        assert!(matches!(err, FrogError::Protocol(msg) if msg.contains("references")));
    }

    #[test]
    fn test_document_order_preserved() {
        let doc = folia(&format!(
            "{}{}<entities>\
             <entity class=\"loc\"><wref id=\"w.2\" t=\"b\"/></entity>\
             <entity class=\"per\"><wref id=\"w.1\" t=\"a\"/></entity>\
             </entities>",
            word("w.1", "a"),
            word("w.2", "b"),
        ));
        let tokens = vec![Span::new(0, 1), Span::new(2, 3)];
        let spans = entity_spans(&doc, &tokens).unwrap();
        // Ordem de documento das entidades, não ordem textual.
        assert_eq!(spans[0], Span::labeled(2, 3, "loc"));
        assert_eq!(spans[1], Span::labeled(0, 1, "per"));
    }
}
