//! # Inserção de milestones
//!
//! Reescreve uma subárvore XML inserindo elementos vazios ("milestones") nas
//! posições exatas de texto onde cada span de entidade começa e termina. Os
//! milestones entram como **irmãos** do texto dividido, nunca envolvendo ou
//! re-hierarquizando conteúdo existente — uma fronteira de entidade que cai
//! dentro de markup aninhado só divide o nó de texto local e deixa o
//! aninhamento original intacto.
//!
//! ## Máquina de estados
//!
//! Dois cursores percorrem a lista ordenada de spans: `span_pos` (qual span
//! é o atual) e `at_span_end` (a próxima fronteira a emitir é o início ou o
//! fim desse span). Um contador `text_pos` acompanha a posição no fluxo de
//! caracteres achatado da subárvore, avançando monotonicamente através de
//! nós de texto irmãos — inclusive por dentro de elementos aninhados, que
//! são percorridos recursivamente. Comentários passam ilesos e não avançam
//! nada. Esgotados os spans, todo nó restante volta inalterado (caminho
//! rápido).
//!
//! Pré-condição: os spans devem estar ordenados por início, sem
//! sobreposição, e ser relativos ao texto achatado da subárvore processada
//! (não ao documento inteiro).

use crate::span::Span;
use crate::xml::{Element, Node};

/// Nomes dos elementos milestone e, opcionalmente, o atributo que recebe a
/// classe da entidade no milestone de abertura.
#[derive(Debug, Clone)]
pub struct MilestoneOptions {
    pub start_tag: String,
    pub end_tag: String,
    pub class_attr: Option<String>,
}

/// Insere milestones para `spans` na subárvore `node`, devolvendo a
/// sequência de nós que a substitui (um nó de texto pode virar vários).
pub fn splice(node: Node, spans: &[Span], options: &MilestoneOptions) -> Vec<Node> {
    let mut writer = MilestoneWriter {
        spans,
        options,
        span_pos: 0,
        at_span_end: false,
        text_pos: 0,
    };
    writer.traverse(node)
}

struct MilestoneWriter<'a> {
    spans: &'a [Span],
    options: &'a MilestoneOptions,
    span_pos: usize,
    at_span_end: bool,
    text_pos: usize,
}

impl MilestoneWriter<'_> {
    fn traverse(&mut self, node: Node) -> Vec<Node> {
        if self.span_pos == self.spans.len() {
            return vec![node];
        }
        match node {
            Node::Text(text) => self.split_text(text),
            Node::Element(mut elem) => {
                self.traverse_children(&mut elem);
                vec![Node::Element(elem)]
            }
            other @ Node::Comment(_) => vec![other],
        }
    }

    /// Substitui cada filho pelo resultado (possivelmente múltiplo) da sua
    /// travessia; a lista nova só é instalada depois da recursão, nunca
    /// mutada durante a iteração.
    fn traverse_children(&mut self, elem: &mut Element) {
        let old = std::mem::take(&mut elem.children);
        let mut rebuilt = Vec::with_capacity(old.len());
        for child in old {
            rebuilt.extend(self.traverse(child));
        }
        elem.children = rebuilt;
    }

    fn split_text(&mut self, text: String) -> Vec<Node> {
        let mut rest = text.as_str();
        let mut pieces = Vec::new();

        while let Some(boundary) = self.next_boundary() {
            let offset = boundary - self.text_pos;
            if offset > rest.len() {
                // A fronteira cai depois deste nó: consome o texto todo e
                // deixa para um irmão mais à frente.
                self.text_pos += rest.len();
                break;
            }
            if offset > 0 {
                pieces.push(Node::Text(rest[..offset].to_string()));
            }
            rest = &rest[offset..];
            self.text_pos += offset;
            pieces.push(self.milestone());
            self.advance_boundary();
        }

        if !rest.is_empty() {
            pieces.push(Node::Text(rest.to_string()));
        }
        pieces
    }

    /// Posição absoluta da próxima fronteira pendente, se ainda há spans.
    fn next_boundary(&self) -> Option<usize> {
        let span = self.spans.get(self.span_pos)?;
        Some(if self.at_span_end { span.end } else { span.start })
    }

    /// Alterna início↔fim; ao fechar um span, passa ao próximo.
    fn advance_boundary(&mut self) {
        if self.at_span_end {
            self.span_pos += 1;
        }
        self.at_span_end = !self.at_span_end;
    }

    fn milestone(&self) -> Node {
        if self.at_span_end {
            return Node::Element(Element::new(self.options.end_tag.clone()));
        }
        let mut elem = Element::new(self.options.start_tag.clone());
        if let Some(attr) = &self.options.class_attr {
            if let Some(class) = &self.spans[self.span_pos].label {
                elem.attributes.push((attr.clone(), class.clone()));
            }
        }
        Node::Element(elem)
    }
}
