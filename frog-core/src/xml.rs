//! # Árvore XML própria
//!
//! O inseridor de milestones precisa reescrever listas de filhos no meio de
//! markup arbitrário, então o documento é materializado como uma árvore de
//! propriedade nossa: uma variante etiquetada com *matching* exaustivo, em
//! vez de testes de tipo em tempo de execução. O parsing fica por conta dos
//! eventos do `quick-xml`; a serialização é nossa, com a declaração
//! `<?xml version="1.0"?>` na primeira linha.
//!
//! A árvore é deliberadamente pequena: elementos, texto e comentários. É o
//! suficiente para o caso de uso de milestones — isto não é uma biblioteca
//! de manipulação XML de propósito geral.

use std::collections::HashMap;

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XmlError;

/// Nó da árvore: elemento, texto ou comentário.
///
/// Texto e comentário guardam o conteúdo já decodificado (sem entidades);
/// os offsets do pipeline contam bytes desse conteúdo decodificado.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    /// Texto achatado do nó. Comentários não contribuem nada.
    pub fn text_yield(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => e.text_yield(out),
            Node::Comment(_) => {}
        }
    }
}

/// Elemento com nome cru (prefixado como no documento), atributos em ordem
/// de documento — declarações `xmlns` incluídas — e filhos mutáveis.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Elemento vazio, sem atributos.
    pub fn new(name: impl Into<String>) -> Self {
        Element { name: name.into(), attributes: Vec::new(), children: Vec::new() }
    }

    /// Valor de um atributo, pelo nome cru (ex.: `"xml:id"`).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatena o texto de todos os descendentes, em ordem de documento.
    pub fn text_yield(&self, out: &mut String) {
        for child in &self.children {
            child.text_yield(out);
        }
    }

    /// Texto achatado como `String` nova.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.text_yield(&mut out);
        out
    }

    /// Nó descendente pelo caminho de índices de filho. Caminho vazio não é
    /// endereçável aqui (o próprio elemento não é um [`Node`]).
    pub fn descendant(&self, path: &[usize]) -> Option<&Node> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.children.get(first)?;
        for &index in rest {
            match node {
                Node::Element(elem) => node = elem.children.get(index)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Versão mutável de [`Element::descendant`].
    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(first)?;
        for &index in rest {
            match node {
                Node::Element(elem) => node = elem.children.get_mut(index)?,
                _ => return None,
            }
        }
        Some(node)
    }
}

/// Documento: só a raiz nos interessa. Prólogo e epílogo (declaração,
/// doctype, comentários fora da raiz) são descartados no parsing; a
/// serialização sempre reemite uma declaração padrão.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Constrói a árvore a partir de uma string XML.
    pub fn parse(xml: &str) -> Result<Document, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::Malformed(e.to_string()))?;
            match event {
                Event::Start(start) => {
                    if root.is_some() && stack.is_empty() {
                        return Err(XmlError::TrailingContent);
                    }
                    stack.push(element_from_start(&start)?);
                }
                Event::Empty(start) => {
                    let elem = element_from_start(&start)?;
                    attach(Node::Element(elem), &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    // quick-xml já valida o pareamento dos nomes.
                    let elem = stack.pop().ok_or(XmlError::TrailingContent)?;
                    attach(Node::Element(elem), &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let decoded = text
                        .unescape()
                        .map_err(|e| XmlError::Malformed(e.to_string()))?;
                    if stack.is_empty() {
                        // Espaço em branco entre a declaração e a raiz.
                        if !decoded.trim().is_empty() {
                            return Err(XmlError::TrailingContent);
                        }
                    } else {
                        attach(Node::Text(decoded.into_owned()), &mut stack, &mut root)?;
                    }
                }
                Event::CData(cdata) => {
                    let bytes = cdata.into_inner();
                    let decoded = String::from_utf8_lossy(&bytes).into_owned();
                    attach(Node::Text(decoded), &mut stack, &mut root)?;
                }
                Event::Comment(comment) => {
                    if !stack.is_empty() {
                        let decoded = comment
                            .unescape()
                            .map_err(|e| XmlError::Malformed(e.to_string()))?;
                        attach(Node::Comment(decoded.into_owned()), &mut stack, &mut root)?;
                    }
                }
                Event::Decl(_) | Event::DocType(_) | Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        match root {
            Some(root) if stack.is_empty() => Ok(Document { root }),
            Some(_) => Err(XmlError::Malformed("unclosed element".into())),
            None => Err(XmlError::NoRoot),
        }
    }

    /// Serializa o documento, declaração incluída.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\"?>\n");
        write_element(&self.root, &mut out);
        out
    }
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element { name, attributes, children: Vec::new() })
}

fn attach(
    node: Node,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => match node {
            Node::Element(elem) => {
                if root.is_some() {
                    return Err(XmlError::TrailingContent);
                }
                *root = Some(elem);
                Ok(())
            }
            // Texto/comentário fora da raiz já foi filtrado no chamador.
            _ => Ok(()),
        },
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(elem) => write_element(elem, out),
        Node::Text(text) => out.push_str(&partial_escape(text)),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
    }
}

fn write_element(elem: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&elem.name);
    for (key, value) in &elem.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if elem.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &elem.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&elem.name);
    out.push('>');
}

/// Escopo de namespaces em vigor num ponto da árvore: prefixo → URI.
/// A chave vazia representa o namespace padrão.
pub type NsScope = HashMap<String, String>;

/// Escopo do elemento, derivado do escopo do pai mais as declarações
/// `xmlns`/`xmlns:p` do próprio elemento. `None` significa "sem mudanças,
/// use o do pai".
pub fn scope_with(elem: &Element, parent: &NsScope) -> Option<NsScope> {
    let mut updated: Option<NsScope> = None;
    for (key, value) in &elem.attributes {
        if key == "xmlns" {
            updated
                .get_or_insert_with(|| parent.clone())
                .insert(String::new(), value.clone());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            updated
                .get_or_insert_with(|| parent.clone())
                .insert(prefix.to_string(), value.clone());
        }
    }
    updated
}

/// Nome resolvido do elemento: `(URI do namespace, nome local)`.
///
/// Elemento sem prefixo cai no namespace padrão em vigor; `xmlns=""`
/// devolve o elemento para "sem namespace".
pub fn resolved_name<'a>(elem: &'a Element, scope: &'a NsScope) -> (Option<&'a str>, &'a str) {
    match elem.name.split_once(':') {
        Some((prefix, local)) => (scope.get(prefix).map(String::as_str), local),
        None => (
            scope
                .get("")
                .map(String::as_str)
                .filter(|uri| !uri.is_empty()),
            elem.name.as_str(),
        ),
    }
}
