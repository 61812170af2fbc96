//! # Seleção por XPath (subconjunto)
//!
//! Avaliador de caminhos de localização sobre a árvore do módulo
//! [`crate::xml`], suficiente para os pedidos de anotação: é com ele que o
//! chamador aponta quais nós do documento devem ter seu texto anotado.
//!
//! ## Sintaxe aceita
//!
//! | Forma                  | Significado                                  |
//! |------------------------|----------------------------------------------|
//! | `/a/b`, `a/b`          | passos pelo eixo filho                       |
//! | `//a`, `a//b`          | descendente-ou-próprio + filho               |
//! | `.`                    | o próprio nó de contexto                     |
//! | `*`                    | qualquer elemento                            |
//! | `pre:nome`             | nome qualificado (prefixo do mapa fornecido) |
//! | `text()`               | nós de texto                                 |
//! | `[n]`                  | posição 1-based dentro do passo              |
//! | `[@attr]`, `[@attr='v']` | existência/igualdade de atributo           |
//!
//! Prefixos em testes de nome resolvem pelo mapa prefixo→URI do pedido;
//! prefixo desconhecido é erro. Teste de nome sem prefixo casa apenas com
//! elementos **sem** namespace (semântica do XPath 1.0). O namespace de
//! cada elemento do documento é resolvido pelas declarações `xmlns` em
//! escopo.
//!
//! Os nós selecionados são devolvidos como caminhos de índices de filho a
//! partir da raiz (caminho vazio = a própria raiz), em ordem de documento e
//! sem duplicatas.

use std::collections::HashMap;

use crate::error::XPathError;
use crate::xml::{resolved_name, scope_with, Document, Element, Node, NsScope};

/// Caminho de um nó: índices de filho a partir da raiz.
pub type NodePath = Vec<usize>;

/// Expressão compilada.
#[derive(Debug, Clone)]
pub struct XPath {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
struct Step {
    /// Verdadeiro quando o passo veio depois de `//`.
    descendant: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// `.`
    Current,
    /// `*`
    AnyElement,
    /// `nome` ou `prefixo:nome`
    Name { prefix: Option<String>, local: String },
    /// `text()`
    Text,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    HasAttr(String),
    AttrEquals(String, String),
}

/// Compila uma expressão do subconjunto suportado.
pub fn compile(expr: &str) -> Result<XPath, XPathError> {
    let mut rest = expr.trim();
    if rest.is_empty() {
        return Err(XPathError::Empty);
    }

    let mut descendant = false;
    if let Some(stripped) = rest.strip_prefix("//") {
        descendant = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('/') {
        rest = stripped;
    }
    if rest.is_empty() {
        return Err(XPathError::Unsupported(expr.trim().to_string()));
    }

    let mut steps = Vec::new();
    loop {
        let (segment, remainder) = split_step(rest)?;
        steps.push(parse_step(segment, descendant)?);
        match remainder {
            None => break,
            Some((next, next_descendant)) => {
                if next.is_empty() {
                    return Err(XPathError::Unsupported(expr.trim().to_string()));
                }
                rest = next;
                descendant = next_descendant;
            }
        }
    }
    Ok(XPath { steps })
}

/// Separa o primeiro passo do restante, ignorando `/` dentro de predicados
/// e de literais entre aspas.
fn split_step(s: &str) -> Result<(&str, Option<(&str, bool)>), XPathError> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '[' => depth += 1,
                ']' => depth -= 1,
                '/' if depth == 0 => {
                    let segment = &s[..i];
                    let rest = &s[i + 1..];
                    return match rest.strip_prefix('/') {
                        Some(r) => Ok((segment, Some((r, true)))),
                        None => Ok((segment, Some((rest, false)))),
                    };
                }
                _ => {}
            },
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(XPathError::Unsupported(s.to_string()));
    }
    Ok((s, None))
}

fn parse_step(segment: &str, descendant: bool) -> Result<Step, XPathError> {
    let segment = segment.trim();
    let (name_part, predicate_part) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    // Só o eixo filho explícito é aceito; os demais, nem abreviados.
    let name_part = name_part.strip_prefix("child::").unwrap_or(name_part).trim();
    if name_part.starts_with('@') || name_part.contains("::") || name_part == ".." {
        return Err(XPathError::Unsupported(segment.to_string()));
    }

    let test = match name_part {
        "." => NodeTest::Current,
        "*" => NodeTest::AnyElement,
        "text()" => NodeTest::Text,
        name => {
            if name.is_empty() || !is_qname(name) {
                return Err(XPathError::Unsupported(segment.to_string()));
            }
            match name.split_once(':') {
                Some((prefix, local)) => NodeTest::Name {
                    prefix: Some(prefix.to_string()),
                    local: local.to_string(),
                },
                None => NodeTest::Name { prefix: None, local: name.to_string() },
            }
        }
    };

    Ok(Step { descendant, test, predicates: parse_predicates(predicate_part)? })
}

fn is_qname(name: &str) -> bool {
    let mut colons = 0;
    for ch in name.chars() {
        match ch {
            ':' => colons += 1,
            c if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' => {}
            _ => return false,
        }
    }
    colons <= 1 && !name.starts_with(':') && !name.ends_with(':')
}

fn parse_predicates(mut s: &str) -> Result<Vec<Predicate>, XPathError> {
    let mut predicates = Vec::new();
    while !s.is_empty() {
        if !s.starts_with('[') {
            return Err(XPathError::BadPredicate(s.to_string()));
        }
        let close = s
            .find(']')
            .ok_or_else(|| XPathError::BadPredicate(s.to_string()))?;
        let body = s[1..close].trim();
        predicates.push(parse_predicate(body)?);
        s = &s[close + 1..];
    }
    Ok(predicates)
}

fn parse_predicate(body: &str) -> Result<Predicate, XPathError> {
    if body.is_empty() {
        return Err(XPathError::BadPredicate(body.to_string()));
    }
    if body.chars().all(|c| c.is_ascii_digit()) {
        return Ok(Predicate::Position(body.parse().map_err(|_| {
            XPathError::BadPredicate(body.to_string())
        })?));
    }
    let attr = match body.strip_prefix('@') {
        Some(rest) => rest.trim(),
        None => return Err(XPathError::BadPredicate(body.to_string())),
    };
    match attr.split_once('=') {
        None => {
            if !is_qname(attr) {
                return Err(XPathError::BadPredicate(body.to_string()));
            }
            Ok(Predicate::HasAttr(attr.to_string()))
        }
        Some((name, value)) => {
            let name = name.trim();
            let value = value.trim();
            let unquoted = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| XPathError::BadPredicate(body.to_string()))?;
            if !is_qname(name) {
                return Err(XPathError::BadPredicate(body.to_string()));
            }
            Ok(Predicate::AttrEquals(name.to_string(), unquoted.to_string()))
        }
    }
}

/// Contexto de avaliação: `None` é o nó-documento (pai virtual da raiz).
type Ctx = Option<NodePath>;

/// Avalia a expressão sobre o documento, devolvendo caminhos em ordem de
/// documento, sem duplicatas.
pub fn select(
    doc: &Document,
    xpath: &XPath,
    namespaces: &HashMap<String, String>,
) -> Result<Vec<NodePath>, XPathError> {
    let mut contexts: Vec<Ctx> = vec![None];

    for step in &xpath.steps {
        let mut next: Vec<Ctx> = Vec::new();
        for ctx in &contexts {
            let mut candidates: Vec<Ctx> = Vec::new();
            if step.test == NodeTest::Current {
                candidates.push(ctx.clone());
                if step.descendant {
                    for path in strict_descendants(doc, ctx) {
                        candidates.push(Some(path));
                    }
                }
            } else {
                let pool = if step.descendant {
                    strict_descendants(doc, ctx)
                } else {
                    children_of(doc, ctx)
                };
                for path in pool {
                    if matches_test(doc, &path, &step.test, namespaces)? {
                        candidates.push(Some(path));
                    }
                }
            }
            for predicate in &step.predicates {
                apply_predicate(doc, &mut candidates, predicate);
            }
            next.extend(candidates);
        }
        // Ordem lexicográfica de caminhos == ordem de documento.
        next.sort();
        next.dedup();
        contexts = next;
    }

    Ok(contexts.into_iter().flatten().collect())
}

/// Filhos diretos do contexto. O nó-documento tem um único filho: a raiz.
fn children_of(doc: &Document, ctx: &Ctx) -> Vec<NodePath> {
    match ctx {
        None => vec![Vec::new()],
        Some(path) => match element_at(&doc.root, path) {
            Some(elem) => (0..elem.children.len())
                .map(|i| {
                    let mut child = path.clone();
                    child.push(i);
                    child
                })
                .collect(),
            None => Vec::new(),
        },
    }
}

/// Todos os descendentes estritos do contexto, em ordem de documento.
/// Para o nó-documento isso inclui a própria raiz.
fn strict_descendants(doc: &Document, ctx: &Ctx) -> Vec<NodePath> {
    let mut out = Vec::new();
    match ctx {
        None => {
            out.push(Vec::new());
            collect_descendants(&doc.root, &mut Vec::new(), &mut out);
        }
        Some(path) => {
            if let Some(elem) = element_at(&doc.root, path) {
                let mut prefix = path.clone();
                collect_descendants(elem, &mut prefix, &mut out);
            }
        }
    }
    out
}

fn collect_descendants(elem: &Element, prefix: &mut NodePath, out: &mut Vec<NodePath>) {
    for (i, child) in elem.children.iter().enumerate() {
        prefix.push(i);
        out.push(prefix.clone());
        if let Node::Element(inner) = child {
            collect_descendants(inner, prefix, out);
        }
        prefix.pop();
    }
}

/// Elemento no caminho, ou `None` se o caminho aponta para texto/comentário.
fn element_at<'a>(root: &'a Element, path: &[usize]) -> Option<&'a Element> {
    if path.is_empty() {
        return Some(root);
    }
    match root.descendant(path)? {
        Node::Element(elem) => Some(elem),
        _ => None,
    }
}

fn matches_test(
    doc: &Document,
    path: &NodePath,
    test: &NodeTest,
    namespaces: &HashMap<String, String>,
) -> Result<bool, XPathError> {
    match test {
        NodeTest::Current => Ok(true),
        NodeTest::AnyElement => Ok(element_at(&doc.root, path).is_some()),
        NodeTest::Text => Ok(matches!(doc.root.descendant(path), Some(Node::Text(_)))),
        NodeTest::Name { prefix, local } => {
            let Some(elem) = element_at(&doc.root, path) else {
                return Ok(false);
            };
            let wanted_uri = match prefix {
                Some(p) => Some(
                    namespaces
                        .get(p)
                        .ok_or_else(|| XPathError::UnknownPrefix(p.clone()))?
                        .as_str(),
                ),
                None => None,
            };
            let scope = scope_at(&doc.root, path);
            let (uri, elem_local) = resolved_name(elem, &scope);
            Ok(uri == wanted_uri && elem_local == local)
        }
    }
}

/// Escopo de namespaces em vigor no nó do caminho, acumulado da raiz até lá.
fn scope_at(root: &Element, path: &[usize]) -> NsScope {
    let mut scope = NsScope::new();
    if let Some(updated) = scope_with(root, &scope) {
        scope = updated;
    }
    let mut elem = root;
    for &index in path {
        match &elem.children[index] {
            Node::Element(child) => {
                if let Some(updated) = scope_with(child, &scope) {
                    scope = updated;
                }
                elem = child;
            }
            _ => break,
        }
    }
    scope
}

fn apply_predicate(doc: &Document, candidates: &mut Vec<Ctx>, predicate: &Predicate) {
    match predicate {
        Predicate::Position(n) => {
            if *n == 0 || *n > candidates.len() {
                candidates.clear();
            } else {
                let kept = candidates.swap_remove(*n - 1);
                candidates.clear();
                candidates.push(kept);
            }
        }
        Predicate::HasAttr(name) => {
            candidates.retain(|ctx| {
                ctx.as_ref()
                    .and_then(|path| element_at(&doc.root, path))
                    .is_some_and(|elem| elem.attribute(name).is_some())
            });
        }
        Predicate::AttrEquals(name, value) => {
            candidates.retain(|ctx| {
                ctx.as_ref()
                    .and_then(|path| element_at(&doc.root, path))
                    .is_some_and(|elem| elem.attribute(name) == Some(value.as_str()))
            });
        }
    }
}
