//! # Cliente do Frog via socket TCP
//!
//! O Frog é um reconhecedor de entidades nomeadas para o holandês que roda
//! como servidor TCP produzindo XML. Para subir um, basta
//!
//! ```text
//! frog --skip=mptcla -S ${porta} -X
//! ```
//!
//! (o `--skip` é opcional, mas evita análises que não usamos). Com a imagem
//! Docker da LaMachine:
//!
//! ```text
//! docker run -p ${porta}:9999 proycon/lamachine frog --skip=mptcla -S 9999 -X
//! ```
//!
//! ## Protocolo
//!
//! Orientado a linhas, UTF-8, terminado por `\n`. O pedido é o texto
//! aparado de cada token, um por linha, na ordem dos tokens, seguido da
//! linha literal `EOT`. A resposta é um documento XML FoLiA espalhado por
//! várias linhas, seguido de uma linha contendo exatamente `READY`.
//!
//! O Frog exige uma conexão nova por frase: o cliente abre um socket por
//! chamada, nunca reutiliza conexão, não faz retry e não impõe timeout —
//! política de tempo, se desejada, fica no transporte da aplicação. Toda
//! validação de entrada acontece **antes** de qualquer I/O.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FrogError, Result};
use crate::milestone::{self, MilestoneOptions};
use crate::span::Span;
use crate::tokenizer::tokenize;
use crate::xml::{Document, Element, Node};
use crate::xpath;
use crate::folia;

/// Cliente do Frog. Construí-lo não abre conexão nenhuma; cada chamada a
/// [`FrogClient::apply_tokens`] abre e fecha o próprio socket, então a
/// mesma instância pode ser compartilhada entre threads à vontade.
#[derive(Debug, Clone)]
pub struct FrogClient {
    host: String,
    port: u16,
}

/// Pedido de anotação de um documento XML arbitrário.
///
/// Os nomes dos campos seguem o formato de fio da API (`starttag`,
/// `endtag`, `classattr`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlOptions {
    /// Documento XML a anotar.
    pub xml: String,
    /// Expressão XPath selecionando os nós cujo texto será anotado.
    pub xpath: String,
    /// Mapeamento prefixo→URI para avaliar o XPath.
    #[serde(default)]
    pub namespaces: HashMap<String, String>,
    /// Nome do elemento milestone de abertura.
    #[serde(rename = "starttag")]
    pub start_tag: String,
    /// Nome do elemento milestone de fechamento.
    #[serde(rename = "endtag")]
    pub end_tag: String,
    /// Atributo do milestone de abertura que recebe a classe da entidade.
    #[serde(rename = "classattr", default)]
    pub class_attr: Option<String>,
}

impl FrogClient {
    /// Cliente para um Frog em `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        FrogClient { host: host.into(), port }
    }

    /// Aplica o NER do Frog a um texto, tokenizando-o antes com o
    /// tokenizador padrão.
    pub fn apply(&self, text: &str) -> Result<Vec<Span>> {
        self.apply_tokens(text, &tokenize(text))
    }

    /// Aplica o NER do Frog a um texto já tokenizado.
    ///
    /// Devolve um span por entidade reconhecida, com `label` = classe
    /// atribuída pelo Frog, na ordem de documento da resposta.
    pub fn apply_tokens(&self, text: &str, tokens: &[Span]) -> Result<Vec<Span>> {
        let request = request_body(text, tokens)?;

        debug!(host = %self.host, port = self.port, tokens = tokens.len(), "enviando pedido ao Frog");
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))?;
        stream.write_all(request.as_bytes())?;
        stream.flush()?;

        let body = read_response(BufReader::new(&stream))?;
        drop(stream);
        debug!(bytes = body.len(), "resposta recebida");

        let doc = Document::parse(&body)
            .map_err(|e| FrogError::Protocol(format!("malformed recognizer response: {e}")))?;
        folia::entity_spans(&doc, tokens)
    }

    /// Anota um documento XML com as entidades encontradas pelo Frog.
    ///
    /// Para cada nó selecionado pelo XPath, o texto achatado da subárvore é
    /// enviado ao Frog (uma chamada por nó) e as entidades voltam como
    /// milestones inseridos nas posições exatas. Nós de texto selecionados
    /// são promovidos ao elemento pai. Devolve o documento inteiro
    /// serializado.
    pub fn apply_xml(&self, options: &XmlOptions) -> Result<String> {
        if options.xml.is_empty() {
            return Err(FrogError::InvalidInput("empty xml document".to_string()));
        }
        if options.xpath.is_empty() {
            return Err(FrogError::InvalidInput("empty xpath expression".to_string()));
        }

        let mut doc = Document::parse(&options.xml)?;
        let expr = xpath::compile(&options.xpath)?;
        let mut paths = xpath::select(&doc, &expr, &options.namespaces)?;

        // Texto e comentário não têm filhos para receber milestones:
        // anota-se o elemento pai.
        for path in &mut paths {
            if !path.is_empty() && !matches!(doc.root.descendant(path), Some(Node::Element(_))) {
                path.pop();
            }
        }
        paths.sort();
        paths.dedup();

        let milestone_options = MilestoneOptions {
            start_tag: options.start_tag.clone(),
            end_tag: options.end_tag.clone(),
            class_attr: options.class_attr.clone(),
        };
        for path in &paths {
            self.annotate_at(&mut doc, path, &milestone_options)?;
        }
        Ok(doc.to_xml())
    }

    fn annotate_at(
        &self,
        doc: &mut Document,
        path: &[usize],
        options: &MilestoneOptions,
    ) -> Result<()> {
        let elem: &mut Element = if path.is_empty() {
            &mut doc.root
        } else {
            match doc.root.descendant_mut(path) {
                Some(Node::Element(elem)) => elem,
                // Caminho invalidado por uma seleção aninhada: ignora.
                _ => return Ok(()),
            }
        };

        let text = elem.text();
        let mut spans = self.apply(&text)?;
        if spans.is_empty() {
            return Ok(());
        }
        // O inseridor exige spans ordenados e sem sobreposição.
        spans.sort_by_key(|s| s.start);

        let taken = std::mem::replace(elem, Element::new("_"));
        let mut result = milestone::splice(Node::Element(taken), &spans, options);
        match result.pop() {
            Some(Node::Element(done)) if result.is_empty() => *elem = done,
            _ => unreachable!("splice de elemento devolve exatamente um elemento"),
        }
        Ok(())
    }
}

/// Monta o corpo do pedido, validando a sequência de tokens. Qualquer
/// violação é [`FrogError::InvalidInput`] com o(s) span(s) culpado(s);
/// nada é enviado pela rede antes desta função passar.
fn request_body(text: &str, tokens: &[Span]) -> Result<String> {
    let mut body = String::new();
    let mut prev = Span::new(0, 0);

    for span in tokens {
        let trimmed = span.trim(text);
        let token = trimmed.covered_text(text);

        if token.is_empty() {
            return Err(FrogError::InvalidInput(format!(
                "empty or all-whitespace token '{}' at {span}",
                span.covered_text(text)
            )));
        }
        if token == "EOT" {
            return Err(FrogError::InvalidInput(
                "'EOT' not allowed as a token".to_string(),
            ));
        }
        if span.crosses(&prev) {
            return Err(FrogError::InvalidInput(format!(
                "crossing spans {prev} and {span}"
            )));
        }
        if span.start < prev.end {
            return Err(FrogError::InvalidInput(format!(
                "unsorted spans: {prev}, then {span}"
            )));
        }

        body.push_str(token);
        body.push('\n');
        prev = span.clone();
    }
    body.push_str("EOT\n");
    Ok(body)
}

/// Acumula linhas da resposta até a sentinela `READY`, sem reinserir as
/// quebras de linha. EOF antes da sentinela é falha de transporte.
fn read_response(reader: impl BufRead) -> Result<String> {
    let mut body = String::new();
    for line in reader.lines() {
        let line = line?;
        if line == "READY" {
            return Ok(body);
        }
        body.push_str(&line);
    }
    Err(FrogError::Transport(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "connection closed before READY",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{SocketAddr, TcpListener};
    use std::thread;

    /// Servidor de mentira falando o protocolo EOT/READY: aceita conexões
    /// em série e responde sempre o mesmo documento.
    fn serve(response: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    if line.trim_end() == "EOT" {
                        break;
                    }
                }
                stream.write_all(response.as_bytes()).unwrap();
                stream.write_all(b"\nREADY\n").unwrap();
            }
        });
        addr
    }

    fn client_for(addr: SocketAddr) -> FrogClient {
        FrogClient::new(addr.ip().to_string(), addr.port())
    }

    /// Resposta FoLiA para "Henk staat aan het begin van de zin.":
    /// nove tokens, uma entidade `per` no primeiro.
    const HENK_FOLIA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FoLiA xmlns="http://ilk.uvt.nl/folia" xml:id="untitled">
  <text xml:id="untitled.text">
    <s xml:id="untitled.p.1.s.1">
      <w xml:id="untitled.p.1.s.1.w.1"><t>Henk</t></w>
      <w xml:id="untitled.p.1.s.1.w.2"><t>staat</t></w>
      <w xml:id="untitled.p.1.s.1.w.3"><t>aan</t></w>
      <w xml:id="untitled.p.1.s.1.w.4"><t>het</t></w>
      <w xml:id="untitled.p.1.s.1.w.5"><t>begin</t></w>
      <w xml:id="untitled.p.1.s.1.w.6"><t>van</t></w>
      <w xml:id="untitled.p.1.s.1.w.7"><t>de</t></w>
      <w xml:id="untitled.p.1.s.1.w.8"><t>zin</t></w>
      <w xml:id="untitled.p.1.s.1.w.9"><t>.</t></w>
      <entities>
        <entity xml:id="untitled.p.1.s.1.entity.1" class="per">
          <wref id="untitled.p.1.s.1.w.1" t="Henk"/>
        </entity>
      </entities>
    </s>
  </text>
</FoLiA>"#;

    /// Resposta FoLiA para "Bert Haanstra": entidade `per` nos dois tokens.
    const BERT_FOLIA: &str = r#"<FoLiA xmlns="http://ilk.uvt.nl/folia" xml:id="untitled">
<w xml:id="w.1"><t>Bert</t></w>
<w xml:id="w.2"><t>Haanstra</t></w>
<entities>
<entity class="per"><wref id="w.1" t="Bert"/><wref id="w.2" t="Haanstra"/></entity>
</entities>
</FoLiA>"#;

    #[test]
    fn test_apply_tokens_end_to_end() {
        let text = "Henk staat aan het begin van de zin.";
        let bounds = [0, 4, 5, 10, 11, 15, 15, 18, 19, 24, 25, 28, 29, 31, 32, 35, 35, 36];
        let tokens: Vec<Span> = bounds
            .chunks(2)
            .map(|b| Span::new(b[0], b[1]).trim(text))
            .collect();

        let client = client_for(serve(HENK_FOLIA));
        let names = client.apply_tokens(text, &tokens).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].covered_text(text), "Henk");
        assert_eq!(names[0].label.as_deref(), Some("per"));
    }

    #[test]
    fn test_invalid_input_fails_before_io() {
        // Porta 1: conectar falharia, mas a validação corta antes.
        let client = FrogClient::new("localhost", 1);

        // Token vazio.
        let err = client.apply_tokens("", &[Span::new(0, 0)]).unwrap_err();
        assert!(matches!(err, FrogError::InvalidInput(_)));

        // Spans cruzados.
        let err = client
            .apply_tokens("Hallo!", &[Span::new(0, 4), Span::new(3, 6)])
            .unwrap_err();
        assert!(matches!(err, FrogError::InvalidInput(msg) if msg.contains("crossing")));

        // Fora de ordem.
        let err = client
            .apply_tokens("Hallo wereld!", &[Span::new(6, 13), Span::new(0, 5)])
            .unwrap_err();
        assert!(matches!(err, FrogError::InvalidInput(msg) if msg.contains("unsorted")));

        // "EOT" literal como token.
        let err = client.apply("Wat is een EOT ?").unwrap_err();
        assert!(matches!(err, FrogError::InvalidInput(msg) if msg.contains("EOT")));
    }

    #[test]
    fn test_request_body_format() {
        let text = "Henk staat.";
        let body = request_body(text, &tokenize(text)).unwrap();
        assert_eq!(body, "Henk\nstaat\n.\nEOT\n");
    }

    #[test]
    fn test_eof_before_ready_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line.trim_end() == "EOT" {
                    break;
                }
            }
            // Responde algo e fecha sem a sentinela READY.
            stream.write_all(b"<FoLiA/>\n").unwrap();
        });
        let client = client_for(addr);
        let err = client.apply("Henk").unwrap_err();
        assert!(matches!(err, FrogError::Transport(_)));
    }

    #[test]
    fn test_garbage_response_is_protocol_violation() {
        let client = client_for(serve("isto não é XML <"));
        let err = client.apply("Henk").unwrap_err();
        assert!(matches!(err, FrogError::Protocol(_)));
    }

    #[test]
    fn test_apply_xml_milestones_as_siblings() {
        let client = client_for(serve(BERT_FOLIA));
        let options = XmlOptions {
            xml: "<p>Bert <br/>Haanstra</p>".to_string(),
            xpath: "//p".to_string(),
            namespaces: HashMap::new(),
            start_tag: "start".to_string(),
            end_tag: "end".to_string(),
            class_attr: Some("class".to_string()),
        };
        let out = client.apply_xml(&options).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n<p><start class=\"per\"/>Bert <br/>Haanstra<end/></p>"
        );
    }

    #[test]
    fn test_apply_xml_input_validation() {
        let client = FrogClient::new("localhost", 1);
        let working = XmlOptions {
            xml: "<p/>".to_string(),
            xpath: "//p".to_string(),
            namespaces: HashMap::new(),
            start_tag: "start".to_string(),
            end_tag: "end".to_string(),
            class_attr: None,
        };

        let mut args = working.clone();
        args.xml = String::new();
        assert!(matches!(
            client.apply_xml(&args).unwrap_err(),
            FrogError::InvalidInput(_)
        ));

        let mut args = working.clone();
        args.xpath = String::new();
        assert!(matches!(
            client.apply_xml(&args).unwrap_err(),
            FrogError::InvalidInput(_)
        ));

        let mut args = working.clone();
        args.xml = "<p>não fechado".to_string();
        assert!(matches!(client.apply_xml(&args).unwrap_err(), FrogError::Xml(_)));

        let mut args = working;
        args.xpath = "//p[position()>1]".to_string();
        assert!(matches!(client.apply_xml(&args).unwrap_err(), FrogError::XPath(_)));
    }

    #[test]
    fn test_xml_options_wire_format() {
        // Os nomes no fio são starttag/endtag/classattr; namespaces e
        // classattr são opcionais.
        let options: XmlOptions = serde_json::from_str(
            r#"{"xml": "<p/>", "xpath": "//p", "starttag": "s", "endtag": "e",
                "classattr": "class", "namespaces": {"f": "http://ilk.uvt.nl/folia"}}"#,
        )
        .unwrap();
        assert_eq!(options.start_tag, "s");
        assert_eq!(options.end_tag, "e");
        assert_eq!(options.class_attr.as_deref(), Some("class"));
        assert_eq!(
            options.namespaces.get("f").map(String::as_str),
            Some("http://ilk.uvt.nl/folia")
        );

        let options: XmlOptions =
            serde_json::from_str(r#"{"xml": "<p/>", "xpath": "/p", "starttag": "s", "endtag": "e"}"#)
                .unwrap();
        assert!(options.class_attr.is_none());
        assert!(options.namespaces.is_empty());
    }

    #[test]
    fn test_apply_xml_no_entities_returns_document_unchanged() {
        const EMPTY_FOLIA: &str = r#"<FoLiA xmlns="http://ilk.uvt.nl/folia" xml:id="untitled">
<w xml:id="w.1"><t>Dit</t></w><w xml:id="w.2"><t>is</t></w><w xml:id="w.3"><t>kort</t></w><w xml:id="w.4"><t>.</t></w>
</FoLiA>"#;
        let client = client_for(serve(EMPTY_FOLIA));
        let options = XmlOptions {
            xml: "<p>Dit is kort.</p>".to_string(),
            xpath: "//p".to_string(),
            namespaces: HashMap::new(),
            start_tag: "start".to_string(),
            end_tag: "end".to_string(),
            class_attr: None,
        };
        let out = client.apply_xml(&options).unwrap();
        assert_eq!(out, "<?xml version=\"1.0\"?>\n<p>Dit is kort.</p>");
    }
}
