//! # frog-core — projeção de anotações NER sobre texto e XML
//!
//! Biblioteca que conecta um reconhecedor de entidades nomeadas externo (o
//! **Frog**, falado via socket TCP) a documentos do chamador: texto puro
//! tokenizado ou XML arbitrário. O resultado sai em duas formas
//! intercambiáveis:
//!
//! | Saída | Função | Uso típico |
//! |-------|--------|------------|
//! | Spans rotulados | [`FrogClient::apply_tokens`] | pós-processamento próprio |
//! | Tags BIO | [`to_bio`] | treino/avaliação de modelos |
//! | XML com milestones | [`FrogClient::apply_xml`] | corpora TEI e afins |
//!
//! ## Arquitetura
//!
//! ```text
//! texto + tokens ──► cliente TCP ──► FoLiA ──► spans de entidade
//!                                                 │
//!                           ┌─────────────────────┴───────┐
//!                           ▼                             ▼
//!                      tags BIO                milestones no XML
//! ```
//!
//! - [`span`]: spans de byte `[start, end)` com rótulo opcional — a moeda
//!   corrente de toda a biblioteca
//! - [`tokenizer`]: tokenizador padrão para quem não traz fronteiras prontas
//! - [`client`]: o protocolo do Frog (linhas + `EOT`/`READY`) e a
//!   orquestração texto→spans e XML→XML
//! - [`folia`]: da resposta FoLiA do Frog para spans de byte
//! - [`tags`]: codificação BIO
//! - [`xml`] e [`xpath`]: árvore XML própria e o subconjunto de XPath usado
//!   para selecionar os nós a anotar
//!
//! ## Exemplo
//!
//! ```no_run
//! use frog_core::FrogClient;
//!
//! fn main() -> frog_core::Result<()> {
//!     let client = FrogClient::new("localhost", 9999);
//!     for entity in client.apply("Bert Haanstra filmt in Amsterdam.")? {
//!         println!("{entity}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Todos os offsets são **bytes** UTF-8 sobre o texto do chamador, nunca
//! índices de caractere.

pub mod client;
pub mod error;
pub mod folia;
pub mod milestone;
pub mod span;
pub mod tags;
pub mod tokenizer;
pub mod xml;
pub mod xpath;

pub use client::{FrogClient, XmlOptions};
pub use error::{FrogError, Result, XPathError, XmlError};
pub use milestone::MilestoneOptions;
pub use span::Span;
pub use tags::to_bio;
pub use tokenizer::tokenize;
