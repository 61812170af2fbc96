//! # Erros do pipeline
//!
//! Taxonomia central de erros, com `thiserror`. A política de propagação é
//! estrita: nenhum erro é engolido para produzir resultado parcial — qualquer
//! violação detectada aborta a chamada `apply`/`apply_xml` inteira. A única
//! recuperação possível fica no chamador, por documento.

use thiserror::Error;

/// XML malformado encontrado pelo módulo [`crate::xml`].
#[derive(Debug, Error)]
pub enum XmlError {
    /// O parser de eventos rejeitou a entrada.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// O documento não tem elemento raiz.
    #[error("document has no root element")]
    NoRoot,

    /// Havia conteúdo estrutural depois do fechamento da raiz.
    #[error("trailing content after root element")]
    TrailingContent,
}

/// Expressão XPath que o subconjunto suportado não aceita.
#[derive(Debug, Error)]
pub enum XPathError {
    #[error("empty XPath expression")]
    Empty,

    #[error("unsupported XPath syntax near '{0}'")]
    Unsupported(String),

    #[error("malformed predicate '{0}'")]
    BadPredicate(String),

    /// Prefixo usado na expressão sem mapeamento prefixo→URI.
    #[error("unknown namespace prefix '{0}'")]
    UnknownPrefix(String),
}

/// Erro de uma chamada ao reconhecedor ou de projeção de anotações.
#[derive(Debug, Error)]
pub enum FrogError {
    /// Entrada malformada, detectada localmente **antes** de qualquer I/O:
    /// token vazio/só espaços, token literal `EOT`, spans cruzados ou fora
    /// de ordem, pedido XML com campos vazios.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Falha de conexão, escrita ou leitura no socket, incluindo EOF antes
    /// da sentinela `READY`. Fatal para a chamada; esta camada não tenta de
    /// novo.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// A resposta do reconhecedor violou o protocolo: XML malformado,
    /// token sem identificador, entidade sem referência de token, id
    /// desconhecido.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Entidade começa depois do último token (contrato do BIO violado).
    #[error("entity span out of range")]
    OutOfRange,

    /// Um token foi reivindicado por mais de uma entidade.
    #[error("overlapping entities")]
    OverlappingEntities,

    /// O documento XML **de entrada** de um pedido de anotação é inválido.
    /// Distinto de [`FrogError::Protocol`] para que a camada HTTP o trate
    /// como erro do cliente.
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// O XPath de um pedido de anotação é inválido.
    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),
}

/// Alias de resultado do crate.
pub type Result<T> = std::result::Result<T, FrogError>;
