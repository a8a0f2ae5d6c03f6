//! Domain model: supported libraries and search hits

use serde::{Deserialize, Serialize};

use crate::error::{DocsError, Result};

/// Documentation sites the `get_docs` tool can search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Library {
    LangChain,
    LlamaIndex,
    OpenAi,
}

impl Library {
    pub const ALL: [Library; 3] = [Library::LangChain, Library::LlamaIndex, Library::OpenAi];

    /// Identifier the model passes in the `library` argument
    pub fn id(self) -> &'static str {
        match self {
            Library::LangChain => "langchain",
            Library::LlamaIndex => "llama-index",
            Library::OpenAi => "openai",
        }
    }

    /// Site prefix used to scope the web search
    pub fn docs_url(self) -> &'static str {
        match self {
            Library::LangChain => "python.langchain.com/docs",
            Library::LlamaIndex => "docs.llamaindex.ai/stable",
            Library::OpenAi => "platform.openai.com/docs",
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|lib| lib.id() == id)
            .ok_or_else(|| DocsError::UnsupportedLibrary(id.to_string()))
    }

    /// Search query restricted to this library's docs
    pub fn site_query(self, query: &str) -> String {
        format!("site:{} {}", self.docs_url(), query)
    }
}

/// One organic search hit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}
