use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pdfchat_rag::config::{DEFAULT_OLLAMA_URL, DEFAULT_QDRANT_URL};
use pdfchat_rag::{BackendConfig, IndexKind, ProviderKind, QueryPolicy, RagConfig};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Parser)]
#[command(name = "pdfchat", version, about = "Chat with your PDF documents")]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest documents, then answer questions interactively
    Chat(SourceArgs),
    /// Ingest documents and answer a single question
    Ask {
        #[command(flatten)]
        source: SourceArgs,
        /// The question to answer
        question: String,
    },
}

/// Where the documents come from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Ingest every PDF under an existing directory, in place
    #[arg(
        long,
        value_name = "DIR",
        conflicts_with = "upload",
        required_unless_present = "upload"
    )]
    pub docs: Option<PathBuf>,

    /// Stage a PDF file for ingestion (can be repeated)
    #[arg(long, value_name = "FILE")]
    pub upload: Vec<PathBuf>,

    /// Directory under which upload batches are staged
    #[arg(long, default_value = "uploads", env = "PDFCHAT_UPLOADS_DIR")]
    pub uploads_root: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Embedding backend
    #[arg(long, global = true, default_value = "ollama", env = "PDFCHAT_EMBEDDING_PROVIDER")]
    pub embedding_provider: ProviderKind,

    /// Embedding model name
    #[arg(
        long,
        global = true,
        default_value = "nomic-embed-text",
        env = "PDFCHAT_EMBEDDING_MODEL"
    )]
    pub embedding_model: String,

    /// Dimension of the embedding model's vectors
    #[arg(long, global = true, default_value_t = 768, env = "PDFCHAT_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: usize,

    /// Generative model backend
    #[arg(long, global = true, default_value = "ollama", env = "PDFCHAT_CHAT_PROVIDER")]
    pub chat_provider: ProviderKind,

    /// Generative model name
    #[arg(
        long,
        global = true,
        default_value = "llama3:8b-instruct-q5_1",
        env = "PDFCHAT_CHAT_MODEL"
    )]
    pub chat_model: String,

    /// Sampling temperature for the generative model
    #[arg(long, global = true, env = "PDFCHAT_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Ollama server URL
    #[arg(long, global = true, default_value = DEFAULT_OLLAMA_URL, env = "OLLAMA_API_BASE_URL")]
    pub ollama_url: String,

    /// Base URL of an OpenAI-compatible server
    #[arg(long, global = true, default_value = OPENAI_API_BASE, env = "OPENAI_BASE_URL")]
    pub openai_url: String,

    /// API key for OpenAI-compatible servers
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Vector index backend
    #[arg(long, global = true, env = "PDFCHAT_VECTOR_INDEX")]
    pub vector_index: Option<IndexKind>,

    /// Qdrant gRPC URL; selects the Qdrant index unless --vector-index says otherwise
    #[arg(long, global = true, env = "QDRANT_URL")]
    pub qdrant_url: Option<String>,

    /// Timeout for each backend request, in seconds
    #[arg(long, global = true, default_value_t = 120, env = "PDFCHAT_REQUEST_TIMEOUT")]
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Args)]
pub struct RetrievalArgs {
    /// Maximum chunk size in characters
    #[arg(long, global = true, default_value_t = 800, env = "PDFCHAT_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Characters repeated between consecutive chunks
    #[arg(long, global = true, default_value_t = 80, env = "PDFCHAT_CHUNK_OVERLAP")]
    pub chunk_overlap: usize,

    /// Passages retrieved per question
    #[arg(long, global = true, default_value_t = 4, env = "PDFCHAT_TOP_K")]
    pub top_k: usize,

    /// Drop passages scoring below this similarity
    #[arg(long, global = true, default_value_t = 0.0)]
    pub similarity_threshold: f32,

    /// How follow-up questions become retrieval queries: verbatim or condense
    #[arg(long, global = true, default_value = "verbatim", env = "PDFCHAT_QUERY_POLICY")]
    pub query_policy: QueryPolicy,
}

impl BackendArgs {
    pub fn to_config(&self) -> BackendConfig {
        let url_for = |provider| match provider {
            ProviderKind::Ollama => self.ollama_url.clone(),
            ProviderKind::OpenAi => self.openai_url.clone(),
        };
        let vector_index = self.vector_index.unwrap_or(if self.qdrant_url.is_some() {
            IndexKind::Qdrant
        } else {
            IndexKind::Memory
        });

        BackendConfig {
            embedding_provider: self.embedding_provider,
            embedding_url: url_for(self.embedding_provider),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.embedding_dimensions,
            chat_provider: self.chat_provider,
            chat_url: url_for(self.chat_provider),
            chat_model: self.chat_model.clone(),
            temperature: self.temperature,
            vector_index,
            qdrant_url: self.qdrant_url.clone().unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            api_key: self.openai_api_key.clone(),
            request_timeout_secs: self.request_timeout,
        }
    }
}

impl RetrievalArgs {
    pub fn to_config(&self) -> pdfchat_rag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .similarity_threshold(self.similarity_threshold)
            .query_policy(self.query_policy)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_with_docs_uses_defaults() {
        let cli = Cli::try_parse_from(["pdfchat", "chat", "--docs", "papers"]).unwrap();
        let Command::Chat(source) = &cli.command else { panic!("expected chat") };
        assert_eq!(source.docs.as_deref(), Some(std::path::Path::new("papers")));

        let rag = cli.retrieval.to_config().unwrap();
        assert_eq!((rag.chunk_size, rag.chunk_overlap, rag.top_k), (800, 80, 4));
    }

    #[test]
    fn docs_and_upload_are_exclusive() {
        let result =
            Cli::try_parse_from(["pdfchat", "chat", "--docs", "papers", "--upload", "a.pdf"]);
        assert!(result.is_err());
        assert!(Cli::try_parse_from(["pdfchat", "chat"]).is_err());
    }

    #[test]
    fn qdrant_url_selects_qdrant_index() {
        let cli = Cli::try_parse_from([
            "pdfchat",
            "--qdrant-url",
            "http://qdrant:6334",
            "ask",
            "--upload",
            "a.pdf",
            "What is this about?",
        ])
        .unwrap();
        let backend = cli.backend.to_config();
        assert_eq!(backend.vector_index, IndexKind::Qdrant);
        assert_eq!(backend.qdrant_url, "http://qdrant:6334");
    }

    #[test]
    fn openai_provider_uses_openai_url() {
        let cli = Cli::try_parse_from([
            "pdfchat",
            "--embedding-provider",
            "openai",
            "chat",
            "--docs",
            "papers",
        ])
        .unwrap();
        let backend = cli.backend.to_config();
        assert_eq!(backend.embedding_url, OPENAI_API_BASE);
        assert_eq!(backend.chat_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn temperature_reaches_backend_config() {
        let cli = Cli::try_parse_from(["pdfchat", "--temperature", "0.3", "chat", "--docs", "p"])
            .unwrap();
        assert_eq!(cli.backend.to_config().temperature, Some(0.3));

        let cli = Cli::try_parse_from(["pdfchat", "chat", "--docs", "p"]).unwrap();
        assert_eq!(cli.backend.to_config().temperature, None);
    }
}
