//! Dataform tools language server
//!
//! Speaks LSP over stdin/stdout; logs go to stderr.

use dataform_tools_lsp::{Backend, DEPENDENCY_TREE_METHOD, TABLE_METADATA_METHOD};
use tower_lsp::{LspService, Server};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Dataform tools LSP server");

    let (stdin, stdout) = (tokio::io::stdin(), tokio::io::stdout());
    let (service, socket) = LspService::build(Backend::new)
        .custom_method(TABLE_METADATA_METHOD, Backend::table_metadata)
        .custom_method(DEPENDENCY_TREE_METHOD, Backend::dependency_tree)
        .finish();

    Server::new(stdin, stdout, socket).serve(service).await;

    tracing::info!("Dataform tools LSP server stopped");
}
